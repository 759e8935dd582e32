//! The content-addressed store: every distinct file body, stored once.
//!
//! Blobs live at `FILE/<d1>/<d2>/<hash>_<size>.dbf`. The directory segments
//! come from the first two hash bytes, sliced at six bits so the first level
//! tops out at 64 entries. A blob's name *is* its integrity claim: if the
//! on-disk size doesn't match the name, the blob is ignored (never deleted)
//! and a backup will lay it down again.

use std::fs::{self, File};

use anyhow::{Context, Result, ensure};
use camino::{Utf8Path, Utf8PathBuf};
use rustc_hash::FxHashSet;
use tracing::*;

use crate::counters;
use crate::file_util;
use crate::hashing::{self, ContentId};
use crate::snapshot::{FileEntry, Snapshot};

pub const STORE_DIR: &str = "FILE";
pub const BLOB_EXTENSION: &str = "dbf";

/// `<64-hex-hash>_<uppercase-hex-byte-count>.dbf`
pub fn blob_name(hash: &ContentId, byte_count: u64) -> String {
    format!("{hash}_{byte_count:X}.{BLOB_EXTENSION}")
}

/// The store-relative path of a blob: two fanout directories, then the name.
pub fn blob_rel_path(hash: &ContentId, byte_count: u64) -> Utf8PathBuf {
    let h = hash.as_bytes();
    let d1 = h[0] >> 2;
    let d2 = (h[0] << 4) | (h[1] >> 4);
    Utf8PathBuf::from(format!(
        "{d1:02X}/{d2:02X}/{}",
        blob_name(hash, byte_count)
    ))
}

fn parse_blob_name(name: &str) -> Option<(ContentId, u64)> {
    let stem = name.strip_suffix(".dbf")?;
    let (hex, size) = stem.split_once('_')?;
    if hex.len() != 64 {
        return None;
    }
    let hash = hex.parse::<ContentId>().ok()?;
    let byte_count = u64::from_str_radix(size, 16).ok()?;
    // Canonical rendering only: uppercase, no leading zeros.
    if format!("{byte_count:X}") != size {
        return None;
    }
    Some((hash, byte_count))
}

/// What a backup did, for summaries and tests.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct BackupStats {
    pub files_hashed: usize,
    pub files_reused: usize,
    pub blobs_written: usize,
    pub blobs_deduplicated: usize,
    pub bytes_copied: u64,
}

/// What a restore did.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct RestoreStats {
    pub files_copied: usize,
    pub files_skipped: usize,
    pub files_pruned: usize,
    pub folders_pruned: usize,
}

pub struct Store {
    folder: Utf8PathBuf,
    /// Absolute paths of every valid blob. Only grows.
    present: FxHashSet<Utf8PathBuf>,
}

impl Store {
    /// Open (and with `create`, make) the store under a repository root,
    /// indexing every blob already present.
    pub fn open(repository: &Utf8Path, create: bool) -> Result<Store> {
        let folder = repository.join(STORE_DIR);
        if create {
            file_util::mkdir_recursive(&folder)?;
        } else {
            ensure!(
                folder.is_dir(),
                "No file store at {folder} (is {repository} a repository?)"
            );
        }
        let mut store = Store {
            folder,
            present: FxHashSet::default(),
        };
        store.scan()?;
        Ok(store)
    }

    fn scan(&mut self) -> Result<()> {
        for level1 in subdirectories(&self.folder)? {
            for level2 in subdirectories(&level1)? {
                for entry in
                    fs::read_dir(&level2).with_context(|| format!("Couldn't read {level2}"))?
                {
                    let entry =
                        entry.with_context(|| format!("Couldn't read an entry of {level2}"))?;
                    let Ok(name) = entry.file_name().into_string() else {
                        continue;
                    };
                    let path = level2.join(&name);
                    let Some((_, byte_count)) = parse_blob_name(&name) else {
                        warn!("{path} isn't named like a blob; ignoring it");
                        continue;
                    };
                    let on_disk = entry
                        .metadata()
                        .with_context(|| format!("Couldn't stat {path}"))?
                        .len();
                    if on_disk != byte_count {
                        warn!(
                            "{path} is {on_disk} bytes but its name says {byte_count}; ignoring it"
                        );
                        continue;
                    }
                    self.present.insert(path);
                }
            }
        }
        debug!("Indexed {} blobs in {}", self.present.len(), self.folder);
        Ok(())
    }

    pub fn blob_path(&self, hash: &ContentId, byte_count: u64) -> Utf8PathBuf {
        self.folder.join(blob_rel_path(hash, byte_count))
    }

    pub fn contains(&self, hash: &ContentId, byte_count: u64) -> bool {
        self.present.contains(&self.blob_path(hash, byte_count))
    }

    /// Hash one data file, fill in its record, and copy it into the store
    /// unless an identical blob is already there.
    pub fn backup_file(
        &mut self,
        data_path: &Utf8Path,
        file: &mut FileEntry,
        stats: &mut BackupStats,
    ) -> Result<()> {
        let (hash, byte_count) = hashing::hash_file(data_path)?;
        stats.files_hashed += 1;
        let info = file_util::stat(data_path)?;
        file.hash = hash;
        file.byte_count = byte_count;
        file.access_ticks = info.access_ticks;
        file.modification_ticks = info.modification_ticks;
        file.attribute_mask = info.attributes;

        let dest = self.blob_path(&hash, byte_count);
        if self.present.contains(&dest) {
            trace!("{:>9} {data_path}", "deduped");
            counters::bump(counters::Op::BlobDedup);
            stats.blobs_deduplicated += 1;
            return Ok(());
        }

        file_util::mkdir_recursive(dest.parent().expect("blob paths have parents"))?;
        let from = File::open(data_path).with_context(|| format!("Couldn't open {data_path}"))?;
        file_util::safe_copy_to_file(from, &dest)?;
        self.present.insert(dest);
        counters::bump(counters::Op::BlobWrite);
        stats.blobs_written += 1;
        stats.bytes_copied += byte_count;
        Ok(())
    }

    /// Back up every file of a freshly scanned snapshot.
    ///
    /// A file whose `(path, byte_count, modification_time)` matches the
    /// previous snapshot adopts its hash without being read at all: that's
    /// the fast path that makes repeat backups cheap.
    pub fn backup_snapshot(
        &mut self,
        data_folder: &Utf8Path,
        snapshot: &mut Snapshot,
        previous: Option<&Snapshot>,
        abort: bool,
    ) -> Result<BackupStats> {
        let mut stats = BackupStats::default();
        for i in 0..snapshot.files.len() {
            let path = snapshot.file_path(&snapshot.files[i]);
            if let Some(prev) = previous.and_then(|p| p.file_at(&path)) {
                let file = &snapshot.files[i];
                if prev.byte_count == file.byte_count
                    && prev.modification_ticks == file.modification_ticks
                {
                    trace!("{:>9} {path}", "unchanged");
                    snapshot.files[i].hash = prev.hash;
                    counters::bump(counters::Op::FastPathReuse);
                    stats.files_reused += 1;
                    continue;
                }
            }
            debug!("{:>9} {path}", "backup");
            let data_path = data_folder.join(&path);
            if let Err(e) = self.backup_file(&data_path, &mut snapshot.files[i], &mut stats) {
                if abort {
                    return Err(e);
                }
                crate::report_nonfatal(&e);
            }
        }
        Ok(stats)
    }

    /// Make the data folder look like the archived snapshot.
    ///
    /// Copies out every blob whose live counterpart is absent or differs by
    /// `(byte_count, modification_time)`, reapplying recorded times and
    /// attributes. Then prunes: live files the archive doesn't know are
    /// removed, and live folders the archive doesn't know are removed if
    /// (and only if) that left them empty. Files strictly before folders.
    pub fn restore_snapshot(
        &self,
        data_folder: &Utf8Path,
        archive: &Snapshot,
        live: &Snapshot,
        abort: bool,
    ) -> Result<RestoreStats> {
        let mut stats = RestoreStats::default();

        // Record order is parent-first, so this recreates the tree top-down
        // (empty archived folders included).
        for folder in &archive.folders {
            file_util::mkdir_recursive(&data_folder.join(&folder.path))?;
        }

        for file in &archive.files {
            let path = archive.file_path(file);
            if let Some(live_file) = live.file_at(&path)
                && live_file.byte_count == file.byte_count
                && live_file.modification_ticks == file.modification_ticks
            {
                trace!("{:>9} {path}", "matches");
                counters::bump(counters::Op::RestoreSkip);
                stats.files_skipped += 1;
                continue;
            }
            debug!("{:>9} {path}", "restore");
            if let Err(e) = self.restore_file(data_folder, &path, file) {
                if abort {
                    return Err(e);
                }
                crate::report_nonfatal(&e);
                continue;
            }
            stats.files_copied += 1;
        }

        for file in &live.files {
            let path = live.file_path(file);
            if archive.file_at(&path).is_some() {
                continue;
            }
            debug!("{:>9} {path}", "prune");
            if let Err(e) = file_util::remove_file(&data_folder.join(&path)) {
                if abort {
                    return Err(e);
                }
                crate::report_nonfatal(&e);
                continue;
            }
            counters::bump(counters::Op::PruneFile);
            stats.files_pruned += 1;
        }

        // Children sit after their parents in the records; walk backwards so
        // emptied subtrees collapse bottom-up.
        for folder in live.folders.iter().rev() {
            if folder.path.is_empty() || archive.folder_at(&folder.path).is_some() {
                continue;
            }
            match file_util::remove_empty_dir(&data_folder.join(&folder.path)) {
                Ok(true) => {
                    debug!("{:>9} {}", "prune", folder.path);
                    counters::bump(counters::Op::PruneFolder);
                    stats.folders_pruned += 1;
                }
                Ok(false) => debug!("Leaving non-empty folder {}", folder.path),
                Err(e) => {
                    if abort {
                        return Err(e);
                    }
                    crate::report_nonfatal(&e);
                }
            }
        }
        Ok(stats)
    }

    fn restore_file(&self, data_folder: &Utf8Path, path: &str, file: &FileEntry) -> Result<()> {
        let blob = self.blob_path(&file.hash, file.byte_count);
        ensure!(
            self.present.contains(&blob),
            "No blob {} in the store for {path}",
            blob_name(&file.hash, file.byte_count)
        );
        let dest = data_folder.join(path);
        if dest.exists() {
            // An existing file may be read-only; loosen it for the copy and
            // the timestamps, then put the recorded attributes back last.
            file_util::clear_protection(&dest)?;
        }
        file_util::copy_contents(&blob, &dest)?;
        file_util::set_times(&dest, file.access_ticks, file.modification_ticks)?;
        file_util::set_attributes(&dest, file.attribute_mask)?;
        counters::bump(counters::Op::RestoreCopy);
        Ok(())
    }

    /// Verify that every file of a snapshot has its blob, at the recorded
    /// size, in the store. Returns how many don't.
    pub fn check_snapshot(&self, snapshot: &Snapshot) -> usize {
        let mut missing = 0;
        for file in &snapshot.files {
            if !self.contains(&file.hash, file.byte_count) {
                error!(
                    "No blob {} in the store for {}",
                    blob_name(&file.hash, file.byte_count),
                    snapshot.file_path(file)
                );
                missing += 1;
            }
        }
        missing
    }
}

fn subdirectories(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Couldn't read {dir}"))? {
        let entry = entry.with_context(|| format!("Couldn't read an entry of {dir}"))?;
        if !entry
            .file_type()
            .with_context(|| format!("Couldn't get an entry type in {dir}"))?
            .is_dir()
        {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            dirs.push(dir.join(name));
        }
    }
    Ok(dirs)
}
