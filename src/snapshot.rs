//! Build, read and write snapshots: one immutable record per scan of a
//! data folder.
//!
//! A snapshot is two flat tables (folders, then files) plus the scan's
//! filter configuration. Folders come parent-first, so a single pass can
//! rebuild every path; files point back into the folder table by index.

use std::fs;
use std::io::prelude::*;

use anyhow::{Context, Result, bail, ensure};
use camino::{Utf8Path, Utf8PathBuf};
use rustc_hash::FxHashMap;
use tracing::*;

use crate::file_util::{self, EntryKind};
use crate::filter::ScanOptions;
use crate::hashing::ContentId;
use crate::stream::{Decoder, Encoder};

pub const SNAPSHOT_VERSION: u32 = 1;
pub const SNAPSHOT_EXTENSION: &str = "dbs";

/// On the wire, a root folder's parent index.
const SUPER_FOLDER_NONE: u32 = 0xffff_ffff;

/// A directory the scan walked through.
///
/// `path` is relative to the data folder and slash-terminated (the root is
/// the empty string); it's derived from the parent chain, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub super_folder: Option<u32>,
    pub name: String,
    pub path: String,
    pub access_ticks: u64,
    pub modification_ticks: u64,
    pub attribute_mask: u32,
}

/// A regular file the scan kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub folder_index: u32,
    pub name: String,
    pub hash: ContentId,
    pub byte_count: u64,
    pub access_ticks: u64,
    pub modification_ticks: u64,
    pub attribute_mask: u32,
}

#[derive(Debug, Default)]
pub struct Snapshot {
    pub version: u32,
    pub time_ticks: u64,
    pub data_folder_path: String,
    pub folder_filters: Vec<String>,
    pub folder_filter_is_inclusive: Vec<bool>,
    pub file_filters: Vec<String>,
    pub file_filter_is_inclusive: Vec<bool>,
    pub selected_file_filters: Vec<String>,
    pub folders: Vec<Folder>,
    pub files: Vec<FileEntry>,

    // Derived; rebuilt after scans and loads.
    folder_by_path: FxHashMap<String, u32>,
    file_by_path: FxHashMap<String, u32>,
}

impl PartialEq for Snapshot {
    fn eq(&self, o: &Self) -> bool {
        // The lookup maps are derived from the tables; don't consult them.
        self.version == o.version
            && self.time_ticks == o.time_ticks
            && self.data_folder_path == o.data_folder_path
            && self.folder_filters == o.folder_filters
            && self.folder_filter_is_inclusive == o.folder_filter_is_inclusive
            && self.file_filters == o.file_filters
            && self.file_filter_is_inclusive == o.file_filter_is_inclusive
            && self.selected_file_filters == o.selected_file_filters
            && self.folders == o.folders
            && self.files == o.files
    }
}

impl Eq for Snapshot {}

impl Snapshot {
    /// A file's path relative to the data folder.
    pub fn file_path(&self, f: &FileEntry) -> String {
        format!("{}{}", self.folders[f.folder_index as usize].path, f.name)
    }

    pub fn folder_at(&self, path: &str) -> Option<&Folder> {
        self.folder_by_path
            .get(path)
            .map(|&i| &self.folders[i as usize])
    }

    pub fn file_at(&self, path: &str) -> Option<&FileEntry> {
        self.file_by_path
            .get(path)
            .map(|&i| &self.files[i as usize])
    }

    pub fn rebuild_lookup(&mut self) {
        self.folder_by_path = self
            .folders
            .iter()
            .enumerate()
            .map(|(i, f)| (f.path.clone(), i as u32))
            .collect();
        self.file_by_path = self
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| (self.file_path(f), i as u32))
            .collect();
    }

    /// Walk `data_folder` through the given filters and record what's there.
    ///
    /// Per directory, in-scope files are recorded first (in whatever order
    /// the filesystem enumerates them), then included subfolders are
    /// recursed into. Nothing is hashed here; hashes are filled in (or
    /// adopted from a previous snapshot) when the store backs the files up.
    pub fn scan(data_folder: &Utf8Path, time_ticks: u64, opts: &ScanOptions) -> Result<Snapshot> {
        let (folder_filters, folder_filter_is_inclusive) = opts.folder_parts();
        let (file_filters, file_filter_is_inclusive) = opts.file_parts();
        let mut snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            time_ticks,
            data_folder_path: data_folder.to_string(),
            folder_filters,
            folder_filter_is_inclusive,
            file_filters,
            file_filter_is_inclusive,
            selected_file_filters: opts.selected_file_filters.clone(),
            ..Default::default()
        };

        let root = file_util::stat(data_folder)?;
        snapshot.folders.push(Folder {
            super_folder: None,
            name: String::new(),
            path: String::new(),
            access_ticks: root.access_ticks,
            modification_ticks: root.modification_ticks,
            attribute_mask: root.attributes,
        });
        scan_folder(&mut snapshot, data_folder, 0, opts)?;

        snapshot.rebuild_lookup();
        Ok(snapshot)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut enc = Encoder::new();

        enc.begin_section("Version");
        enc.put_u32(self.version);

        enc.begin_section("Time");
        enc.put_varuint(self.time_ticks);

        enc.begin_section("DataFolderPath");
        enc.put_text(&self.data_folder_path);

        put_text_array(&mut enc, "FolderFilterArray", &self.folder_filters);
        put_bool_array(
            &mut enc,
            "FolderFilterIsInclusiveArray",
            &self.folder_filter_is_inclusive,
        );
        put_text_array(&mut enc, "FileFilterArray", &self.file_filters);
        put_bool_array(
            &mut enc,
            "FileFilterIsInclusiveArray",
            &self.file_filter_is_inclusive,
        );
        put_text_array(&mut enc, "SelectedFileFilterArray", &self.selected_file_filters);

        enc.begin_section("FolderArray");
        enc.put_u32(self.folders.len() as u32);
        for folder in &self.folders {
            enc.put_u32(folder.super_folder.unwrap_or(SUPER_FOLDER_NONE));
            enc.put_text(&folder.name);
            enc.put_varuint(folder.access_ticks);
            enc.put_varuint(folder.modification_ticks);
            enc.put_u32(folder.attribute_mask);
        }

        enc.begin_section("FileArray");
        enc.put_u32(self.files.len() as u32);
        for file in &self.files {
            enc.put_u32(file.folder_index);
            enc.put_text(&file.name);
            enc.put_hash(file.hash.as_bytes());
            enc.put_varuint(file.byte_count);
            enc.put_varuint(file.access_ticks);
            enc.put_varuint(file.modification_ticks);
            enc.put_u32(file.attribute_mask);
        }

        enc.finish()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Snapshot> {
        let mut dec = Decoder::new(bytes)?;
        let mut snapshot = Snapshot::default();

        if dec.begin_section("Version") {
            snapshot.version = dec.get_u32()?;
            dec.end_section()?;
        } else {
            missing("Version");
        }

        if dec.begin_section("Time") {
            snapshot.time_ticks = dec.get_varuint()?;
            dec.end_section()?;
        } else {
            missing("Time");
        }

        if dec.begin_section("DataFolderPath") {
            snapshot.data_folder_path = dec.get_text()?;
            dec.end_section()?;
        } else {
            missing("DataFolderPath");
        }

        snapshot.folder_filters = get_text_array(&mut dec, "FolderFilterArray")?;
        snapshot.folder_filter_is_inclusive =
            get_bool_array(&mut dec, "FolderFilterIsInclusiveArray")?;
        snapshot.file_filters = get_text_array(&mut dec, "FileFilterArray")?;
        snapshot.file_filter_is_inclusive = get_bool_array(&mut dec, "FileFilterIsInclusiveArray")?;
        snapshot.selected_file_filters = get_text_array(&mut dec, "SelectedFileFilterArray")?;

        if dec.begin_section("FolderArray") {
            let count = dec.get_u32()?;
            for i in 0..count {
                let raw_super = dec.get_u32()?;
                let name = dec.get_text()?;
                let access_ticks = dec.get_varuint()?;
                let modification_ticks = dec.get_varuint()?;
                let attribute_mask = dec.get_u32()?;

                let super_folder = (raw_super != SUPER_FOLDER_NONE).then_some(raw_super);
                let path = match (i, super_folder) {
                    (0, None) => String::new(),
                    (0, Some(parent)) => bail!("Folder 0 should be the root, not a child of {parent}"),
                    (_, None) => bail!("Folder {i} claims to be a second root"),
                    (_, Some(parent)) => {
                        ensure!(
                            parent < i,
                            "Folder {i}'s parent ({parent}) doesn't precede it"
                        );
                        format!("{}{}/", snapshot.folders[parent as usize].path, name)
                    }
                };
                snapshot.folders.push(Folder {
                    super_folder,
                    name,
                    path,
                    access_ticks,
                    modification_ticks,
                    attribute_mask,
                });
            }
            dec.end_section()?;
        } else {
            missing("FolderArray");
        }

        if dec.begin_section("FileArray") {
            let count = dec.get_u32()?;
            let folder_count = snapshot.folders.len() as u32;
            for _ in 0..count {
                let folder_index = dec.get_u32()?;
                let name = dec.get_text()?;
                let hash = ContentId::from_bytes(dec.get_hash()?);
                let byte_count = dec.get_varuint()?;
                let access_ticks = dec.get_varuint()?;
                let modification_ticks = dec.get_varuint()?;
                let attribute_mask = dec.get_u32()?;
                ensure!(
                    folder_index < folder_count,
                    "File {name} references folder {folder_index}, but there are only {folder_count}"
                );
                snapshot.files.push(FileEntry {
                    folder_index,
                    name,
                    hash,
                    byte_count,
                    access_ticks,
                    modification_ticks,
                    attribute_mask,
                });
            }
            dec.end_section()?;
        } else {
            missing("FileArray");
        }

        dec.finish()?;
        snapshot.rebuild_lookup();
        Ok(snapshot)
    }

    /// Write into the archive folder under a temporary name, then persist as
    /// `<name>.dbs`, so a crashed backup never leaves a half-written snapshot
    /// visible.
    pub fn save(&self, archive_folder: &Utf8Path, name: &str) -> Result<Utf8PathBuf> {
        let bytes = self.serialize();
        let mut fh = tempfile::Builder::new()
            .prefix("temp-dedub-")
            .suffix(".dbs")
            .tempfile_in(archive_folder)
            .context("Couldn't open temporary snapshot for writing")?;
        fh.write_all(&bytes).context("Couldn't save snapshot")?;
        fh.as_file().sync_all().context("Couldn't sync snapshot")?;

        let dest = archive_folder.join(format!("{name}.{SNAPSHOT_EXTENSION}"));
        fh.persist(&dest)
            .with_context(|| format!("Couldn't persist finished snapshot {dest}"))?;
        Ok(dest)
    }

    pub fn load(path: &Utf8Path) -> Result<Snapshot> {
        debug!("Loading snapshot {path}");
        let bytes = fs::read(path).with_context(|| format!("Couldn't read snapshot {path}"))?;
        Self::deserialize(&bytes).with_context(|| format!("Couldn't decode snapshot {path}"))
    }
}

fn missing(tag: &str) {
    warn!("Snapshot section {tag} is missing");
}

fn scan_folder(
    snapshot: &mut Snapshot,
    dir: &Utf8Path,
    folder_index: u32,
    opts: &ScanOptions,
) -> Result<()> {
    let folder_path = snapshot.folders[folder_index as usize].path.clone();
    let rooted = format!("/{folder_path}");

    let entries = file_util::walk_shallow(dir)?;
    for entry in entries.iter().filter(|e| e.kind == EntryKind::File) {
        if !opts.file_in_scope(&rooted, &entry.name) {
            trace!("{:>9} {rooted}{}", "filtered", entry.name);
            continue;
        }
        snapshot.files.push(FileEntry {
            folder_index,
            name: entry.name.clone(),
            hash: ContentId::default(),
            byte_count: entry.size,
            access_ticks: entry.access_ticks,
            modification_ticks: entry.modification_ticks,
            attribute_mask: entry.attributes,
        });
    }
    for entry in entries.iter().filter(|e| e.kind == EntryKind::Folder) {
        let sub_rooted = format!("{rooted}{}/", entry.name);
        if !opts.folder_included(&sub_rooted) {
            debug!("{:>9} {sub_rooted}", "filtered");
            continue;
        }
        let sub_index = snapshot.folders.len() as u32;
        snapshot.folders.push(Folder {
            super_folder: Some(folder_index),
            name: entry.name.clone(),
            path: format!("{folder_path}{}/", entry.name),
            access_ticks: entry.access_ticks,
            modification_ticks: entry.modification_ticks,
            attribute_mask: entry.attributes,
        });
        scan_folder(snapshot, &dir.join(&entry.name), sub_index, opts)?;
    }
    Ok(())
}

fn put_text_array(enc: &mut Encoder, tag: &str, values: &[String]) {
    enc.begin_section(tag);
    enc.put_u32(values.len() as u32);
    for v in values {
        enc.put_text(v);
    }
}

fn put_bool_array(enc: &mut Encoder, tag: &str, values: &[bool]) {
    enc.begin_section(tag);
    enc.put_u32(values.len() as u32);
    for v in values {
        enc.put_bool(*v);
    }
}

fn get_text_array(dec: &mut Decoder, tag: &str) -> Result<Vec<String>> {
    if !dec.begin_section(tag) {
        missing(tag);
        return Ok(Vec::new());
    }
    let count = dec.get_u32()?;
    let mut values = Vec::new();
    for _ in 0..count {
        values.push(dec.get_text()?);
    }
    dec.end_section()?;
    Ok(values)
}

fn get_bool_array(dec: &mut Decoder, tag: &str) -> Result<Vec<bool>> {
    if !dec.begin_section(tag) {
        missing(tag);
        return Ok(Vec::new());
    }
    let count = dec.get_u32()?;
    let mut values = Vec::new();
    for _ in 0..count {
        values.push(dec.get_bool()?);
    }
    dec.end_section()?;
    Ok(values)
}
