//! Filesystem plumbing: shallow walks, stat, copies, times and attributes.
//!
//! Everything here takes and returns UTF-8 paths, never follows symlinks,
//! and wraps failures with the path that caused them.

use std::fs::{self, File};
use std::io::prelude::*;

use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::*;

use crate::ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
    /// Symlinks, sockets, devices... nothing a snapshot represents.
    Other,
}

/// One directory child, as a scan sees it.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub access_ticks: u64,
    pub modification_ticks: u64,
    pub attributes: u32,
}

/// What a backup records about a path, minus its name.
#[derive(Debug, Clone, Copy)]
pub struct StatInfo {
    pub size: u64,
    pub access_ticks: u64,
    pub modification_ticks: u64,
    pub attributes: u32,
}

#[cfg(unix)]
fn attributes_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.mode()
}

#[cfg(windows)]
fn attributes_of(meta: &fs::Metadata) -> u32 {
    use std::os::windows::fs::MetadataExt;
    meta.file_attributes()
}

fn stat_of(meta: &fs::Metadata, path: &Utf8Path) -> Result<StatInfo> {
    let access = meta
        .accessed()
        .with_context(|| format!("No access time for {path}"))?;
    let modification = meta
        .modified()
        .with_context(|| format!("No modification time for {path}"))?;
    Ok(StatInfo {
        size: meta.len(),
        access_ticks: ticks::from_system_time(access),
        modification_ticks: ticks::from_system_time(modification),
        attributes: attributes_of(meta),
    })
}

/// Stat without following symlinks.
pub fn stat(path: &Utf8Path) -> Result<StatInfo> {
    let meta = fs::symlink_metadata(path).with_context(|| format!("Couldn't stat {path}"))?;
    stat_of(&meta, path)
}

/// List one directory, in whatever order the filesystem hands entries back.
///
/// Symlinks are never followed; they (and other non-file, non-folder
/// entries) come back as [`EntryKind::Other`] for the caller to skip.
pub fn walk_shallow(dir: &Utf8Path) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Couldn't read folder {dir}"))? {
        let entry = entry.with_context(|| format!("Couldn't read an entry of {dir}"))?;
        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(n) => {
                warn!(
                    "Skipping {}/{}: name isn't UTF-8",
                    dir,
                    n.to_string_lossy()
                );
                continue;
            }
        };
        let file_type = entry
            .file_type()
            .with_context(|| format!("Couldn't get the type of {dir}/{name}"))?;
        let kind = if file_type.is_symlink() {
            EntryKind::Other
        } else if file_type.is_dir() {
            EntryKind::Folder
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        // DirEntry::metadata() doesn't traverse symlinks either.
        let meta = entry
            .metadata()
            .with_context(|| format!("Couldn't stat {dir}/{name}"))?;
        let info = stat_of(&meta, &dir.join(&name))?;
        entries.push(DirEntry {
            name,
            kind,
            size: info.size,
            access_ticks: info.access_ticks,
            modification_ticks: info.modification_ticks,
            attributes: info.attributes,
        });
    }
    Ok(entries)
}

/// Copy contents only; destination attributes are whatever `create` gives
/// (or whatever the destination already had).
pub fn copy_contents(from: &Utf8Path, to: &Utf8Path) -> Result<u64> {
    let mut src = File::open(from).with_context(|| format!("Couldn't open {from}"))?;
    let mut dst = File::create(to).with_context(|| format!("Couldn't create {to}"))?;
    let copied =
        std::io::copy(&mut src, &mut dst).with_context(|| format!("Couldn't write {to}"))?;
    Ok(copied)
}

/// Copies the reader to a new file at `to + ".part"`, then renames to `to`.
///
/// This should guarantee that `to` never contains a partial file.
pub fn safe_copy_to_file<R: Read>(mut from: R, to: &Utf8Path) -> Result<()> {
    let to_part = Utf8PathBuf::from(format!("{to}.part"));

    let mut to_fh = File::create(&to_part).with_context(|| format!("Couldn't open {to_part}"))?;

    std::io::copy(&mut from, &mut to_fh).with_context(|| format!("Couldn't write {to_part}"))?;
    drop(from);

    to_fh
        .sync_all()
        .with_context(|| format!("Couldn't sync {to_part}"))?;
    drop(to_fh);

    fs::rename(&to_part, to).with_context(|| format!("Couldn't rename {to_part} to {to}"))
}

pub fn mkdir_recursive(path: &Utf8Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Couldn't create folder {path}"))
}

pub fn remove_file(path: &Utf8Path) -> Result<()> {
    fs::remove_file(path).with_context(|| format!("Couldn't remove {path}"))
}

/// Remove a directory if (and only if) it's empty; says whether it did.
pub fn remove_empty_dir(path: &Utf8Path) -> Result<bool> {
    let mut children = fs::read_dir(path).with_context(|| format!("Couldn't read folder {path}"))?;
    if children.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(path).with_context(|| format!("Couldn't remove folder {path}"))?;
    Ok(true)
}

#[cfg(unix)]
pub fn set_times(path: &Utf8Path, access_ticks: u64, modification_ticks: u64) -> Result<()> {
    use rustix::fs::{AtFlags, CWD, Timespec, Timestamps, utimensat};

    let timespec = |t: u64| {
        let (tv_sec, tv_nsec) = ticks::to_unix_parts(t);
        Timespec { tv_sec, tv_nsec }
    };
    utimensat(
        CWD,
        path.as_std_path(),
        &Timestamps {
            last_access: timespec(access_ticks),
            last_modification: timespec(modification_ticks),
        },
        AtFlags::empty(),
    )
    .with_context(|| format!("Couldn't set times on {path}"))?;
    Ok(())
}

#[cfg(windows)]
pub fn set_times(path: &Utf8Path, access_ticks: u64, modification_ticks: u64) -> Result<()> {
    let times = fs::FileTimes::new()
        .set_accessed(ticks::to_system_time(access_ticks))
        .set_modified(ticks::to_system_time(modification_ticks));
    File::options()
        .write(true)
        .open(path)
        .with_context(|| format!("Couldn't open {path}"))?
        .set_times(times)
        .with_context(|| format!("Couldn't set times on {path}"))
}

/// Reapply a recorded attribute mask: the permission bits on Unix, the
/// read-only flag on Windows.
#[cfg(unix)]
pub fn set_attributes(path: &Utf8Path, mask: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mask & 0o7777))
        .with_context(|| format!("Couldn't set permissions on {path}"))
}

#[cfg(windows)]
pub fn set_attributes(path: &Utf8Path, mask: u32) -> Result<()> {
    const FILE_ATTRIBUTE_READONLY: u32 = 0x1;
    let mut perms = fs::metadata(path.as_std_path())
        .with_context(|| format!("Couldn't stat {path}"))?
        .permissions();
    perms.set_readonly(mask & FILE_ATTRIBUTE_READONLY != 0);
    fs::set_permissions(path, perms).with_context(|| format!("Couldn't set attributes on {path}"))
}

/// Loosen an existing file so a restore can overwrite and retime it; the
/// recorded attributes go back on last.
#[cfg(unix)]
pub fn clear_protection(path: &Utf8Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777))
        .with_context(|| format!("Couldn't unprotect {path}"))
}

#[cfg(windows)]
pub fn clear_protection(path: &Utf8Path) -> Result<()> {
    let mut perms = fs::metadata(path.as_std_path())
        .with_context(|| format!("Couldn't stat {path}"))?
        .permissions();
    perms.set_readonly(false);
    fs::set_permissions(path, perms).with_context(|| format!("Couldn't unprotect {path}"))
}

pub fn nice_size(bytes: u64) -> String {
    format!(
        "{:.2}",
        Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary)
    )
}
