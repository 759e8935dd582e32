//! Archives: named, chronologically ordered runs of snapshots.
//!
//! An archive is just a folder under `SNAPSHOT/` full of `.dbs` files.
//! Snapshot names are timestamps rendered so that sorting the names sorts
//! the snapshots by age; "the latest snapshot" is simply the greatest name.

use std::fs;

use anyhow::{Context, Result, anyhow, ensure};
use camino::{Utf8Path, Utf8PathBuf};

use crate::file_util;
use crate::snapshot::{SNAPSHOT_EXTENSION, Snapshot};

pub const SNAPSHOT_DIR: &str = "SNAPSHOT";
pub const DEFAULT_ARCHIVE: &str = "DEFAULT";

/// Archive names are identifiers: ASCII letters, digits, and underscores.
pub fn is_valid_archive_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub struct Archive {
    pub name: String,
    pub folder: Utf8PathBuf,
    /// Ascending, i.e. oldest first.
    pub snapshot_names: Vec<String>,
}

impl Archive {
    /// Open an archive folder (creating it when backing up) and index its
    /// snapshot names.
    pub fn open(snapshots_folder: &Utf8Path, name: &str, create: bool) -> Result<Archive> {
        ensure!(
            is_valid_archive_name(name),
            "Invalid archive name {name}: use letters, digits, and _"
        );
        let folder = snapshots_folder.join(name);
        if create {
            file_util::mkdir_recursive(&folder)?;
        } else {
            ensure!(folder.is_dir(), "No archive {name} in this repository");
        }

        let mut snapshot_names = Vec::new();
        for entry in
            fs::read_dir(&folder).with_context(|| format!("Couldn't read archive {name}"))?
        {
            let entry = entry.with_context(|| format!("Couldn't read an entry of {folder}"))?;
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(stem) = file_name.strip_suffix(&format!(".{SNAPSHOT_EXTENSION}")) {
                snapshot_names.push(stem.to_owned());
            }
        }
        snapshot_names.sort();

        Ok(Archive {
            name: name.to_owned(),
            folder,
            snapshot_names,
        })
    }

    pub fn last_snapshot_name(&self) -> Result<&str> {
        self.snapshot_names
            .last()
            .map(String::as_str)
            .ok_or_else(|| anyhow!("Archive {} has no snapshots", self.name))
    }

    /// The requested snapshot if given (it must exist), the latest otherwise.
    pub fn resolve_snapshot<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str> {
        match requested {
            None => self.last_snapshot_name(),
            Some(name) => {
                ensure!(
                    self.snapshot_names.iter().any(|s| s == name),
                    "No snapshot {name} in archive {}",
                    self.name
                );
                Ok(name)
            }
        }
    }

    pub fn snapshot_path(&self, name: &str) -> Utf8PathBuf {
        self.folder.join(format!("{name}.{SNAPSHOT_EXTENSION}"))
    }

    pub fn load_snapshot(&self, name: &str) -> Result<Snapshot> {
        Snapshot::load(&self.snapshot_path(name))
    }
}

/// Every archive under a repository's `SNAPSHOT/` folder, rebuilt on each
/// invocation.
pub struct History {
    pub folder: Utf8PathBuf,
    /// Sorted archive names.
    pub archives: Vec<String>,
}

impl History {
    pub fn open(repository: &Utf8Path, create: bool) -> Result<History> {
        let folder = repository.join(SNAPSHOT_DIR);
        if create {
            file_util::mkdir_recursive(&folder)?;
        } else {
            ensure!(
                folder.is_dir(),
                "No snapshots at {folder} (is {repository} a repository?)"
            );
        }

        let mut archives = Vec::new();
        for entry in fs::read_dir(&folder).with_context(|| format!("Couldn't read {folder}"))? {
            let entry = entry.with_context(|| format!("Couldn't read an entry of {folder}"))?;
            if !entry
                .file_type()
                .with_context(|| format!("Couldn't get an entry type in {folder}"))?
                .is_dir()
            {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                archives.push(name);
            }
        }
        archives.sort();

        Ok(History { folder, archives })
    }

    pub fn archive(&self, name: &str, create: bool) -> Result<Archive> {
        Archive::open(&self.folder, name, create)
    }
}
