#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use assert_cmd::Command;
use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

pub fn dedub() -> Result<Command> {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME"))?;
    cmd.arg("-vvv");
    Ok(cmd)
}

/// A tempdir that's guaranteed UTF-8 so it can flow through the CLI and the
/// library alike.
pub fn utf8_temp() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp test directory");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_owned()).expect("tempdir isn't UTF-8");
    (dir, path)
}

pub fn write_file(path: &Utf8Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Couldn't create parent folders");
    }
    fs::write(path, contents).expect("Couldn't write test file");
}

/// Every file under `p`, relative to it, sorted.
pub fn files_in(p: &Path) -> Vec<PathBuf> {
    let mut files = WalkDir::new(p)
        .into_iter()
        .map(|e| e.expect("couldn't walk dir"))
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(p).unwrap().to_owned())
        .collect::<Vec<_>>();
    files.sort();
    files
}

/// Every directory under `p` (excluding `p` itself), relative to it, sorted.
pub fn dirs_in(p: &Path) -> Vec<PathBuf> {
    let mut dirs = WalkDir::new(p)
        .into_iter()
        .map(|e| e.expect("couldn't walk dir"))
        .filter(|e| e.file_type().is_dir() && e.path() != p)
        .map(|e| e.path().strip_prefix(p).unwrap().to_owned())
        .collect::<Vec<_>>();
    dirs.sort();
    dirs
}

/// The single archive folder's snapshot names, oldest first.
pub fn snapshot_names(repo: &Utf8Path, archive: &str) -> Vec<String> {
    let archive = dedub::archive::Archive::open(
        &repo.join(dedub::archive::SNAPSHOT_DIR),
        archive,
        false,
    )
    .expect("couldn't open archive");
    archive.snapshot_names
}

pub fn load_snapshot(repo: &Utf8Path, archive: &str, name: &str) -> dedub::snapshot::Snapshot {
    let path = repo
        .join(dedub::archive::SNAPSHOT_DIR)
        .join(archive)
        .join(format!("{name}.dbs"));
    dedub::snapshot::Snapshot::load(&path).expect("couldn't load snapshot")
}
