//! A repository: the history of snapshots plus the content-addressed store,
//! composed over one root folder and driven by the six top-level commands.

use anyhow::{Context, Result, ensure};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::*;

use crate::archive::History;
use crate::compare;
use crate::file_util;
use crate::filter::{self, ScanOptions};
use crate::snapshot::Snapshot;
use crate::store::{BackupStats, RestoreStats, Store};
use crate::ticks;

pub struct Repository {
    pub root: Utf8PathBuf,
    pub history: History,
    pub store: Store,
}

impl Repository {
    /// Open a repository. Backups pass `create` to make the layout on first
    /// use; read-only commands treat a missing layout as an error.
    pub fn open(root: &Utf8Path, create: bool) -> Result<Repository> {
        if create {
            file_util::mkdir_recursive(root)?;
        } else {
            ensure!(root.is_dir(), "No repository at {root}");
        }
        let history = History::open(root, create)?;
        let store = Store::open(root, create)?;
        Ok(Repository {
            root: root.to_owned(),
            history,
            store,
        })
    }

    /// Scan the data folder, skip what the previous snapshot already has,
    /// copy the rest into the store, and append the new snapshot to the
    /// archive. Returns the snapshot's name.
    pub fn backup(
        &mut self,
        data_folder: &Utf8Path,
        archive_name: &str,
        opts: &ScanOptions,
    ) -> Result<(String, BackupStats)> {
        let data_folder = canonical_data_folder(data_folder)?;
        let archive = self.history.archive(archive_name, true)?;
        let previous = match archive.snapshot_names.last() {
            Some(last) => Some(archive.load_snapshot(last)?),
            None => None,
        };

        let now = ticks::now();
        info!("Scanning {data_folder}");
        let mut snapshot = Snapshot::scan(&data_folder, now, opts)?;
        debug!(
            "Scanned {} folders and {} files",
            snapshot.folders.len(),
            snapshot.files.len()
        );

        let stats =
            self.store
                .backup_snapshot(&data_folder, &mut snapshot, previous.as_ref(), opts.abort)?;

        let name = ticks::snapshot_name(now)?;
        snapshot.save(&archive.folder, &name)?;
        info!("Snapshot {name} saved to archive {archive_name}");
        Ok((name, stats))
    }

    /// Verify a snapshot against the store. Returns the checked snapshot's
    /// name; errors if any file's blob is absent.
    pub fn check(&self, archive_name: &str, snapshot_name: Option<&str>) -> Result<String> {
        let archive = self.history.archive(archive_name, false)?;
        let name = archive.resolve_snapshot(snapshot_name)?;
        let snapshot = archive.load_snapshot(name)?;

        let missing = self.store.check_snapshot(&snapshot);
        ensure!(
            missing == 0,
            "{missing} of {} files in snapshot {name} have no blob in the store",
            snapshot.files.len()
        );
        info!(
            "Snapshot {name}: all {} files are in the store",
            snapshot.files.len()
        );
        Ok(name.to_owned())
    }

    /// Diff a snapshot against the live data folder, reporting through the
    /// given callbacks. Mutates nothing.
    pub fn compare(
        &self,
        data_folder: &Utf8Path,
        archive_name: &str,
        snapshot_name: Option<&str>,
        opts: &ScanOptions,
        callbacks: &mut dyn compare::Callbacks,
    ) -> Result<()> {
        let data_folder = canonical_data_folder(data_folder)?;
        let archive = self.history.archive(archive_name, false)?;
        let name = archive.resolve_snapshot(snapshot_name)?;
        let archived = archive.load_snapshot(name)?;

        info!("Comparing snapshot {name} to {data_folder}");
        let live = Snapshot::scan(&data_folder, ticks::now(), opts)?;
        compare::compare_snapshots(&archived, &live, callbacks)
    }

    /// Make the data folder match a snapshot (creating the folder if need
    /// be), pruning whatever the snapshot doesn't have.
    pub fn restore(
        &self,
        data_folder: &Utf8Path,
        archive_name: &str,
        snapshot_name: Option<&str>,
        opts: &ScanOptions,
    ) -> Result<RestoreStats> {
        let archive = self.history.archive(archive_name, false)?;
        let name = archive.resolve_snapshot(snapshot_name)?;
        let archived = archive.load_snapshot(name)?;

        file_util::mkdir_recursive(data_folder)?;
        let data_folder = canonical_data_folder(data_folder)?;
        info!("Restoring snapshot {name} to {data_folder}");
        let live = Snapshot::scan(&data_folder, ticks::now(), opts)?;
        self.store
            .restore_snapshot(&data_folder, &archived, &live, opts.abort)
    }

    /// Archive names and snapshot names matching a pair of globs, for `find`
    /// and `list`.
    pub fn matching_snapshots(
        &self,
        archive_glob: &str,
        snapshot_glob: &str,
    ) -> Result<Vec<(String, Vec<String>)>> {
        let mut matches = Vec::new();
        for archive_name in &self.history.archives {
            if !filter::glob_match(archive_name, archive_glob) {
                continue;
            }
            let archive = self.history.archive(archive_name, false)?;
            let snapshots = archive
                .snapshot_names
                .iter()
                .filter(|name| filter::glob_match(name, snapshot_glob))
                .cloned()
                .collect();
            matches.push((archive_name.clone(), snapshots));
        }
        Ok(matches)
    }
}

fn canonical_data_folder(data_folder: &Utf8Path) -> Result<Utf8PathBuf> {
    let canonical = data_folder
        .canonicalize_utf8()
        .with_context(|| format!("Couldn't canonicalize {data_folder}"))?;
    ensure!(canonical.is_dir(), "{data_folder} isn't a folder");
    Ok(canonical)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    fn utf8_temp() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("no tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_owned()).expect("non-UTF-8");
        (dir, path)
    }

    #[test]
    fn read_only_open_needs_a_repository() -> Result<()> {
        let (_guard, root) = utf8_temp();
        let repo_path = root.join("repo");
        assert!(Repository::open(&repo_path, false).is_err());

        fs::create_dir(&repo_path)?;
        // An empty folder isn't a repository either.
        assert!(Repository::open(&repo_path, false).is_err());

        Repository::open(&repo_path, true)?;
        assert!(repo_path.join(crate::store::STORE_DIR).is_dir());
        assert!(repo_path.join(crate::archive::SNAPSHOT_DIR).is_dir());
        assert!(Repository::open(&repo_path, false).is_ok());
        Ok(())
    }

    #[test]
    fn backup_names_sort_with_time() -> Result<()> {
        let (_guard, root) = utf8_temp();
        let data = root.join("data");
        fs::create_dir(&data)?;
        fs::write(data.join("f.txt"), b"f")?;

        let mut repo = Repository::open(&root.join("repo"), true)?;
        let (first, _) = repo.backup(&data, "DEFAULT", &ScanOptions::default())?;
        let (second, _) = repo.backup(&data, "DEFAULT", &ScanOptions::default())?;
        assert!(first <= second, "{first} should sort before {second}");

        // YYYYMMDD_HHMMSS_fffffff
        assert_eq!(first.len(), 23);
        assert_eq!(&first[8..9], "_");
        assert_eq!(&first[15..16], "_");
        Ok(())
    }

    #[test]
    fn snapshots_resolve_and_check() -> Result<()> {
        let (_guard, root) = utf8_temp();
        let data = root.join("data");
        fs::create_dir(&data)?;
        fs::write(data.join("f.txt"), b"contents")?;

        let mut repo = Repository::open(&root.join("repo"), true)?;
        let (name, _) = repo.backup(&data, "DEFAULT", &ScanOptions::default())?;

        // Re-open read-only, as check does.
        let repo = Repository::open(&root.join("repo"), false)?;
        assert_eq!(repo.check("DEFAULT", None)?, name);
        assert_eq!(repo.check("DEFAULT", Some(name.as_str()))?, name);
        assert!(repo.check("DEFAULT", Some("20990101_000000_0000000")).is_err());
        assert!(repo.check("NOSUCH", None).is_err());
        Ok(())
    }

    #[test]
    fn glob_matching_over_archives_and_snapshots() -> Result<()> {
        let (_guard, root) = utf8_temp();
        let data = root.join("data");
        fs::create_dir(&data)?;

        let mut repo = Repository::open(&root.join("repo"), true)?;
        repo.backup(&data, "DEFAULT", &ScanOptions::default())?;
        repo.backup(&data, "NIGHTLY", &ScanOptions::default())?;
        repo.backup(&data, "NIGHTLY", &ScanOptions::default())?;

        let all = repo.matching_snapshots("*", "*")?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "DEFAULT");
        assert_eq!(all[0].1.len(), 1);
        assert_eq!(all[1].0, "NIGHTLY");
        assert_eq!(all[1].1.len(), 2);

        let nightly = repo.matching_snapshots("NIGHT*", "*")?;
        assert_eq!(nightly.len(), 1);
        assert_eq!(nightly[0].1.len(), 2);

        let none = repo.matching_snapshots("*", "1999*")?;
        assert!(none.iter().all(|(_, snaps)| snaps.is_empty()));
        Ok(())
    }
}
