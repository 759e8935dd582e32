//! Diffs an archived snapshot against the live tree and runs a set of
//! callbacks for each difference.

use anyhow::Result;

use crate::snapshot::{FileEntry, Snapshot};

pub trait Callbacks {
    /// The archive has this file; the data folder doesn't.
    fn missing_archive_file(&mut self, path: &str, archived: &FileEntry) -> Result<()>;

    /// Both have the file, but byte count or modification time differ.
    fn changed_archive_file(
        &mut self,
        path: &str,
        archived: &FileEntry,
        live: &FileEntry,
    ) -> Result<()>;

    /// The archive has this folder; the data folder doesn't.
    fn missing_archive_folder(&mut self, path: &str) -> Result<()>;

    /// The data folder has this file; the archive doesn't.
    fn missing_data_file(&mut self, path: &str) -> Result<()>;

    /// The data folder has this folder; the archive doesn't.
    fn missing_data_folder(&mut self, path: &str) -> Result<()>;
}

/// Report every difference between an archived snapshot and the live one.
///
/// Files are compared by `(byte_count, modification_time)`, never by
/// re-reading contents. Mutates nothing; findings come out in record order,
/// archive side first.
pub fn compare_snapshots(
    archive: &Snapshot,
    data: &Snapshot,
    callbacks: &mut dyn Callbacks,
) -> Result<()> {
    for file in &archive.files {
        let path = archive.file_path(file);
        match data.file_at(&path) {
            None => callbacks.missing_archive_file(&path, file)?,
            Some(live)
                if live.byte_count != file.byte_count
                    || live.modification_ticks != file.modification_ticks =>
            {
                callbacks.changed_archive_file(&path, file, live)?
            }
            Some(_) => (),
        }
    }
    for folder in &archive.folders {
        // Both roots exist by construction.
        if !folder.path.is_empty() && data.folder_at(&folder.path).is_none() {
            callbacks.missing_archive_folder(&folder.path)?;
        }
    }
    for file in &data.files {
        let path = data.file_path(file);
        if archive.file_at(&path).is_none() {
            callbacks.missing_data_file(&path)?;
        }
    }
    for folder in &data.folders {
        if !folder.path.is_empty() && archive.folder_at(&folder.path).is_none() {
            callbacks.missing_data_folder(&folder.path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hashing::ContentId;
    use crate::snapshot::Folder;

    #[derive(Debug, Default, PartialEq, Eq)]
    struct Collected {
        missing_archive_files: Vec<String>,
        changed_archive_files: Vec<String>,
        missing_archive_folders: Vec<String>,
        missing_data_files: Vec<String>,
        missing_data_folders: Vec<String>,
    }

    impl Callbacks for Collected {
        fn missing_archive_file(&mut self, path: &str, _archived: &FileEntry) -> Result<()> {
            self.missing_archive_files.push(path.to_owned());
            Ok(())
        }

        fn changed_archive_file(
            &mut self,
            path: &str,
            _archived: &FileEntry,
            _live: &FileEntry,
        ) -> Result<()> {
            self.changed_archive_files.push(path.to_owned());
            Ok(())
        }

        fn missing_archive_folder(&mut self, path: &str) -> Result<()> {
            self.missing_archive_folders.push(path.to_owned());
            Ok(())
        }

        fn missing_data_file(&mut self, path: &str) -> Result<()> {
            self.missing_data_files.push(path.to_owned());
            Ok(())
        }

        fn missing_data_folder(&mut self, path: &str) -> Result<()> {
            self.missing_data_folders.push(path.to_owned());
            Ok(())
        }
    }

    fn snapshot(folders: &[(&str, Option<u32>)], files: &[(u32, &str, u64, u64)]) -> Snapshot {
        let mut s = Snapshot::default();
        for (name, super_folder) in folders {
            let path = match super_folder {
                None => String::new(),
                Some(p) => format!("{}{}/", s.folders[*p as usize].path, name),
            };
            s.folders.push(Folder {
                super_folder: *super_folder,
                name: (*name).to_owned(),
                path,
                access_ticks: 0,
                modification_ticks: 0,
                attribute_mask: 0,
            });
        }
        for (folder_index, name, byte_count, modification_ticks) in files {
            s.files.push(FileEntry {
                folder_index: *folder_index,
                name: (*name).to_owned(),
                hash: ContentId::default(),
                byte_count: *byte_count,
                access_ticks: 0,
                modification_ticks: *modification_ticks,
                attribute_mask: 0,
            });
        }
        s.rebuild_lookup();
        s
    }

    #[test]
    fn identical_snapshots_are_quiet() -> Result<()> {
        let a = snapshot(
            &[("", None), ("sub", Some(0))],
            &[(0, "x.txt", 3, 100), (1, "y.txt", 4, 200)],
        );
        let d = snapshot(
            &[("", None), ("sub", Some(0))],
            &[(0, "x.txt", 3, 100), (1, "y.txt", 4, 200)],
        );
        let mut got = Collected::default();
        compare_snapshots(&a, &d, &mut got)?;
        assert_eq!(got, Collected::default());
        Ok(())
    }

    #[test]
    fn every_difference_is_classified() -> Result<()> {
        let archive = snapshot(
            &[("", None), ("kept", Some(0)), ("gone", Some(0))],
            &[
                (0, "same.txt", 1, 10),
                (0, "changed.txt", 2, 20),
                (2, "lost.txt", 3, 30),
            ],
        );
        let data = snapshot(
            &[("", None), ("kept", Some(0)), ("added", Some(0))],
            &[
                (0, "same.txt", 1, 10),
                (0, "changed.txt", 2, 21),
                (2, "new.txt", 5, 50),
            ],
        );

        let mut got = Collected::default();
        compare_snapshots(&archive, &data, &mut got)?;
        assert_eq!(
            got,
            Collected {
                missing_archive_files: vec!["gone/lost.txt".to_owned()],
                changed_archive_files: vec!["changed.txt".to_owned()],
                missing_archive_folders: vec!["gone/".to_owned()],
                missing_data_files: vec!["added/new.txt".to_owned()],
                missing_data_folders: vec!["added/".to_owned()],
            }
        );
        Ok(())
    }

    #[test]
    fn size_and_mtime_both_count_as_change() -> Result<()> {
        let archive = snapshot(&[("", None)], &[(0, "a", 1, 10), (0, "b", 1, 10)]);
        let data = snapshot(&[("", None)], &[(0, "a", 2, 10), (0, "b", 1, 11)]);
        let mut got = Collected::default();
        compare_snapshots(&archive, &data, &mut got)?;
        assert_eq!(got.changed_archive_files, vec!["a", "b"]);
        Ok(())
    }
}
