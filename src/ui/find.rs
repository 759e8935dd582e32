use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;

use crate::repo::Repository;
use crate::snapshot::FileEntry;

/// Print the recorded contents of matching snapshots
#[derive(Debug, Parser)]
pub struct Args {
    /// The repository folder
    pub repository: Utf8PathBuf,

    /// Only archives matching this glob
    #[clap(default_value = "*")]
    pub archive_glob: String,

    /// Only snapshots matching this glob
    #[clap(default_value = "*")]
    pub snapshot_glob: String,
}

pub fn run(args: Args) -> Result<()> {
    let repository = Repository::open(&args.repository, false)?;
    for (archive_name, snapshot_names) in
        repository.matching_snapshots(&args.archive_glob, &args.snapshot_glob)?
    {
        let archive = repository.history.archive(&archive_name, false)?;
        for snapshot_name in snapshot_names {
            println!("{archive_name}/{snapshot_name}:");
            let snapshot = archive.load_snapshot(&snapshot_name)?;

            // Group files under their folders; both tables are already in
            // parent-first scan order.
            let mut by_folder: Vec<Vec<&FileEntry>> = vec![Vec::new(); snapshot.folders.len()];
            for file in &snapshot.files {
                by_folder[file.folder_index as usize].push(file);
            }
            for (i, folder) in snapshot.folders.iter().enumerate() {
                if !folder.path.is_empty() {
                    println!("  {}", folder.path);
                }
                for file in &by_folder[i] {
                    println!("  {}", snapshot.file_path(file));
                }
            }
        }
    }
    Ok(())
}
