use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;

use crate::archive;
use crate::repo::Repository;

/// Verify that a snapshot's files are all in the store
#[derive(Debug, Parser)]
pub struct Args {
    /// The data folder the snapshot was taken of (accepted for symmetry
    /// with backup; checking never reads it)
    pub data_folder: Utf8PathBuf,

    /// The repository folder
    pub repository: Utf8PathBuf,

    /// The archive holding the snapshot
    #[clap(default_value = archive::DEFAULT_ARCHIVE)]
    pub archive: String,

    /// The snapshot to check (latest by default)
    pub snapshot: Option<String>,
}

pub fn run(args: Args) -> Result<()> {
    let repository = Repository::open(&args.repository, false)?;
    let name = repository.check(&args.archive, args.snapshot.as_deref())?;
    println!("Snapshot {name} checks out");
    Ok(())
}
