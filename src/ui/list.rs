use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;

use crate::repo::Repository;

/// List archives and their snapshots
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
        println!("{archive_name}");
        for snapshot_name in snapshot_names {
            println!("  {snapshot_name}");
        }
    }
    Ok(())
}
