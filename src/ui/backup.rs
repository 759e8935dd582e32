use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{ArgMatches, Parser};
use tracing::*;

use crate::archive;
use crate::file_util::nice_size;
use crate::repo::Repository;

/// Take a snapshot of a data folder and store its files
#[derive(Debug, Parser)]
pub struct Args {
    /// Traverse only this rooted folder path, its ancestors, and its
    /// descendants (can be given multiple times)
    #[clap(long, value_name = "/FOLDER/")]
    pub include: Vec<String>,

    /// Skip folders matching this glob
    #[clap(long, value_name = "FOLDER_FILTER/")]
    pub exclude: Vec<String>,

    /// Keep files matching this glob
    #[clap(long, value_name = "FILE_FILTER")]
    pub keep: Vec<String>,

    /// Skip files matching this glob
    #[clap(long, value_name = "FILE_FILTER")]
    pub ignore: Vec<String>,

    /// Take only files matching at least one of these globs
    #[clap(long, value_name = "FILE_FILTER")]
    pub select: Vec<String>,

    /// Give up on the first per-file error instead of reporting and moving on
    #[clap(long)]
    pub abort: bool,

    /// The folder to back up
    pub data_folder: Utf8PathBuf,

    /// The repository folder
    pub repository: Utf8PathBuf,

    /// The archive to append this snapshot to
    #[clap(default_value = archive::DEFAULT_ARCHIVE)]
    pub archive: String,
}

pub fn run(args: Args, matches: &ArgMatches) -> Result<()> {
    let opts = super::scan_options(
        matches,
        &args.include,
        &args.exclude,
        &args.keep,
        &args.ignore,
        &args.select,
        args.abort,
    );

    let mut repository = Repository::open(&args.repository, true)?;
    let (name, stats) = repository.backup(&args.data_folder, &args.archive, &opts)?;

    info!(
        "{} files hashed, {} unchanged, {} deduplicated",
        stats.files_hashed, stats.files_reused, stats.blobs_deduplicated
    );
    println!(
        "Snapshot {name}: {} new blobs, {} copied",
        stats.blobs_written,
        nice_size(stats.bytes_copied)
    );
    Ok(())
}
