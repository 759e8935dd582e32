use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{ArgMatches, Parser};

use crate::archive;
use crate::repo::Repository;

/// Make the data folder match a snapshot
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

    /// Restore only over files matching at least one of these globs
    #[clap(long, value_name = "FILE_FILTER")]
    pub select: Vec<String>,

    /// Give up on the first per-file error instead of reporting and moving on
    #[clap(long)]
    pub abort: bool,

    /// The folder to restore into (created if missing)
    pub data_folder: Utf8PathBuf,

    /// The repository folder
    pub repository: Utf8PathBuf,

    /// The archive holding the snapshot
    #[clap(default_value = archive::DEFAULT_ARCHIVE)]
    pub archive: String,

    /// The snapshot to restore (latest by default)
    pub snapshot: Option<String>,
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

    let repository = Repository::open(&args.repository, false)?;
    let stats = repository.restore(
        &args.data_folder,
        &args.archive,
        args.snapshot.as_deref(),
        &opts,
    )?;

    println!(
        "{} files restored, {} already in place; {} files and {} folders pruned",
        stats.files_copied, stats.files_skipped, stats.files_pruned, stats.folders_pruned
    );
    Ok(())
}
