use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{ArgMatches, Parser};

use crate::archive;
use crate::compare::Callbacks;
use crate::repo::Repository;
use crate::snapshot::FileEntry;

/// Report differences between a snapshot and the data folder
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

    /// Compare only files matching at least one of these globs
    #[clap(long, value_name = "FILE_FILTER")]
    pub select: Vec<String>,

    /// The data folder to compare against
    pub data_folder: Utf8PathBuf,

    /// The repository folder
    pub repository: Utf8PathBuf,

    /// The archive holding the snapshot
    #[clap(default_value = archive::DEFAULT_ARCHIVE)]
    pub archive: String,

    /// The snapshot to compare (latest by default)
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
        false,
    );

    let repository = Repository::open(&args.repository, false)?;
    let mut printer = PrintDiffs::default();
    repository.compare(
        &args.data_folder,
        &args.archive,
        args.snapshot.as_deref(),
        &opts,
        &mut printer,
    )?;

    if printer.differences == 0 {
        println!("No differences");
    } else {
        println!("{} differences", printer.differences);
    }
    Ok(())
}

#[derive(Debug, Default)]
struct PrintDiffs {
    differences: usize,
}

impl Callbacks for PrintDiffs {
    fn missing_archive_file(&mut self, path: &str, _archived: &FileEntry) -> Result<()> {
        println!("Missing archive file : {path}");
        self.differences += 1;
        Ok(())
    }

    fn changed_archive_file(
        &mut self,
        path: &str,
        _archived: &FileEntry,
        _live: &FileEntry,
    ) -> Result<()> {
        println!("Changed archive file : {path}");
        self.differences += 1;
        Ok(())
    }

    fn missing_archive_folder(&mut self, path: &str) -> Result<()> {
        println!("Missing archive folder : {path}");
        self.differences += 1;
        Ok(())
    }

    fn missing_data_file(&mut self, path: &str) -> Result<()> {
        println!("Missing data file : {path}");
        self.differences += 1;
        Ok(())
    }

    fn missing_data_folder(&mut self, path: &str) -> Result<()> {
        println!("Missing data folder : {path}");
        self.differences += 1;
        Ok(())
    }
}
