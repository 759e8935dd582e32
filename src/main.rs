use std::process::ExitCode;

use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand};

use dedub::{ERROR_PREFIX, counters, ui};

/// A deduplicating local file backup tool
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Cli {
    /// Verbosity (-v, -vv, -vvv, etc.)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    subcommand: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Backup(ui::backup::Args),
    Check(ui::check::Args),
    Compare(ui::compare::Args),
    Restore(ui::restore::Args),
    Find(ui::find::Args),
    List(ui::list::Args),
}

fn main() -> ExitCode {
    // The filter options' polarity depends on the order they were written
    // in, so hold on to the raw matches alongside the parsed struct.
    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };
    init_logger(cli.verbose);

    let (_, sub_matches) = matches.subcommand().expect("subcommand is required");
    let result = match cli.subcommand {
        Command::Backup(args) => ui::backup::run(args, sub_matches),
        Command::Check(args) => ui::check::run(args),
        Command::Compare(args) => ui::compare::run(args, sub_matches),
        Command::Restore(args) => ui::restore::run(args, sub_matches),
        Command::Find(args) => ui::find::run(args),
        Command::List(args) => ui::list::run(args),
    };
    counters::log_counts();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{ERROR_PREFIX}{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Set up tracing-subscriber to spit messages to stderr.
fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}
