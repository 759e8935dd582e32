//! CLI subcommands: one module per verb, each an `Args` struct and a `run`.

pub mod backup;
pub mod check;
pub mod compare;
pub mod find;
pub mod list;
pub mod restore;

use clap::ArgMatches;

use crate::filter::{self, ScanOptions};

/// Pair each repeated option's values with their argv indices.
///
/// clap hands us `--include` and `--exclude` as two separate lists, but
/// filter polarity is decided by the order the user wrote them in; the
/// indices let us re-interleave.
fn indexed(matches: &ArgMatches, id: &str, values: &[String]) -> Vec<(usize, String)> {
    match matches.indices_of(id) {
        Some(indices) => indices.zip(values.iter().cloned()).collect(),
        None => Vec::new(),
    }
}

pub(crate) fn scan_options(
    matches: &ArgMatches,
    include: &[String],
    exclude: &[String],
    keep: &[String],
    ignore: &[String],
    select: &[String],
    abort: bool,
) -> ScanOptions {
    ScanOptions {
        folder_filters: filter::merge_declaration_order(
            indexed(matches, "include", include),
            indexed(matches, "exclude", exclude),
        ),
        file_filters: filter::merge_declaration_order(
            indexed(matches, "keep", keep),
            indexed(matches, "ignore", ignore),
        ),
        selected_file_filters: select.iter().map(|s| filter::to_logical(s)).collect(),
        abort,
    }
}
