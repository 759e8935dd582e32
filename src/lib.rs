//! A deduplicating local file backup tool.
//!
//! One repository folder holds a content-addressed store of file bodies
//! (each stored once, however many snapshots reference it) and named
//! archives of immutable snapshots. See [`repo`] for how a command comes
//! together.

pub mod archive;
pub mod compare;
pub mod counters;
pub mod file_util;
pub mod filter;
pub mod hashing;
pub mod repo;
pub mod snapshot;
pub mod store;
pub mod stream;
pub mod ticks;

// CLI stuff:
pub mod ui;

/// Every user-facing error line starts with this.
pub const ERROR_PREFIX: &str = "*** ERROR : ";

/// Report a per-file error without giving up on the rest of the operation.
pub fn report_nonfatal(e: &anyhow::Error) {
    eprintln!("{ERROR_PREFIX}{e:#}");
}
