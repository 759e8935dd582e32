//! Operation counters: how many times did we hash, copy, reuse, prune?

use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering, fence};

use enum_map::{Enum, EnumMap};
use tracing::*;

#[derive(Debug, Copy, Clone, Enum)]
pub enum Op {
    FileHash,
    FastPathReuse,
    BlobWrite,
    BlobDedup,
    RestoreCopy,
    RestoreSkip,
    PruneFile,
    PruneFolder,
}

static COUNTER_MAP: LazyLock<EnumMap<Op, AtomicUsize>> = LazyLock::new(EnumMap::default);

#[inline]
pub fn bump(which: Op) {
    add(which, 1);
}

pub fn add(to: Op, amount: usize) {
    COUNTER_MAP[to].fetch_add(amount, Ordering::Relaxed);
}

pub fn get(which: Op) -> usize {
    COUNTER_MAP[which].load(Ordering::Relaxed)
}

pub fn log_counts() {
    // Probably not needed; but we're probably calling this once at program exit.
    fence(Ordering::SeqCst);

    let counts = COUNTER_MAP
        .iter()
        .map(|(k, v)| (k, v.load(Ordering::Relaxed)))
        .filter(|(_k, v)| *v > 0) // Ignore things we didn't do
        .collect::<Vec<_>>();

    if counts.is_empty() {
        return;
    }

    let opname = |op| match op {
        Op::FileHash => "files hashed",
        Op::FastPathReuse => "unchanged files reusing their previous hash",
        Op::BlobWrite => "blobs copied into the store",
        Op::BlobDedup => "files deduplicated against existing blobs",
        Op::RestoreCopy => "files restored from the store",
        Op::RestoreSkip => "files already matching their snapshot",
        Op::PruneFile => "extraneous files removed",
        Op::PruneFolder => "emptied folders removed",
    };

    debug!("Counters:");
    for (op, count) in &counts {
        debug!("{:6} {}", count, opname(*op));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_are_monotonic() {
        let before = get(Op::PruneFolder);
        add(Op::PruneFolder, 3);
        assert!(get(Op::PruneFolder) >= before + 3);
    }
}
