//! Content identity: everything in the store is named by its [`ContentId`]

use std::fmt;
use std::fs::File;
use std::io::prelude::*;

use anyhow::{Context, Result, ensure};
use camino::Utf8Path;
use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256, digest::Output};

use crate::counters;

type Sha256Digest = Output<Sha256>;

/// Files are read in bounded chunks while hashing, so memory use doesn't
/// scale with file size.
const HASH_CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// The SHA-256 of a file's contents, the first half of its store address.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ContentId {
    digest: [u8; 32],
}

impl ContentId {
    /// Calculates an ID from the given bytes
    pub fn hash(bytes: &[u8]) -> Self {
        Self {
            digest: Sha256::digest(bytes).into(),
        }
    }

    fn from_digest(digest: Sha256Digest) -> Self {
        Self {
            digest: digest.into(),
        }
    }

    pub fn from_bytes(digest: [u8; 32]) -> Self {
        Self { digest }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.digest
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ digest: {} }}", HEXLOWER.encode(&self.digest))
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.digest))
    }
}

impl std::str::FromStr for ContentId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = HEXLOWER
            .decode(s.as_bytes())
            .with_context(|| format!("Couldn't decode {s} as lowercase hex"))?;

        ensure!(
            bytes.len() == <Sha256 as Digest>::output_size(),
            "Expected a SHA-256 in hex"
        );
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes);
        Ok(ContentId::from_bytes(digest))
    }
}

/// Hashes a file's entire contents, returning the ID and the bytes read.
pub fn hash_file(path: &Utf8Path) -> Result<(ContentId, u64)> {
    let mut fh = File::open(path).with_context(|| format!("Couldn't open {path}"))?;
    let hinted_len = fh
        .metadata()
        .with_context(|| format!("Couldn't stat {path}"))?
        .len();

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; (hinted_len.clamp(1, HASH_CHUNK_SIZE as u64)) as usize];
    let mut total = 0u64;
    loop {
        let count = fh
            .read(&mut buf)
            .with_context(|| format!("Couldn't read {path}"))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
        total += count as u64;
    }
    counters::bump(counters::Op::FileHash);
    Ok((ContentId::from_digest(hasher.finalize()), total))
}
