//! The tagged-section binary format behind `.dbs` snapshot files.
//!
//! A stream is a run of sections, each a payload followed by its varuint
//! byte count and the (interned) tag of the *next* section. The stream opens
//! with a degenerate record (empty payload, zero count, first tag) and the
//! final record carries an empty tag, so a reader always knows what's coming
//! before it parses a byte of payload.

use anyhow::{Context, Result, bail, ensure};
use rustc_hash::FxHashMap;

/// Little-endian base-128: low seven bits per byte, 0x80 as the continuation bit.
pub fn encode_varuint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let mut b = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            b |= 0x80;
        }
        out.push(b);
        if v == 0 {
            break;
        }
    }
}

/// Zig-zag so small negative values stay small on the wire.
#[inline]
pub fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline]
pub fn unzigzag(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

/// Writes a section stream into an in-memory buffer.
///
/// Payload bytes accumulate in a scratch buffer until the next
/// [`begin_section`](Encoder::begin_section) (or [`finish`](Encoder::finish))
/// flushes them along with their byte count and the upcoming tag.
#[derive(Debug, Default)]
pub struct Encoder {
    out: Vec<u8>,
    payload: Vec<u8>,
    tag_table: Vec<String>,
    tag_indices: FxHashMap<String, u64>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the current section (if any) and announce the next one.
    pub fn begin_section(&mut self, tag: &str) {
        self.flush(tag);
    }

    /// Close the last section and return the finished stream.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush("");
        self.out
    }

    fn flush(&mut self, next_tag: &str) {
        let count = self.payload.len() as u64;
        self.out.append(&mut self.payload);
        encode_varuint(&mut self.out, count);
        self.put_tag(next_tag);
    }

    fn put_tag(&mut self, tag: &str) {
        if let Some(&index) = self.tag_indices.get(tag) {
            encode_varuint(&mut self.out, (index << 1) | 1);
        } else {
            let index = self.tag_table.len() as u64;
            self.tag_indices.insert(tag.to_owned(), index);
            self.tag_table.push(tag.to_owned());
            encode_varuint(&mut self.out, (tag.len() as u64) << 1);
            self.out.extend_from_slice(tag.as_bytes());
        }
    }

    /// Tags seen so far, in interning order.
    pub fn tag_table(&self) -> &[String] {
        &self.tag_table
    }

    pub fn put_byte(&mut self, b: u8) {
        self.payload.push(b);
    }

    pub fn put_bool(&mut self, b: bool) {
        self.payload.push(b as u8);
    }

    pub fn put_varuint(&mut self, v: u64) {
        encode_varuint(&mut self.payload, v);
    }

    pub fn put_varint(&mut self, v: i64) {
        encode_varuint(&mut self.payload, zigzag(v));
    }

    pub fn put_u32(&mut self, v: u32) {
        self.put_varuint(u64::from(v));
    }

    pub fn put_hash(&mut self, h: &[u8; 32]) {
        self.payload.extend_from_slice(h);
    }

    pub fn put_text(&mut self, s: &str) {
        encode_varuint(&mut self.payload, s.len() as u64);
        self.payload.extend_from_slice(s.as_bytes());
    }
}

/// Reads a section stream from a byte slice.
///
/// The decoder always sits on a known upcoming tag. [`begin_section`]
/// (Decoder::begin_section) probes it: on a match the caller parses the
/// payload with the `get_*` primitives and closes with [`end_section`]
/// (Decoder::end_section), which checks the consumed byte count against the
/// recorded one. On a mismatch the cursor stays put, so a later expected
/// section can still claim the tag.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    section_start: usize,
    tag_table: Vec<String>,
    next_tag: String,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let mut d = Self {
            buf,
            pos: 0,
            section_start: 0,
            tag_table: Vec::new(),
            next_tag: String::new(),
        };
        let leading = d.get_varuint()?;
        ensure!(leading == 0, "Stream doesn't start with an empty record");
        d.next_tag = d.get_tag()?;
        Ok(d)
    }

    /// The tag of the upcoming section; empty at end of stream.
    pub fn section_tag(&self) -> &str {
        &self.next_tag
    }

    /// True (and positions the cursor at the payload) if the upcoming
    /// section is `expected`; false, leaving the cursor alone, otherwise.
    pub fn begin_section(&mut self, expected: &str) -> bool {
        if self.next_tag == expected && !expected.is_empty() {
            self.section_start = self.pos;
            true
        } else {
            false
        }
    }

    /// Close the section opened by [`begin_section`](Decoder::begin_section):
    /// verify the byte count and read the next tag.
    pub fn end_section(&mut self) -> Result<()> {
        let consumed = (self.pos - self.section_start) as u64;
        let recorded = self.get_varuint()?;
        ensure!(
            consumed == recorded,
            "Section {} is {} bytes but its record says {}",
            self.next_tag,
            consumed,
            recorded
        );
        self.next_tag = self.get_tag()?;
        Ok(())
    }

    /// The stream is complete only when the empty tag has been reached and
    /// every byte consumed.
    pub fn finish(self) -> Result<()> {
        ensure!(
            self.next_tag.is_empty(),
            "Unexpected section {} at end of stream",
            self.next_tag
        );
        ensure!(
            self.pos == self.buf.len(),
            "Stream has {} unread bytes past its last section",
            self.buf.len() - self.pos
        );
        Ok(())
    }

    /// Tags seen so far, in interning order.
    pub fn tag_table(&self) -> &[String] {
        &self.tag_table
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        ensure!(
            n <= self.buf.len() - self.pos,
            "Stream ends {} bytes short",
            n - (self.buf.len() - self.pos)
        );
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_byte()? != 0)
    }

    pub fn get_varuint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let b = self.get_byte()?;
            let low = u64::from(b & 0x7f);
            ensure!(
                shift < 64 && (shift != 63 || low <= 1),
                "varuint overflows 64 bits"
            );
            value |= low << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub fn get_varint(&mut self) -> Result<i64> {
        Ok(unzigzag(self.get_varuint()?))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let v = self.get_varuint()?;
        ensure!(v <= u64::from(u32::MAX), "Value {v} overflows u32");
        Ok(v as u32)
    }

    pub fn get_hash(&mut self) -> Result<[u8; 32]> {
        let mut h = [0u8; 32];
        h.copy_from_slice(self.take(32)?);
        Ok(h)
    }

    pub fn get_text(&mut self) -> Result<String> {
        let len = self.get_varuint()? as usize;
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes)
            .context("Text isn't UTF-8")?
            .to_owned())
    }

    fn get_tag(&mut self) -> Result<String> {
        let token = self.get_varuint()?;
        if token & 1 == 1 {
            let index = (token >> 1) as usize;
            match self.tag_table.get(index) {
                Some(t) => Ok(t.clone()),
                None => bail!("Tag index {index} out of range"),
            }
        } else {
            let len = (token >> 1) as usize;
            let bytes = self.take(len)?;
            let tag = std::str::from_utf8(bytes)
                .context("Tag isn't UTF-8")?
                .to_owned();
            self.tag_table.push(tag.clone());
            Ok(tag)
        }
    }
}
