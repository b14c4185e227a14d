//! Append-only line position storage.
//!
//! One entry per line: the byte offset just past the line's terminator,
//! which is also the start of the following line. Line 0 implicitly starts
//! at offset 0, so the final entry doubles as a sentinel one past the end of
//! the indexed data. When the file's last line has no terminator, a
//! synthetic entry at `file_size + 1` stands in and is flagged as fake; a
//! later append (the appended data completing that line) replaces it.
//!
//! Storage is delta-compressed: chunks of up to 1024 entries, each holding a
//! `u64` base and `u32` deltas from it. Long files of short lines — the
//! common case for logs — cost about a third of a flat `u64` vector. The
//! compression is not externally observable.
//!
//! # Invariants
//! - Entries are strictly non-decreasing.
//! - `fake_final_lf` implies the last entry is `file_size + 1`.

use crate::LineOffset;

/// Entries per compressed chunk.
const CHUNK_CAPACITY: usize = 1024;

#[derive(Debug)]
struct PosChunk {
    /// Index of this chunk's first entry within the whole array.
    first_index: u64,
    /// Offset the chunk's deltas are relative to.
    base: u64,
    deltas: Vec<u32>,
}

impl PosChunk {
    fn new(first_index: u64, offset: u64) -> Self {
        let mut deltas = Vec::with_capacity(CHUNK_CAPACITY);
        deltas.push(0);
        Self {
            first_index,
            base: offset,
            deltas,
        }
    }

    fn last_offset(&self) -> u64 {
        // Chunks are never empty.
        self.base + u64::from(*self.deltas.last().expect("chunk holds at least one entry"))
    }

    fn try_push(&mut self, offset: u64) -> bool {
        if self.deltas.len() >= CHUNK_CAPACITY {
            return false;
        }
        let Some(delta) = offset.checked_sub(self.base) else {
            return false;
        };
        let Ok(delta) = u32::try_from(delta) else {
            return false;
        };
        self.deltas.push(delta);
        true
    }
}

/// Scratch output of one block parse: a flat list of new line end offsets.
///
/// Cheap to fill in the parser's hot loop; folded into the main array in one
/// bulk append under the index write lock.
#[derive(Clone, Debug, Default)]
pub struct FastLinePositionArray {
    positions: Vec<LineOffset>,
    fake_final_lf: bool,
}

impl FastLinePositionArray {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn append(&mut self, offset: LineOffset) {
        self.positions.push(offset);
    }

    /// Marks the final entry as a synthetic terminator.
    pub fn set_fake_final_lf(&mut self) {
        debug_assert!(
            !self.positions.is_empty(),
            "a fake terminator needs an entry to stand in for"
        );
        self.fake_final_lf = true;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn fake_final_lf(&self) -> bool {
        self.fake_final_lf
    }

    pub fn iter(&self) -> impl Iterator<Item = LineOffset> + '_ {
        self.positions.iter().copied()
    }
}

/// Delta-compressed append-only array of line end offsets.
#[derive(Debug, Default)]
pub struct LinePositionArray {
    chunks: Vec<PosChunk>,
    len: u64,
    fake_final_lf: bool,
}

impl LinePositionArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, which is also the number of indexed lines.
    #[inline]
    pub fn size(&self) -> u64 {
        self.len
    }

    pub fn fake_final_lf(&self) -> bool {
        self.fake_final_lf
    }

    /// Entry at `index`: the end offset of line `index` (exclusive), equal to
    /// the start offset of line `index + 1`.
    ///
    /// # Panics
    /// Panics if `index >= size()`.
    pub fn at(&self, index: u64) -> LineOffset {
        assert!(index < self.len, "line position index out of range");
        let chunk_idx = self
            .chunks
            .partition_point(|chunk| chunk.first_index <= index)
            - 1;
        let chunk = &self.chunks[chunk_idx];
        let within = (index - chunk.first_index) as usize;
        LineOffset(chunk.base + u64::from(chunk.deltas[within]))
    }

    /// Appends one entry, replacing a fake final terminator if present.
    pub fn append(&mut self, offset: LineOffset) {
        if self.fake_final_lf {
            self.pop_last();
            self.fake_final_lf = false;
        }
        self.push(offset.get());
    }

    /// Bulk append of one block parse's output.
    ///
    /// An empty list is a no-op: a fake final entry must survive until real
    /// data replaces it.
    pub fn append_list(&mut self, list: &FastLinePositionArray) {
        if list.is_empty() {
            return;
        }
        if self.fake_final_lf {
            self.pop_last();
        }
        for offset in list.iter() {
            self.push(offset.get());
        }
        self.fake_final_lf = list.fake_final_lf();
    }

    pub fn set_fake_final_lf(&mut self) {
        debug_assert!(self.len > 0, "a fake terminator needs an entry");
        self.fake_final_lf = true;
    }

    /// Approximate heap bytes held by the compressed storage.
    pub fn allocated_size(&self) -> usize {
        self.chunks.capacity() * std::mem::size_of::<PosChunk>()
            + self
                .chunks
                .iter()
                .map(|chunk| chunk.deltas.capacity() * std::mem::size_of::<u32>())
                .sum::<usize>()
    }

    fn push(&mut self, offset: u64) {
        debug_assert!(
            self.chunks
                .last()
                .map(|chunk| chunk.last_offset() <= offset)
                .unwrap_or(true),
            "line positions must be non-decreasing"
        );
        let appended = match self.chunks.last_mut() {
            Some(chunk) => chunk.try_push(offset),
            None => false,
        };
        if !appended {
            self.chunks.push(PosChunk::new(self.len, offset));
        }
        self.len += 1;
    }

    fn pop_last(&mut self) {
        let Some(chunk) = self.chunks.last_mut() else {
            return;
        };
        chunk.deltas.pop();
        if chunk.deltas.is_empty() {
            self.chunks.pop();
        }
        self.len -= 1;
    }
}
