//! Shared indexing state with scoped reader/writer accessors.
//!
//! One `IndexingData` exists per viewed file, created at session start and
//! shared between the worker (writes) and the viewer (reads). All access
//! goes through RAII accessor guards over a readers/writer lock:
//!
//! - [`ConstAccessor`] holds the shared lock and exposes the read API.
//! - [`MutateAccessor`] holds the exclusive lock; [`MutateAccessor::add_all`]
//!   is the single mutating entry point during indexing and covers the line
//!   array extension, the digest update, the max-length merge, and the
//!   encoding assignment in one critical section, so readers never observe a
//!   torn state.
//!
//! Accessors must stay short-lived — one block's worth of work, one snapshot
//! read — to keep the viewer responsive while indexing runs.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::digest::{IndexedHash, RollingIndexHash};
use crate::encoding::TextCodec;
use crate::line_positions::{FastLinePositionArray, LinePositionArray};
use crate::{LineLength, LineNumber, LineOffset};

#[derive(Debug, Default)]
struct IndexedContent {
    line_positions: LinePositionArray,
    max_length: LineLength,
    hash: RollingIndexHash,
    encoding_guess: Option<TextCodec>,
    encoding_forced: Option<TextCodec>,
}

/// Shared handle to one file's indexing state.
///
/// Clones share the same underlying state; the handle is `Send + Sync` and
/// yields accessors whose lifetimes are bounded by the borrow.
#[derive(Clone, Debug, Default)]
pub struct IndexingData {
    inner: Arc<RwLock<IndexedContent>>,
}

impl IndexingData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the shared lock for reading.
    pub fn read(&self) -> ConstAccessor<'_> {
        ConstAccessor {
            guard: self.inner.read().expect("indexing state lock poisoned"),
        }
    }

    /// Acquires the exclusive lock for writing.
    pub fn write(&self) -> MutateAccessor<'_> {
        MutateAccessor {
            guard: self.inner.write().expect("indexing state lock poisoned"),
        }
    }
}

/// Scoped read access to the indexing state.
pub struct ConstAccessor<'a> {
    guard: RwLockReadGuard<'a, IndexedContent>,
}

impl ConstAccessor<'_> {
    /// Total bytes folded into the index so far.
    pub fn indexed_size(&self) -> u64 {
        self.guard.hash.summary().size
    }

    /// Fingerprint snapshot of the indexed range.
    pub fn hash(&self) -> IndexedHash {
        self.guard.hash.summary()
    }

    pub fn max_length(&self) -> LineLength {
        self.guard.max_length
    }

    pub fn nb_lines(&self) -> u64 {
        self.guard.line_positions.size()
    }

    /// Byte offset where `line` starts.
    ///
    /// Line 0 starts at offset 0; every other line starts where its
    /// predecessor ended. `line == nb_lines()` is allowed and yields the
    /// sentinel one past the indexed data, so a line's extent is always
    /// `offset_of(i) .. offset_of(i + 1)`.
    ///
    /// # Panics
    /// Panics if `line > nb_lines()`.
    pub fn offset_of(&self, line: LineNumber) -> LineOffset {
        if line.get() == 0 {
            LineOffset(0)
        } else {
            self.guard.line_positions.at(line.get() - 1)
        }
    }

    /// True when the last line had no terminator and a synthetic one was
    /// recorded at `file_size + 1`.
    pub fn fake_final_lf(&self) -> bool {
        self.guard.line_positions.fake_final_lf()
    }

    pub fn encoding_guess(&self) -> Option<TextCodec> {
        self.guard.encoding_guess
    }

    pub fn forced_encoding(&self) -> Option<TextCodec> {
        self.guard.encoding_forced
    }

    /// Approximate heap bytes held by the line index, for diagnostics.
    pub fn allocated_size(&self) -> usize {
        self.guard.line_positions.allocated_size()
    }
}

/// Scoped write access to the indexing state.
pub struct MutateAccessor<'a> {
    guard: RwLockWriteGuard<'a, IndexedContent>,
}

impl MutateAccessor<'_> {
    /// Folds one parsed block into the index.
    ///
    /// Extends the line array, updates the rolling digests (empty blocks are
    /// skipped — the synthetic final terminator carries no bytes), merges
    /// the block's max line length, and records the current encoding guess,
    /// all under the one exclusive lock the accessor already holds.
    pub fn add_all(
        &mut self,
        block: &[u8],
        max_length: LineLength,
        line_positions: &FastLinePositionArray,
        encoding_guess: Option<TextCodec>,
    ) {
        let content = &mut *self.guard;
        content.max_length = content.max_length.max(max_length);
        content.line_positions.append_list(line_positions);
        if !block.is_empty() {
            content.hash.add_block(block);
        }
        content.encoding_guess = encoding_guess;
    }

    /// Resets the state to empty, as on session start.
    pub fn clear(&mut self) {
        let content = &mut *self.guard;
        content.line_positions = LinePositionArray::new();
        content.max_length = LineLength(0);
        content.hash.clear();
        content.encoding_guess = None;
        content.encoding_forced = None;
    }

    pub fn set_encoding_guess(&mut self, codec: Option<TextCodec>) {
        self.guard.encoding_guess = codec;
    }

    pub fn force_encoding(&mut self, codec: Option<TextCodec>) {
        self.guard.encoding_forced = codec;
    }

    /// Read API mirror, so a writer can consult the state it holds.
    pub fn encoding_guess(&self) -> Option<TextCodec> {
        self.guard.encoding_guess
    }

    pub fn allocated_size(&self) -> usize {
        self.guard.line_positions.allocated_size()
    }
}
