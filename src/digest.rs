//! Rolling content fingerprints for fast file-change detection.
//!
//! Every block folded into the index updates three digests:
//!
//! - a full-file digest over every byte indexed so far,
//! - a header digest over the first indexing block of the file,
//! - a tail digest over a sliding window of the 1–2 most recent blocks.
//!
//! The header and tail windows are what let a change check on a 10 GiB file
//! avoid re-reading the whole file: the prologue and the freshest suffix are
//! enough to catch truncation, rotation, and in-place edits near the end.
//!
//! # Invariants
//! - The header window only grows, up to one indexing block, and is never
//!   trimmed.
//! - The tail window slides: oldest blocks are dropped while the window
//!   exceeds two indexing blocks, so it always spans between one and two
//!   blocks once the file is past the 2 MiB mark.
//! - Digests are stable across runs: same bytes, same value.

use std::collections::VecDeque;

use crate::INDEXING_BLOCK_SIZE;

/// Incremental 64-bit content digest.
///
/// Wraps an incremental BLAKE3 hasher; the 64-bit value is the first eight
/// bytes of the output, little-endian. Stability across runs is the only
/// requirement here — collision resistance comes for free.
#[derive(Clone, Default)]
pub struct FileDigest {
    hasher: blake3::Hasher,
}

impl std::fmt::Debug for FileDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDigest")
            .field("digest", &self.digest())
            .finish()
    }
}

impl FileDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds `bytes` into the running digest.
    #[inline]
    pub fn add(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Current digest over everything added so far.
    ///
    /// Non-destructive; more bytes can be added afterwards.
    pub fn digest(&self) -> u64 {
        let hash = self.hasher.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(word)
    }

    /// Container-key form of the digest (mixed so low bits spread).
    pub fn hash(&self) -> u64 {
        self.digest().wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    pub fn reset(&mut self) {
        self.hasher.reset();
    }
}

/// Snapshot of the indexed range's fingerprints.
///
/// Cheap to copy; the change check works entirely from one of these without
/// holding the index lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexedHash {
    /// Total bytes folded into the index so far.
    pub size: u64,
    /// Digest over all indexed bytes.
    pub full_digest: u64,
    /// Container-key form of `full_digest`.
    pub hash: u64,
    /// Digest over the header window.
    pub header_digest: u64,
    /// Bytes covered by the header window.
    pub header_size: u64,
    /// File offset where the tail window starts.
    pub tail_offset: u64,
    /// Bytes covered by the tail window.
    pub tail_size: u64,
    /// Digest over the tail window.
    pub tail_digest: u64,
}

/// Owns the digest state that must survive between blocks: the running
/// full-file hasher and the header/tail block windows.
///
/// Lives inside the indexing state and is updated under its write lock, one
/// call per block.
#[derive(Debug, Default)]
pub struct RollingIndexHash {
    summary: IndexedHash,
    builder: FileDigest,
    header_blocks: Vec<Vec<u8>>,
    tail_blocks: VecDeque<(u64, Vec<u8>)>,
}

impl RollingIndexHash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint snapshot for the bytes added so far.
    #[inline]
    pub fn summary(&self) -> IndexedHash {
        self.summary
    }

    /// Folds one block into the full, header, and tail digests.
    ///
    /// The block's file offset is the current indexed size; callers feed
    /// blocks strictly in file order.
    pub fn add_block(&mut self, block: &[u8]) {
        debug_assert!(!block.is_empty(), "empty blocks never reach the digests");

        self.builder.add(block);
        self.summary.full_digest = self.builder.digest();
        self.summary.hash = self.builder.hash();

        if self.summary.header_size < INDEXING_BLOCK_SIZE as u64 {
            self.header_blocks.push(block.to_vec());

            let mut header = FileDigest::new();
            for header_block in &self.header_blocks {
                header.add(header_block);
            }
            self.summary.header_digest = header.digest();
            self.summary.header_size += block.len() as u64;
        }

        self.tail_blocks.push_back((self.summary.size, block.to_vec()));
        let mut tail_total: u64 = self.tail_blocks.iter().map(|(_, b)| b.len() as u64).sum();
        while tail_total > 2 * INDEXING_BLOCK_SIZE as u64 {
            if let Some((_, dropped)) = self.tail_blocks.pop_front() {
                tail_total -= dropped.len() as u64;
            } else {
                break;
            }
        }

        let mut tail = FileDigest::new();
        self.summary.tail_size = 0;
        for (_, tail_block) in &self.tail_blocks {
            tail.add(tail_block);
            self.summary.tail_size += tail_block.len() as u64;
        }
        self.summary.tail_offset = self
            .tail_blocks
            .front()
            .map(|(offset, _)| *offset)
            .unwrap_or(0);
        self.summary.tail_digest = tail.digest();

        self.summary.size += block.len() as u64;
    }

    pub fn clear(&mut self) {
        self.summary = IndexedHash::default();
        self.builder.reset();
        self.header_blocks.clear();
        self.tail_blocks.clear();
    }
}
