//! Line indexing core for a large-file log viewer.
//!
//! The crate scans a text log on disk — potentially many gigabytes — and
//! produces a compact line index: a mapping from line number to byte offset,
//! the maximum displayed line length (tab-expanded), a detected character
//! encoding, and a set of rolling content fingerprints that let a viewer
//! detect whether the file was appended-to, truncated, or replaced since the
//! last pass. The index makes random access to any line O(1).
//!
//! High-level flow (one indexing pass):
//! 1) A dedicated reader thread streams the file in 1 MiB blocks.
//! 2) A bounded channel between reader and parser caps prefetch memory.
//! 3) The parser locates line terminators, expands tabs, and appends line
//!    offsets to the shared indexing state, one short write lock per block.
//! 4) Rolling header/tail digests are folded in as each block lands.
//!
//! Three operations drive the flow: a full rebuild, an append-only
//! continuation, and a change check that compares on-disk digests against the
//! indexed fingerprints without re-reading the whole file.
//!
//! The shared state is read by the viewer through short-lived accessor
//! guards; see [`index::IndexingData`]. The worker facade in [`worker`]
//! serializes operations and reports progress and terminal status to an
//! observer.

pub mod config;
pub mod digest;
pub mod encoding;
pub mod index;
pub mod line_positions;
pub mod operations;
pub mod parser;
pub mod pipeline;
pub mod worker;

pub use config::IndexConfig;
pub use digest::{FileDigest, IndexedHash};
pub use encoding::{detect_encoding, EncodingParameters, TextCodec};
pub use index::{ConstAccessor, IndexingData, MutateAccessor};
pub use line_positions::{FastLinePositionArray, LinePositionArray};
pub use operations::{FileChangeStatus, IndexingStatus};
pub use worker::{ChannelObserver, IndexEvent, IndexObserver, LogIndexWorker};

/// Unit of I/O and digest accounting (bytes).
///
/// The reader streams the file in blocks of this size; the header and tail
/// fingerprint windows are sized in multiples of it.
pub const INDEXING_BLOCK_SIZE: usize = 1024 * 1024;

/// Display width of the tab grid (columns).
pub const TAB_STOP: u32 = 8;

/// Byte position within the file where a line starts or ends.
///
/// Monotone across a session; `u64` so multi-gigabyte files index without
/// overflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineOffset(pub u64);

impl LineOffset {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Zero-based line number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineNumber(pub u64);

impl LineNumber {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Displayed line length in columns, after tab expansion.
///
/// Saturates at `u32::MAX`; data itself is never truncated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineLength(pub u32);

impl LineLength {
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}
