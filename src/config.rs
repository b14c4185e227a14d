//! Read-only configuration inputs for the indexing core.
//!
//! The host application owns configuration storage; the core only consumes a
//! snapshot of the two knobs that affect indexing behavior. The struct is
//! serde-enabled so hosts can load it as part of a larger settings document.

use serde::{Deserialize, Serialize};

/// Tunables consumed by the indexing operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Prefetch window between the reader thread and the parser, in MiB.
    ///
    /// One indexing block is 1 MiB, so this is also the maximum number of
    /// blocks in flight. Must be at least 1.
    #[serde(default = "default_read_buffer_mb")]
    pub index_read_buffer_size_mb: usize,

    /// Enables the header/tail digest fast path in the change check.
    ///
    /// When set, files larger than two indexing blocks are verified by
    /// digesting only the first and the most recently indexed bytes instead
    /// of the whole indexed range.
    #[serde(default = "default_fast_detection")]
    pub fast_modification_detection: bool,
}

fn default_read_buffer_mb() -> usize {
    16
}

fn default_fast_detection() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_read_buffer_size_mb: default_read_buffer_mb(),
            fast_modification_detection: default_fast_detection(),
        }
    }
}

impl IndexConfig {
    /// Prefetch window expressed in blocks, clamped to at least one.
    #[inline]
    pub(crate) fn prefetch_blocks(&self) -> usize {
        self.index_read_buffer_size_mb.max(1)
    }
}
