//! Streaming reader/parser pipeline for one indexing pass.
//!
//! ```text
//! [reader thread] --bounded channel--> [parser, on the operation thread]
//! ```
//!
//! Why a dedicated reader thread and a bounded channel?
//! - The channel capacity *is* the prefetch window: at most N blocks sit
//!   between the reader and the parser, so memory stays bounded on a fast
//!   disk with a slow parser. A blocked `send` is the backpressure; a `recv`
//!   returns the credit.
//! - A single producer and a single consumer give strict block order, which
//!   the parser requires: its cursor state is sequential and the line array
//!   is append-only.
//! - Decoupling read from parse hides I/O latency behind the CPU-bound parse.
//!
//! The reader checks the cancellation flag before each block. On EOF, read
//! error, or cancellation it sends the [`BlockMessage::Eof`] sentinel and
//! terminates; the consumer drains whatever was already in flight (at most
//! one prefetch window) and stops at the sentinel.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};
use tracing::{debug, error};

use crate::INDEXING_BLOCK_SIZE;

/// One message from the reader to the parser.
#[derive(Debug)]
pub(crate) enum BlockMessage {
    /// A block of file data starting at `offset`.
    Block { offset: u64, bytes: Vec<u8> },
    /// End of stream: EOF, read failure, or cancellation.
    Eof,
}

/// Counters reported by the reader thread when it finishes.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ReaderStats {
    /// Blocks successfully read and sent.
    pub blocks_read: u64,
    /// Bytes successfully read and sent.
    pub bytes_read: u64,
    /// Time spent inside `read()` calls.
    pub io_time: Duration,
    /// A read failed; the stream was cut short.
    pub read_failed: bool,
}

/// A running reader thread plus the channel it feeds.
pub(crate) struct BlockPipeline {
    receiver: Receiver<BlockMessage>,
    reader: JoinHandle<ReaderStats>,
}

impl BlockPipeline {
    /// Seeks `file` to `start_offset` and spawns the reader thread.
    ///
    /// `prefetch_blocks` is the bounded channel capacity in 1 MiB blocks and
    /// must be at least 1.
    pub fn spawn(
        mut file: File,
        start_offset: u64,
        prefetch_blocks: usize,
        interrupt: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        debug_assert!(prefetch_blocks >= 1);
        file.seek(SeekFrom::Start(start_offset))?;

        let (sender, receiver) = bounded(prefetch_blocks.max(1));
        let reader = thread::Builder::new()
            .name("index-reader".into())
            .spawn(move || {
                let mut stats = ReaderStats::default();
                let mut offset = start_offset;

                loop {
                    if interrupt.load(Ordering::Relaxed) {
                        debug!(offset, "reader interrupted");
                        break;
                    }

                    let mut buffer = vec![0u8; INDEXING_BLOCK_SIZE];
                    let io_start = Instant::now();
                    let read = match read_full(&mut file, &mut buffer) {
                        Ok(read) => read,
                        Err(err) => {
                            error!(offset, %err, "read failed, stopping the reader");
                            stats.read_failed = true;
                            break;
                        }
                    };
                    stats.io_time += io_start.elapsed();

                    if read == 0 {
                        break;
                    }
                    buffer.truncate(read);

                    debug!(offset, len = read, "sending block");
                    stats.blocks_read += 1;
                    stats.bytes_read += read as u64;

                    // Backpressure: blocks until the parser frees a slot. A
                    // send fails only when the consumer is gone, in which
                    // case there is nobody left to read for.
                    if sender
                        .send(BlockMessage::Block {
                            offset,
                            bytes: buffer,
                        })
                        .is_err()
                    {
                        return stats;
                    }
                    offset += read as u64;
                }

                let _ = sender.send(BlockMessage::Eof);
                stats
            })?;

        Ok(Self { receiver, reader })
    }

    /// Channel end the parser drains; messages arrive in file order, the
    /// sentinel last.
    pub fn receiver(&self) -> &Receiver<BlockMessage> {
        &self.receiver
    }

    /// Waits for the reader thread and returns its counters.
    pub fn join(self) -> ReaderStats {
        match self.reader.join() {
            Ok(stats) => stats,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Reads until the buffer is full or EOF, retrying on interruption.
///
/// Short reads are legal for `File::read`; blocks must be full-sized except
/// the last one, or block offsets and digest windows drift.
fn read_full(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                // A partial block before the failure still counts: the bytes
                // were read and the index can retain them.
                if filled > 0 {
                    tracing::warn!(filled, %err, "read error after a partial block");
                }
                return if filled > 0 { Ok(filled) } else { Err(err) };
            }
        }
    }
    Ok(filled)
}
