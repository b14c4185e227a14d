//! The three indexing operations: full rebuild, append-only continuation,
//! and the file-change check.
//!
//! Full and partial indexing share one driver, [`OperationContext::do_index`]:
//! it opens the file, spawns the reader pipeline, and parses blocks in order,
//! folding each one into the shared state under a short write lock. The
//! change check never touches the parser; it digests the current file
//! contents and compares against the fingerprint snapshot taken when the
//! data was indexed.
//!
//! Terminal results never leave as errors: an unopenable file indexes as
//! empty and still reports success, a mid-file read failure retains whatever
//! was indexed, and cancellation clears the index. Every outcome reaches the
//! caller as a status value through the observer.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::digest::FileDigest;
use crate::encoding::{detect_encoding, EncodingParameters, TextCodec};
use crate::index::IndexingData;
use crate::line_positions::FastLinePositionArray;
use crate::parser::{parse_block, ParserState};
use crate::pipeline::{BlockMessage, BlockPipeline};
use crate::worker::IndexObserver;
use crate::{LineLength, LineOffset, INDEXING_BLOCK_SIZE};

/// Terminal status of an indexing operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexingStatus {
    Successful,
    Interrupted,
}

/// Result of the file-change check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileChangeStatus {
    /// On-disk contents match the indexed fingerprints exactly.
    Unchanged,
    /// The indexed range is intact and the file has grown; a partial index
    /// brings the index up to date.
    DataAdded,
    /// The index no longer describes the file: the file shrank, vanished,
    /// became unreadable, or its content changed inside the indexed range.
    /// The only safe response is a full reindex.
    Truncated,
}

/// Everything an operation needs: the target path, the shared state, the
/// cancellation flag, the configuration snapshot, and the observer.
pub(crate) struct OperationContext {
    pub path: PathBuf,
    pub data: IndexingData,
    pub interrupt: Arc<AtomicBool>,
    pub config: IndexConfig,
    pub observer: Arc<dyn IndexObserver>,
}

/// Full rebuild: clear, record the forced encoding, index from offset zero.
pub(crate) fn run_full_index(ctx: &OperationContext, forced_encoding: Option<TextCodec>) -> bool {
    debug!(path = %ctx.path.display(), "full index starting");
    ctx.observer.indexing_progressed(0);

    {
        let mut writer = ctx.data.write();
        writer.clear();
        writer.force_encoding(forced_encoding);
    }

    ctx.do_index(0);

    let success = !ctx.interrupted();
    debug!(success, "full index finished");
    ctx.observer.indexing_finished(if success {
        IndexingStatus::Successful
    } else {
        IndexingStatus::Interrupted
    });
    success
}

/// Append-only continuation from the currently indexed size.
pub(crate) fn run_partial_index(ctx: &OperationContext) -> bool {
    let initial_position = ctx.data.read().indexed_size();
    debug!(path = %ctx.path.display(), initial_position, "partial index starting");
    ctx.observer.indexing_progressed(0);

    ctx.do_index(initial_position);

    let success = !ctx.interrupted();
    debug!(success, "partial index finished");
    ctx.observer.indexing_finished(if success {
        IndexingStatus::Successful
    } else {
        IndexingStatus::Interrupted
    });
    success
}

/// Digest comparison between the file on disk and the indexed fingerprints.
pub(crate) fn run_check_file_changes(ctx: &OperationContext) -> FileChangeStatus {
    info!(path = %ctx.path.display(), "checking file for changes");
    let status = ctx.do_check_file_changes();
    ctx.observer.check_file_changes_finished(status);
    status
}

impl OperationContext {
    #[inline]
    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Resolves the encoding for this pass, once per operation.
    ///
    /// The probe runs on the first block seen. The codec actually used for
    /// parsing is, in priority order: the forced encoding, a guess recorded
    /// by a previous pass, this pass's probe result.
    fn guess_encoding(&self, block: &[u8], state: &mut ParserState) {
        if state.encoding_guess.is_none() {
            let guess = detect_encoding(block);
            info!(codec = guess.name(), "encoding guess");
            state.encoding_guess = Some(guess);
        }

        if state.file_codec.is_none() {
            let reader = self.data.read();
            let codec = reader
                .forced_encoding()
                .or_else(|| reader.encoding_guess())
                .or(state.encoding_guess);
            drop(reader);

            if let Some(codec) = codec {
                state.file_codec = Some(codec);
                state.encoding_params = EncodingParameters::for_codec(codec);
                info!(
                    codec = codec.name(),
                    line_feed_width = state.encoding_params.line_feed_width,
                    "file codec resolved"
                );
            }
        }
    }

    /// Shared driver for full and partial indexing.
    fn do_index(&self, initial_position: u64) {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) => {
                // An unopenable file indexes as an empty one.
                warn!(path = %self.path.display(), %err, "cannot open file, indexing as empty");
                let mut writer = self.data.write();
                writer.clear();
                writer.set_encoding_guess(Some(TextCodec::platform_default()));
                drop(writer);
                self.observer.indexing_progressed(100);
                return;
            }
        };

        let file_size = file.metadata().map(|meta| meta.len()).unwrap_or(0);
        let mut state = ParserState::new(initial_position, file_size);

        {
            let reader = self.data.read();
            state.file_codec = reader.forced_encoding().or_else(|| reader.encoding_guess());
            state.encoding_guess = reader.encoding_guess();
        }
        if let Some(codec) = state.file_codec {
            state.encoding_params = EncodingParameters::for_codec(codec);
        }

        let indexing_start = Instant::now();

        let pipeline = match BlockPipeline::spawn(
            file,
            initial_position,
            self.config.prefetch_blocks(),
            Arc::clone(&self.interrupt),
        ) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "cannot seek file, indexing as empty");
                let mut writer = self.data.write();
                writer.clear();
                writer.set_encoding_guess(Some(TextCodec::platform_default()));
                drop(writer);
                self.observer.indexing_progressed(100);
                return;
            }
        };

        for message in pipeline.receiver().iter() {
            let BlockMessage::Block { offset, bytes } = message else {
                break;
            };
            debug!(offset, "indexing block start");

            self.guess_encoding(&bytes, &mut state);

            let mut writer = self.data.write();
            if !bytes.is_empty() {
                let line_positions = parse_block(offset, &bytes, &mut state);
                writer.add_all(
                    &bytes,
                    LineLength(state.max_length),
                    &line_positions,
                    state.encoding_guess,
                );
                drop(writer);

                let progress = if state.file_size > 0 {
                    calculate_progress(state.pos, state.file_size)
                } else {
                    100
                };
                self.observer.indexing_progressed(progress);
            } else {
                writer.set_encoding_guess(state.encoding_guess);
            }

            debug!(offset, "indexing block done");
        }

        let reader_stats = pipeline.join();
        if reader_stats.read_failed {
            warn!(
                indexed = state.pos,
                "read failed mid-file, keeping the partial index"
            );
        }

        let mut writer = self.data.write();
        debug!(pos = state.pos, "indexed up to");

        // A last line without a terminator gets a synthetic one past EOF.
        if !self.interrupted() && state.file_size > state.pos {
            warn!("file not terminated by a line feed, recording a synthetic one");
            let mut line_position = FastLinePositionArray::new();
            line_position.append(LineOffset(state.file_size + 1));
            line_position.set_fake_final_lf();
            writer.add_all(&[], LineLength(0), &line_position, state.encoding_guess);
        }

        let took = indexing_start.elapsed();
        let throughput_mib_s = if took.as_millis() > 0 {
            (state.file_size as f64 / (1024.0 * 1024.0)) / took.as_secs_f64()
        } else {
            0.0
        };
        info!(
            took_ms = took.as_millis() as u64,
            io_ms = reader_stats.io_time.as_millis() as u64,
            index_bytes = writer.allocated_size(),
            throughput_mib_s = %format_args!("{throughput_mib_s:.1}"),
            "indexing done"
        );

        if self.interrupted() {
            writer.clear();
        }

        if writer.encoding_guess().is_none() {
            writer.set_encoding_guess(Some(TextCodec::platform_default()));
        }
    }

    fn do_check_file_changes(&self) -> FileChangeStatus {
        let indexed = self.data.read().hash();
        let real_size = std::fs::metadata(&self.path)
            .map(|meta| meta.len())
            .unwrap_or(0);

        if real_size == 0 || real_size < indexed.size {
            info!(real_size, indexed_size = indexed.size, "file truncated");
            return FileChangeStatus::Truncated;
        }

        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) => {
                info!(path = %self.path.display(), %err, "file failed to open");
                return FileChangeStatus::Truncated;
            }
        };

        let mut buffer = vec![0u8; INDEXING_BLOCK_SIZE];
        let fast_path = self.config.fast_modification_detection
            && indexed.size > 2 * INDEXING_BLOCK_SIZE as u64;

        let modified = if fast_path {
            let header_digest = digest_range(&mut file, indexed.header_size, &mut buffer);
            info!(
                indexed = indexed.header_digest,
                current = header_digest,
                size = indexed.header_size,
                "header digest"
            );

            if header_digest != indexed.header_digest {
                true
            } else if file.seek(SeekFrom::Start(indexed.tail_offset)).is_err() {
                true
            } else {
                let tail_digest = digest_range(&mut file, indexed.tail_size, &mut buffer);
                info!(
                    indexed = indexed.tail_digest,
                    current = tail_digest,
                    size = indexed.tail_size,
                    "tail digest"
                );
                tail_digest != indexed.tail_digest
            }
        } else {
            let full_digest = digest_range(&mut file, indexed.size, &mut buffer);
            info!(
                indexed = indexed.full_digest,
                current = full_digest,
                "full digest"
            );
            full_digest != indexed.full_digest
        };

        if modified {
            info!("file changed in indexed range");
            FileChangeStatus::Truncated
        } else if real_size > indexed.size {
            info!("new data on disk");
            FileChangeStatus::DataAdded
        } else {
            info!("no change in file");
            FileChangeStatus::Unchanged
        }
    }
}

/// Digests `len` bytes from the file's current position.
///
/// A short read (EOF or error) just ends the loop: the resulting digest will
/// not match the indexed one, which is exactly the verdict such a file
/// deserves.
fn digest_range(file: &mut File, len: u64, buffer: &mut [u8]) -> u64 {
    let mut digest = FileDigest::new();
    let mut total: u64 = 0;
    while total < len {
        let want = (len - total).min(buffer.len() as u64) as usize;
        match file.read(&mut buffer[..want]) {
            Ok(0) => break,
            Ok(read) => {
                digest.add(&buffer[..read]);
                total += read as u64;
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    digest.digest()
}

/// Progress in percent, clamped to the file size.
fn calculate_progress(pos: u64, size: u64) -> u8 {
    debug_assert!(size > 0);
    (pos.min(size) * 100 / size) as u8
}
