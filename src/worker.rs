//! Worker facade: one operation at a time, observed asynchronously.
//!
//! The worker owns the attached path, the cancellation flag, and at most one
//! running operation. Submitting an operation waits for the previous one,
//! clears the flag, and launches the new one on a named background thread.
//! The operation talks back through the [`IndexObserver`] callback trio;
//! callbacks fire on the operation thread, so observers must be cheap and
//! thread-safe. Hosts with an event loop can use [`ChannelObserver`] to turn
//! the callbacks into a typed event stream drained wherever convenient.
//!
//! Dropping the worker interrupts and joins whatever is still running, so an
//! operation never outlives the facade or the state it mutates.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::encoding::TextCodec;
use crate::index::IndexingData;
use crate::operations::{
    run_check_file_changes, run_full_index, run_partial_index, FileChangeStatus, IndexingStatus,
    OperationContext,
};

/// Callbacks an operation delivers while it runs.
///
/// All methods have empty defaults so observers implement only what they
/// watch. Calls arrive on the operation's background thread.
pub trait IndexObserver: Send + Sync {
    /// Indexing progress, 0 to 100.
    fn indexing_progressed(&self, _percent: u8) {}
    /// Terminal status of a full or partial index.
    fn indexing_finished(&self, _status: IndexingStatus) {}
    /// Terminal status of a change check.
    fn check_file_changes_finished(&self, _status: FileChangeStatus) {}
}

/// Observer notifications as plain values, for channel-based hosts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexEvent {
    Progress(u8),
    IndexingFinished(IndexingStatus),
    CheckFileChangesFinished(FileChangeStatus),
}

/// Observer that forwards every notification into an unbounded channel.
pub struct ChannelObserver {
    sender: Sender<IndexEvent>,
}

impl ChannelObserver {
    /// Creates the observer and the receiving end the host drains.
    pub fn new() -> (Arc<Self>, Receiver<IndexEvent>) {
        let (sender, receiver) = unbounded();
        (Arc::new(Self { sender }), receiver)
    }
}

impl IndexObserver for ChannelObserver {
    fn indexing_progressed(&self, percent: u8) {
        let _ = self.sender.send(IndexEvent::Progress(percent));
    }

    fn indexing_finished(&self, status: IndexingStatus) {
        let _ = self.sender.send(IndexEvent::IndexingFinished(status));
    }

    fn check_file_changes_finished(&self, status: FileChangeStatus) {
        let _ = self.sender.send(IndexEvent::CheckFileChangesFinished(status));
    }
}

/// What a finished operation thread reports back to `wait_for_finished`.
#[derive(Clone, Copy, Debug)]
enum OperationResult {
    Indexing(bool),
    FileCheck(FileChangeStatus),
}

/// Serializes indexing operations over one file's shared state.
pub struct LogIndexWorker {
    data: IndexingData,
    config: IndexConfig,
    observer: Arc<dyn IndexObserver>,
    interrupt: Arc<AtomicBool>,
    file_path: Mutex<PathBuf>,
    operation: Mutex<Option<JoinHandle<OperationResult>>>,
}

impl LogIndexWorker {
    /// Creates a worker over `data`; the caller keeps its own clone of the
    /// handle for reading.
    pub fn new(data: IndexingData, config: IndexConfig, observer: Arc<dyn IndexObserver>) -> Self {
        Self {
            data,
            config,
            observer,
            interrupt: Arc::new(AtomicBool::new(false)),
            file_path: Mutex::new(PathBuf::new()),
            operation: Mutex::new(None),
        }
    }

    /// Sets the file the next operations work on.
    pub fn attach_file(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!(path = %path.display(), "file attached");
        *self.file_path.lock().expect("worker path lock poisoned") = path;
    }

    /// Starts a full rebuild, optionally pinning the codec for the session.
    pub fn index_all(&self, forced_encoding: Option<TextCodec>) {
        debug!("full index requested");
        self.submit("index-full", move |ctx| {
            OperationResult::Indexing(run_full_index(&ctx, forced_encoding))
        });
    }

    /// Starts an append-only continuation from the indexed size.
    pub fn index_additional_lines(&self) {
        debug!("additional lines requested");
        self.submit("index-partial", |ctx| {
            OperationResult::Indexing(run_partial_index(&ctx))
        });
    }

    /// Starts a change check against the indexed fingerprints.
    pub fn check_file_changes(&self) {
        debug!("check file changes requested");
        self.submit("index-check", |ctx| {
            OperationResult::FileCheck(run_check_file_changes(&ctx))
        });
    }

    /// Requests cancellation of the running operation.
    ///
    /// The reader notices before its next block; the operation then clears
    /// the index and finishes as `Interrupted`.
    pub fn interrupt(&self) {
        info!("interrupt requested");
        self.interrupt.store(true, Ordering::Relaxed);
    }

    /// Blocks until the current operation (if any) has finished.
    pub fn wait_for_finished(&self) {
        let handle = self
            .operation
            .lock()
            .expect("worker operation lock poisoned")
            .take();
        Self::join(handle);
    }

    fn submit<F>(&self, name: &str, run: F)
    where
        F: FnOnce(OperationContext) -> OperationResult + Send + 'static,
    {
        let mut slot = self
            .operation
            .lock()
            .expect("worker operation lock poisoned");

        // One operation at a time: the previous one finishes first.
        Self::join(slot.take());
        self.interrupt.store(false, Ordering::Relaxed);

        let ctx = OperationContext {
            path: self
                .file_path
                .lock()
                .expect("worker path lock poisoned")
                .clone(),
            data: self.data.clone(),
            interrupt: Arc::clone(&self.interrupt),
            config: self.config,
            observer: Arc::clone(&self.observer),
        };

        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || run(ctx))
            .expect("spawn operation thread");
        *slot = Some(handle);
    }

    fn join(handle: Option<JoinHandle<OperationResult>>) {
        if let Some(handle) = handle {
            match handle.join() {
                Ok(result) => debug!(?result, "operation finished"),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    }
}

impl Drop for LogIndexWorker {
    fn drop(&mut self) {
        self.interrupt.store(true, Ordering::Relaxed);
        self.wait_for_finished();
    }
}
