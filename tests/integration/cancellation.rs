//! Cancellation semantics: an interrupted index finishes empty.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};
use logindex::{
    IndexConfig, IndexEvent, IndexObserver, IndexingData, IndexingStatus, LogIndexWorker,
};

use crate::util::TempDir;

/// Observer that interrupts the worker on the first progress report.
///
/// The first report fires before any block is parsed, so the reader sees the
/// flag at its first check and the run deterministically ends interrupted.
struct InterruptOnFirstProgress {
    target: Mutex<Option<Arc<LogIndexWorker>>>,
    events: Sender<IndexEvent>,
}

impl InterruptOnFirstProgress {
    fn new() -> (Arc<Self>, Receiver<IndexEvent>) {
        let (events, receiver) = unbounded();
        (
            Arc::new(Self {
                target: Mutex::new(None),
                events,
            }),
            receiver,
        )
    }

    fn arm(&self, worker: Arc<LogIndexWorker>) {
        *self.target.lock().expect("observer lock") = Some(worker);
    }

    fn arm_none(&self) {
        *self.target.lock().expect("observer lock") = None;
    }
}

impl IndexObserver for InterruptOnFirstProgress {
    fn indexing_progressed(&self, percent: u8) {
        if let Some(worker) = self.target.lock().expect("observer lock").as_ref() {
            worker.interrupt();
        }
        let _ = self.events.send(IndexEvent::Progress(percent));
    }

    fn indexing_finished(&self, status: IndexingStatus) {
        let _ = self.events.send(IndexEvent::IndexingFinished(status));
    }
}

#[test]
fn interrupted_full_index_clears_the_state() {
    let tmp = TempDir::new("cancel").expect("temp dir");
    let mut content = Vec::new();
    for i in 0..200_000u32 {
        content.extend_from_slice(format!("line number {i}\n").as_bytes());
    }
    let path = tmp.file_with("big.log", &content);

    let data = IndexingData::new();
    let (observer, events) = InterruptOnFirstProgress::new();
    let worker = Arc::new(LogIndexWorker::new(
        data.clone(),
        IndexConfig::default(),
        observer.clone(),
    ));
    observer.arm(Arc::clone(&worker));
    worker.attach_file(&path);

    worker.index_all(None);
    worker.wait_for_finished();

    let statuses: Vec<_> = events
        .try_iter()
        .filter_map(|event| match event {
            IndexEvent::IndexingFinished(status) => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![IndexingStatus::Interrupted]);

    let reader = data.read();
    assert_eq!(reader.nb_lines(), 0);
    assert_eq!(reader.indexed_size(), 0);
    assert_eq!(reader.max_length().get(), 0);

    // Break the observer -> worker reference cycle before the test ends.
    observer.arm_none();
}

#[test]
fn a_fresh_operation_clears_a_previous_interrupt() {
    let tmp = TempDir::new("resubmit").expect("temp dir");
    let path = tmp.file_with("small.log", b"one\ntwo\n");

    let data = IndexingData::new();
    let (observer, events) = logindex::ChannelObserver::new();
    let worker = LogIndexWorker::new(data.clone(), IndexConfig::default(), observer);
    worker.attach_file(&path);

    // Interrupt with nothing running, then index: the stale flag must not
    // leak into the new operation.
    worker.interrupt();
    worker.index_all(None);
    worker.wait_for_finished();

    let status = events
        .try_iter()
        .find_map(|event| match event {
            IndexEvent::IndexingFinished(status) => Some(status),
            _ => None,
        })
        .expect("indexing produced a terminal status");
    assert_eq!(status, IndexingStatus::Successful);
    assert_eq!(data.read().nb_lines(), 2);
}
