//! Indexing laws over generated files: monotone offsets, the line-count
//! law, round-tripping, idempotence, the append law, and fingerprint
//! sensitivity.
//!
//! Generated files stay small (well under one indexing block), which keeps
//! the suite fast and forces the change check onto the full-digest path,
//! where single-byte sensitivity is guaranteed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use proptest::prelude::*;

use logindex::{
    ChannelObserver, FileChangeStatus, IndexConfig, IndexedHash, IndexingData, IndexingStatus,
    LineNumber, LogIndexWorker,
};

struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn with_bytes(bytes: &[u8]) -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "logindex_prop_{}_{}",
            std::process::id(),
            stamp
        ));
        fs::write(&path, bytes).expect("write generated file");
        Self { path }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Indexed {
    nb_lines: u64,
    max_length: u32,
    offsets: Vec<u64>,
    hash: IndexedHash,
    fake_final_lf: bool,
}

fn run_worker(path: &Path, drive: impl FnOnce(&LogIndexWorker)) -> Indexed {
    let data = IndexingData::new();
    let (observer, events) = ChannelObserver::new();
    let worker = LogIndexWorker::new(data.clone(), IndexConfig::default(), observer);
    worker.attach_file(path);
    drive(&worker);
    worker.wait_for_finished();

    let finished = events.try_iter().any(|event| {
        matches!(
            event,
            logindex::IndexEvent::IndexingFinished(IndexingStatus::Successful)
        )
    });
    assert!(finished, "indexing did not finish successfully");

    let reader = data.read();
    let nb_lines = reader.nb_lines();
    Indexed {
        nb_lines,
        max_length: reader.max_length().get(),
        offsets: (0..=nb_lines)
            .map(|line| reader.offset_of(LineNumber(line)).get())
            .collect(),
        hash: reader.hash(),
        fake_final_lf: reader.fake_final_lf(),
    }
}

fn full_index(path: &Path) -> Indexed {
    run_worker(path, |worker| worker.index_all(None))
}

/// Lines without terminators, tabs included.
fn arb_lines() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(
        prop::collection::vec(
            prop_oneof![
                4 => prop::sample::select(&b"abcdefghijklmnopqrstuvwxyz 0123456789:.-[]"[..]),
                1 => Just(b'\t'),
            ],
            0..60,
        ),
        0..40,
    )
}

/// A file image from lines: terminated lines plus an optional unterminated
/// tail.
fn file_image(lines: &[Vec<u8>], trailing_newline: bool) -> Vec<u8> {
    let mut image = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        image.extend_from_slice(line);
        if i + 1 < lines.len() || trailing_newline {
            image.push(b'\n');
        }
    }
    image
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn offsets_are_strictly_monotone(lines in arb_lines(), trailing in any::<bool>()) {
        let image = file_image(&lines, trailing);
        let tmp = TempFile::with_bytes(&image);
        let indexed = full_index(&tmp.path);

        for pair in indexed.offsets.windows(2) {
            prop_assert!(pair[0] < pair[1], "offsets {:?} not monotone", indexed.offsets);
        }
    }

    #[test]
    fn line_count_matches_terminators(lines in arb_lines(), trailing in any::<bool>()) {
        let image = file_image(&lines, trailing);
        let tmp = TempFile::with_bytes(&image);
        let indexed = full_index(&tmp.path);

        let newlines = image.iter().filter(|&&b| b == b'\n').count() as u64;
        let unterminated_tail = !image.is_empty() && *image.last().expect("non-empty") != b'\n';
        prop_assert_eq!(indexed.nb_lines, newlines + u64::from(unterminated_tail));
        prop_assert_eq!(indexed.fake_final_lf, unterminated_tail);
    }

    #[test]
    fn offsets_round_trip_to_the_original_lines(lines in arb_lines()) {
        // Fully terminated image: every line's extent is delimited by its
        // offset and the next one, minus the terminator.
        let image = file_image(&lines, true);
        let tmp = TempFile::with_bytes(&image);
        let indexed = full_index(&tmp.path);

        prop_assert_eq!(indexed.nb_lines as usize, lines.len());
        for (i, line) in lines.iter().enumerate() {
            let start = indexed.offsets[i] as usize;
            let end = indexed.offsets[i + 1] as usize;
            prop_assert_eq!(&image[start..end - 1], &line[..]);
        }
    }

    #[test]
    fn indexing_twice_is_idempotent(lines in arb_lines(), trailing in any::<bool>()) {
        let image = file_image(&lines, trailing);
        let tmp = TempFile::with_bytes(&image);

        let first = full_index(&tmp.path);
        let second = full_index(&tmp.path);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn appending_equals_reindexing(
        lines in arb_lines(),
        split in any::<prop::sample::Index>(),
        trailing in any::<bool>(),
    ) {
        // Cut at a line boundary: the realistic append pattern, and the one
        // where incremental state is defined to match a full rebuild.
        let keep = split.index(lines.len() + 1);
        let prefix = file_image(&lines[..keep], true);
        let full = file_image(&lines, trailing);
        prop_assume!(full.len() >= prefix.len() && full.starts_with(&prefix));

        let tmp = TempFile::with_bytes(&prefix);
        let data = IndexingData::new();
        let (observer, _events) = ChannelObserver::new();
        let worker = LogIndexWorker::new(data.clone(), IndexConfig::default(), observer);
        worker.attach_file(&tmp.path);
        worker.index_all(None);
        worker.wait_for_finished();

        fs::write(&tmp.path, &full).expect("extend file");
        worker.index_additional_lines();
        worker.wait_for_finished();

        let reader = data.read();
        let incremental = Indexed {
            nb_lines: reader.nb_lines(),
            max_length: reader.max_length().get(),
            offsets: (0..=reader.nb_lines())
                .map(|line| reader.offset_of(LineNumber(line)).get())
                .collect(),
            hash: reader.hash(),
            fake_final_lf: reader.fake_final_lf(),
        };
        drop(reader);

        let rebuilt = full_index(&tmp.path);
        prop_assert_eq!(incremental, rebuilt);
    }

    #[test]
    fn any_single_byte_edit_is_detected(
        lines in arb_lines(),
        position in any::<prop::sample::Index>(),
        replacement in any::<u8>(),
    ) {
        let image = file_image(&lines, true);
        prop_assume!(!image.is_empty());

        let at = position.index(image.len());
        prop_assume!(image[at] != replacement);

        let tmp = TempFile::with_bytes(&image);
        let mut edited = image.clone();
        edited[at] = replacement;

        let data = IndexingData::new();
        let (observer, events) = ChannelObserver::new();
        let worker = LogIndexWorker::new(data, IndexConfig::default(), observer);
        worker.attach_file(&tmp.path);
        worker.index_all(None);
        worker.wait_for_finished();

        fs::write(&tmp.path, &edited).expect("rewrite file");
        worker.check_file_changes();
        worker.wait_for_finished();

        let status = events
            .try_iter()
            .find_map(|event| match event {
                logindex::IndexEvent::CheckFileChangesFinished(status) => Some(status),
                _ => None,
            })
            .expect("change check produced a status");
        prop_assert_eq!(status, FileChangeStatus::Truncated);
    }
}
