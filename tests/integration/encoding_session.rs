//! Encoding detection and override behavior across a session.

use logindex::{IndexConfig, IndexingStatus, TextCodec};

use crate::util::{snapshot, Harness, TempDir};

fn utf16le_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
    bytes
}

#[test]
fn utf16le_bom_sets_the_guess_and_terminator_width() {
    let tmp = TempDir::new("utf16le").expect("temp dir");
    let path = tmp.file_with("wide.log", &utf16le_with_bom("ab\ncd\n"));
    let harness = Harness::attached(&path, IndexConfig::default());

    assert_eq!(harness.index_all(), IndexingStatus::Successful);

    let state = snapshot(&harness.data);
    // BOM (2) + "ab" (4) + LF (2) = 8; the second line ends the file at 14.
    assert_eq!(state.offsets, vec![0, 8, 14]);
    assert_eq!(state.nb_lines, 2);
    assert!(!state.fake_final_lf);
    assert_eq!(harness.data.read().encoding_guess(), Some(TextCodec::Utf16Le));
}

#[test]
fn utf16be_lines_end_on_the_sequence_start() {
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend("ab\ncd\n".encode_utf16().flat_map(u16::to_be_bytes));

    let tmp = TempDir::new("utf16be").expect("temp dir");
    let path = tmp.file_with("wide_be.log", &bytes);
    let harness = Harness::attached(&path, IndexConfig::default());

    assert_eq!(harness.index_all(), IndexingStatus::Successful);

    let state = snapshot(&harness.data);
    assert_eq!(state.offsets, vec![0, 8, 14]);
    assert_eq!(harness.data.read().encoding_guess(), Some(TextCodec::Utf16Be));
}

#[test]
fn forced_encoding_overrides_the_probe() {
    let tmp = TempDir::new("forced").expect("temp dir");
    let path = tmp.file_with("narrow.log", b"ab\ncd\n");
    let harness = Harness::attached(&path, IndexConfig::default());

    harness.worker.index_all(Some(TextCodec::Utf16Le));
    harness.worker.wait_for_finished();

    let reader = harness.data.read();
    assert_eq!(reader.forced_encoding(), Some(TextCodec::Utf16Le));
    // The probe still ran and still thinks the content is UTF-8...
    assert_eq!(reader.encoding_guess(), Some(TextCodec::Utf8));
    // ...but parsing used the forced two-byte terminator.
    assert_eq!(reader.nb_lines(), 2);
    assert_eq!(reader.offset_of(logindex::LineNumber(1)).get(), 4);
}

#[test]
fn a_new_full_index_drops_the_forced_encoding() {
    let tmp = TempDir::new("unforce").expect("temp dir");
    let path = tmp.file_with("log.log", b"ab\ncd\n");
    let harness = Harness::attached(&path, IndexConfig::default());

    harness.worker.index_all(Some(TextCodec::Latin1));
    harness.worker.wait_for_finished();
    assert_eq!(harness.data.read().forced_encoding(), Some(TextCodec::Latin1));

    assert_eq!(harness.index_all(), IndexingStatus::Successful);
    assert_eq!(harness.data.read().forced_encoding(), None);
}

#[test]
fn bomless_utf16le_is_detected_from_content() {
    let bytes: Vec<u8> = "error line\nnext\n"
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();

    let tmp = TempDir::new("bomless").expect("temp dir");
    let path = tmp.file_with("bomless.log", &bytes);
    let harness = Harness::attached(&path, IndexConfig::default());

    assert_eq!(harness.index_all(), IndexingStatus::Successful);
    assert_eq!(harness.data.read().encoding_guess(), Some(TextCodec::Utf16Le));
    assert_eq!(harness.data.read().nb_lines(), 2);
}
