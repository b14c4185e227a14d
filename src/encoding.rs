//! Encoding probe and per-codec line terminator parameters.
//!
//! The indexer never decodes text; it only needs to know how wide a `\n` is
//! in the file's codec and where the line boundary falls within a multi-byte
//! LF sequence. Detection is a pure function over a leading byte window: BOM
//! sniff first, then a statistical heuristic, then the platform default.
//!
//! The byte-level search in the parser always looks for the raw `0x0A` byte.
//! In UTF-16BE/UTF-32BE that byte is the *last* of the LF sequence, so the
//! reported line boundary must be pulled back to the sequence start; that
//! correction is [`EncodingParameters::before_cr_offset`].

/// Codecs the probe can report.
///
/// The set is closed: the indexer only cares about the line-feed layout, and
/// every byte-oriented codec the viewer renders (all the 8-bit codepages)
/// shares the `Latin1` parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextCodec {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Latin1,
}

impl TextCodec {
    /// Canonical name, for logs and the viewer's encoding menu.
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf32Le => "UTF-32LE",
            Self::Utf32Be => "UTF-32BE",
            Self::Latin1 => "ISO-8859-1",
        }
    }

    /// Codec assumed when the probe has nothing to go on (empty file).
    pub fn platform_default() -> Self {
        Self::Utf8
    }
}

/// Line terminator layout for a codec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodingParameters {
    /// Bytes occupied by one `\n` in this codec.
    pub line_feed_width: u64,
    /// Byte offset from the start of an LF sequence to its `0x0A` byte.
    ///
    /// Zero for single-byte and little-endian codecs; width − 1 for
    /// big-endian codecs, where the `0x0A` comes last.
    pub before_cr_offset: u64,
}

impl EncodingParameters {
    pub fn for_codec(codec: TextCodec) -> Self {
        match codec {
            TextCodec::Utf8 | TextCodec::Latin1 => Self {
                line_feed_width: 1,
                before_cr_offset: 0,
            },
            TextCodec::Utf16Le => Self {
                line_feed_width: 2,
                before_cr_offset: 0,
            },
            TextCodec::Utf16Be => Self {
                line_feed_width: 2,
                before_cr_offset: 1,
            },
            TextCodec::Utf32Le => Self {
                line_feed_width: 4,
                before_cr_offset: 0,
            },
            TextCodec::Utf32Be => Self {
                line_feed_width: 4,
                before_cr_offset: 3,
            },
        }
    }
}

/// Fraction of sampled 16-bit units that must carry a NUL in the same half
/// before the heuristic commits to UTF-16.
const UTF16_NUL_RATIO_NUM: usize = 3;
const UTF16_NUL_RATIO_DEN: usize = 10;

/// Guesses the codec from a leading byte window.
///
/// BOMs win outright. Without one, the heuristic accepts UTF-8 when the
/// window validates (allowing a multi-byte sequence cut off at the window
/// edge), detects UTF-16 from the NUL distribution typical of ASCII-heavy
/// text, and otherwise falls back to Latin-1. An empty window yields the
/// platform default.
pub fn detect_encoding(prefix: &[u8]) -> TextCodec {
    if prefix.is_empty() {
        return TextCodec::platform_default();
    }

    // UTF-32 BOMs first: the UTF-32LE BOM starts with the UTF-16LE one.
    if prefix.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        return TextCodec::Utf32Le;
    }
    if prefix.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        return TextCodec::Utf32Be;
    }
    if prefix.starts_with(&[0xFF, 0xFE]) {
        return TextCodec::Utf16Le;
    }
    if prefix.starts_with(&[0xFE, 0xFF]) {
        return TextCodec::Utf16Be;
    }
    if prefix.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return TextCodec::Utf8;
    }

    if is_plausible_utf8(prefix) {
        return TextCodec::Utf8;
    }

    // ASCII-heavy UTF-16 shows NULs concentrated in one half of each unit.
    let mut high_nuls = 0usize;
    let mut low_nuls = 0usize;
    let units = prefix.len() / 2;
    for pair in prefix.chunks_exact(2) {
        if pair[0] == 0 {
            high_nuls += 1;
        }
        if pair[1] == 0 {
            low_nuls += 1;
        }
    }
    if units > 0 {
        let threshold = units * UTF16_NUL_RATIO_NUM / UTF16_NUL_RATIO_DEN;
        if low_nuls > threshold && low_nuls > high_nuls {
            return TextCodec::Utf16Le;
        }
        if high_nuls > threshold && high_nuls > low_nuls {
            return TextCodec::Utf16Be;
        }
    }

    TextCodec::Latin1
}

/// UTF-8 validation that tolerates a multi-byte sequence truncated by the
/// probe window.
///
/// NUL bytes are valid UTF-8 but never appear in text logs; their presence
/// means the window is either binary or a wide encoding, so the UTF-16
/// heuristic must get a look at it.
fn is_plausible_utf8(window: &[u8]) -> bool {
    if memchr::memchr(0, window).is_some() {
        return false;
    }
    match std::str::from_utf8(window) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none() && window.len() - err.valid_up_to() < 4,
    }
}
