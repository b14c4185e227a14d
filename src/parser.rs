//! Block parser: line terminator location and tab-expanded length accounting.
//!
//! The parser walks one block at a time, carrying its cursor state across
//! blocks, so a line split over any number of blocks is still measured and
//! terminated correctly. It searches for the raw `0x0A` byte; for big-endian
//! wide codecs the match lands on the *last* byte of the LF sequence and the
//! boundary is pulled back by `before_cr_offset` to the sequence start.
//!
//! Tab expansion tracks the extra display columns a terminal would insert:
//! each tab contributes one column for itself plus enough to reach the next
//! tab stop. The extra columns accumulate in `additional_spaces` and reset
//! at each terminator; the column base is the byte distance from the line
//! start, matching what the viewer renders for single-byte text.

use memchr::memchr;

use crate::encoding::{EncodingParameters, TextCodec};
use crate::line_positions::FastLinePositionArray;
use crate::{LineOffset, TAB_STOP};

/// Per-operation cursor state threaded through consecutive block parses.
///
/// `pos` is the absolute offset of the next byte to scan — the start of the
/// line currently being assembled. `end` is the last terminator found.
#[derive(Clone, Debug, Default)]
pub struct ParserState {
    pub pos: u64,
    pub end: u64,
    pub file_size: u64,
    pub max_length: u32,
    pub additional_spaces: u64,
    pub encoding_params: EncodingParameters,
    pub encoding_guess: Option<TextCodec>,
    pub file_codec: Option<TextCodec>,
}

impl ParserState {
    /// Fresh state for a pass starting at `initial_position`.
    pub fn new(initial_position: u64, file_size: u64) -> Self {
        Self {
            pos: initial_position,
            file_size,
            encoding_params: EncodingParameters::for_codec(TextCodec::platform_default()),
            ..Self::default()
        }
    }
}

/// Parses one block, returning the end offsets of every line terminated in
/// it.
///
/// `state.max_length` is reset on entry and holds the longest line seen in
/// *this* block; the caller merges it into the running maximum. Blocks must
/// arrive in file order.
pub fn parse_block(
    block_beginning: u64,
    block: &[u8],
    state: &mut ParserState,
) -> FastLinePositionArray {
    state.max_length = 0;
    let mut line_positions = FastLinePositionArray::new();

    loop {
        // A multi-byte terminator can push `pos` past the block start, or an
        // LF sequence split across blocks can leave it just before.
        let start = state.pos.saturating_sub(block_beginning) as usize;
        if start >= block.len() {
            break;
        }

        match memchr(b'\n', &block[start..]) {
            Some(found) => {
                let lf_index = start + found;
                expand_tabs(state, block, block_beginning, start, lf_index);

                state.end = (block_beginning + lf_index as u64)
                    .saturating_sub(state.encoding_params.before_cr_offset);

                let length = state
                    .end
                    .saturating_sub(state.pos)
                    .saturating_add(state.additional_spaces);
                let length = u32::try_from(length).unwrap_or(u32::MAX);
                state.max_length = state.max_length.max(length);

                state.pos = state.end + state.encoding_params.line_feed_width;
                state.additional_spaces = 0;
                line_positions.append(LineOffset(state.pos));
            }
            None => {
                expand_tabs(state, block, block_beginning, start, block.len());
                break;
            }
        }
    }

    line_positions
}

/// Accumulates tab-expansion columns over `block[from..to]`.
fn expand_tabs(
    state: &mut ParserState,
    block: &[u8],
    block_beginning: u64,
    from: usize,
    to: usize,
) {
    let tab_width = u64::from(TAB_STOP);
    let mut search = from;
    while search < to {
        let Some(found) = memchr(b'\t', &block[search..to]) else {
            break;
        };
        let tab_index = search + found;
        let tab_abs = (block_beginning + tab_index as u64)
            .saturating_sub(state.encoding_params.before_cr_offset);
        let column = tab_abs.saturating_sub(state.pos);

        state.additional_spaces +=
            tab_width - ((column + state.additional_spaces) % tab_width) - 1;

        search = tab_index + 1;
    }
}
