//! Message chunking for size-limited chat transports.
//!
//! Splits a payload into ordered segments of at most `max_chars`
//! characters whose concatenation is exactly the input. A segment
//! ends just after the last line break inside the candidate window,
//! unless that break sits fewer than [`MIN_LINE_BREAK_OFFSET`]
//! characters into the window, in which case the window is cut at
//! `max_chars`.
//!
//! Lengths are counted in `char`s, so a cut never lands inside a
//! UTF-8 sequence.

/// Default segment size, safely under Telegram's 4096 limit.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 3900;

/// A line break closer than this to the segment start is ignored.
pub const MIN_LINE_BREAK_OFFSET: usize = 200;

/// Split `text` into transport-safe segments.
///
/// Returns an empty vector for empty input. `max_chars` of zero is
/// treated as one.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        // Byte offset of the char at index `max_chars`, if the rest is longer.
        let Some((hard_cut, _)) = rest.char_indices().nth(max_chars) else {
            chunks.push(rest);
            break;
        };

        let window = &rest[..hard_cut];
        let cut = match window.rfind('\n') {
            Some(newline) if window[..newline].chars().count() >= MIN_LINE_BREAK_OFFSET => {
                newline + 1
            }
            _ => hard_cut,
        };

        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }

    chunks
}
