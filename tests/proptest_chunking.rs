//! Property-Based Tests - Message Chunking Invariants
//!
//! Uses `proptest` to verify that `split_into_chunks` is lossless,
//! respects the size limit, and cuts at the latest usable line break.

use proptest::prelude::*;

use crypto_briefing_bot::domain::chunking::{split_into_chunks, MIN_LINE_BREAK_OFFSET};

/// Mixed ASCII, multi-byte characters and frequent line breaks.
fn payload() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            8 => prop::char::range('a', 'z'),
            2 => Just('\n'),
            1 => Just('é'),
            1 => Just('🚀'),
        ],
        0..3000,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    /// Concatenating the segments yields the input exactly.
    #[test]
    fn chunks_concatenate_to_input(text in payload(), max in 1usize..1200) {
        let chunks = split_into_chunks(&text, max);
        prop_assert_eq!(chunks.concat(), text);
    }

    /// No segment is empty or longer than the limit.
    #[test]
    fn chunks_respect_size_limit(text in payload(), max in 1usize..1200) {
        for chunk in split_into_chunks(&text, max) {
            let len = chunk.chars().count();
            prop_assert!(len >= 1);
            prop_assert!(len <= max, "segment of {len} chars exceeds {max}");
        }
    }

    /// A segment ends at the last line break of its window, unless that
    /// break is too close to the segment start; otherwise it is a hard
    /// cut at exactly `max` characters.
    #[test]
    fn chunks_prefer_late_line_breaks(text in payload(), max in 201usize..1200) {
        let chunks = split_into_chunks(&text, max);
        let mut consumed = 0usize;

        for (i, chunk) in chunks.iter().enumerate() {
            consumed += chunk.len();
            if i + 1 == chunks.len() {
                break;
            }
            let len = chunk.chars().count();
            let rest = &text[consumed..];

            if chunk.ends_with('\n') && len > MIN_LINE_BREAK_OFFSET {
                // Nothing after the break, inside the window, is another break.
                let tail_in_window: String = rest.chars().take(max - len).collect();
                prop_assert!(!tail_in_window.contains('\n'));
            } else {
                prop_assert_eq!(len, max);
                let late_break = chunk
                    .chars()
                    .enumerate()
                    .any(|(idx, c)| c == '\n' && idx >= MIN_LINE_BREAK_OFFSET);
                prop_assert!(!late_break, "hard cut despite a usable line break");
            }
        }
    }
}
