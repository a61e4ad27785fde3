//! Deterministic sentence-aware text chunking.
//!
//! Splits extracted text into overlapping character windows. Each window is
//! cut back to the nearest sentence terminator (`.`, `!`, `?`) when one sits
//! within the last 100 characters of the window, so fragments rarely break
//! mid-sentence. Identical inputs always yield identical output.

const SENTENCE_SEARCH_SPAN: usize = 100;

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Split `text` into overlapping fragments of at most `chunk_size` characters.
///
/// Text no longer than `chunk_size` comes back as a single trimmed fragment,
/// or nothing at all when it is whitespace. Consecutive fragments overlap by
/// up to `overlap` characters. Fragments that trim to empty are dropped.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut fragments = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = start + chunk_size;

        if end < chars.len() {
            // Prefer a sentence boundary near the window end over a raw cut.
            let floor = start + chunk_size.saturating_sub(SENTENCE_SEARCH_SPAN);
            for idx in ((floor + 1)..=end).rev() {
                if is_sentence_end(chars[idx]) {
                    end = idx + 1;
                    break;
                }
            }
        }

        let slice_end = end.min(chars.len());
        let fragment: String = chars[start..slice_end].iter().collect();
        let fragment = fragment.trim();
        if !fragment.is_empty() {
            fragments.push(fragment.to_string());
        }

        let next = end.saturating_sub(overlap);
        // Degenerate parameters (overlap >= window) must still make progress.
        start = if next > start { next } else { end };
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_comes_back_as_one_trimmed_fragment() {
        assert_eq!(chunk_text("  hello world  ", 1000, 200), vec!["hello world"]);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert!(chunk_text("   \n\t  ", 1000, 200).is_empty());
        assert!(chunk_text("", 1000, 200).is_empty());
    }

    #[test]
    fn long_text_fragments_respect_the_size_bound() {
        let text = "word ".repeat(500);
        let fragments = chunk_text(&text, 1000, 200);
        assert!(fragments.len() > 1);
        for fragment in &fragments {
            assert!(fragment.chars().count() <= 1000);
        }
    }

    #[test]
    fn windows_are_cut_at_a_nearby_sentence_boundary() {
        // Sentence ends 30 characters before the raw 100-character window end,
        // well within the backward search span.
        let first = format!("{}.", "a".repeat(69));
        let text = format!("{first} {}", "b".repeat(200));
        let fragments = chunk_text(&text, 100, 10);
        assert_eq!(fragments[0], first);
    }

    #[test]
    fn consecutive_fragments_overlap() {
        let text = "abcdefghij".repeat(30);
        let fragments = chunk_text(&text, 100, 20);
        assert!(fragments.len() > 1);
        for pair in fragments.windows(2) {
            let tail: String = pair[0].chars().rev().take(20).collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "The quick brown fox. Jumps over the lazy dog! Again and again? "
            .repeat(40);
        let first = chunk_text(&text, 1000, 200);
        let second = chunk_text(&text, 1000, 200);
        assert_eq!(first, second);
    }

    #[test]
    fn degenerate_overlap_still_terminates() {
        let text = "x".repeat(500);
        let fragments = chunk_text(&text, 100, 100);
        assert!(!fragments.is_empty());
        for fragment in &fragments {
            assert!(fragment.chars().count() <= 100);
        }
    }
}
