//! Head/tail pruning of oversized text.
//!
//! The beginning of a document usually states the request and the end holds
//! the latest detail, so pruning keeps both and drops the middle:
//!
//! ```
//! use crewline::context::{PRUNE_SENTINEL, prune_context};
//!
//! let pruned = prune_context("abcdefghij", 4);
//! assert_eq!(pruned, format!("ab{PRUNE_SENTINEL}ij"));
//!
//! // Text within budget comes back untouched (and unallocated).
//! assert!(matches!(prune_context("short", 10), std::borrow::Cow::Borrowed(_)));
//! ```
//!
//! Budgets are counted in `char`s. For an odd budget the head keeps the extra
//! character, so a pruned result is always `max_chars + PRUNE_SENTINEL` chars
//! long. A zero budget reduces any non-empty text to the sentinel alone.

use std::borrow::Cow;

/// Marker inserted where the middle of the text was removed.
pub const PRUNE_SENTINEL: &str = "\n...[CONTENT PRUNED FOR COST OPTIMIZATION]...\n";

/// Default budget for task descriptions and backstories, in characters.
pub const DEFAULT_PRUNE_BUDGET: usize = 10_000;

/// Cap `text` at `max_chars` characters, keeping the head and tail.
pub fn prune_context(text: &str, max_chars: usize) -> Cow<'_, str> {
    let len = text.chars().count();
    if len <= max_chars {
        return Cow::Borrowed(text);
    }

    let tail_chars = max_chars / 2;
    let head_chars = max_chars - tail_chars;

    let head_end = byte_offset(text, head_chars);
    let tail_start = byte_offset(text, len - tail_chars);

    let mut out = String::with_capacity(head_end + PRUNE_SENTINEL.len() + text.len() - tail_start);
    out.push_str(text.get(..head_end).unwrap_or_default());
    out.push_str(PRUNE_SENTINEL);
    out.push_str(text.get(tail_start..).unwrap_or_default());
    Cow::Owned(out)
}

/// Byte offset of the `n`th char (or `text.len()` past the end).
fn byte_offset(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map_or(text.len(), |(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentinel_len() -> usize {
        PRUNE_SENTINEL.chars().count()
    }

    #[test]
    fn within_budget_is_identity() {
        for (text, max) in [("", 0), ("", 10), ("hello", 5), ("hello", 100)] {
            let out = prune_context(text, max);
            assert!(matches!(out, Cow::Borrowed(_)));
            assert_eq!(out, text);
        }
    }

    #[test]
    fn over_budget_keeps_head_and_tail() {
        let text: String = ('a'..='z').collect();
        let out = prune_context(&text, 10);
        assert!(out.starts_with("abcde"));
        assert!(out.ends_with("vwxyz"));
        assert!(out.contains(PRUNE_SENTINEL));
        assert_eq!(out.chars().count(), 10 + sentinel_len());
    }

    #[test]
    fn exact_length_for_many_budgets() {
        let text = "x".repeat(501);
        for max in 0..500 {
            let out = prune_context(&text, max);
            assert_eq!(out.chars().count(), max + sentinel_len(), "budget {max}");
        }
    }

    #[test]
    fn odd_budget_gives_head_the_extra_char() {
        let out = prune_context("0123456789", 5);
        assert_eq!(out, format!("012{PRUNE_SENTINEL}89"));
    }

    #[test]
    fn zero_budget_is_sentinel_only() {
        assert_eq!(prune_context("anything", 0), PRUNE_SENTINEL);
    }

    #[test]
    fn budget_of_one_keeps_first_char() {
        assert_eq!(prune_context("abc", 1), format!("a{PRUNE_SENTINEL}"));
    }

    #[test]
    fn splits_on_char_boundaries() {
        let text = "é".repeat(20) + &"ж".repeat(20);
        let out = prune_context(&text, 10);
        assert!(out.starts_with("ééééé"));
        assert!(out.ends_with("жжжжж"));
        assert_eq!(out.chars().count(), 10 + sentinel_len());
    }

    #[test]
    fn large_text_prunes_to_budget() {
        let text: String = (0..50_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let out = prune_context(&text, DEFAULT_PRUNE_BUDGET);
        assert_eq!(out.chars().count(), DEFAULT_PRUNE_BUDGET + sentinel_len());
        assert!(out.starts_with(text.get(..5_000).unwrap()));
        assert!(out.ends_with(text.get(45_000..).unwrap()));
    }

    #[test]
    fn pruning_is_idempotent_once_within_budget() {
        let text = "y".repeat(100);
        let once = prune_context(&text, 10).into_owned();
        let budget = once.chars().count();
        assert_eq!(prune_context(&once, budget), once);
    }
}
