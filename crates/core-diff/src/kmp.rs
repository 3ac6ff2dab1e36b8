//! Scroll overlap detection.
//!
//! A terminal that scrolls shows the tail of the previous capture at the head
//! of the next one. The overlap is the longest suffix of `prev` equal to a
//! prefix of `next`, found in O(n + m) with the KMP prefix function over
//! `next ++ [SENTINEL] ++ prev`.

use crate::hash::{BLANK_HASH, hash_lines, hashes_match};

/// Separator between the two halves of the KMP text. Shares the blank
/// sentinel value and therefore never matches.
const SENTINEL: u64 = BLANK_HASH;

/// Outcome of [`detect_scroll_kmp`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScrollDetection {
    pub scrolled: bool,
    /// Number of leading lines of `next` that repeat the tail of `prev`.
    pub overlap: usize,
    /// Lines of `next` past the overlap. Empty when no scroll was confirmed,
    /// except for an empty `prev` where every line of `next` is new.
    pub new_lines: Vec<String>,
}

/// Overlap length over pre-hashed lines.
pub fn overlap_from_hashes(prev: &[u64], next: &[u64]) -> usize {
    if prev.is_empty() || next.is_empty() {
        return 0;
    }
    let mut text = Vec::with_capacity(next.len() + 1 + prev.len());
    text.extend_from_slice(next);
    text.push(SENTINEL);
    text.extend_from_slice(prev);

    let mut pi = vec![0usize; text.len()];
    for i in 1..text.len() {
        let mut k = pi[i - 1];
        while k > 0 && !hashes_match(text[i], text[k]) {
            k = pi[k - 1];
        }
        if hashes_match(text[i], text[k]) {
            k += 1;
        }
        pi[i] = k;
    }
    let last = pi.last().copied().unwrap_or(0);
    last.min(next.len()).min(prev.len())
}

/// Longest suffix of `prev` equal to a prefix of `next`, with a match score
/// of `1.0` when any overlap exists.
pub fn find_overlap_kmp<S: AsRef<str>, T: AsRef<str>>(prev: &[S], next: &[T]) -> (usize, f64) {
    let k = overlap_from_hashes(&hash_lines(prev), &hash_lines(next));
    (k, if k > 0 { 1.0 } else { 0.0 })
}

/// Quadratic suffix/prefix comparison. Same contract as [`find_overlap_kmp`].
pub fn find_overlap_naive<S: AsRef<str>, T: AsRef<str>>(prev: &[S], next: &[T]) -> (usize, f64) {
    let ph = hash_lines(prev);
    let nh = hash_lines(next);
    let max = ph.len().min(nh.len());
    for k in (1..=max).rev() {
        let tail = &ph[ph.len() - k..];
        if tail.iter().zip(&nh[..k]).all(|(a, b)| hashes_match(*a, *b)) {
            return (k, 1.0);
        }
    }
    (0, 0.0)
}

/// Decide whether `next` is `prev` scrolled upward.
///
/// Requires an overlap of at least `max(1, floor(len(prev) * threshold))`
/// lines.
pub fn detect_scroll_kmp<S: AsRef<str>, T: AsRef<str>>(
    prev: &[S],
    next: &[T],
    threshold: f64,
) -> ScrollDetection {
    if prev.is_empty() {
        return ScrollDetection {
            scrolled: false,
            overlap: 0,
            new_lines: next.iter().map(|l| l.as_ref().to_string()).collect(),
        };
    }
    if next.is_empty() {
        return ScrollDetection::default();
    }
    let (k, _) = find_overlap_kmp(prev, next);
    let min_overlap = ((prev.len() as f64 * threshold).floor() as usize).max(1);
    if k < min_overlap {
        return ScrollDetection {
            scrolled: false,
            overlap: k,
            new_lines: Vec::new(),
        };
    }
    ScrollDetection {
        scrolled: true,
        overlap: k,
        new_lines: next[k..].iter().map(|l| l.as_ref().to_string()).collect(),
    }
}
