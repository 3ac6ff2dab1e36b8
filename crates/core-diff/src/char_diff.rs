//! Prefix/suffix differ for a single line.
//!
//! Finds the changed interior of an edited line (progress counters, spinners,
//! timestamps). [`char_diff`] works on bytes and is meant for ASCII status
//! text; boundaries are backed off to `char` boundaries so the middles are
//! always valid UTF-8. [`char_diff_graphemes`] walks extended grapheme
//! clusters instead, so a combining mark or ZWJ sequence is never split.

use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

/// `old == old[..prefix_len] + old_middle + old[old.len() - suffix_len..]`,
/// and the same decomposition holds for `new`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharDiffResult {
    pub prefix_len: usize,
    pub old_middle: String,
    pub new_middle: String,
    pub suffix_len: usize,
}

impl CharDiffResult {
    pub fn has_changes(&self) -> bool {
        !self.old_middle.is_empty() || !self.new_middle.is_empty()
    }

    /// Byte range of the replaced interior within `old`.
    pub fn changed_range(&self) -> Range<usize> {
        self.prefix_len..self.prefix_len + self.old_middle.len()
    }
}

pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

pub fn common_suffix_len(a: &str, b: &str) -> usize {
    a.bytes()
        .rev()
        .zip(b.bytes().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

pub fn char_diff(old: &str, new: &str) -> CharDiffResult {
    let mut prefix = common_prefix_len(old, new);
    while !(old.is_char_boundary(prefix) && new.is_char_boundary(prefix)) {
        prefix -= 1;
    }
    let (old_rest, new_rest) = (&old[prefix..], &new[prefix..]);
    let mut suffix = common_suffix_len(old_rest, new_rest);
    while !(old_rest.is_char_boundary(old_rest.len() - suffix)
        && new_rest.is_char_boundary(new_rest.len() - suffix))
    {
        suffix -= 1;
    }
    build(old, new, prefix, suffix)
}

/// Same decomposition as [`char_diff`] with both boundaries on grapheme
/// cluster edges.
pub fn char_diff_graphemes(old: &str, new: &str) -> CharDiffResult {
    let mut prefix = 0usize;
    for (g_old, g_new) in old.graphemes(true).zip(new.graphemes(true)) {
        if g_old != g_new {
            break;
        }
        prefix += g_old.len();
    }
    let (old_rest, new_rest) = (&old[prefix..], &new[prefix..]);
    let mut suffix = 0usize;
    for (g_old, g_new) in old_rest
        .graphemes(true)
        .rev()
        .zip(new_rest.graphemes(true).rev())
    {
        if g_old != g_new {
            break;
        }
        suffix += g_old.len();
    }
    build(old, new, prefix, suffix)
}

fn build(old: &str, new: &str, prefix: usize, suffix: usize) -> CharDiffResult {
    CharDiffResult {
        prefix_len: prefix,
        old_middle: old[prefix..old.len() - suffix].to_string(),
        new_middle: new[prefix..new.len() - suffix].to_string(),
        suffix_len: suffix,
    }
}
