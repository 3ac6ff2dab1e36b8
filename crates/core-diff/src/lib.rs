//! Line-sequence diffing for terminal pane captures.
//!
//! Pure, synchronous building blocks: normalization and hashing
//! ([`hash`]), scroll overlap detection ([`kmp`]), a bounded shortest edit
//! script ([`myers`]), an unbounded LCS region classifier ([`anchor`]) and a
//! single-line prefix/suffix differ ([`char_diff`]). All of them compare
//! lines through their normalized hash, and the blank-line hash never
//! matches.

pub mod anchor;
pub mod char_diff;
pub mod hash;
pub mod kmp;
pub mod myers;

pub use anchor::{
    AnchorPair, DiffRegion, DiffType, compute_lcs, diff_with_anchors, find_anchors,
    is_anchor_candidate,
};
pub use char_diff::{CharDiffResult, char_diff, char_diff_graphemes};
pub use hash::{BLANK_HASH, find_changed_lines, hash_line, hash_lines, hashes_match, normalize};
pub use kmp::{ScrollDetection, detect_scroll_kmp, find_overlap_kmp};
pub use myers::{
    DiffEdit, EditKind, MAX_DIFF_THRESHOLD, apply_edits, myers_diff, myers_diff_with_limit,
    myers_lcs,
};
