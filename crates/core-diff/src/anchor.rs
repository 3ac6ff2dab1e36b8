//! Region classifier built on a full LCS of the two captures.
//!
//! Standalone companion to the Myers differ: it always produces a complete
//! partition of both sequences (no distance bound), at O(N·M) cost. Useful
//! for inspecting full redraws that the bounded differ gives up on.

use std::fmt;

use ahash::AHashMap;

use crate::hash::{BLANK_HASH, hash_lines, hashes_match};

/// Substrings that mark a line as structurally stable (prompts, fences,
/// headings, comments, definitions).
const ANCHOR_TOKENS: &[&str] = &[
    "> ", "$ ", ">>> ", "```", "---", "===", "###", "//", "/*", "func ", "def ", "class ",
    "import ",
];

/// Trimmed length above which a line is considered unique enough to anchor.
const LONG_LINE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffType {
    Unchanged,
    Inserted,
    Deleted,
    Modified,
}

impl DiffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffType::Unchanged => "unchanged",
            DiffType::Inserted => "inserted",
            DiffType::Deleted => "deleted",
            DiffType::Modified => "modified",
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open ranges `[prev_start, prev_end)` and `[next_start, next_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffRegion {
    pub kind: DiffType,
    pub prev_start: usize,
    pub prev_end: usize,
    pub next_start: usize,
    pub next_end: usize,
}

impl DiffRegion {
    fn gap(prev_start: usize, prev_end: usize, next_start: usize, next_end: usize) -> Self {
        let kind = match (prev_end > prev_start, next_end > next_start) {
            (false, _) => DiffType::Inserted,
            (true, false) => DiffType::Deleted,
            (true, true) => DiffType::Modified,
        };
        Self {
            kind,
            prev_start,
            prev_end,
            next_start,
            next_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorPair {
    pub prev_index: usize,
    pub next_index: usize,
    pub hash: u64,
}

pub fn is_anchor_candidate(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.len() > LONG_LINE {
        return true;
    }
    if ANCHOR_TOKENS.iter().any(|t| trimmed.contains(t)) {
        return true;
    }
    // path-like
    trimmed.contains('/') && !trimmed.starts_with("http")
}

/// Greedy pairing of identical anchor-candidate lines.
///
/// Each `prev` line takes the first matching `next` line after the previous
/// anchor, so pairs are strictly increasing on both sides.
pub fn find_anchors<S: AsRef<str>, T: AsRef<str>>(prev: &[S], next: &[T]) -> Vec<AnchorPair> {
    let prev_hashes = hash_lines(prev);
    let next_hashes = hash_lines(next);

    let mut positions: AHashMap<u64, Vec<usize>> = AHashMap::new();
    for (j, &h) in next_hashes.iter().enumerate() {
        if h != BLANK_HASH {
            positions.entry(h).or_default().push(j);
        }
    }

    let mut anchors = Vec::new();
    let mut floor = 0usize;
    for (i, &h) in prev_hashes.iter().enumerate() {
        if h == BLANK_HASH || !is_anchor_candidate(prev[i].as_ref()) {
            continue;
        }
        let Some(indices) = positions.get(&h) else {
            continue;
        };
        if let Some(&j) = indices.iter().find(|&&j| j >= floor) {
            anchors.push(AnchorPair {
                prev_index: i,
                next_index: j,
                hash: h,
            });
            floor = j + 1;
        }
    }
    anchors
}

/// Matched `(prev, next)` index pairs of a longest common subsequence.
fn lcs_pairs(prev: &[u64], next: &[u64]) -> Vec<(usize, usize)> {
    let (n, m) = (prev.len(), next.len());
    if n == 0 || m == 0 {
        return Vec::new();
    }
    // suffix table: dp[i][j] = LCS length of prev[i..] and next[j..]
    let width = m + 1;
    let mut dp = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i * width + j] = if hashes_match(prev[i], next[j]) {
                dp[(i + 1) * width + j + 1] + 1
            } else {
                dp[(i + 1) * width + j].max(dp[i * width + j + 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(dp[0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if hashes_match(prev[i], next[j]) {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if dp[(i + 1) * width + j] >= dp[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

/// Indices into `prev` of a longest common subsequence of the two hash
/// sequences.
pub fn compute_lcs(prev: &[u64], next: &[u64]) -> Vec<usize> {
    lcs_pairs(prev, next).into_iter().map(|(i, _)| i).collect()
}

/// Partition both captures into unchanged, inserted, deleted and modified
/// regions.
pub fn diff_with_anchors<S: AsRef<str>, T: AsRef<str>>(prev: &[S], next: &[T]) -> Vec<DiffRegion> {
    let prev_hashes = hash_lines(prev);
    let next_hashes = hash_lines(next);

    let mut regions = Vec::new();
    let (mut pi, mut ni) = (0usize, 0usize);
    for (p, q) in lcs_pairs(&prev_hashes, &next_hashes) {
        if p > pi || q > ni {
            regions.push(DiffRegion::gap(pi, p, ni, q));
        }
        regions.push(DiffRegion {
            kind: DiffType::Unchanged,
            prev_start: p,
            prev_end: p + 1,
            next_start: q,
            next_end: q + 1,
        });
        pi = p + 1;
        ni = q + 1;
    }
    if pi < prev.len() || ni < next.len() {
        regions.push(DiffRegion::gap(pi, prev.len(), ni, next.len()));
    }
    merge_adjacent_regions(regions)
}

fn merge_adjacent_regions(regions: Vec<DiffRegion>) -> Vec<DiffRegion> {
    let mut merged: Vec<DiffRegion> = Vec::with_capacity(regions.len());
    for r in regions {
        if let Some(last) = merged.last_mut()
            && last.kind == r.kind
            && last.prev_end == r.prev_start
            && last.next_end == r.next_start
        {
            last.prev_end = r.prev_end;
            last.next_end = r.next_end;
            continue;
        }
        merged.push(r);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn region(kind: DiffType, p: (usize, usize), n: (usize, usize)) -> DiffRegion {
        DiffRegion {
            kind,
            prev_start: p.0,
            prev_end: p.1,
            next_start: n.0,
            next_end: n.1,
        }
    }

    #[test]
    fn degenerate_partitions() {
        assert!(diff_with_anchors::<&str, &str>(&[], &[]).is_empty());
        assert_eq!(
            diff_with_anchors::<&str, &str>(&[], &["a", "b"]),
            vec![region(DiffType::Inserted, (0, 0), (0, 2))]
        );
        assert_eq!(
            diff_with_anchors::<&str, &str>(&["a"], &[]),
            vec![region(DiffType::Deleted, (0, 1), (0, 0))]
        );
    }

    #[test]
    fn unchanged_runs_merge() {
        let s = ["a", "b", "c"];
        assert_eq!(
            diff_with_anchors(&s, &s),
            vec![region(DiffType::Unchanged, (0, 3), (0, 3))]
        );
    }

    #[test]
    fn gap_classification() {
        let prev = ["$ make", "compiling foo", "compiling bar", "done", "old tail"];
        let next = ["$ make", "linking", "done", "$ "];
        assert_eq!(
            diff_with_anchors(&prev, &next),
            vec![
                region(DiffType::Unchanged, (0, 1), (0, 1)),
                region(DiffType::Modified, (1, 3), (1, 2)),
                region(DiffType::Unchanged, (3, 4), (2, 3)),
                region(DiffType::Modified, (4, 5), (3, 4)),
            ]
        );
    }

    #[test]
    fn lcs_skips_blank_lines() {
        let prev = hash_lines(&["a", "", "b", "c"]);
        let next = hash_lines(&["a", "", "c"]);
        assert_eq!(compute_lcs(&prev, &next), vec![0, 3]);
        assert!(compute_lcs(&[], &next).is_empty());
    }

    #[test]
    fn anchor_candidates() {
        assert!(is_anchor_candidate("user@host:~$ cargo build"));
        assert!(is_anchor_candidate("  def main():"));
        assert!(is_anchor_candidate("src/lib.rs"));
        assert!(is_anchor_candidate(&"x".repeat(41)));
        assert!(!is_anchor_candidate(&"x".repeat(40)));
        assert!(!is_anchor_candidate("http/1.1 200"));
        assert!(!is_anchor_candidate("ok"));
    }

    #[test]
    fn anchors_are_ordered_and_unique() {
        let prev = ["$ ls", "plain", "src/main.rs", "$ ls", "readme"];
        let next = ["$ ls", "src/main.rs", "plain", "other"];
        let anchors = find_anchors(&prev, &next);
        let idx: Vec<(usize, usize)> = anchors
            .iter()
            .map(|a| (a.prev_index, a.next_index))
            .collect();
        // "plain" is not a candidate; the second "$ ls" has no later partner.
        assert_eq!(idx, vec![(0, 0), (2, 1)]);
        assert_eq!(anchors[0].hash, crate::hash::hash_line("$ ls"));
    }

    #[test]
    fn diff_type_display() {
        assert_eq!(DiffType::Modified.to_string(), "modified");
        assert_eq!(format!("{}", DiffType::Unchanged), "unchanged");
    }
}
