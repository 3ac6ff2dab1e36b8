//! Bounded Myers shortest edit script over hashed lines.
//!
//! Runs the classic O((N+M)·D) greedy search, keeping a copy of the V array
//! per depth so the path can be walked back afterwards. The search gives up
//! after [`MAX_DIFF_THRESHOLD`] edits and returns `None`; callers treat that
//! as "fall back to a cheaper strategy", not as an error.

use std::fmt;

use crate::hash::hashes_match;

/// Largest edit distance searched before giving up.
pub const MAX_DIFF_THRESHOLD: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    Equal,
    Insert,
    Delete,
}

impl EditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditKind::Equal => "equal",
            EditKind::Insert => "insert",
            EditKind::Delete => "delete",
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of the edit script.
///
/// `prev_index` and `next_index` are cursor positions in both sequences: an
/// `Insert` reports where in `prev` its lines go, a `Delete` reports the
/// position in `next` its removed lines would have occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffEdit {
    pub kind: EditKind,
    pub prev_index: usize,
    pub next_index: usize,
    pub count: usize,
}

impl DiffEdit {
    pub fn new(kind: EditKind, prev_index: usize, next_index: usize, count: usize) -> Self {
        Self {
            kind,
            prev_index,
            next_index,
            count,
        }
    }

    /// Lines of `prev` consumed by this run.
    pub fn prev_len(&self) -> usize {
        match self.kind {
            EditKind::Insert => 0,
            _ => self.count,
        }
    }

    /// Lines of `next` produced by this run.
    pub fn next_len(&self) -> usize {
        match self.kind {
            EditKind::Delete => 0,
            _ => self.count,
        }
    }
}

pub fn myers_diff(prev: &[u64], next: &[u64]) -> Option<Vec<DiffEdit>> {
    myers_diff_with_limit(prev, next, MAX_DIFF_THRESHOLD)
}

/// Shortest edit script from `prev` to `next`, or `None` when it needs more
/// than `limit` inserts and deletes.
pub fn myers_diff_with_limit(prev: &[u64], next: &[u64], limit: usize) -> Option<Vec<DiffEdit>> {
    let (n, m) = (prev.len(), next.len());
    match (n, m) {
        (0, 0) => return Some(Vec::new()),
        (0, _) if m <= limit => return Some(vec![DiffEdit::new(EditKind::Insert, 0, 0, m)]),
        (_, 0) if n <= limit => return Some(vec![DiffEdit::new(EditKind::Delete, 0, 0, n)]),
        (0, _) | (_, 0) => return None,
        _ => {}
    }

    let max_d = (n + m).min(limit) as isize;
    let offset = max_d + 1;
    let (n_i, m_i) = (n as isize, m as isize);
    let mut v = vec![0isize; (2 * max_d + 3) as usize];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    for d in 0..=max_d {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n_i && y < m_i && hashes_match(prev[x as usize], next[y as usize]) {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n_i && y >= m_i {
                return Some(backtrack(&trace, n, m, offset));
            }
            k += 2;
        }
    }
    tracing::trace!(target: "diff.myers", prev_len = n, next_len = m, limit, "myers_bound_exceeded");
    None
}

#[derive(Clone, Copy)]
struct Step {
    kind: EditKind,
    prev: usize,
    next: usize,
}

fn backtrack(trace: &[Vec<isize>], n: usize, m: usize, offset: isize) -> Vec<DiffEdit> {
    let mut steps: Vec<Step> = Vec::with_capacity(n.max(m));
    let (mut x, mut y) = (n as isize, m as isize);
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let idx = (k + offset) as usize;
        let prev_k = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;
        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            steps.push(Step {
                kind: EditKind::Equal,
                prev: x as usize,
                next: y as usize,
            });
        }
        if d > 0 {
            if x == prev_x {
                steps.push(Step {
                    kind: EditKind::Insert,
                    prev: x as usize,
                    next: (y - 1) as usize,
                });
            } else {
                steps.push(Step {
                    kind: EditKind::Delete,
                    prev: (x - 1) as usize,
                    next: y as usize,
                });
            }
        }
        x = prev_x;
        y = prev_y;
    }
    steps.reverse();
    merge_steps(&steps)
}

fn merge_steps(steps: &[Step]) -> Vec<DiffEdit> {
    let mut out: Vec<DiffEdit> = Vec::new();
    for s in steps {
        if let Some(last) = out.last_mut()
            && last.kind == s.kind
        {
            let contiguous = match s.kind {
                EditKind::Equal => {
                    last.prev_index + last.count == s.prev && last.next_index + last.count == s.next
                }
                EditKind::Insert => last.prev_index == s.prev && last.next_index + last.count == s.next,
                EditKind::Delete => last.prev_index + last.count == s.prev && last.next_index == s.next,
            };
            if contiguous {
                last.count += 1;
                continue;
            }
        }
        out.push(DiffEdit::new(s.kind, s.prev, s.next, 1));
    }
    out
}

/// Indices into `prev` of every line kept by the edit script.
pub fn myers_lcs(prev: &[u64], next: &[u64]) -> Option<Vec<usize>> {
    let edits = myers_diff(prev, next)?;
    Some(
        edits
            .iter()
            .filter(|e| e.kind == EditKind::Equal)
            .flat_map(|e| e.prev_index..e.prev_index + e.count)
            .collect(),
    )
}

/// Replay an edit script, taking kept lines from `prev` and inserted lines
/// from `next`.
pub fn apply_edits<T: Clone>(prev: &[T], next: &[T], edits: &[DiffEdit]) -> Vec<T> {
    let mut out = Vec::with_capacity(next.len());
    for e in edits {
        match e.kind {
            EditKind::Equal => out.extend_from_slice(&prev[e.prev_index..e.prev_index + e.count]),
            EditKind::Insert => out.extend_from_slice(&next[e.next_index..e.next_index + e.count]),
            EditKind::Delete => {}
        }
    }
    out
}
