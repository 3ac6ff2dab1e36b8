//! Translate a Myers edit script into buffer operations.
//!
//! The active window is assumed to end with the previous capture. A script
//! maps onto at most three operations, applied in order:
//!
//! 1. `commit`: previous lines deleted before the first kept line scrolled
//!    off the top and are committed from the head of the window.
//! 2. `splice`: every other change between the first and last kept line
//!    (plus leading inserts) is coalesced into one range replacement.
//! 3. `append`: inserts after the last kept line are appended.
//!
//! A script that keeps nothing commits the whole window and appends the new
//! capture, the same outcome as a full redraw.

use core_config::MidBufferEdits;
use core_diff::{DiffEdit, EditKind};

use crate::buffer::ArchiveBuffer;
use crate::error::BufferError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    /// Active-window index, after the plan's commit has been applied.
    pub start: usize,
    pub remove: usize,
    pub insert: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditPlan {
    pub commit: usize,
    pub splice: Option<Splice>,
    pub append: Vec<String>,
}

/// Why a script could not be expressed as an [`EditPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanRejection {
    /// The script edits the middle of the window and policy forbids splicing.
    MidBufferEdit,
    /// The edit starts at lines that are no longer in the active window.
    SpliceBeforeWindow,
}

impl PlanRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanRejection::MidBufferEdit => "mid_buffer_edit",
            PlanRejection::SpliceBeforeWindow => "splice_before_window",
        }
    }
}

/// Half-open spans `[p0, p1)` in prev and `[n0, n1)` in next.
#[derive(Debug, Clone, Copy)]
struct Span {
    p0: usize,
    p1: usize,
    n0: usize,
    n1: usize,
}

impl Span {
    fn cover(this: Option<Span>, other: Span) -> Option<Span> {
        Some(match this {
            None => other,
            Some(s) => Span {
                p0: s.p0.min(other.p0),
                p1: s.p1.max(other.p1),
                n0: s.n0.min(other.n0),
                n1: s.n1.max(other.n1),
            },
        })
    }
}

pub fn plan_myers_edits(
    edits: &[DiffEdit],
    next: &[String],
    prev_len: usize,
    active_len: usize,
    policy: MidBufferEdits,
) -> Result<EditPlan, PlanRejection> {
    let (Some(first_eq), Some(last_eq)) = (
        edits.iter().position(|e| e.kind == EditKind::Equal),
        edits.iter().rposition(|e| e.kind == EditKind::Equal),
    ) else {
        return Ok(EditPlan {
            commit: active_len,
            splice: None,
            append: next.to_vec(),
        });
    };

    let head_deleted: usize = edits[..first_eq]
        .iter()
        .filter(|e| e.kind == EditKind::Delete)
        .map(|e| e.count)
        .sum();

    let mut span: Option<Span> = None;
    let anchor = edits[first_eq];
    if anchor.next_index > 0 {
        // lines inserted above the first kept line
        span = Span::cover(
            span,
            Span {
                p0: anchor.prev_index,
                p1: anchor.prev_index,
                n0: 0,
                n1: anchor.next_index,
            },
        );
    }

    let tail = &edits[last_eq + 1..];
    let tail_appends = tail.iter().all(|e| e.kind == EditKind::Insert);
    let middle_end = if tail_appends { last_eq + 1 } else { edits.len() };
    for e in edits[first_eq..middle_end]
        .iter()
        .filter(|e| e.kind != EditKind::Equal)
    {
        span = Span::cover(
            span,
            Span {
                p0: e.prev_index,
                p1: e.prev_index + e.prev_len(),
                n0: e.next_index,
                n1: e.next_index + e.next_len(),
            },
        );
    }

    let append = match tail.first() {
        Some(first) if tail_appends => next[first.next_index..].to_vec(),
        _ => Vec::new(),
    };

    // Active index of prev line p is p + offset before the commit.
    let offset = active_len as isize - prev_len as isize;
    let commit = (head_deleted as isize + offset.min(0)).max(0) as usize;

    let splice = match span {
        None => None,
        Some(_) if policy == MidBufferEdits::Redraw => return Err(PlanRejection::MidBufferEdit),
        Some(s) => {
            let start = s.p0 as isize + offset - commit as isize;
            if start < 0 {
                return Err(PlanRejection::SpliceBeforeWindow);
            }
            Some(Splice {
                start: start as usize,
                remove: s.p1 - s.p0,
                insert: next[s.n0..s.n1].to_vec(),
            })
        }
    };

    Ok(EditPlan {
        commit,
        splice,
        append,
    })
}

impl EditPlan {
    pub fn apply<B: ArchiveBuffer + ?Sized>(&self, buffer: &mut B) -> Result<(), BufferError> {
        if self.commit > 0 {
            buffer.commit_lines(self.commit)?;
        }
        if let Some(s) = &self.splice {
            buffer.replace_lines(s.start, s.remove, &s.insert)?;
        }
        if !self.append.is_empty() {
            buffer.append_lines(&self.append)?;
        }
        Ok(())
    }
}
