//! Archive cycle counters.
//!
//! Strategy counters record which path each cycle took; line counters record
//! how much buffer work the chosen path did. Shared behind an `Arc` so the
//! runtime can log a snapshot without borrowing the session.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ArchiveMetrics {
    /// Cycles that reached the orchestrator (capture succeeded).
    pub cycles: AtomicU64,
    pub first_captures: AtomicU64,
    /// Capture identical to the previous one; no buffer work.
    pub unchanged: AtomicU64,
    pub kmp_hits: AtomicU64,
    pub kmp_misses: AtomicU64,
    /// Myers scripts applied to the buffer.
    pub myers_applied: AtomicU64,
    /// Myers runs that exceeded the edit bound.
    pub myers_overflows: AtomicU64,
    /// Myers skipped by the rate limiter.
    pub myers_refused: AtomicU64,
    /// Myers scripts found but not expressible under the current policy.
    pub myers_rejected: AtomicU64,
    pub full_redraws: AtomicU64,
    pub lines_appended: AtomicU64,
    pub lines_committed: AtomicU64,
    pub lines_replaced: AtomicU64,
    /// Cycles abandoned on a capture or buffer error.
    pub cycle_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveMetricsSnapshot {
    pub cycles: u64,
    pub first_captures: u64,
    pub unchanged: u64,
    pub kmp_hits: u64,
    pub kmp_misses: u64,
    pub myers_applied: u64,
    pub myers_overflows: u64,
    pub myers_refused: u64,
    pub myers_rejected: u64,
    pub full_redraws: u64,
    pub lines_appended: u64,
    pub lines_committed: u64,
    pub lines_replaced: u64,
    pub cycle_errors: u64,
}

impl ArchiveMetrics {
    pub fn snapshot(&self) -> ArchiveMetricsSnapshot {
        ArchiveMetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            first_captures: self.first_captures.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            kmp_hits: self.kmp_hits.load(Ordering::Relaxed),
            kmp_misses: self.kmp_misses.load(Ordering::Relaxed),
            myers_applied: self.myers_applied.load(Ordering::Relaxed),
            myers_overflows: self.myers_overflows.load(Ordering::Relaxed),
            myers_refused: self.myers_refused.load(Ordering::Relaxed),
            myers_rejected: self.myers_rejected.load(Ordering::Relaxed),
            full_redraws: self.full_redraws.load(Ordering::Relaxed),
            lines_appended: self.lines_appended.load(Ordering::Relaxed),
            lines_committed: self.lines_committed.load(Ordering::Relaxed),
            lines_replaced: self.lines_replaced.load(Ordering::Relaxed),
            cycle_errors: self.cycle_errors.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        if n > 0 {
            counter.fetch_add(n as u64, Ordering::Relaxed);
        }
    }
}
