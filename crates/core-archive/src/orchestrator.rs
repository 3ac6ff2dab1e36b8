//! Adaptive diff orchestrator.
//!
//! One call to [`Orchestrator::select_and_apply`] per capture. The cascade:
//!
//! - first capture: append it verbatim;
//! - identical to the previous capture: nothing to do;
//! - [`DiffStrategy::Kmp`]: the pane scrolled; commit what scrolled off the
//!   top and append the new tail;
//! - [`DiffStrategy::Myers`]: rate limited by [`BackoffState`]; apply the
//!   bounded edit script through an [`EditPlan`];
//! - [`DiffStrategy::FullRedraw`]: commit the whole active window and append
//!   the capture.
//!
//! Strategy failures only escalate. Buffer errors abort the cycle and leave
//! the previous capture in place so the next cycle diffs against it again.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use core_config::ArchiveSettings;
use core_diff::{detect_scroll_kmp, hash_lines, myers_diff, normalize};
use tracing::{debug, trace};

use crate::backoff::BackoffState;
use crate::buffer::ArchiveBuffer;
use crate::error::BufferError;
use crate::metrics::ArchiveMetrics;
use crate::plan::{EditPlan, plan_myers_edits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffStrategy {
    Kmp,
    Myers,
    FullRedraw,
}

impl DiffStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffStrategy::Kmp => "kmp",
            DiffStrategy::Myers => "myers",
            DiffStrategy::FullRedraw => "full_redraw",
        }
    }
}

impl fmt::Display for DiffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a cycle did to the buffer. Counts are lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedEdit {
    FirstCapture {
        appended: usize,
    },
    Unchanged,
    Scrolled {
        committed: usize,
        appended: usize,
    },
    Edited {
        committed: usize,
        replaced: usize,
        inserted: usize,
        appended: usize,
    },
    Redrawn {
        committed: usize,
        appended: usize,
    },
}

impl AppliedEdit {
    /// Strategy that produced this edit; `None` when no diff was needed.
    pub fn strategy(&self) -> Option<DiffStrategy> {
        match self {
            AppliedEdit::FirstCapture { .. } | AppliedEdit::Unchanged => None,
            AppliedEdit::Scrolled { .. } => Some(DiffStrategy::Kmp),
            AppliedEdit::Edited { .. } => Some(DiffStrategy::Myers),
            AppliedEdit::Redrawn { .. } => Some(DiffStrategy::FullRedraw),
        }
    }
}

#[derive(Debug)]
pub struct Orchestrator {
    settings: ArchiveSettings,
    prev_screen: Option<Vec<String>>,
    backoff: BackoffState,
    kmp_failures: u32,
    metrics: Arc<ArchiveMetrics>,
}

impl Orchestrator {
    pub fn new(settings: ArchiveSettings) -> Self {
        Self::with_metrics(settings, Arc::new(ArchiveMetrics::default()))
    }

    pub fn with_metrics(settings: ArchiveSettings, metrics: Arc<ArchiveMetrics>) -> Self {
        Self {
            settings,
            prev_screen: None,
            backoff: BackoffState::new(),
            kmp_failures: 0,
            metrics,
        }
    }

    pub fn settings(&self) -> &ArchiveSettings {
        &self.settings
    }

    /// Normalized previous capture, `None` before the first cycle.
    pub fn prev_screen(&self) -> Option<&[String]> {
        self.prev_screen.as_deref()
    }

    pub fn kmp_failures(&self) -> u32 {
        self.kmp_failures
    }

    pub fn backoff(&self) -> &BackoffState {
        &self.backoff
    }

    pub fn metrics(&self) -> &Arc<ArchiveMetrics> {
        &self.metrics
    }

    pub fn can_run_myers(&self, now: Instant) -> bool {
        self.backoff
            .allow(now, self.settings.myers_rate_limit, self.kmp_failures)
    }

    pub fn select_and_apply<B: ArchiveBuffer + ?Sized>(
        &mut self,
        buffer: &mut B,
        next: &[String],
        now: Instant,
    ) -> Result<AppliedEdit, BufferError> {
        ArchiveMetrics::incr(&self.metrics.cycles);
        let next = normalize(next);

        let Some(prev) = self.prev_screen.take() else {
            buffer.append_lines(&next)?;
            ArchiveMetrics::incr(&self.metrics.first_captures);
            ArchiveMetrics::add(&self.metrics.lines_appended, next.len());
            debug!(target: "archive.orchestrator", lines = next.len(), "first_capture");
            let appended = next.len();
            self.prev_screen = Some(next);
            return Ok(AppliedEdit::FirstCapture { appended });
        };

        if prev == next {
            self.kmp_failures = 0;
            ArchiveMetrics::incr(&self.metrics.unchanged);
            self.prev_screen = Some(prev);
            return Ok(AppliedEdit::Unchanged);
        }

        match self.cascade(buffer, &prev, &next, now) {
            Ok(applied) => {
                debug!(
                    target: "archive.orchestrator",
                    strategy = applied.strategy().map(|s| s.as_str()).unwrap_or("none"),
                    ?applied,
                    "cycle_applied"
                );
                self.prev_screen = Some(next);
                Ok(applied)
            }
            Err(e) => {
                self.prev_screen = Some(prev);
                Err(e)
            }
        }
    }

    fn cascade<B: ArchiveBuffer + ?Sized>(
        &mut self,
        buffer: &mut B,
        prev: &[String],
        next: &[String],
        now: Instant,
    ) -> Result<AppliedEdit, BufferError> {
        let scroll = detect_scroll_kmp(prev, next, self.settings.scroll_threshold);
        if scroll.scrolled {
            self.kmp_failures = 0;
            let committed = prev.len().saturating_sub(scroll.overlap);
            if committed > 0 {
                buffer.commit_lines(committed)?;
            }
            if !scroll.new_lines.is_empty() {
                buffer.append_lines(&scroll.new_lines)?;
            }
            ArchiveMetrics::incr(&self.metrics.kmp_hits);
            ArchiveMetrics::add(&self.metrics.lines_committed, committed);
            ArchiveMetrics::add(&self.metrics.lines_appended, scroll.new_lines.len());
            return Ok(AppliedEdit::Scrolled {
                committed,
                appended: scroll.new_lines.len(),
            });
        }

        self.kmp_failures = self.kmp_failures.saturating_add(1);
        ArchiveMetrics::incr(&self.metrics.kmp_misses);
        trace!(
            target: "archive.orchestrator",
            overlap = scroll.overlap,
            kmp_failures = self.kmp_failures,
            "kmp_miss"
        );

        if self.can_run_myers(now) {
            if let Some(plan) = self.run_myers(prev, next, buffer.active_len(), now) {
                plan.apply(buffer)?;
                let (replaced, inserted) = plan
                    .splice
                    .as_ref()
                    .map(|s| (s.remove, s.insert.len()))
                    .unwrap_or((0, 0));
                ArchiveMetrics::incr(&self.metrics.myers_applied);
                ArchiveMetrics::add(&self.metrics.lines_committed, plan.commit);
                ArchiveMetrics::add(&self.metrics.lines_replaced, replaced);
                ArchiveMetrics::add(&self.metrics.lines_appended, plan.append.len());
                return Ok(AppliedEdit::Edited {
                    committed: plan.commit,
                    replaced,
                    inserted,
                    appended: plan.append.len(),
                });
            }
        } else {
            ArchiveMetrics::incr(&self.metrics.myers_refused);
            trace!(
                target: "archive.orchestrator",
                failures = self.backoff.consecutive_failures,
                kmp_failures = self.kmp_failures,
                "myers_rate_limited"
            );
        }

        let committed = buffer.active_len();
        buffer.commit_lines(committed)?;
        buffer.append_lines(next)?;
        ArchiveMetrics::incr(&self.metrics.full_redraws);
        ArchiveMetrics::add(&self.metrics.lines_committed, committed);
        ArchiveMetrics::add(&self.metrics.lines_appended, next.len());
        Ok(AppliedEdit::Redrawn {
            committed,
            appended: next.len(),
        })
    }

    /// Run the bounded differ and plan its script. `None` falls through to a
    /// full redraw.
    fn run_myers(
        &mut self,
        prev: &[String],
        next: &[String],
        active_len: usize,
        now: Instant,
    ) -> Option<EditPlan> {
        let Some(edits) = myers_diff(&hash_lines(prev), &hash_lines(next)) else {
            self.backoff.record_failure();
            ArchiveMetrics::incr(&self.metrics.myers_overflows);
            debug!(
                target: "archive.orchestrator",
                failures = self.backoff.consecutive_failures,
                backoff_ms = self.backoff.backoff(self.settings.myers_rate_limit).as_millis() as u64,
                "myers_bound_exceeded"
            );
            return None;
        };
        self.backoff.record_success(now);
        match plan_myers_edits(
            &edits,
            next,
            prev.len(),
            active_len,
            self.settings.mid_buffer_edits,
        ) {
            Ok(plan) => Some(plan),
            Err(reason) => {
                ArchiveMetrics::incr(&self.metrics.myers_rejected);
                debug!(target: "archive.orchestrator", reason = reason.as_str(), "myers_plan_rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::ArchiveWindow;
    use core_config::MidBufferEdits;
    use std::time::Duration;

    fn s(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    fn settings() -> ArchiveSettings {
        ArchiveSettings {
            myers_rate_limit: Duration::from_secs(5),
            ..ArchiveSettings::default()
        }
    }

    #[test]
    fn first_capture_then_unchanged() {
        let mut o = Orchestrator::new(settings());
        let mut w = ArchiveWindow::new();
        let t0 = Instant::now();
        let applied = o.select_and_apply(&mut w, &s(&["a  ", "b"]), t0).unwrap();
        assert_eq!(applied, AppliedEdit::FirstCapture { appended: 2 });
        assert_eq!(w.active(), s(&["a", "b"]).as_slice());
        assert_eq!(o.select_and_apply(&mut w, &s(&["a", "b\t"]), t0).unwrap(), AppliedEdit::Unchanged);
        assert_eq!(o.kmp_failures(), 0);
        assert_eq!(o.metrics().snapshot().unchanged, 1);
    }

    #[test]
    fn scroll_commits_and_appends() {
        let mut o = Orchestrator::new(settings());
        let mut w = ArchiveWindow::new();
        let t0 = Instant::now();
        o.select_and_apply(&mut w, &s(&["a", "b", "c", "d", "e"]), t0).unwrap();
        let applied = o
            .select_and_apply(&mut w, &s(&["c", "d", "e", "f", "g"]), t0)
            .unwrap();
        assert_eq!(
            applied,
            AppliedEdit::Scrolled {
                committed: 2,
                appended: 2
            }
        );
        assert_eq!(w.committed(), s(&["a", "b"]).as_slice());
        assert_eq!(w.active(), s(&["c", "d", "e", "f", "g"]).as_slice());
        assert_eq!(applied.strategy(), Some(DiffStrategy::Kmp));
    }

    #[test]
    fn myers_handles_in_place_edit() {
        let mut o = Orchestrator::new(settings());
        let mut w = ArchiveWindow::new();
        let t0 = Instant::now();
        o.select_and_apply(&mut w, &s(&["$ top", "cpu 10%", "mem 2G"]), t0).unwrap();
        let applied = o
            .select_and_apply(&mut w, &s(&["$ top", "cpu 55%", "mem 2G"]), t0)
            .unwrap();
        assert_eq!(
            applied,
            AppliedEdit::Edited {
                committed: 0,
                replaced: 1,
                inserted: 1,
                appended: 0
            }
        );
        assert_eq!(w.active(), s(&["$ top", "cpu 55%", "mem 2G"]).as_slice());
        assert!(w.committed().is_empty());
        assert_eq!(o.kmp_failures(), 1);
        assert_eq!(o.backoff().last_success, Some(t0));
    }

    #[test]
    fn redraw_policy_falls_back_on_mid_buffer_edit() {
        let mut o = Orchestrator::new(ArchiveSettings {
            mid_buffer_edits: MidBufferEdits::Redraw,
            ..settings()
        });
        let mut w = ArchiveWindow::new();
        let t0 = Instant::now();
        o.select_and_apply(&mut w, &s(&["$ top", "cpu 10%", "mem 2G"]), t0).unwrap();
        let applied = o
            .select_and_apply(&mut w, &s(&["$ top", "cpu 55%", "mem 2G"]), t0)
            .unwrap();
        assert_eq!(
            applied,
            AppliedEdit::Redrawn {
                committed: 3,
                appended: 3
            }
        );
        assert_eq!(w.committed().len(), 3);
        assert_eq!(o.metrics().snapshot().myers_rejected, 1);
    }

    #[test]
    fn rate_limited_myers_redraws() {
        let mut o = Orchestrator::new(settings());
        let mut w = ArchiveWindow::new();
        let t0 = Instant::now();
        o.select_and_apply(&mut w, &s(&["a", "b"]), t0).unwrap();
        // first miss runs Myers and opens the rate-limit window
        o.select_and_apply(&mut w, &s(&["a", "x"]), t0).unwrap();
        let applied = o
            .select_and_apply(&mut w, &s(&["y", "x"]), t0 + Duration::from_secs(1))
            .unwrap();
        assert_eq!(applied.strategy(), Some(DiffStrategy::FullRedraw));
        assert_eq!(o.metrics().snapshot().myers_refused, 1);
    }

    #[test]
    fn forced_kmp_failures_run_myers_inside_rate_window() {
        let mut o = Orchestrator::new(settings());
        let mut w = ArchiveWindow::new();
        let t0 = Instant::now();
        o.select_and_apply(&mut w, &s(&["> "]), t0).unwrap();
        o.select_and_apply(&mut w, &s(&["> ", "hello"]), t0).unwrap();

        o.backoff.record_success(t0);
        o.kmp_failures = 2;
        let t1 = t0 + Duration::from_secs(1);
        assert!(!o.can_run_myers(t1));

        // this miss is the third in a row
        let applied = o
            .select_and_apply(&mut w, &s(&["total 0", "drwxr-xr-x ."]), t1)
            .unwrap();
        assert_eq!(
            applied,
            AppliedEdit::Edited {
                committed: 2,
                replaced: 0,
                inserted: 0,
                appended: 2
            }
        );
        assert_eq!(o.kmp_failures(), 3);
        assert_eq!(o.backoff().last_success, Some(t1));
        assert_eq!(w.committed(), s(&[">", "hello"]).as_slice());
    }

    #[test]
    fn buffer_error_keeps_previous_screen() {
        struct Broken(Vec<String>);
        impl ArchiveBuffer for Broken {
            fn append_lines(&mut self, lines: &[String]) -> Result<(), BufferError> {
                self.0.extend_from_slice(lines);
                Ok(())
            }
            fn commit_lines(&mut self, _count: usize) -> Result<(), BufferError> {
                Err(BufferError::Sink(std::io::Error::other("sink gone")))
            }
            fn replace_lines(&mut self, start: usize, _c: usize, _l: &[String]) -> Result<(), BufferError> {
                Err(BufferError::StartOutOfRange { start, len: 0 })
            }
            fn active(&self) -> &[String] {
                &self.0
            }
        }

        let mut o = Orchestrator::new(settings());
        let mut b = Broken(Vec::new());
        let t0 = Instant::now();
        o.select_and_apply(&mut b, &s(&["a", "b", "c"]), t0).unwrap();
        assert!(o.select_and_apply(&mut b, &s(&["b", "c", "d"]), t0).is_err());
        assert_eq!(o.prev_screen(), Some(s(&["a", "b", "c"]).as_slice()));
    }
}
