//! One archived pane: capture source, buffer, and orchestrator wired together.

use std::sync::Arc;
use std::time::Instant;

use core_config::ArchiveSettings;
use tracing::{info, warn};

use crate::buffer::ArchiveBuffer;
use crate::capture::CaptureSource;
use crate::error::{ArchiveError, BufferError, Result};
use crate::metrics::ArchiveMetrics;
use crate::orchestrator::{AppliedEdit, Orchestrator};

pub struct ArchiveSession<C: CaptureSource, B: ArchiveBuffer> {
    pane: String,
    width: u16,
    height: u16,
    capture: C,
    buffer: B,
    orchestrator: Orchestrator,
}

impl<C: CaptureSource, B: ArchiveBuffer> ArchiveSession<C, B> {
    pub fn new(pane: impl Into<String>, settings: ArchiveSettings, capture: C, buffer: B) -> Self {
        Self {
            pane: pane.into(),
            width: settings.width,
            height: settings.height,
            capture,
            buffer,
            orchestrator: Orchestrator::new(settings),
        }
    }

    pub fn pane(&self) -> &str {
        &self.pane
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn capture_source(&self) -> &C {
        &self.capture
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn metrics(&self) -> Arc<ArchiveMetrics> {
        self.orchestrator.metrics().clone()
    }

    /// Capture once and fold the snapshot into the buffer.
    pub fn try_tick(&mut self, now: Instant) -> Result<AppliedEdit> {
        let lines = self.capture.capture(&self.pane, self.width, self.height)?;
        let applied = self
            .orchestrator
            .select_and_apply(&mut self.buffer, &lines, now)?;
        Ok(applied)
    }

    /// Best-effort [`Self::try_tick`]: errors are logged and counted, and the
    /// next tick starts from the last successful capture.
    pub fn tick(&mut self, now: Instant) -> Option<AppliedEdit> {
        match self.try_tick(now) {
            Ok(applied) => Some(applied),
            Err(e) => {
                ArchiveMetrics::incr(&self.orchestrator.metrics().cycle_errors);
                match &e {
                    ArchiveError::Capture(_) => {
                        warn!(target: "archive.session", pane = %self.pane, error = %e, "capture_failed")
                    }
                    ArchiveError::Buffer(_) => {
                        warn!(target: "archive.session", pane = %self.pane, error = %e, "apply_failed")
                    }
                }
                None
            }
        }
    }

    /// Commit everything still active. Called once on shutdown.
    pub fn flush(&mut self) -> std::result::Result<(), BufferError> {
        let pending = self.buffer.active_len();
        self.buffer.commit_lines(pending)?;
        self.buffer.flush()?;
        ArchiveMetrics::add(&self.orchestrator.metrics().lines_committed, pending);
        info!(target: "archive.session", pane = %self.pane, lines = pending, "active_window_flushed");
        Ok(())
    }
}
