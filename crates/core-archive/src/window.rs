//! In-memory transcript with an active window and a committed history.
//!
//! `max_active` caps the active window; appends past the cap commit the
//! overflow from the head. With a [`CommitSink`] attached, committed lines are
//! forwarded to the sink instead of being kept in memory.

use crate::buffer::{ArchiveBuffer, CommitSink};
use crate::error::BufferError;

#[derive(Default)]
pub struct ArchiveWindow {
    committed: Vec<String>,
    active: Vec<String>,
    /// 0 disables the cap.
    max_active: usize,
    committed_total: usize,
    sink: Option<Box<dyn CommitSink>>,
}

impl std::fmt::Debug for ArchiveWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWindow")
            .field("committed", &self.committed.len())
            .field("active", &self.active.len())
            .field("max_active", &self.max_active)
            .field("committed_total", &self.committed_total)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl ArchiveWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_active(max_active: usize) -> Self {
        Self {
            max_active,
            ..Self::default()
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn CommitSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Committed lines held in memory. Empty when a sink is attached.
    pub fn committed(&self) -> &[String] {
        &self.committed
    }

    /// Number of lines committed over the window's lifetime.
    pub fn committed_total(&self) -> usize {
        self.committed_total
    }

    /// Committed history followed by the active window.
    pub fn full_transcript(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.committed.len() + self.active.len());
        out.extend_from_slice(&self.committed);
        out.extend_from_slice(&self.active);
        out
    }

    /// Commit the whole active window and flush the sink.
    pub fn commit_all(&mut self) -> Result<(), BufferError> {
        self.commit_lines(self.active.len())?;
        self.flush()
    }

    fn enforce_cap(&mut self) -> Result<(), BufferError> {
        if self.max_active == 0 || self.active.len() <= self.max_active {
            return Ok(());
        }
        let overflow = self.active.len() - self.max_active;
        tracing::trace!(target: "archive.window", overflow, max_active = self.max_active, "window_overflow_commit");
        self.commit_lines(overflow)
    }
}

impl ArchiveBuffer for ArchiveWindow {
    fn append_lines(&mut self, lines: &[String]) -> Result<(), BufferError> {
        self.active.extend_from_slice(lines);
        self.enforce_cap()
    }

    fn commit_lines(&mut self, count: usize) -> Result<(), BufferError> {
        let n = count.min(self.active.len());
        if n == 0 {
            return Ok(());
        }
        // Sink first: on failure the lines stay active.
        match self.sink.as_mut() {
            Some(sink) => sink.commit(&self.active[..n])?,
            None => self.committed.extend_from_slice(&self.active[..n]),
        }
        self.active.drain(..n);
        self.committed_total += n;
        Ok(())
    }

    fn replace_lines(
        &mut self,
        start: usize,
        count: usize,
        lines: &[String],
    ) -> Result<(), BufferError> {
        let len = self.active.len();
        if start > len {
            return Err(BufferError::StartOutOfRange { start, len });
        }
        let end = start.saturating_add(count).min(len);
        self.active.splice(start..end, lines.iter().cloned());
        self.enforce_cap()
    }

    fn active(&self) -> &[String] {
        &self.active
    }

    fn flush(&mut self) -> Result<(), BufferError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }
}
