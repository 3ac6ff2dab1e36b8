//! Contract between the orchestrator and whatever holds the transcript.
//!
//! The transcript has two halves: the *active* window mirrors the lines the
//! pane currently shows and may still change; *committed* lines are final.
//! Committing always moves lines off the head of the active window.

use crate::error::BufferError;

pub trait ArchiveBuffer {
    /// Append lines to the tail of the active window.
    fn append_lines(&mut self, lines: &[String]) -> Result<(), BufferError>;
    /// Move up to `count` lines from the head of the active window to the
    /// committed transcript. Counts past the active length are clamped.
    fn commit_lines(&mut self, count: usize) -> Result<(), BufferError>;
    /// Replace `count` active lines starting at `start` with `lines`.
    /// `start` may equal the active length (pure insert at the tail).
    fn replace_lines(
        &mut self,
        start: usize,
        count: usize,
        lines: &[String],
    ) -> Result<(), BufferError>;
    fn active(&self) -> &[String];
    fn active_len(&self) -> usize {
        self.active().len()
    }
    /// Push committed lines to durable storage, if any.
    fn flush(&mut self) -> Result<(), BufferError> {
        Ok(())
    }
}

/// Receives every line as it is committed, in transcript order.
pub trait CommitSink: Send {
    fn commit(&mut self, lines: &[String]) -> std::io::Result<()>;
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
