//! Error types for the archive engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Top-level error for one archive cycle.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// Failures reported by a [`crate::capture::CaptureSource`].
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("no tmux server running")]
    NoServer,

    #[error("pane target must not be empty")]
    EmptyPane,

    #[error("capture command failed: {0}")]
    Command(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by an [`crate::buffer::ArchiveBuffer`].
#[derive(Error, Debug)]
pub enum BufferError {
    #[error("replace start {start} is past the end of the active window ({len} lines)")]
    StartOutOfRange { start: usize, len: usize },

    #[error("commit sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl CaptureError {
    /// Classify the stderr of a failed `tmux` invocation.
    pub fn from_stderr(stderr: &str) -> Self {
        let msg = stderr.trim();
        if msg.contains("no server running") {
            CaptureError::NoServer
        } else if msg.contains("session not found") || msg.contains("can't find") {
            CaptureError::SessionNotFound(msg.to_string())
        } else {
            CaptureError::Command(msg.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_classification() {
        assert!(matches!(
            CaptureError::from_stderr("session not found: work\n"),
            CaptureError::SessionNotFound(s) if s == "session not found: work"
        ));
        assert!(matches!(
            CaptureError::from_stderr("can't find pane: %9"),
            CaptureError::SessionNotFound(_)
        ));
        assert!(matches!(
            CaptureError::from_stderr("no server running on /tmp/tmux-1000/default"),
            CaptureError::NoServer
        ));
        assert!(matches!(
            CaptureError::from_stderr("unknown flag -Q"),
            CaptureError::Command(s) if s == "unknown flag -Q"
        ));
    }

    #[test]
    fn cycle_error_wraps_sources() {
        let err: ArchiveError = CaptureError::NoServer.into();
        assert_eq!(err.to_string(), "capture error: no tmux server running");
        let err: ArchiveError = BufferError::StartOutOfRange { start: 5, len: 2 }.into();
        assert!(err.to_string().contains("replace start 5"));
    }
}
