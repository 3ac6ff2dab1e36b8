//! Pane archiving: capture a terminal pane on every tick and fold each
//! snapshot into an append-mostly transcript.
//!
//! Layers:
//! - `capture`: pulls the visible lines of a pane (`tmux capture-pane`).
//! - `orchestrator`: picks the cheapest diff strategy that explains the new
//!   capture (scroll detection, bounded Myers, or a full redraw) and applies
//!   it to an [`ArchiveBuffer`].
//! - `plan`: maps a Myers edit script onto commit/splice/append buffer calls.
//! - `window`: in-memory buffer with an optional [`CommitSink`] for committed
//!   lines.
//! - `session`: one pane's capture, buffer and orchestrator wired together.
//!
//! Counters live in `metrics` and are shared with the runtime via `Arc`.

pub mod backoff;
pub mod buffer;
pub mod capture;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod plan;
pub mod session;
pub mod window;

pub use backoff::{BackoffState, FORCE_AFTER_KMP_FAILURES};
pub use buffer::{ArchiveBuffer, CommitSink};
pub use capture::{
    CaptureSource, CommandOutput, CommandRunner, DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH,
    ProcessRunner, TmuxCapture, truncate_to_width,
};
pub use error::{ArchiveError, BufferError, CaptureError, Result};
pub use metrics::{ArchiveMetrics, ArchiveMetricsSnapshot};
pub use orchestrator::{AppliedEdit, DiffStrategy, Orchestrator};
pub use plan::{EditPlan, PlanRejection, Splice, plan_myers_edits};
pub use session::ArchiveSession;
pub use window::ArchiveWindow;
