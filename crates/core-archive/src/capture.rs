//! Pane capture sources.
//!
//! [`CaptureSource`] is the seam the session reads snapshots through.
//! [`TmuxCapture`] implements it with `tmux capture-pane`, running the
//! command through a [`CommandRunner`] so tests can stand in for tmux.

use std::process::Command;

use unicode_width::UnicodeWidthChar;

use crate::error::CaptureError;

pub const DEFAULT_CAPTURE_WIDTH: u16 = 200;
pub const DEFAULT_CAPTURE_HEIGHT: u16 = 100;

pub trait CaptureSource {
    /// Snapshot the visible text of `pane`, at most `height` lines each cut
    /// to `width` display columns.
    fn capture(&mut self, pane: &str, width: u16, height: u16) -> Result<Vec<String>, CaptureError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner {
    fn run(&mut self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&mut self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let out = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            success: out.status.success(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}

#[derive(Debug, Default)]
pub struct TmuxCapture<R: CommandRunner = ProcessRunner> {
    runner: R,
}

impl TmuxCapture<ProcessRunner> {
    pub fn new() -> Self {
        Self {
            runner: ProcessRunner,
        }
    }
}

impl<R: CommandRunner> TmuxCapture<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// `capture-pane` arguments: print to stdout, keep escapes, join
    /// wrapped lines, start `height` lines into the scrollback.
    pub fn capture_args(pane: &str, height: u16) -> Vec<String> {
        vec![
            "capture-pane".into(),
            "-p".into(),
            "-e".into(),
            "-J".into(),
            "-t".into(),
            pane.into(),
            "-S".into(),
            format!("-{height}"),
        ]
    }
}

impl<R: CommandRunner> CaptureSource for TmuxCapture<R> {
    fn capture(&mut self, pane: &str, width: u16, height: u16) -> Result<Vec<String>, CaptureError> {
        if pane.is_empty() {
            return Err(CaptureError::EmptyPane);
        }
        let width = if width == 0 { DEFAULT_CAPTURE_WIDTH } else { width };
        let height = if height == 0 { DEFAULT_CAPTURE_HEIGHT } else { height };

        let out = self.runner.run("tmux", &Self::capture_args(pane, height))?;
        if !out.success {
            let err = CaptureError::from_stderr(&out.stderr);
            tracing::debug!(target: "archive.capture", pane, error = %err, "capture_failed");
            return Err(err);
        }
        let mut lines = split_output(&out.stdout);
        if lines.len() > height as usize {
            lines.drain(..lines.len() - height as usize);
        }
        Ok(lines
            .into_iter()
            .map(|l| truncate_to_width(l, width as usize).to_string())
            .collect())
    }
}

/// Split command output into lines. A single trailing newline terminates the
/// last line rather than starting an empty one.
fn split_output(stdout: &str) -> Vec<&str> {
    if stdout.is_empty() {
        return Vec::new();
    }
    stdout
        .strip_suffix('\n')
        .unwrap_or(stdout)
        .split('\n')
        .collect()
}

/// Cut `line` after `width` display columns; a width of 0 leaves it whole.
/// CSI (`ESC [ ... final`) and OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`)
/// sequences are copied through and take no columns, so styling and links
/// that precede the cut survive.
pub fn truncate_to_width(line: &str, width: usize) -> &str {
    if width == 0 {
        return line;
    }
    let mut cols = 0usize;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                Some(&(_, '[')) => {
                    chars.next();
                    // parameters and intermediates up to the final byte
                    for (_, c) in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                Some(&(_, ']')) => {
                    chars.next();
                    while let Some((_, c)) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && matches!(chars.peek(), Some(&(_, '\\'))) {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
            continue;
        }
        let w = c.width().unwrap_or(0);
        if cols + w > width {
            return &line[..i];
        }
        cols += w;
    }
    line
}
