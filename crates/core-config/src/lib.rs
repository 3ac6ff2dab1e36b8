//! Configuration loading and parsing.
//!
//! Parses `panearc.toml` (or an override path provided by the binary) into
//! [`ConfigFile`]. Every field has a default so an absent or partial file is
//! valid. Unknown fields are ignored. A file that fails to parse is logged
//! and replaced by defaults; the daemon should still archive with a broken
//! config.
//!
//! Raw values are kept as parsed. [`Config::settings`] validates them into
//! the [`ArchiveSettings`] the engine runs with, clamping out-of-range values
//! (each clamp is logged under the `config` target).

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::{info, warn};

const DEFAULT_INTERVAL_MS: u64 = 1000;
const DEFAULT_WIDTH: u16 = 200;
const DEFAULT_HEIGHT: u16 = 100;
const DEFAULT_SCROLL_THRESHOLD: f64 = 0.1;
const DEFAULT_MYERS_RATE_LIMIT_MS: u64 = 5000;

/// How Myers edits that land in the middle of the active window are applied.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MidBufferEdits {
    /// Splice the changed span in place.
    #[default]
    Replace,
    /// Give up on the edit script and redraw the whole window.
    Redraw,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "CaptureConfig::default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "CaptureConfig::default_width")]
    pub width: u16,
    #[serde(default = "CaptureConfig::default_height")]
    pub height: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            width: Self::default_width(),
            height: Self::default_height(),
        }
    }
}

impl CaptureConfig {
    const fn default_interval_ms() -> u64 {
        DEFAULT_INTERVAL_MS
    }
    const fn default_width() -> u16 {
        DEFAULT_WIDTH
    }
    const fn default_height() -> u16 {
        DEFAULT_HEIGHT
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiffConfig {
    /// Fraction of the previous capture that must reappear for a scroll.
    #[serde(default = "DiffConfig::default_scroll_threshold")]
    pub scroll_threshold: f64,
    #[serde(default = "DiffConfig::default_myers_rate_limit_ms")]
    pub myers_rate_limit_ms: u64,
    #[serde(default)]
    pub mid_buffer_edits: MidBufferEdits,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            scroll_threshold: Self::default_scroll_threshold(),
            myers_rate_limit_ms: Self::default_myers_rate_limit_ms(),
            mid_buffer_edits: MidBufferEdits::default(),
        }
    }
}

impl DiffConfig {
    const fn default_scroll_threshold() -> f64 {
        DEFAULT_SCROLL_THRESHOLD
    }
    const fn default_myers_rate_limit_ms() -> u64 {
        DEFAULT_MYERS_RATE_LIMIT_MS
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
        }
    }
}

impl StorageConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from("archive")
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Command line values that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub interval_ms: Option<u64>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub scroll_threshold: Option<f64>,
    pub myers_rate_limit_ms: Option<u64>,
    pub mid_buffer_edits: Option<MidBufferEdits>,
    pub storage_dir: Option<PathBuf>,
}

/// Validated runtime parameters for one archived pane.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSettings {
    pub interval: Duration,
    pub width: u16,
    pub height: u16,
    pub scroll_threshold: f64,
    pub myers_rate_limit: Duration,
    pub mid_buffer_edits: MidBufferEdits,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            scroll_threshold: DEFAULT_SCROLL_THRESHOLD,
            myers_rate_limit: Duration::from_millis(DEFAULT_MYERS_RATE_LIMIT_MS),
            mid_buffer_edits: MidBufferEdits::default(),
        }
    }
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("panearc.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("panearc").join("panearc.toml");
    }
    PathBuf::from("panearc.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config {
            raw: Some(content),
            file,
        }),
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    pub fn apply_overrides(&mut self, o: &ConfigOverrides) {
        let capture = &mut self.file.capture;
        let diff = &mut self.file.diff;
        if let Some(v) = o.interval_ms {
            capture.interval_ms = v;
        }
        if let Some(v) = o.width {
            capture.width = v;
        }
        if let Some(v) = o.height {
            capture.height = v;
        }
        if let Some(v) = o.scroll_threshold {
            diff.scroll_threshold = v;
        }
        if let Some(v) = o.myers_rate_limit_ms {
            diff.myers_rate_limit_ms = v;
        }
        if let Some(v) = o.mid_buffer_edits {
            diff.mid_buffer_edits = v;
        }
        if let Some(dir) = &o.storage_dir {
            self.file.storage.dir = dir.clone();
        }
    }

    /// Validate the parsed values into runtime settings.
    ///
    /// The scroll threshold must lie in `(0, 1]`: larger values clamp to `1.0`,
    /// non-positive or NaN values fall back to the default. A zero interval or
    /// capture dimension falls back to its default.
    pub fn settings(&self) -> ArchiveSettings {
        let capture = &self.file.capture;
        let diff = &self.file.diff;

        let raw = diff.scroll_threshold;
        let scroll_threshold = if raw.is_nan() || raw <= 0.0 {
            DEFAULT_SCROLL_THRESHOLD
        } else {
            raw.min(1.0)
        };
        if scroll_threshold != raw {
            info!(target: "config", raw, clamped = scroll_threshold, "scroll_threshold_clamped");
        }

        let interval_ms = if capture.interval_ms == 0 {
            info!(target: "config", default = DEFAULT_INTERVAL_MS, "capture_interval_defaulted");
            DEFAULT_INTERVAL_MS
        } else {
            capture.interval_ms
        };

        let (width, height) = (
            nonzero_or(capture.width, DEFAULT_WIDTH),
            nonzero_or(capture.height, DEFAULT_HEIGHT),
        );
        if (width, height) != (capture.width, capture.height) {
            info!(
                target: "config",
                raw_width = capture.width,
                raw_height = capture.height,
                width,
                height,
                "capture_size_defaulted"
            );
        }

        ArchiveSettings {
            interval: Duration::from_millis(interval_ms),
            width,
            height,
            scroll_threshold,
            myers_rate_limit: Duration::from_millis(diff.myers_rate_limit_ms),
            mid_buffer_edits: diff.mid_buffer_edits,
        }
    }
}

fn nonzero_or(v: u16, default: u16) -> u16 {
    if v == 0 { default } else { v }
}
