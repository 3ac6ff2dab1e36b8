//! panearc entrypoint.
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use core_archive::{
    ArchiveBuffer, ArchiveSession, ArchiveWindow, CaptureSource, CommitSink, TmuxCapture,
};
use core_config::{ArchiveSettings, ConfigOverrides, MidBufferEdits, load_from};
use core_events::{
    EVENT_CHANNEL_CAP, Event, EventSourceRegistry, SignalEventSource, TickEventSource,
    channel_send_failures,
};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "panearc", version, about = "Archive the scrollback of a terminal pane")]
struct Args {
    /// Pane to archive, in tmux target syntax (`session:window.pane`).
    pub pane: String,
    /// Optional configuration file path (overrides discovery of `panearc.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub interval_ms: Option<u64>,
    #[arg(long)]
    pub width: Option<u16>,
    #[arg(long)]
    pub height: Option<u16>,
    /// Minimum overlap, as a fraction of the previous capture, that counts as a scroll.
    #[arg(long)]
    pub scroll_threshold: Option<f64>,
    #[arg(long)]
    pub myers_rate_limit_ms: Option<u64>,
    #[arg(long, value_enum)]
    pub mid_buffer_edits: Option<MidBufferArg>,
    /// Directory receiving committed transcripts.
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MidBufferArg {
    Replace,
    Redraw,
}

impl From<MidBufferArg> for MidBufferEdits {
    fn from(arg: MidBufferArg) -> Self {
        match arg {
            MidBufferArg::Replace => MidBufferEdits::Replace,
            MidBufferArg::Redraw => MidBufferEdits::Redraw,
        }
    }
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            interval_ms: self.interval_ms,
            width: self.width,
            height: self.height,
            scroll_threshold: self.scroll_threshold,
            myers_rate_limit_ms: self.myers_rate_limit_ms,
            mid_buffer_edits: self.mid_buffer_edits.map(Into::into),
            storage_dir: self.storage_dir.clone(),
        }
    }
}

/// Appends committed lines to `<dir>/<pane>.log`.
struct FileCommitSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileCommitSink {
    fn create(dir: &Path, pane: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating storage dir {}", dir.display()))?;
        let path = dir.join(transcript_file_name(pane));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening transcript {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl CommitSink for FileCommitSink {
    fn commit(&mut self, lines: &[String]) -> std::io::Result<()> {
        for line in lines {
            self.writer.write_all(line.as_bytes())?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Pane targets may contain path separators; keep the file inside the storage dir.
fn transcript_file_name(pane: &str) -> String {
    let stem: String = pane
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c => c,
        })
        .collect();
    let stem = if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "pane".to_string()
    } else {
        stem
    };
    format!("{stem}.log")
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

/// The active window never holds more than one capture's worth of lines.
fn archive_window(settings: &ArchiveSettings, sink: Box<dyn CommitSink>) -> ArchiveWindow {
    ArchiveWindow::with_max_active(settings.height as usize).with_sink(sink)
}

struct RuntimeContext {
    pane: String,
    settings: ArchiveSettings,
    window: ArchiveWindow,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn run(&mut self, args: &Args) -> Result<RuntimeContext> {
        self.configure_logging(&args.log_dir)?;
        Self::install_panic_hook();

        info!(target: "runtime", pane = args.pane.as_str(), "startup");

        let mut config = load_from(args.config.clone())?;
        config.apply_overrides(&args.overrides());
        let settings = config.settings();
        let sink = FileCommitSink::create(&config.file.storage.dir, &args.pane)?;

        info!(
            target: "runtime.startup",
            pane = args.pane.as_str(),
            transcript = %sink.path().display(),
            interval_ms = settings.interval.as_millis() as u64,
            width = settings.width,
            height = settings.height,
            scroll_threshold = settings.scroll_threshold,
            config_override = args.config.is_some(),
            "bootstrap_complete"
        );

        let window = archive_window(&settings, Box::new(sink));
        Ok(RuntimeContext {
            pane: args.pane.clone(),
            settings,
            window,
        })
    }

    fn configure_logging(&mut self, log_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("creating log dir {}", log_dir.display()))?;
        let file_appender = tracing_appender::rolling::never(log_dir, "panearc.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Subscriber already installed; dropping the guard stops this writer.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

enum LoopControl {
    Continue,
    Break { reason: ShutdownReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

struct ArchiveRuntime<C: CaptureSource> {
    session: ArchiveSession<C, ArchiveWindow>,
    rx: mpsc::Receiver<Event>,
    tx: Option<mpsc::Sender<Event>>,
    source_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl<C: CaptureSource> ArchiveRuntime<C> {
    fn new(
        session: ArchiveSession<C, ArchiveWindow>,
        tx: mpsc::Sender<Event>,
        rx: mpsc::Receiver<Event>,
        source_handles: Vec<tokio::task::JoinHandle<()>>,
    ) -> Self {
        Self {
            session,
            rx,
            tx: Some(tx),
            source_handles,
        }
    }

    async fn run(&mut self) -> Result<()> {
        let span = tracing::debug_span!(target: "runtime", "event_loop", pane = self.session.pane());
        let _enter_loop = span.enter();

        let mut shutdown_reason = ShutdownReason::ChannelClosed;
        while let Some(event) = self.rx.recv().await {
            let control = match event {
                Event::Tick => self.handle_tick(),
                Event::Shutdown => LoopControl::Break {
                    reason: ShutdownReason::ShutdownEvent,
                },
            };
            if let LoopControl::Break { reason } = control {
                shutdown_reason = reason;
                break;
            }
        }

        self.rx.close();
        self.finalize_shutdown(shutdown_reason).await
    }

    fn handle_tick(&mut self) -> LoopControl {
        if let Some(applied) = self.session.tick(Instant::now()) {
            trace!(
                target: "runtime",
                strategy = applied.strategy().map(|s| s.as_str()).unwrap_or("none"),
                active = self.session.buffer().active_len(),
                "cycle_complete"
            );
        }
        LoopControl::Continue
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) -> Result<()> {
        log_shutdown_stage(reason, "begin");
        if let Some(tx) = self.tx.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "dropping_runtime_sender"
            );
            drop(tx);
        }

        while let Some(handle) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(_)) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_timeout"
                ),
            }
        }

        let flushed = self.session.flush();
        if let Err(err) = &flushed {
            error!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                error = %err,
                "transcript_flush_failed"
            );
        }

        let m = self.session.metrics().snapshot();
        info!(
            target: "runtime.shutdown",
            cycles = m.cycles,
            unchanged = m.unchanged,
            kmp_hits = m.kmp_hits,
            kmp_misses = m.kmp_misses,
            myers_applied = m.myers_applied,
            myers_overflows = m.myers_overflows,
            myers_refused = m.myers_refused,
            full_redraws = m.full_redraws,
            lines_committed = m.lines_committed,
            cycle_errors = m.cycle_errors,
            channel_send_failures = channel_send_failures(),
            "archive_metrics"
        );

        log_shutdown_stage(reason, "complete");
        flushed.context("flushing transcript")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    let context = startup.run(&args)?;

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let mut registry = EventSourceRegistry::new();
    registry.register(TickEventSource::new(context.settings.interval));
    registry.register(SignalEventSource);
    let source_handles = registry.spawn_all(&tx);

    let session = ArchiveSession::new(
        context.pane,
        context.settings,
        TmuxCapture::new(),
        context.window,
    );
    let mut runtime = ArchiveRuntime::new(session, tx, rx, source_handles);
    runtime.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_archive::CaptureError;
    use std::collections::VecDeque;

    struct ScriptedCapture(VecDeque<Vec<String>>);

    impl CaptureSource for ScriptedCapture {
        fn capture(
            &mut self,
            _pane: &str,
            _width: u16,
            _height: u16,
        ) -> std::result::Result<Vec<String>, CaptureError> {
            self.0.pop_front().ok_or(CaptureError::EmptyPane)
        }
    }

    fn screens(frames: &[&[&str]]) -> ScriptedCapture {
        ScriptedCapture(
            frames
                .iter()
                .map(|f| f.iter().map(|l| l.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn args_map_to_overrides() {
        let args = Args::try_parse_from([
            "panearc",
            "work:0.1",
            "--interval-ms",
            "250",
            "--scroll-threshold",
            "0.5",
            "--mid-buffer-edits",
            "redraw",
            "--storage-dir",
            "/tmp/arc",
        ])
        .unwrap();
        assert_eq!(args.pane, "work:0.1");
        let o = args.overrides();
        assert_eq!(o.interval_ms, Some(250));
        assert_eq!(o.scroll_threshold, Some(0.5));
        assert_eq!(o.mid_buffer_edits, Some(MidBufferEdits::Redraw));
        assert_eq!(o.storage_dir, Some(PathBuf::from("/tmp/arc")));
        assert_eq!(o.width, None);
        assert_eq!(args.log_dir, PathBuf::from("."));
    }

    #[test]
    fn pane_is_required() {
        assert!(Args::try_parse_from(["panearc"]).is_err());
    }

    #[test]
    fn transcript_names_stay_in_storage_dir() {
        assert_eq!(transcript_file_name("work:0.1"), "work:0.1.log");
        assert_eq!(transcript_file_name("../etc/passwd"), ".._etc_passwd.log");
        assert_eq!(transcript_file_name(".."), "pane.log");
        assert_eq!(transcript_file_name(""), "pane.log");
    }

    #[test]
    fn file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileCommitSink::create(dir.path(), "w").unwrap();
        sink.commit(&["one".to_string(), "two".to_string()]).unwrap();
        sink.flush().unwrap();
        let mut again = FileCommitSink::create(dir.path(), "w").unwrap();
        again.commit(&["three".to_string()]).unwrap();
        again.flush().unwrap();
        let written = std::fs::read_to_string(dir.path().join("w.log")).unwrap();
        assert_eq!(written, "one\ntwo\nthree\n");
    }

    #[test]
    fn shutdown_reason_labels() {
        assert_eq!(ShutdownReason::ShutdownEvent.to_string(), "shutdown_event");
        assert_eq!(ShutdownReason::ChannelClosed.as_str(), "channel_closed");
    }

    #[tokio::test]
    async fn runtime_archives_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileCommitSink::create(dir.path(), "w").unwrap();
        let window = ArchiveWindow::new().with_sink(Box::new(sink));
        let capture = screens(&[&["$ seq 3", "1"], &["1", "2", "3", "$"]]);
        let session = ArchiveSession::new("w", ArchiveSettings::default(), capture, window);

        let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
        tx.send(Event::Tick).await.unwrap();
        tx.send(Event::Tick).await.unwrap();
        tx.send(Event::Shutdown).await.unwrap();
        // left unread: shutdown stops the loop first
        tx.send(Event::Tick).await.unwrap();

        let mut runtime = ArchiveRuntime::new(session, tx, rx, Vec::new());
        runtime.run().await.unwrap();

        assert!(runtime.session.buffer().active().is_empty());
        let written = std::fs::read_to_string(dir.path().join("w.log")).unwrap();
        assert_eq!(written, "$ seq 3\n1\n2\n3\n$\n");
        let m = runtime.session.metrics().snapshot();
        assert_eq!((m.cycles, m.kmp_hits), (2, 1));
    }

    #[tokio::test]
    async fn closed_channel_still_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileCommitSink::create(dir.path(), "w").unwrap();
        let window = ArchiveWindow::new().with_sink(Box::new(sink));
        let session =
            ArchiveSession::new("w", ArchiveSettings::default(), screens(&[&["only"]]), window);

        let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
        tx.send(Event::Tick).await.unwrap();
        let mut runtime = ArchiveRuntime::new(session, tx, rx, Vec::new());
        // the runtime owns the only sender; drop it so recv() ends after the tick
        drop(runtime.tx.take());
        runtime.run().await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("w.log")).unwrap();
        assert_eq!(written, "only\n");
    }

    #[test]
    fn window_cap_follows_capture_height() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileCommitSink::create(dir.path(), "w").unwrap();
        let settings = ArchiveSettings {
            height: 2,
            ..ArchiveSettings::default()
        };
        let mut window = archive_window(&settings, Box::new(sink));
        window
            .append_lines(&["a".to_string(), "b".to_string(), "c".to_string()])
            .unwrap();
        assert_eq!(window.active(), ["b".to_string(), "c".to_string()].as_slice());
        assert_eq!(window.committed_total(), 1);
        window.flush().unwrap();
        let written = std::fs::read_to_string(dir.path().join("w.log")).unwrap();
        assert_eq!(written, "a\n");
    }
}
