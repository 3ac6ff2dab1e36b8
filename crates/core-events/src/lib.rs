//! Runtime event types and async event sources for the archive daemon.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel policy
// -------------------------------------------------------------------------------------------------
// Bounded mpsc channel. Sources await `send`, so a slow consumer parks the producers instead of
// dropping events. A failed send means the consumer is gone and the source must exit.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 64;

/// Sends that failed because the consumer dropped the channel.
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Current value of [`CHANNEL_SEND_FAILURES`], logged by the runtime at shutdown.
pub fn channel_send_failures() -> u64 {
    CHANNEL_SEND_FAILURES.load(Ordering::Relaxed)
}

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Capture interval elapsed; run one archive cycle.
    Tick,
    /// Termination requested (signal or internal).
    Shutdown,
}

/// Trait implemented by any async event producer. Implementors usually hold configuration and
/// spawn one background task that pushes `Event`s into the shared channel.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task. Implementors stop when `tx.send(..).await`
    /// returns Err (channel closed) or on their own internal stop condition.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Emits `Event::Tick` every configured interval. The first tick fires immediately so the first
/// capture does not wait a full interval.
pub struct TickEventSource {
    interval: Duration,
}

impl TickEventSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            // A cycle that overran should not be followed by a burst of catch-up ticks.
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
        })
    }
}

/// Translates Ctrl-C (and SIGTERM on unix) into a single `Event::Shutdown`.
pub struct SignalEventSource;

impl SignalEventSource {
    async fn wait() {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "runtime.events", error = %e, "sigterm_handler_unavailable");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

impl AsyncEventSource for SignalEventSource {
    fn name(&self) -> &'static str {
        "signal"
    }
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = Self::wait() => {
                    tracing::info!(target: "runtime.events", "shutdown_signal_received");
                    if tx.send(Event::Shutdown).await.is_err() {
                        CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                    }
                }
                _ = tx.closed() => {}
            }
        })
    }
}

/// Registry of event sources. Stores boxed trait objects and spawns them all at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }
    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }
    pub fn len(&self) -> usize {
        self.sources.len()
    }
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
    /// Spawn all registered sources, returning their JoinHandles. Each source receives its own
    /// `Sender` clone; during shutdown the caller drops its last clone before awaiting the
    /// handles so the sources observe the closed channel.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        // Drain so a second call cannot spawn duplicates.
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::mpsc;

    struct MockShutdownSource;

    impl AsyncEventSource for MockShutdownSource {
        fn name(&self) -> &'static str {
            "mock_shutdown"
        }
        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            tokio::spawn(async move {
                let _ = tx.send(Event::Shutdown).await;
            })
        }
    }

    #[tokio::test]
    async fn registry_spawns_and_emits() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(MockShutdownSource);
        reg.register(TickEventSource::new(Duration::from_millis(10)));
        assert_eq!(reg.len(), 2);
        let handles = reg.spawn_all(&tx);
        assert!(reg.is_empty());

        let mut got_shutdown = false;
        let mut got_tick = false;
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(200) && (!got_shutdown || !got_tick) {
            if let Ok(Some(ev)) = tokio::time::timeout(Duration::from_millis(5), rx.recv()).await {
                match ev {
                    Event::Shutdown => got_shutdown = true,
                    Event::Tick => got_tick = true,
                }
            }
        }
        assert!(got_shutdown, "expected mock source to request shutdown");
        assert!(got_tick, "expected tick source to emit tick events");

        drop(tx);
        drop(rx);
        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_millis(50), handle).await;
        }
    }

    #[tokio::test]
    async fn tick_source_exits_on_channel_drop() {
        let before = channel_send_failures();
        let (tx, rx) = mpsc::channel::<Event>(1);
        let handle = Box::new(TickEventSource::new(Duration::from_millis(1))).spawn(tx);
        drop(rx);
        match tokio::time::timeout(Duration::from_millis(100), handle).await {
            Ok(join_res) => join_res.expect("tick task should exit cleanly"),
            Err(_) => panic!("tick task did not observe channel closure"),
        }
        // other tests share the counter, so only a lower bound holds
        assert!(channel_send_failures() > before);
    }

    struct MockCloseSource {
        flag: Arc<AtomicBool>,
    }

    impl AsyncEventSource for MockCloseSource {
        fn name(&self) -> &'static str {
            "mock_close"
        }

        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            let flag = self.flag;
            tokio::spawn(async move {
                tx.closed().await;
                flag.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn signal_and_custom_sources_exit_on_channel_drop() {
        let (tx, rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(MockCloseSource { flag: flag.clone() });
        reg.register(SignalEventSource);
        let handles = reg.spawn_all(&tx);

        drop(tx);
        drop(rx);

        for handle in handles {
            match tokio::time::timeout(Duration::from_millis(100), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source task did not observe channel closure"),
            }
        }
        assert!(flag.load(Ordering::SeqCst));
    }
}
