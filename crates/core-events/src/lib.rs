//! Core event types and channel helpers for Conduit.
//!
//! Every producer (stdin reader, terminal size watcher, session transport) pushes
//! `Event`s into one bounded channel consumed by the runtime loop. The loop is the
//! only task that touches session state, so producers never share mutable data.

use std::sync::atomic::AtomicU64;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

pub mod wire;
pub use wire::{ControlFlowSignal, ServerMessage};

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded mpsc channel sized by `EVENT_CHANNEL_CAP`. Producers `send().await`, so a slow consumer
// parks the stdin reader and transport task instead of dropping keystrokes or output. Ordering per
// producer is preserved, which the renderer relies on (output is always drawn before the prompt
// that follows it).
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters, inspected by tests and logged at shutdown.
// -------------------------------------------------------------------------------------------------
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static INPUT_CHUNKS: AtomicU64 = AtomicU64::new(0); // raw stdin chunks forwarded
pub static INPUT_BYTES: AtomicU64 = AtomicU64::new(0);
pub static ESCAPE_SEQUENCES: AtomicU64 = AtomicU64::new(0); // atomic escape sequences decoded
pub static PASTE_LINES: AtomicU64 = AtomicU64::new(0); // synthetic Enter events produced by paste splitting
pub static SUBMISSIONS: AtomicU64 = AtomicU64::new(0); // complete statements forwarded to the transport
pub static MALFORMED_MESSAGES: AtomicU64 = AtomicU64::new(0); // inbound payloads dropped
pub static RECONNECT_ATTEMPTS: AtomicU64 = AtomicU64::new(0);
// Input task lifecycle
pub static INPUT_TASK_STARTS: AtomicU64 = AtomicU64::new(0);
pub static INPUT_TASK_STOP_SIGNAL: AtomicU64 = AtomicU64::new(0);
pub static INPUT_TASK_STOP_CHANNEL: AtomicU64 = AtomicU64::new(0);
pub static INPUT_TASK_STOP_EOF: AtomicU64 = AtomicU64::new(0);
pub static INPUT_TASK_STOP_ERROR: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Transport(TransportEvent),
    /// The process was asked to terminate (SIGTERM, SIGHUP, or Ctrl-C outside raw mode).
    Shutdown,
}

/// Raw terminal input as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// One read from the terminal. May hold a single keystroke or an entire paste; decoding
    /// into keys happens on the loop side so a chunk is never observed half-applied.
    Chunk(String),
    /// Terminal resize (columns, rows).
    Resize(u16, u16),
    /// Input stream ended (stdin closed).
    Eof,
}

/// Connection lifecycle reported by the session transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Status(ConnectionState),
    Message(ServerMessage),
    /// Emitted exactly once per session when the socket is connected and the
    /// interpreter reported itself loaded.
    Ready,
    /// A statement that could not be sent because no socket was open.
    SendDropped(String),
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------
// Producers that run on their own timer or IO future register uniformly. Each source owns its task
// lifecycle and must stop once `tx.send(..).await` fails (consumer dropped).

/// Trait implemented by any async event producer.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task, returning a JoinHandle.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources spawned at startup.
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
    /// `Sender` clone; the registry keeps no strong references once this returns.
    ///
    /// During shutdown the caller should drop its final `Sender` before awaiting the handles so
    /// the sources observe the closed channel and exit cooperatively.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        // Drain so duplicate spawns are prevented if called twice.
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Polls the terminal size and emits `InputEvent::Resize` when it changes.
///
/// Raw stdin reads carry no resize notification, so the grid width is sampled on an interval
/// instead. The size query is injectable so tests do not need a real terminal.
pub struct ResizeWatchSource {
    interval: std::time::Duration,
    query_size: Box<dyn FnMut() -> Option<(u16, u16)> + Send>,
    last: Option<(u16, u16)>,
}

impl ResizeWatchSource {
    pub fn new<F>(
        interval: std::time::Duration,
        initial: Option<(u16, u16)>,
        query_size: F,
    ) -> Self
    where
        F: FnMut() -> Option<(u16, u16)> + Send + 'static,
    {
        Self {
            interval,
            query_size: Box::new(query_size),
            last: initial,
        }
    }
}

impl AsyncEventSource for ResizeWatchSource {
    fn name(&self) -> &'static str {
        "resize_watch"
    }

    fn spawn(mut self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = interval.tick() => {}
                }
                let Some(size) = (self.query_size)() else {
                    continue;
                };
                if self.last == Some(size) {
                    continue;
                }
                self.last = Some(size);
                let (w, h) = size;
                if tx
                    .send(Event::Input(InputEvent::Resize(w, h)))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests_async_sources {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct MockOnceSource;

    impl AsyncEventSource for MockOnceSource {
        fn name(&self) -> &'static str {
            "mock_once"
        }
        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            tokio::spawn(async move {
                let _ = tx.send(Event::Shutdown).await;
            })
        }
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
    async fn registry_spawns_and_emits() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(MockOnceSource);
        assert_eq!(reg.len(), 1);
        let handles = reg.spawn_all(&tx);
        assert!(reg.is_empty(), "spawn_all drains the registry");

        let got = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("source should emit promptly");
        assert!(matches!(got, Some(Event::Shutdown)));

        drop(tx);
        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_millis(20), handle).await;
        }
    }

    #[tokio::test]
    async fn registry_sources_exit_on_channel_drop() {
        let (tx, rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(MockCloseSource { flag: flag.clone() });
        let handles = reg.spawn_all(&tx);

        drop(tx);
        drop(rx);

        for handle in handles {
            match tokio::time::timeout(Duration::from_millis(50), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source task did not observe channel closure"),
            }
        }

        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn resize_watch_emits_only_on_change() {
        let sizes = Arc::new(std::sync::Mutex::new(vec![(80, 24), (80, 24), (100, 30)]));
        let queued_sizes = sizes.clone();
        let source = ResizeWatchSource::new(Duration::from_millis(10), Some((80, 24)), move || {
            let mut v = queued_sizes.lock().unwrap();
            if v.is_empty() { None } else { Some(v.remove(0)) }
        });
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let handle = Box::new(source).spawn(tx);

        let ev = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("resize expected");
        match ev {
            Some(Event::Input(InputEvent::Resize(w, h))) => assert_eq!((w, h), (100, 30)),
            other => panic!("unexpected event: {other:?}"),
        }
        drop(rx);
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }
}
