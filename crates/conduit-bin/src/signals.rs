//! Process termination requests as `Event::Shutdown`.

use core_events::{AsyncEventSource, Event};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{info, warn};

type SignalWait = Pin<Box<dyn Future<Output = Option<&'static str>> + Send>>;

/// Resolves once with the name of the signal received, or `None` if no handler could be
/// installed.
pub(crate) struct TerminationSource {
    wait: SignalWait,
}

impl TerminationSource {
    pub(crate) fn new<F>(wait: F) -> Self
    where
        F: Future<Output = Option<&'static str>> + Send + 'static,
    {
        Self {
            wait: Box::pin(wait),
        }
    }

    /// SIGTERM and SIGHUP (the terminal went away). Raw mode turns Ctrl-C into a key, so
    /// SIGINT only arrives when it is sent from elsewhere.
    pub(crate) fn os() -> Self {
        Self::new(os_signal())
    }
}

#[cfg(unix)]
async fn os_signal() -> Option<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};
    let (mut term, mut hup, mut int) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(hup), Ok(int)) => (term, hup, int),
        _ => {
            warn!(target: "runtime.signal", "signal_handlers_unavailable");
            return None;
        }
    };
    tokio::select! {
        _ = term.recv() => Some("SIGTERM"),
        _ = hup.recv() => Some("SIGHUP"),
        _ = int.recv() => Some("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn os_signal() -> Option<&'static str> {
    match tokio::signal::ctrl_c().await {
        Ok(()) => Some("ctrl_c"),
        Err(e) => {
            warn!(target: "runtime.signal", error = %e, "signal_handlers_unavailable");
            None
        }
    }
}

impl AsyncEventSource for TerminationSource {
    fn name(&self) -> &'static str {
        "termination_signal"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let wait = self.wait;
        tokio::spawn(async move {
            let signal = tokio::select! {
                _ = tx.closed() => return,
                signal = wait => signal,
            };
            let Some(signal) = signal else {
                return;
            };
            info!(target: "runtime.signal", signal, "termination_requested");
            let _ = tx.send(Event::Shutdown).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{mpsc, oneshot};

    #[tokio::test]
    async fn signal_becomes_shutdown_event() {
        let (fire, fired) = oneshot::channel::<()>();
        let source = TerminationSource::new(async move { fired.await.ok().map(|()| "SIGTERM") });
        let (tx, mut rx) = mpsc::channel(4);
        let handle = Box::new(source).spawn(tx);
        fire.send(()).unwrap();
        assert!(matches!(rx.recv().await, Some(Event::Shutdown)));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn missing_handlers_emit_nothing() {
        let source = TerminationSource::new(async { None });
        let (tx, mut rx) = mpsc::channel(4);
        let handle = Box::new(source).spawn(tx);
        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
