use crate::connector::{Connector, Link};
use crate::machine::{ConnectionMachine, ReadinessGate, Step};
use crate::protocol::{decode_or_drop, encode_input};
use crate::TransportError;
use core_events::{
    CHANNEL_SEND_FAILURES, ConnectionState, Event, RECONNECT_ATTEMPTS, TransportEvent,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(3);
const COMMAND_CHANNEL_CAP: usize = 64;
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum Command {
    Send(String),
    InterpreterLoaded,
    Close,
}

/// Handle to the session task. Dropping it without `close` also stops the task once the
/// command channel drains.
#[derive(Debug)]
pub struct SessionTransport {
    commands: Sender<Command>,
    task: JoinHandle<()>,
}

impl SessionTransport {
    /// Spawn the session task; it starts connecting immediately and reports through `events`.
    pub fn spawn(connector: Arc<dyn Connector>, events: Sender<Event>, backoff: Duration) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_CHANNEL_CAP);
        let task = tokio::spawn(SessionTask::new(connector, events, rx, backoff).run());
        Self { commands, task }
    }

    /// Forward a complete statement. Sent as-is when connected; otherwise it is handed back as
    /// `TransportEvent::SendDropped`.
    pub async fn send(&self, statement: String) -> Result<(), TransportError> {
        self.commands
            .send(Command::Send(statement))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// The interpreter finished loading; readiness may fire.
    pub async fn interpreter_loaded(&self) -> Result<(), TransportError> {
        self.commands
            .send(Command::InterpreterLoaded)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Explicit close: no reconnect afterwards. Waits briefly for the task to report
    /// `Disconnected`, then aborts it.
    pub async fn close(self) {
        let _ = self.commands.send(Command::Close).await;
        let mut task = self.task;
        if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
            warn!(target: "transport", "close_timeout_abort");
            task.abort();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct SessionTask {
    connector: Arc<dyn Connector>,
    events: Sender<Event>,
    commands: Receiver<Command>,
    backoff: Duration,
    machine: ConnectionMachine,
    readiness: ReadinessGate,
    link: Option<Box<dyn Link>>,
    reconnect_at: Option<Instant>,
}

impl SessionTask {
    fn new(
        connector: Arc<dyn Connector>,
        events: Sender<Event>,
        commands: Receiver<Command>,
        backoff: Duration,
    ) -> Self {
        Self {
            connector,
            events,
            commands,
            backoff,
            machine: ConnectionMachine::new(),
            readiness: ReadinessGate::default(),
            link: None,
            reconnect_at: None,
        }
    }

    async fn run(mut self) {
        info!(target: "transport", "session_task_started");
        let mut flow = self.emit(TransportEvent::Status(ConnectionState::Connecting)).await;
        if flow == Flow::Continue {
            flow = self.attempt_connect().await;
        }
        while flow == Flow::Continue {
            let reconnect_at = self.reconnect_at;
            flow = tokio::select! {
                biased;
                cmd = self.commands.recv() => self.on_command(cmd).await,
                frame = next_frame(&mut self.link) => self.on_frame(frame).await,
                _ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    RECONNECT_ATTEMPTS.fetch_add(1, Ordering::Relaxed);
                    self.attempt_connect().await
                }
            };
        }
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
        info!(target: "transport", state = self.machine.state().as_str(), "session_task_stopped");
    }

    async fn on_command(&mut self, cmd: Option<Command>) -> Flow {
        match cmd {
            Some(Command::Send(statement)) => self.send_statement(statement).await,
            Some(Command::InterpreterLoaded) => {
                if self.readiness.set_loaded() {
                    return self.emit(TransportEvent::Ready).await;
                }
                Flow::Continue
            }
            Some(Command::Close) | None => {
                self.reconnect_at = None;
                let step = self.machine.on_explicit_close();
                if let Some(mut link) = self.link.take() {
                    link.close().await;
                }
                let _ = self.apply(step).await;
                Flow::Stop
            }
        }
    }

    async fn send_statement(&mut self, statement: String) -> Flow {
        let Some(link) = self.link.as_mut() else {
            warn!(target: "transport", len = statement.len(), state = self.machine.state().as_str(), "send_dropped_not_connected");
            return self.emit(TransportEvent::SendDropped(statement)).await;
        };
        let frame = match encode_input(&statement) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(target: "transport.protocol", error = %e, "encode_failed");
                return Flow::Continue;
            }
        };
        debug!(target: "transport", len = statement.len(), "send");
        if let Err(e) = link.send_text(frame).await {
            warn!(target: "transport", error = %e, "send_failed");
            return self.lost_link().await;
        }
        Flow::Continue
    }

    async fn on_frame(&mut self, frame: Option<Result<String, TransportError>>) -> Flow {
        match frame {
            Some(Ok(text)) => match decode_or_drop(&text) {
                Some(msg) => {
                    debug!(target: "transport", kind = msg.kind_label(), "message");
                    self.emit(TransportEvent::Message(msg)).await
                }
                None => Flow::Continue,
            },
            Some(Err(e)) => {
                warn!(target: "transport", error = %e, "receive_failed");
                self.lost_link().await
            }
            None => {
                info!(target: "transport", "peer_closed");
                self.lost_link().await
            }
        }
    }

    /// Commands keep flowing while the attempt is pending, so a close never waits on a
    /// stalled handshake.
    async fn attempt_connect(&mut self) -> Flow {
        let connector = Arc::clone(&self.connector);
        let mut connecting = connector.connect();
        let result = loop {
            tokio::select! {
                biased;
                cmd = self.commands.recv() => {
                    if self.on_command(cmd).await == Flow::Stop {
                        debug!(target: "transport", "connect_abandoned");
                        return Flow::Stop;
                    }
                }
                result = &mut connecting => break result,
            }
        };
        match result {
            Ok(link) => {
                self.link = Some(link);
                let step = self.machine.on_open();
                if self.apply(step).await == Flow::Stop {
                    return Flow::Stop;
                }
                if self.readiness.set_connected(true) {
                    return self.emit(TransportEvent::Ready).await;
                }
                Flow::Continue
            }
            Err(e) => {
                warn!(target: "transport", error = %e, "connect_failed");
                let step = self.machine.on_unexpected_close();
                self.apply(step).await
            }
        }
    }

    async fn lost_link(&mut self) -> Flow {
        self.link = None;
        self.readiness.set_connected(false);
        let step = self.machine.on_unexpected_close();
        self.apply(step).await
    }

    async fn apply(&mut self, step: Step) -> Flow {
        for state in step.emitted {
            info!(target: "transport", state = state.as_str(), "status");
            if self.emit(TransportEvent::Status(state)).await == Flow::Stop {
                return Flow::Stop;
            }
        }
        if step.schedule_reconnect {
            // Replaces any pending timer.
            self.reconnect_at = Some(Instant::now() + self.backoff);
            debug!(target: "transport", backoff_ms = self.backoff.as_millis() as u64, "reconnect_scheduled");
        }
        Flow::Continue
    }

    async fn emit(&mut self, ev: TransportEvent) -> Flow {
        if self.events.send(Event::Transport(ev)).await.is_err() {
            CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
            return Flow::Stop;
        }
        Flow::Continue
    }
}

async fn next_frame(link: &mut Option<Box<dyn Link>>) -> Option<Result<String, TransportError>> {
    match link {
        Some(link) => link.recv_text().await,
        None => std::future::pending().await,
    }
}
