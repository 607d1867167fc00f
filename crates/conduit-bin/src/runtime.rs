//! Event loop: the single owner of the session state.
//!
//! `SessionCore` is the synchronous half (event in, terminal bytes and outbound statements out)
//! so it can be driven directly in tests. `SessionRuntime` adds the async plumbing: the event
//! channel, the interpreter loader, the debounce deadline and the transport handle.

use crate::inbound::notice_for;
use anyhow::Result;
use core_actions::{CommittedLine, DispatchContext, Effect, RedrawKind, Tone, dispatch};
use core_events::{ConnectionState, Event, InputEvent, TransportEvent};
use core_input::{AsyncInputShutdown, Key, KeyStream};
use core_interp::{LoadError, LoadedInterpreter};
use core_render::{Highlighter, RedrawScheduler, Renderer};
use core_state::{HistoryBackend, SessionState};
use core_transport::SessionTransport;
use crossterm::style::Color;
use std::fmt;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

pub(crate) type LoaderHandle = JoinHandle<Result<LoadedInterpreter, LoadError>>;

pub(crate) const READY_NOTICE: &str = "Connected.";
const SOURCE_JOIN_TIMEOUT: Duration = Duration::from_millis(200);
/// How long a partial escape sequence may wait for its remaining bytes.
const ESCAPE_HOLD: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownReason {
    UserClose,
    InputClosed,
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::UserClose => "user_close",
            ShutdownReason::InputClosed => "input_closed",
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Break(ShutdownReason),
}

enum InterpSlot {
    Loading,
    Ready(Box<LoadedInterpreter>),
    Failed,
}

fn tone_color(tone: Tone) -> Option<Color> {
    match tone {
        Tone::Plain => None,
        Tone::Error => Some(Color::Red),
        Tone::Warning => Some(Color::Yellow),
        Tone::Dim => Some(Color::DarkGrey),
    }
}

pub(crate) struct SessionCore<W: Write> {
    out: W,
    state: SessionState,
    renderer: Renderer,
    scheduler: RedrawScheduler,
    keys: KeyStream,
    interp: InterpSlot,
    history: Box<dyn HistoryBackend>,
    trigger_chars: Vec<char>,
    outbox: Vec<String>,
    gate_notice_shown: bool,
    seen_connected: bool,
    escape_deadline: Option<Instant>,
}

impl<W: Write> SessionCore<W> {
    pub(crate) fn new(
        out: W,
        state: SessionState,
        renderer: Renderer,
        scheduler: RedrawScheduler,
        history: Box<dyn HistoryBackend>,
        trigger_chars: Vec<char>,
    ) -> Self {
        Self {
            out,
            state,
            renderer,
            scheduler,
            keys: KeyStream::new(),
            interp: InterpSlot::Loading,
            history,
            trigger_chars,
            outbox: Vec::new(),
            gate_notice_shown: false,
            seen_connected: false,
            escape_deadline: None,
        }
    }

    /// Banner line, then the first prompt.
    pub(crate) fn start(&mut self, banner: &str) {
        self.print(banner, Tone::Plain);
        self.redraw_now();
    }

    pub(crate) fn install_interpreter(&mut self, loaded: LoadedInterpreter) {
        info!(target: "runtime", docs = loaded.docs.len(), "interpreter_ready");
        self.renderer.set_highlighter(Highlighter::new(&loaded.docs));
        self.interp = InterpSlot::Ready(Box::new(loaded));
        self.redraw_now();
    }

    pub(crate) fn interpreter_failed(&mut self, err: &LoadError) {
        error!(target: "runtime", error = %err, "interpreter_unavailable");
        self.interp = InterpSlot::Failed;
        self.print(&format!("Interpreter failed to load: {err}"), Tone::Error);
        self.redraw_now();
    }

    /// Earliest of the debounce deadline and the held-escape deadline.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        match (self.scheduler.deadline(), self.escape_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Flush a held escape prefix and draw if their deadlines have passed.
    pub(crate) fn flush_due(&mut self, now: Instant) -> LoopControl {
        let mut control = LoopControl::Continue;
        if self.escape_deadline.is_some_and(|at| at <= now) {
            self.escape_deadline = None;
            let keys = self.keys.flush_held();
            control = self.dispatch_keys(keys);
        }
        if self.scheduler.take_due(now) {
            self.draw();
        }
        control
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn handle_event(&mut self, event: Event) -> LoopControl {
        match event {
            Event::Input(InputEvent::Chunk(chunk)) => self.handle_chunk(&chunk),
            Event::Input(InputEvent::Resize(width, _)) => {
                debug!(target: "runtime", width, "resize");
                self.renderer.set_width(width);
                self.redraw_now();
                LoopControl::Continue
            }
            Event::Input(InputEvent::Eof) => LoopControl::Break(ShutdownReason::InputClosed),
            Event::Transport(ev) => {
                self.handle_transport(ev);
                LoopControl::Continue
            }
            Event::Shutdown => LoopControl::Break(ShutdownReason::ShutdownEvent),
        }
    }

    fn handle_chunk(&mut self, chunk: &str) -> LoopControl {
        if !matches!(self.interp, InterpSlot::Ready(_)) {
            if !self.gate_notice_shown {
                self.gate_notice_shown = true;
                let notice = match self.interp {
                    InterpSlot::Failed => "Interpreter unavailable; input ignored.",
                    _ => "Interpreter is still loading; input ignored.",
                };
                self.print(notice, Tone::Dim);
                self.redraw_now();
            }
            trace!(target: "runtime", len = chunk.len(), "input_gated");
            return LoopControl::Continue;
        }
        let keys = self.keys.feed(chunk);
        self.escape_deadline = self
            .keys
            .has_held_escape()
            .then(|| Instant::now() + ESCAPE_HOLD);
        self.dispatch_keys(keys)
    }

    fn dispatch_keys(&mut self, keys: Vec<Key>) -> LoopControl {
        let InterpSlot::Ready(loaded) = &mut self.interp else {
            return LoopControl::Continue;
        };
        let loaded = &mut **loaded;
        let mut ctx = DispatchContext {
            interp: &mut loaded.repl,
            docs: &loaded.docs,
            trigger_chars: &self.trigger_chars,
        };
        // Dispatch the whole chunk first; a redraw always shows the latest state and committed
        // lines carry their own snapshot, so applying afterwards draws the same thing.
        let mut effects = Vec::new();
        for key in keys {
            let step = dispatch(&mut self.state, key, &mut ctx);
            let closing = step.contains(&Effect::Close);
            effects.extend(step);
            if closing {
                break;
            }
        }
        self.apply(effects)
    }

    fn handle_transport(&mut self, ev: TransportEvent) {
        match ev {
            TransportEvent::Status(state) => self.on_status(state),
            TransportEvent::Message(msg) => {
                if let Some(notice) = notice_for(&msg, &mut self.state) {
                    self.print(&notice.text, notice.tone);
                }
                self.redraw_now();
            }
            TransportEvent::SendDropped(statement) => {
                warn!(target: "runtime", len = statement.len(), "statement_not_sent");
                self.print(&format!("Not connected; not sent: {statement}"), Tone::Warning);
                self.redraw_now();
            }
            TransportEvent::Ready => {
                info!(target: "runtime", "session_ready");
                self.print(READY_NOTICE, Tone::Plain);
                self.redraw_now();
            }
        }
    }

    fn on_status(&mut self, state: ConnectionState) {
        info!(target: "runtime", state = state.as_str(), "connection_status");
        let notice = match state {
            ConnectionState::Reconnecting => Some("Connection lost; reconnecting..."),
            ConnectionState::Connected if self.seen_connected => Some("Reconnected."),
            _ => None,
        };
        if state == ConnectionState::Connected {
            self.seen_connected = true;
        }
        if let Some(notice) = notice {
            self.print(notice, Tone::Dim);
            self.redraw_now();
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) -> LoopControl {
        for effect in effects {
            trace!(target: "runtime", effect = effect.label(), "apply");
            let result = match effect {
                Effect::Redraw(RedrawKind::Immediate) => {
                    self.redraw_now();
                    Ok(())
                }
                Effect::Redraw(RedrawKind::Debounced) => {
                    self.scheduler.request(Instant::now());
                    Ok(())
                }
                Effect::Commit(CommittedLine {
                    prompt,
                    buffer,
                    marker,
                }) => {
                    self.scheduler.cancel();
                    self.renderer.commit(&mut self.out, &prompt, &buffer, marker)
                }
                Effect::Print { text, tone } => {
                    self.renderer
                        .print_above(&mut self.out, &text, tone_color(tone))
                }
                Effect::Send(statement) => {
                    self.outbox.push(statement);
                    Ok(())
                }
                Effect::PersistHistory => {
                    if let Err(e) = self.history.save(self.state.history.entries()) {
                        warn!(target: "history", error = %e, "history_save_failed");
                    }
                    Ok(())
                }
                Effect::ClearScreen => self.renderer.clear_screen(&mut self.out),
                Effect::Close => return LoopControl::Break(ShutdownReason::UserClose),
            };
            if let Err(e) = result {
                error!(target: "render", error = %e, "render_failed");
            }
        }
        LoopControl::Continue
    }

    /// Leave the live line in the scrollback so the shell prompt starts on a fresh row.
    pub(crate) fn finish(&mut self) {
        self.scheduler.cancel();
        let prompt = self.state.prompt.clone();
        let buffer = self.state.buffer.clone();
        if let Err(e) = self.renderer.commit(&mut self.out, &prompt, &buffer, None) {
            error!(target: "render", error = %e, "final_commit_failed");
        }
    }

    fn print(&mut self, text: &str, tone: Tone) {
        if let Err(e) = self
            .renderer
            .print_above(&mut self.out, text, tone_color(tone))
        {
            error!(target: "render", error = %e, "print_failed");
        }
    }

    fn redraw_now(&mut self) {
        self.scheduler.cancel();
        self.draw();
    }

    fn draw(&mut self) {
        if let Err(e) = self.renderer.redraw(&mut self.out, &self.state) {
            error!(target: "render", error = %e, "redraw_failed");
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn output(&self) -> &W {
        &self.out
    }
}

/// Tasks spawned at startup that the runtime stops on the way out.
pub(crate) struct BackgroundTasks {
    pub input_task: JoinHandle<()>,
    pub input_shutdown: AsyncInputShutdown,
    pub source_handles: Vec<JoinHandle<()>>,
}

pub(crate) struct SessionRuntime<W: Write> {
    core: SessionCore<W>,
    rx: Receiver<Event>,
    transport: Option<SessionTransport>,
    loader: Option<LoaderHandle>,
    tasks: Option<BackgroundTasks>,
}

impl<W: Write> SessionRuntime<W> {
    pub(crate) fn new(
        core: SessionCore<W>,
        rx: Receiver<Event>,
        transport: SessionTransport,
        loader: LoaderHandle,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            core,
            rx,
            transport: Some(transport),
            loader: Some(loader),
            tasks: Some(tasks),
        }
    }

    pub(crate) async fn run(mut self) -> Result<ShutdownReason> {
        let span = tracing::debug_span!(target: "runtime", "event_loop");
        let _enter = span.enter();

        let reason = loop {
            let deadline = self.core.deadline().map(tokio::time::Instant::from_std);
            let control = tokio::select! {
                biased;
                event = self.rx.recv() => match event {
                    Some(event) => self.core.handle_event(event),
                    None => LoopControl::Break(ShutdownReason::ChannelClosed),
                },
                loaded = wait_loader(&mut self.loader) => {
                    self.loader = None;
                    self.on_loader_finished(loaded).await;
                    LoopControl::Continue
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(tokio::time::Instant::now)), if deadline.is_some() => {
                    self.core.flush_due(Instant::now())
                }
            };
            self.flush_outbox().await;
            if let LoopControl::Break(reason) = control {
                break reason;
            }
        };

        self.finalize_shutdown(reason).await;
        Ok(reason)
    }

    async fn on_loader_finished(&mut self, loaded: Result<LoadedInterpreter, LoadError>) {
        match loaded {
            Ok(loaded) => {
                self.core.install_interpreter(loaded);
                if let Some(transport) = &self.transport
                    && let Err(e) = transport.interpreter_loaded().await
                {
                    warn!(target: "runtime", error = %e, "readiness_signal_failed");
                }
            }
            Err(e) => self.core.interpreter_failed(&e),
        }
    }

    async fn flush_outbox(&mut self) {
        for statement in self.core.take_outbox() {
            let Some(transport) = &self.transport else {
                warn!(target: "runtime", len = statement.len(), "send_after_close_dropped");
                continue;
            };
            if let Err(e) = transport.send(statement).await {
                warn!(target: "runtime", error = %e, "send_failed");
            }
        }
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");
        self.core.finish();

        if let Some(transport) = self.transport.take() {
            transport.close().await;
            trace!(target: "runtime.shutdown", reason = reason.as_str(), "transport_closed");
        }
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
        self.rx.close();

        if let Some(tasks) = self.tasks.take() {
            tasks.input_shutdown.signal();
            for handle in tasks
                .source_handles
                .into_iter()
                .chain(std::iter::once(tasks.input_task))
            {
                handle.abort();
                match tokio::time::timeout(SOURCE_JOIN_TIMEOUT, handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) if err.is_cancelled() => {}
                    Ok(Err(err)) => error!(
                        target: "runtime.shutdown",
                        reason = reason.as_str(),
                        ?err,
                        "task_join_failed"
                    ),
                    Err(_) => warn!(
                        target: "runtime.shutdown",
                        reason = reason.as_str(),
                        "task_join_timeout"
                    ),
                }
            }
        }
        log_counters(reason);
        log_shutdown_stage(reason, "complete");
    }
}

fn log_counters(reason: ShutdownReason) {
    use core_events::{
        CHANNEL_SEND_FAILURES, ESCAPE_SEQUENCES, INPUT_CHUNKS, MALFORMED_MESSAGES, PASTE_LINES,
        RECONNECT_ATTEMPTS, SUBMISSIONS,
    };
    use std::sync::atomic::Ordering::Relaxed;
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        input_chunks = INPUT_CHUNKS.load(Relaxed),
        escape_sequences = ESCAPE_SEQUENCES.load(Relaxed),
        paste_lines = PASTE_LINES.load(Relaxed),
        submissions = SUBMISSIONS.load(Relaxed),
        malformed_messages = MALFORMED_MESSAGES.load(Relaxed),
        reconnect_attempts = RECONNECT_ATTEMPTS.load(Relaxed),
        channel_send_failures = CHANNEL_SEND_FAILURES.load(Relaxed),
        "session_counters"
    );
}

async fn wait_loader(loader: &mut Option<LoaderHandle>) -> Result<LoadedInterpreter, LoadError> {
    match loader {
        Some(handle) => match handle.await {
            Ok(result) => result,
            Err(e) => Err(LoadError::Join(e.to_string())),
        },
        None => std::future::pending().await,
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
