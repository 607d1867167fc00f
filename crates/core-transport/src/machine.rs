//! Connection lifecycle and readiness, as pure state.
//!
//! ```text
//! Connecting ──open──▶ Connected ──unexpected close──▶ Disconnected ─▶ Reconnecting
//!      │                   ▲                                               │
//!      │                   └───────────────────open────────────────────────┘
//!      └──failed connect──▶ Disconnected ─▶ Reconnecting
//! any ──explicit close──▶ Disconnected (terminal, no reconnect)
//! ```
//!
//! A failed attempt while already `Reconnecting` stays there and schedules the next backoff.

use core_events::ConnectionState;

/// Result of a lifecycle input: states to report in order, and whether to arm the backoff.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Step {
    pub emitted: Vec<ConnectionState>,
    pub schedule_reconnect: bool,
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    reconnect_desired: bool,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            reconnect_desired: true,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_desired(&self) -> bool {
        self.reconnect_desired
    }

    pub fn on_open(&mut self) -> Step {
        if !self.reconnect_desired {
            return Step::default();
        }
        self.state = ConnectionState::Connected;
        Step {
            emitted: vec![ConnectionState::Connected],
            schedule_reconnect: false,
        }
    }

    /// Socket dropped or a connect attempt failed.
    pub fn on_unexpected_close(&mut self) -> Step {
        if !self.reconnect_desired {
            return Step::default();
        }
        let emitted = match self.state {
            ConnectionState::Reconnecting => Vec::new(),
            _ => vec![ConnectionState::Disconnected, ConnectionState::Reconnecting],
        };
        self.state = ConnectionState::Reconnecting;
        Step {
            emitted,
            schedule_reconnect: true,
        }
    }

    pub fn on_explicit_close(&mut self) -> Step {
        self.reconnect_desired = false;
        if self.state == ConnectionState::Disconnected {
            return Step::default();
        }
        self.state = ConnectionState::Disconnected;
        Step {
            emitted: vec![ConnectionState::Disconnected],
            schedule_reconnect: false,
        }
    }
}

/// One-shot latch: fires the first time the transport is connected while the interpreter is
/// loaded, and never again for the session.
#[derive(Debug, Default, Clone)]
pub struct ReadinessGate {
    connected: bool,
    loaded: bool,
    fired: bool,
}

impl ReadinessGate {
    pub fn set_connected(&mut self, connected: bool) -> bool {
        self.connected = connected;
        self.evaluate()
    }

    pub fn set_loaded(&mut self) -> bool {
        self.loaded = true;
        self.evaluate()
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    fn evaluate(&mut self) -> bool {
        if self.fired || !(self.connected && self.loaded) {
            return false;
        }
        self.fired = true;
        true
    }
}
