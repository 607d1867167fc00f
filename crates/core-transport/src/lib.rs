//! Persistent, self-healing session transport.
//!
//! `SessionTransport::spawn` runs one task per session. The task owns the socket, the
//! `ConnectionMachine` and the one-shot readiness latch, and reports everything as
//! `TransportEvent`s on the shared event channel; the runtime loop never touches the socket.
//! Outbound statements go through the handle and are sent unvalidated. Inbound frames are
//! decoded and malformed ones dropped. Unexpected closes reconnect after a fixed backoff until
//! the handle is explicitly closed.

pub mod adapter;
pub mod connector;
pub mod machine;
pub mod protocol;

pub use adapter::{DEFAULT_RECONNECT_BACKOFF, SessionTransport};
pub use connector::{Connector, Link, WsConnector, endpoint_url};
pub use machine::{ConnectionMachine, ReadinessGate};
pub use protocol::{ClientMessage, ProtocolError, decode_inbound, encode_input};

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("websocket error: {0}")]
    Socket(#[source] Box<tungstenite::Error>),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("session transport closed")]
    Closed,
}

impl From<tungstenite::Error> for TransportError {
    fn from(e: tungstenite::Error) -> Self {
        TransportError::Socket(Box::new(e))
    }
}
