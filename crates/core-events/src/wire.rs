//! Inbound wire records delivered by the shell session.
//!
//! Records are JSON objects tagged by `kind`. Decoding (and rejection of malformed payloads)
//! lives in `core-transport`; these types only describe the shape so the runtime loop can
//! match on them without depending on the transport crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Output {
        output: String,
    },
    TaskError {
        error: String,
    },
    Error {
        error: String,
    },
    OutputFromOtherStream {
        output: String,
        stream_id: String,
    },
    ControlFlow {
        signal: ControlFlowSignal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        portal_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlFlowSignal {
    PortalUpgrade,
    PortalDowngrade,
    TaskQueued,
}

impl ServerMessage {
    /// Stable label for logs (never includes payload text).
    pub fn kind_label(&self) -> &'static str {
        match self {
            ServerMessage::Output { .. } => "output",
            ServerMessage::TaskError { .. } => "task_error",
            ServerMessage::Error { .. } => "error",
            ServerMessage::OutputFromOtherStream { .. } => "output_from_other_stream",
            ServerMessage::ControlFlow { .. } => "control_flow",
        }
    }
}
