//! JSON wire codec for the shell session.
//!
//! Outbound traffic is a single record kind (`INPUT`). Inbound records decode into
//! `core_events::ServerMessage`; anything that fails to decode is a `ProtocolError` and is
//! dropped by the adapter after logging (only the length is logged, never the payload).

use core_events::{MALFORMED_MESSAGES, ServerMessage};
use serde::Serialize;
use std::sync::atomic::Ordering;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed server message: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("failed to encode client message: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    Input { input: String },
}

pub fn encode_input(statement: &str) -> Result<String, ProtocolError> {
    serde_json::to_string(&ClientMessage::Input {
        input: statement.to_string(),
    })
    .map_err(ProtocolError::Encode)
}

pub fn decode_inbound(text: &str) -> Result<ServerMessage, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Malformed)
}

/// Decode, or log and count a malformed frame and return `None`.
pub fn decode_or_drop(text: &str) -> Option<ServerMessage> {
    match decode_inbound(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            MALFORMED_MESSAGES.fetch_add(1, Ordering::Relaxed);
            warn!(target: "transport.protocol", len = text.len(), error = %e, "malformed_message_dropped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::ControlFlowSignal;

    #[test]
    fn input_record_shape() {
        assert_eq!(
            encode_input("print(\"hi\")").unwrap(),
            r#"{"kind":"INPUT","input":"print(\"hi\")"}"#
        );
    }

    #[test]
    fn decodes_every_inbound_kind() {
        let cases = [
            r#"{"kind":"OUTPUT","output":"ok\n"}"#,
            r#"{"kind":"TASK_ERROR","error":"boom"}"#,
            r#"{"kind":"ERROR","error":"bad"}"#,
            r#"{"kind":"OUTPUT_FROM_OTHER_STREAM","output":"x","stream_id":"2"}"#,
            r#"{"kind":"CONTROL_FLOW","signal":"PORTAL_UPGRADE","portal_id":7}"#,
        ];
        for case in cases {
            assert!(decode_inbound(case).is_ok(), "{case}");
        }
        assert_eq!(
            decode_inbound(r#"{"kind":"CONTROL_FLOW","signal":"TASK_QUEUED","message":"queued"}"#)
                .unwrap(),
            ServerMessage::ControlFlow {
                signal: ControlFlowSignal::TaskQueued,
                portal_id: None,
                message: Some("queued".into()),
            }
        );
    }

    #[test]
    fn malformed_payloads_are_counted_and_dropped() {
        let before = MALFORMED_MESSAGES.load(Ordering::Relaxed);
        assert!(decode_or_drop("not json").is_none());
        assert!(decode_or_drop(r#"{"kind":"SHRUG"}"#).is_none());
        assert!(decode_or_drop(r#"{"kind":"OUTPUT"}"#).is_none());
        assert!(MALFORMED_MESSAGES.load(Ordering::Relaxed) >= before + 3);
    }

    #[test]
    fn dropped_payload_is_not_logged() {
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone, Default)]
        struct Capture(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl<'a> MakeWriter<'a> for Capture {
            type Writer = Capture;
            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(capture.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            assert!(decode_or_drop("not json hunter2").is_none());
        });
        let logged = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("transport.protocol"));
        assert!(logged.contains("malformed_message_dropped"));
        assert!(logged.contains("len=16"));
        assert!(!logged.contains("hunter2"));
    }
}
