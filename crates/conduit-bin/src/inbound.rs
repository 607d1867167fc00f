//! Inbound server records to printable notices.

use core_actions::Tone;
use core_events::{ControlFlowSignal, ServerMessage};
use core_state::SessionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Notice {
    pub text: String,
    pub tone: Tone,
}

impl Notice {
    fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// Text to print above the prompt for `msg`, if any. Portal signals update `state` as well.
/// Content without a trailing newline is printed on its own row by the renderer.
pub(crate) fn notice_for(msg: &ServerMessage, state: &mut SessionState) -> Option<Notice> {
    let notice = match msg {
        ServerMessage::Output { output } | ServerMessage::OutputFromOtherStream { output, .. } => {
            Notice::new(output.as_str(), Tone::Plain)
        }
        ServerMessage::TaskError { error } | ServerMessage::Error { error } => {
            Notice::new(error.as_str(), Tone::Error)
        }
        ServerMessage::ControlFlow {
            signal,
            portal_id,
            message,
        } => match signal {
            ControlFlowSignal::TaskQueued => {
                let message = message.as_deref()?;
                Notice::new(format!("{message}\n"), Tone::Warning)
            }
            ControlFlowSignal::PortalUpgrade => {
                let id = (*portal_id)?;
                state.portal_id = Some(id);
                Notice::new(format!("[portal {id} active]"), Tone::Dim)
            }
            ControlFlowSignal::PortalDowngrade => {
                let previous = state.portal_id.take()?;
                Notice::new(format!("[portal {previous} closed]"), Tone::Dim)
            }
        },
    };
    (!notice.text.is_empty()).then_some(notice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(signal: ControlFlowSignal, portal_id: Option<i64>, message: Option<&str>) -> ServerMessage {
        ServerMessage::ControlFlow {
            signal,
            portal_id,
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn output_kinds_map_to_tones() {
        let mut state = SessionState::default();
        let out = ServerMessage::Output {
            output: "1\n".into(),
        };
        assert_eq!(
            notice_for(&out, &mut state),
            Some(Notice::new("1\n", Tone::Plain))
        );
        let other = ServerMessage::OutputFromOtherStream {
            output: "bob ran x".into(),
            stream_id: "s2".into(),
        };
        assert_eq!(notice_for(&other, &mut state).unwrap().tone, Tone::Plain);
        let err = ServerMessage::TaskError {
            error: "boom".into(),
        };
        assert_eq!(notice_for(&err, &mut state).unwrap().tone, Tone::Error);
    }

    #[test]
    fn task_queued_gets_a_newline_and_warning_tone() {
        let mut state = SessionState::default();
        let msg = control(ControlFlowSignal::TaskQueued, None, Some("queued 3"));
        assert_eq!(
            notice_for(&msg, &mut state),
            Some(Notice::new("queued 3\n", Tone::Warning))
        );
        let bare = control(ControlFlowSignal::TaskQueued, None, None);
        assert_eq!(notice_for(&bare, &mut state), None);
    }

    #[test]
    fn portal_signals_track_the_active_portal() {
        let mut state = SessionState::default();
        let up = control(ControlFlowSignal::PortalUpgrade, Some(7), None);
        assert_eq!(notice_for(&up, &mut state).unwrap().tone, Tone::Dim);
        assert_eq!(state.portal_id, Some(7));

        let down = control(ControlFlowSignal::PortalDowngrade, None, None);
        assert!(notice_for(&down, &mut state).is_some());
        assert_eq!(state.portal_id, None);
        // A second downgrade has nothing to report.
        assert_eq!(notice_for(&down, &mut state), None);
    }

    #[test]
    fn empty_output_prints_nothing() {
        let mut state = SessionState::default();
        let msg = ServerMessage::Output {
            output: String::new(),
        };
        assert_eq!(notice_for(&msg, &mut state), None);
    }
}
