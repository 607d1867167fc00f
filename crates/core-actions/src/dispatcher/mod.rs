//! Mode state machine.
//!
//! * `normal`     - line editing, history browsing, control keys
//! * `submit`     - Enter in normal mode (interpreter round trip)
//! * `search`     - reverse-i-search
//! * `completion` - completion requests and the open popup
//!
//! An open popup sees the key first; keys it does not consume close it and fall through to
//! normal handling, so typing past a suggestion list just keeps typing.

use crate::Effect;
use core_input::Key;
use core_interp::{DocRegistry, Interpreter};
use core_state::{Mode, SessionState};
use tracing::trace;

mod completion;
mod normal;
mod search;
mod submit;

pub use completion::request_completion;

/// Collaborators a transition may call into.
pub struct DispatchContext<'a> {
    pub interp: &'a mut dyn Interpreter,
    pub docs: &'a DocRegistry,
    /// Typing one of these opens the completion popup.
    pub trigger_chars: &'a [char],
}

pub fn dispatch(state: &mut SessionState, key: Key, ctx: &mut DispatchContext<'_>) -> Vec<Effect> {
    let mode = state.mode.label();
    let key_label = key.label();
    let effects = match state.mode {
        Mode::Searching { .. } => search::handle(state, key),
        Mode::CompletionOpen(_) => match completion::handle_open(state, key) {
            Ok(effects) => effects,
            Err(key) => {
                let mut effects = normal::handle(state, key, ctx);
                // The popup rows must be cleared even when the forwarded key was a no-op.
                if effects.is_empty() {
                    effects.push(Effect::Redraw(crate::RedrawKind::Immediate));
                }
                effects
            }
        },
        Mode::Normal => normal::handle(state, key, ctx),
    };
    trace!(
        target: "actions.dispatch",
        mode,
        key = key_label,
        effects = effects.len(),
        cursor = state.cursor,
        "dispatch"
    );
    effects
}

#[cfg(test)]
pub(crate) mod test_support {
    use core_interp::{Completions, InputOutcome, Interpreter};
    use std::collections::VecDeque;

    /// Scripted interpreter: replays queued outcomes and fixed completions, records calls.
    #[derive(Default)]
    pub struct FakeInterpreter {
        pub outcomes: VecDeque<InputOutcome>,
        pub completions: Completions,
        pub inputs: Vec<String>,
        pub resets: usize,
    }

    impl FakeInterpreter {
        pub fn with_outcomes(outcomes: Vec<InputOutcome>) -> Self {
            Self {
                outcomes: outcomes.into(),
                ..Self::default()
            }
        }

        pub fn with_completions(suggestions: &[&str], start: usize) -> Self {
            Self {
                completions: Completions {
                    suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
                    start,
                },
                ..Self::default()
            }
        }
    }

    impl Interpreter for FakeInterpreter {
        fn input(&mut self, line: &str) -> InputOutcome {
            self.inputs.push(line.to_string());
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| InputOutcome::complete(None))
        }

        fn complete(&self, _line: &str, _cursor: usize) -> Completions {
            self.completions.clone()
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }
}
