//! Completion requests and the open popup.

use super::DispatchContext;
use crate::{Effect, RedrawKind};
use core_input::Key;
use core_state::{CompletionState, Mode, SessionState};
use core_text::edit;
use tracing::debug;

/// Ask the interpreter for candidates at the cursor.
///
/// Tab (`triggered == false`) splices a lone candidate directly and opens the popup for more
/// than one. A trigger character opens the popup for any non-empty result. Returns no effects
/// when nothing changed.
pub fn request_completion(
    state: &mut SessionState,
    ctx: &mut DispatchContext<'_>,
    triggered: bool,
) -> Vec<Effect> {
    let completions = ctx.interp.complete(&state.buffer, state.cursor);
    debug!(
        target: "actions.dispatch",
        candidates = completions.suggestions.len(),
        start = completions.start,
        triggered,
        "completion_request"
    );
    match completions.suggestions.len() {
        0 => Vec::new(),
        1 if !triggered => {
            if splice(state, completions.start, &completions.suggestions[0]) {
                vec![Effect::Redraw(RedrawKind::Immediate)]
            } else {
                Vec::new()
            }
        }
        _ => {
            if completions.start > state.cursor {
                return Vec::new();
            }
            state.mode = Mode::CompletionOpen(CompletionState::new(
                completions.suggestions,
                completions.start,
            ));
            vec![Effect::Redraw(RedrawKind::Immediate)]
        }
    }
}

/// Keys while the popup is open. `Err` hands the key back after closing the popup.
pub(super) fn handle_open(state: &mut SessionState, key: Key) -> Result<Vec<Effect>, Key> {
    let Mode::CompletionOpen(popup) = &mut state.mode else {
        return Err(key);
    };
    match key {
        Key::Tab | Key::Down => popup.select_next(),
        Key::Up => popup.select_prev(),
        Key::Enter => {
            let start = popup.replace_start;
            let chosen = popup.selected_candidate().map(str::to_string);
            state.mode = Mode::Normal;
            if let Some(chosen) = chosen {
                splice(state, start, &chosen);
            }
        }
        Key::Escape | Key::Cancel => state.mode = Mode::Normal,
        other => {
            state.mode = Mode::Normal;
            return Err(other);
        }
    }
    Ok(vec![Effect::Redraw(RedrawKind::Immediate)])
}

fn splice(state: &mut SessionState, start: usize, text: &str) -> bool {
    match edit::splice(&state.buffer, start, state.cursor, text) {
        Some(e) => {
            state.apply(e);
            true
        }
        None => {
            debug!(target: "actions.dispatch", start, cursor = state.cursor, "completion_splice_ignored");
            false
        }
    }
}
