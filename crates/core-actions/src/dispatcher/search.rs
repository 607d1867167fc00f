//! Reverse incremental search over history.
//!
//! The query is edited with text and Backspace only; cursor motion and line edits are disabled
//! while searching. Enter takes the current match (or an empty line when there is none),
//! Ctrl-C / Ctrl-G leave the line as it was before the search started.

use crate::{Effect, RedrawKind};
use core_input::Key;
use core_state::{Mode, SessionState};

pub(super) fn handle(state: &mut SessionState, key: Key) -> Vec<Effect> {
    let Mode::Searching { query, matched } = &mut state.mode else {
        return Vec::new();
    };
    match key {
        Key::Text(text) => {
            query.push_str(&text);
            *matched = state.history.search(query, None);
        }
        Key::Backspace => {
            if query.pop().is_none() {
                return Vec::new();
            }
            *matched = state.history.search(query, None);
        }
        Key::ReverseSearch => {
            // Older match below the current one; stay put when there is none.
            if let Some(next) = state.history.search(query, *matched) {
                *matched = Some(next);
            }
        }
        Key::Enter => {
            let line = matched
                .and_then(|i| state.history.get(i))
                .unwrap_or_default()
                .to_string();
            state.mode = Mode::Normal;
            state.history_index = None;
            state.set_line(line);
        }
        Key::Interrupt | Key::Cancel | Key::Escape => state.mode = Mode::Normal,
        _ => return Vec::new(),
    }
    vec![Effect::Redraw(RedrawKind::Immediate)]
}
