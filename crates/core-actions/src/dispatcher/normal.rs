//! Normal-mode line editing.

use super::{DispatchContext, completion, submit};
use crate::{CommittedLine, Effect, RedrawKind, Tone};
use core_input::{Key, TAB_INDENT};
use core_state::{Mode, SessionState};
use core_text::edit;

pub(super) fn handle(state: &mut SessionState, key: Key, ctx: &mut DispatchContext<'_>) -> Vec<Effect> {
    let immediate = || vec![Effect::Redraw(RedrawKind::Immediate)];
    match key {
        Key::Enter => submit::handle(state, ctx),
        Key::Tab => {
            if state.is_blank() {
                insert_text(state, TAB_INDENT)
            } else {
                completion::request_completion(state, ctx, false)
            }
        }
        Key::Text(text) => {
            let triggered = text
                .chars()
                .last()
                .is_some_and(|c| ctx.trigger_chars.contains(&c));
            let effects = insert_text(state, &text);
            if triggered {
                let opened = completion::request_completion(state, ctx, true);
                if !opened.is_empty() {
                    return opened;
                }
                return immediate();
            }
            effects
        }
        Key::Backspace => {
            let at_end = state.cursor_at_end();
            state.apply(edit::delete_back(&state.buffer, state.cursor));
            if at_end {
                vec![Effect::Redraw(RedrawKind::Debounced)]
            } else {
                immediate()
            }
        }
        Key::Delete => {
            state.apply(edit::delete_forward(&state.buffer, state.cursor));
            immediate()
        }
        Key::Left => move_to(state, edit::move_left(&state.buffer, state.cursor)),
        Key::Right => move_to(state, edit::move_right(&state.buffer, state.cursor)),
        Key::Home => move_to(state, edit::home(&state.buffer)),
        Key::End => move_to(state, edit::end(&state.buffer)),
        Key::WordLeft => move_to(state, edit::word_left(&state.buffer, state.cursor)),
        Key::WordRight => move_to(state, edit::word_right(&state.buffer, state.cursor)),
        Key::ClearLine => {
            state.apply(edit::clear_line());
            immediate()
        }
        Key::KillToEnd => {
            state.apply(edit::kill_to_end(&state.buffer, state.cursor));
            immediate()
        }
        Key::DeleteWordBack => {
            state.apply(edit::delete_word_back(&state.buffer, state.cursor));
            immediate()
        }
        Key::DeleteWordForward => {
            state.apply(edit::delete_word_forward(&state.buffer, state.cursor));
            immediate()
        }
        Key::Up => {
            if state.history_prev() {
                immediate()
            } else {
                Vec::new()
            }
        }
        Key::Down => {
            if state.history_next() {
                immediate()
            } else {
                Vec::new()
            }
        }
        Key::Interrupt => {
            ctx.interp.reset();
            let committed = CommittedLine {
                prompt: state.prompt.clone(),
                buffer: state.buffer.clone(),
                marker: Some("^C"),
            };
            state.reset_to_primary();
            vec![Effect::Commit(committed), Effect::Redraw(RedrawKind::Immediate)]
        }
        Key::EndOfInput => {
            if state.buffer.is_empty() && state.pending_block.is_empty() {
                vec![Effect::Close]
            } else {
                state.apply(edit::delete_forward(&state.buffer, state.cursor));
                immediate()
            }
        }
        Key::ReverseSearch => {
            state.mode = Mode::Searching {
                query: String::new(),
                matched: None,
            };
            immediate()
        }
        Key::ClearScreen => vec![Effect::ClearScreen, Effect::Redraw(RedrawKind::Immediate)],
        Key::ShowDocs => match ctx.docs.lookup_at(&state.buffer, state.cursor) {
            Some((_, entry)) => vec![
                Effect::print(
                    format!("{}\n  {}", entry.signature, entry.description),
                    Tone::Dim,
                ),
                Effect::Redraw(RedrawKind::Immediate),
            ],
            None => Vec::new(),
        },
        Key::Escape | Key::Cancel | Key::Ignored => Vec::new(),
    }
}

/// Insert at the cursor. A single character typed at the end of the line is the common typing
/// case and only needs a debounced redraw.
fn insert_text(state: &mut SessionState, text: &str) -> Vec<Effect> {
    let typing = state.cursor_at_end() && text.chars().count() == 1;
    state.apply(edit::insert(&state.buffer, state.cursor, text));
    if typing {
        vec![Effect::Redraw(RedrawKind::Debounced)]
    } else {
        vec![Effect::Redraw(RedrawKind::Immediate)]
    }
}

fn move_to(state: &mut SessionState, cursor: usize) -> Vec<Effect> {
    state.set_cursor(cursor);
    vec![Effect::Redraw(RedrawKind::Immediate)]
}
