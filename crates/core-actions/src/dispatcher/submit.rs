//! Enter in normal mode: feed the line to the interpreter and act on its verdict.

use super::DispatchContext;
use crate::{CommittedLine, Effect, RedrawKind, Tone};
use core_events::SUBMISSIONS;
use core_interp::InputStatus;
use core_state::{CONTINUATION_PROMPT, SessionState};
use std::sync::atomic::Ordering;
use tracing::debug;

pub(super) fn handle(state: &mut SessionState, ctx: &mut DispatchContext<'_>) -> Vec<Effect> {
    let mut effects = vec![Effect::Commit(CommittedLine {
        prompt: state.prompt.clone(),
        buffer: state.buffer.clone(),
        marker: None,
    })];
    let line = std::mem::take(&mut state.buffer);
    state.cursor = 0;
    state.history_index = None;
    state.pending_block.push_str(&line);
    state.pending_block.push('\n');

    let outcome = ctx.interp.input(&line);
    debug!(
        target: "actions.dispatch",
        status = ?outcome.status,
        line_len = line.len(),
        block_len = state.pending_block.len(),
        "submit"
    );
    match outcome.status {
        InputStatus::Complete => {
            let block = std::mem::take(&mut state.pending_block);
            let recorded = block.trim_end();
            if !recorded.trim().is_empty() {
                state.history.push(recorded);
                effects.push(Effect::PersistHistory);
            }
            let statement = outcome.payload.unwrap_or(block);
            if !statement.trim().is_empty() {
                SUBMISSIONS.fetch_add(1, Ordering::Relaxed);
                effects.push(Effect::Send(statement));
            }
            state.reset_to_primary();
        }
        InputStatus::Incomplete => {
            state.prompt = outcome
                .prompt
                .unwrap_or_else(|| CONTINUATION_PROMPT.to_string());
        }
        InputStatus::Error => {
            let message = outcome.message.unwrap_or_default();
            effects.push(Effect::print(format!("Error: {message}"), Tone::Error));
            state.reset_to_primary();
        }
    }
    effects.push(Effect::Redraw(RedrawKind::Immediate));
    effects
}
