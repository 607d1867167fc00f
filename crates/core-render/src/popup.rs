//! Completion popup rows.

use core_state::CompletionState;
use crossterm::style::Stylize;

pub const POPUP_MAX_ENTRIES: usize = 10;
const MORE_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupRow {
    Entry { text: String, selected: bool },
    /// Hidden candidates above or below the window.
    More,
}

impl PopupRow {
    pub fn plain(&self) -> &str {
        match self {
            PopupRow::Entry { text, .. } => text,
            PopupRow::More => MORE_MARKER,
        }
    }

    pub fn styled(&self) -> String {
        match self {
            PopupRow::Entry {
                text,
                selected: true,
            } => format!("{}", text.as_str().reverse()),
            PopupRow::Entry { text, .. } => text.clone(),
            PopupRow::More => format!("{}", MORE_MARKER.dark_grey()),
        }
    }
}

/// Window of at most `max` candidates that keeps the selection visible, with `...` rows for the
/// parts cut off.
pub fn popup_rows(state: &CompletionState, max: usize) -> Vec<PopupRow> {
    let len = state.candidates.len();
    if len == 0 {
        return Vec::new();
    }
    let max = max.max(1);
    let selected = state.selected.min(len - 1);
    let start = selected
        .saturating_sub(max / 2)
        .min(len.saturating_sub(max));
    let end = (start + max).min(len);

    let mut rows = Vec::with_capacity(end - start + 2);
    if start > 0 {
        rows.push(PopupRow::More);
    }
    rows.extend(
        state.candidates[start..end]
            .iter()
            .enumerate()
            .map(|(i, text)| PopupRow::Entry {
                text: text.clone(),
                selected: start + i == selected,
            }),
    );
    if end < len {
        rows.push(PopupRow::More);
    }
    rows
}
