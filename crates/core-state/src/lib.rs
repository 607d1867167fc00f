//! Session state: the live edit line, the interaction mode, and history browsing.
//!
//! `SessionState` is owned by the runtime loop and mutated only through the dispatcher; no
//! other task touches it. Mode-specific data lives inside the `Mode` variant so a search query
//! or completion list cannot outlive the mode that created it.
//!
//! Invariants upheld by every mutator here:
//! - `cursor <= buffer.len()` and sits on a grapheme boundary.
//! - `history_index` is `None` (not browsing) or a valid index into `history`.

pub mod history;

pub use history::{
    History, HistoryBackend, HistoryError, JsonFileBackend, MAX_HISTORY, MemoryBackend,
    load_or_empty,
};

use core_text::Edit;
use core_text::edit::clamp_cursor;

pub const PRIMARY_PROMPT: &str = ">>> ";
pub const CONTINUATION_PROMPT: &str = ".. ";

/// Open completion popup: candidates for `buffer[replace_start..cursor]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionState {
    pub candidates: Vec<String>,
    pub replace_start: usize,
    pub selected: usize,
}

impl CompletionState {
    pub fn new(candidates: Vec<String>, replace_start: usize) -> Self {
        Self {
            candidates,
            replace_start,
            selected: 0,
        }
    }

    pub fn select_next(&mut self) {
        if !self.candidates.is_empty() {
            self.selected = (self.selected + 1) % self.candidates.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.candidates.is_empty() {
            let len = self.candidates.len();
            self.selected = (self.selected + len - 1) % len;
        }
    }

    pub fn selected_candidate(&self) -> Option<&str> {
        self.candidates.get(self.selected).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    /// Reverse-i-search. `matched` is the history index currently shown, if any.
    Searching {
        query: String,
        matched: Option<usize>,
    },
    CompletionOpen(CompletionState),
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Searching { .. } => "searching",
            Mode::CompletionOpen(_) => "completion",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub buffer: String,
    pub cursor: usize,
    pub history: History,
    pub history_index: Option<usize>,
    pub prompt: String,
    pub mode: Mode,
    pub pending_block: String,
    /// Set by portal upgrade notices from the server.
    pub portal_id: Option<i64>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(History::default())
    }
}

impl SessionState {
    pub fn new(history: History) -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            history,
            history_index: None,
            prompt: PRIMARY_PROMPT.to_string(),
            mode: Mode::Normal,
            pending_block: String::new(),
            portal_id: None,
        }
    }

    pub fn apply(&mut self, edit: Edit) {
        self.buffer = edit.buffer;
        self.cursor = clamp_cursor(&self.buffer, edit.cursor);
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = clamp_cursor(&self.buffer, cursor);
    }

    pub fn set_line(&mut self, line: impl Into<String>) {
        self.buffer = line.into();
        self.cursor = self.buffer.len();
    }

    pub fn clear_line(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    pub fn is_blank(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    pub fn cursor_at_end(&self) -> bool {
        self.cursor == self.buffer.len()
    }

    /// Back to an empty primary-prompt line: drops any pending block and history browsing.
    pub fn reset_to_primary(&mut self) {
        self.clear_line();
        self.pending_block.clear();
        self.history_index = None;
        self.prompt = PRIMARY_PROMPT.to_string();
        self.mode = Mode::Normal;
    }

    /// Up arrow. From "not browsing" jump to the newest entry; otherwise step older, stopping
    /// at the oldest. Returns false when history is empty.
    pub fn history_prev(&mut self) -> bool {
        if self.history.is_empty() {
            return false;
        }
        let idx = match self.history_index {
            None => self.history.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.browse_to(idx);
        true
    }

    /// Down arrow. Past the newest entry returns to an empty line. Returns false when not
    /// browsing.
    pub fn history_next(&mut self) -> bool {
        let Some(i) = self.history_index else {
            return false;
        };
        if i + 1 < self.history.len() {
            self.browse_to(i + 1);
        } else {
            self.history_index = None;
            self.clear_line();
        }
        true
    }

    fn browse_to(&mut self, idx: usize) {
        let line = self.history.get(idx).unwrap_or_default().to_string();
        self.history_index = Some(idx);
        self.set_line(line);
    }

    /// Search query and current match text, when searching.
    pub fn search_view(&self) -> Option<(&str, &str)> {
        match &self.mode {
            Mode::Searching { query, matched } => {
                let text = matched.and_then(|i| self.history.get(i)).unwrap_or("");
                Some((query.as_str(), text))
            }
            _ => None,
        }
    }

    pub fn completion(&self) -> Option<&CompletionState> {
        match &self.mode {
            Mode::CompletionOpen(c) => Some(c),
            _ => None,
        }
    }
}
