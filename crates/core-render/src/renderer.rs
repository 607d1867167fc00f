//! Inline prompt renderer.
//!
//! The prompt block (prompt + buffer, or the search view, plus an open completion popup) is
//! redrawn in place below whatever output precedes it. The renderer remembers how many rows
//! separate the cursor from the top of the block; every draw moves up by that amount, clears
//! to the end of the screen and writes the new block. Output printed above the prompt clears
//! the block first and leaves the cursor at the start of a fresh row for the next redraw.

use crate::highlight::Highlighter;
use crate::layout::{self, Position};
use crate::popup::{POPUP_MAX_ENTRIES, popup_rows};
use crate::writer::Writer;
use anyhow::Result;
use core_state::SessionState;
use core_text::str_width;
use crossterm::style::{Color, Stylize};
use std::io::Write;
use tracing::trace;

pub const SEARCH_PREFIX: &str = "(reverse-i-search)";

pub struct Renderer {
    width: u16,
    /// Rows between the top of the drawn block and the cursor.
    cursor_row: usize,
    highlighter: Highlighter,
}

impl Renderer {
    pub fn new(width: u16, highlighter: Highlighter) -> Self {
        Self {
            width: width.max(1),
            cursor_row: 0,
            highlighter,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn set_width(&mut self, width: u16) {
        self.width = width.max(1);
    }

    pub fn set_highlighter(&mut self, highlighter: Highlighter) {
        self.highlighter = highlighter;
    }

    pub fn cursor_row(&self) -> usize {
        self.cursor_row
    }

    /// Back to the top-left of the current block and clear everything below.
    fn rewind(&self, w: &mut Writer) {
        w.move_up(self.cursor_row);
        w.move_to_column(0);
        w.clear_down();
    }

    pub fn redraw<W: Write>(&mut self, out: &mut W, state: &SessionState) -> Result<()> {
        let width = self.width as usize;
        let mut w = Writer::new();
        self.rewind(&mut w);

        let (plain, cursor_byte) = match state.search_view() {
            Some((query, matched)) => {
                let text = format!("{SEARCH_PREFIX}'{query}': {matched}");
                w.print(&text);
                let len = text.len();
                (text, len)
            }
            None => {
                w.print(&state.prompt);
                w.print(self.highlighter.highlight(&state.buffer));
                (
                    format!("{}{}", state.prompt, state.buffer),
                    state.prompt.len() + state.cursor,
                )
            }
        };
        if layout::ends_on_wrap(&plain, width) {
            w.newline();
        }
        let end = layout::end_position(&plain, width);
        let cursor = layout::position_of(&plain, cursor_byte, width);

        let mut bottom_row = end.row;
        if let Some(completion) = state.completion() {
            let rows = popup_rows(completion, POPUP_MAX_ENTRIES);
            let longest = rows.iter().map(|r| str_width(r.plain())).max().unwrap_or(0);
            let indent = cursor.col.min(width.saturating_sub(longest));
            for row in &rows {
                w.newline();
                w.move_to_column(indent);
                w.print(row.styled());
                bottom_row += layout::rows_spanned(row.plain(), indent, width);
            }
        }

        self.place_cursor(&mut w, bottom_row, cursor);
        trace!(
            target: "render",
            rows = bottom_row + 1,
            cursor_row = cursor.row,
            cursor_col = cursor.col,
            "redraw"
        );
        w.flush(out)
    }

    fn place_cursor(&mut self, w: &mut Writer, from_row: usize, to: Position) {
        w.move_up(from_row.saturating_sub(to.row));
        w.move_to_column(to.col);
        self.cursor_row = to.row;
    }

    /// Draw a submitted or interrupted line one last time and leave it in the scrollback.
    pub fn commit<W: Write>(
        &mut self,
        out: &mut W,
        prompt: &str,
        buffer: &str,
        marker: Option<&str>,
    ) -> Result<()> {
        let mut w = Writer::new();
        self.rewind(&mut w);
        w.print(prompt);
        w.print(self.highlighter.highlight(buffer));
        if let Some(marker) = marker {
            w.print(marker);
        }
        w.newline();
        self.cursor_row = 0;
        w.flush(out)
    }

    /// Replace the prompt block with `text` (optionally colored). A trailing newline is added
    /// when missing so the next redraw starts on a fresh row.
    pub fn print_above<W: Write>(
        &mut self,
        out: &mut W,
        text: &str,
        color: Option<Color>,
    ) -> Result<()> {
        let mut w = Writer::new();
        self.rewind(&mut w);
        if !text.is_empty() {
            match color {
                Some(color) => w.print(format!("{}", text.with(color))),
                None => w.print(text),
            }
            if !text.ends_with('\n') {
                w.newline();
            }
        }
        self.cursor_row = 0;
        w.flush(out)
    }

    pub fn clear_screen<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let mut w = Writer::new();
        w.clear_all();
        self.cursor_row = 0;
        w.flush(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::strip_sgr;
    use core_state::{CompletionState, History, MAX_HISTORY, Mode};

    fn renderer(width: u16) -> Renderer {
        Renderer::new(width, Highlighter::default())
    }

    fn draw(r: &mut Renderer, state: &SessionState) -> String {
        let mut out = Vec::new();
        r.redraw(&mut out, state).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn first_draw_starts_at_column_zero_and_places_cursor() {
        let mut r = renderer(80);
        let mut s = SessionState::default();
        s.set_line("print(1)");
        s.set_cursor(5);
        let out = draw(&mut r, &s);
        assert!(strip_sgr(&out).starts_with("\x1b[1G\x1b[J>>> print(1)"));
        assert!(out.ends_with("\x1b[10G"));
        assert_eq!(r.cursor_row(), 0);
    }

    #[test]
    fn wrapped_line_rewinds_by_cursor_row() {
        let mut r = renderer(10);
        let mut s = SessionState::default();
        s.set_line("abcdefghijkl");
        draw(&mut r, &s);
        assert_eq!(r.cursor_row(), 1);
        s.set_cursor(0);
        let out = draw(&mut r, &s);
        assert!(out.starts_with("\x1b[1A\x1b[1G\x1b[J"));
        // From the last row back to the first, column after the prompt.
        assert!(out.ends_with("\x1b[1A\x1b[5G"));
        assert_eq!(r.cursor_row(), 0);
    }

    #[test]
    fn exact_fill_forces_the_wrap() {
        let mut r = renderer(8);
        let mut s = SessionState::default();
        s.set_line("abcd");
        let out = draw(&mut r, &s);
        assert!(out.contains(">>> abcd\r\n"));
        assert_eq!(r.cursor_row(), 1);
    }

    #[test]
    fn search_view_replaces_prompt() {
        let mut r = renderer(80);
        let mut s = SessionState::new(History::from_entries(vec!["ls -la".into()], MAX_HISTORY));
        s.mode = Mode::Searching {
            query: "ls".into(),
            matched: Some(0),
        };
        let out = draw(&mut r, &s);
        assert!(strip_sgr(&out).contains("(reverse-i-search)'ls': ls -la"));
    }

    #[test]
    fn popup_rows_count_toward_next_rewind_but_not_cursor() {
        let mut r = renderer(80);
        let mut s = SessionState::default();
        s.set_line("file.r");
        s.mode = Mode::CompletionOpen(CompletionState::new(
            vec!["read".into(), "remove".into()],
            5,
        ));
        let out = draw(&mut r, &s);
        assert!(out.contains("\r\n\x1b[11G"));
        // Two popup rows below the input; cursor goes back up to the input row.
        assert!(out.ends_with("\x1b[2A\x1b[11G"));
        assert_eq!(r.cursor_row(), 0);
    }

    #[test]
    fn wrapped_popup_entries_count_every_screen_row() {
        let mut r = renderer(10);
        let mut s = SessionState::default();
        s.set_line("ab");
        s.mode = Mode::CompletionOpen(CompletionState::new(
            vec!["a".repeat(23), "b".repeat(24)],
            2,
        ));
        let out = draw(&mut r, &s);
        // Each 23/24-column entry covers three rows of a 10-column grid.
        assert!(out.ends_with("\x1b[6A\x1b[7G"));
        assert_eq!(r.cursor_row(), 0);
    }

    #[test]
    fn print_above_terminates_line_and_resets_rows() {
        let mut r = renderer(10);
        let mut s = SessionState::default();
        s.set_line("abcdefghijkl");
        draw(&mut r, &s);
        let mut out = Vec::new();
        r.print_above(&mut out, "hello\nworld", None).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "\x1b[1A\x1b[1G\x1b[Jhello\r\nworld\r\n");
        assert_eq!(r.cursor_row(), 0);
    }

    #[test]
    fn commit_appends_marker() {
        let mut r = renderer(80);
        let mut out = Vec::new();
        r.commit(&mut out, ">>> ", "x = 1", Some("^C")).unwrap();
        assert!(strip_sgr(&String::from_utf8(out).unwrap()).ends_with(">>> x = 1^C\r\n"));
    }
}
