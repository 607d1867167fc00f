//! Pure edit operations over a `(buffer, cursor)` pair.
//!
//! Every function is total: out-of-range or mid-cluster cursors are snapped onto the nearest
//! grapheme boundary first, and operations at the buffer edges are no-ops. Motions return the
//! new cursor; edits return an `Edit` carrying both the new buffer and cursor.

use crate::grapheme;

/// Result of applying an edit: the new buffer text and cursor byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Edit {
    pub buffer: String,
    pub cursor: usize,
}

impl Edit {
    pub fn new(buffer: impl Into<String>, cursor: usize) -> Self {
        let buffer = buffer.into();
        let cursor = clamp_cursor(&buffer, cursor);
        Self { buffer, cursor }
    }

    fn unchanged(buffer: &str, cursor: usize) -> Self {
        Self::new(buffer, cursor)
    }
}

/// Snap a cursor into `0..=len` on a grapheme boundary.
pub fn clamp_cursor(buffer: &str, cursor: usize) -> usize {
    grapheme::floor_boundary(buffer, cursor.min(buffer.len()))
}

/// Splice `text` at the cursor; the cursor advances by `text.len()`.
pub fn insert(buffer: &str, cursor: usize, text: &str) -> Edit {
    let at = clamp_cursor(buffer, cursor);
    let mut out = String::with_capacity(buffer.len() + text.len());
    out.push_str(&buffer[..at]);
    out.push_str(text);
    out.push_str(&buffer[at..]);
    Edit {
        buffer: out,
        cursor: at + text.len(),
    }
}

/// Replace `buffer[start..cursor]` with `text`, leaving the cursor after the inserted text.
///
/// Returns `None` when `start` is past the cursor (the completion source disagreed with the
/// current line) so callers can ignore the request instead of corrupting the buffer.
pub fn splice(buffer: &str, start: usize, cursor: usize, text: &str) -> Option<Edit> {
    let cursor = clamp_cursor(buffer, cursor);
    if start > cursor || !buffer.is_char_boundary(start) {
        return None;
    }
    let mut out = String::with_capacity(buffer.len() + text.len());
    out.push_str(&buffer[..start]);
    out.push_str(text);
    out.push_str(&buffer[cursor..]);
    Some(Edit {
        buffer: out,
        cursor: start + text.len(),
    })
}

/// Backspace: remove the grapheme before the cursor.
pub fn delete_back(buffer: &str, cursor: usize) -> Edit {
    let at = clamp_cursor(buffer, cursor);
    if at == 0 {
        return Edit::unchanged(buffer, at);
    }
    let prev = grapheme::prev_boundary(buffer, at);
    Edit {
        buffer: format!("{}{}", &buffer[..prev], &buffer[at..]),
        cursor: prev,
    }
}

/// Delete the grapheme under the cursor.
pub fn delete_forward(buffer: &str, cursor: usize) -> Edit {
    let at = clamp_cursor(buffer, cursor);
    if at >= buffer.len() {
        return Edit::unchanged(buffer, at);
    }
    let next = grapheme::next_boundary(buffer, at);
    Edit {
        buffer: format!("{}{}", &buffer[..at], &buffer[next..]),
        cursor: at,
    }
}

/// Start of the word left of the cursor.
///
/// Trailing whitespace before the cursor is skipped, then the result is the index just after
/// the last space before that point (or 0 when there is none).
pub fn word_left(buffer: &str, cursor: usize) -> usize {
    let at = clamp_cursor(buffer, cursor);
    let trimmed = buffer[..at].trim_end();
    match trimmed.rfind(' ') {
        Some(idx) => idx + 1,
        None => 0,
    }
}

/// End of the word right of the cursor: skip a run of spaces, then the following non-space run.
pub fn word_right(buffer: &str, cursor: usize) -> usize {
    let at = clamp_cursor(buffer, cursor);
    let rest = &buffer[at..];
    let spaces = rest.len() - rest.trim_start_matches(' ').len();
    let after_spaces = &rest[spaces..];
    let word = after_spaces
        .find(' ')
        .unwrap_or(after_spaces.len());
    (at + spaces + word).min(buffer.len())
}

/// One grapheme left.
pub fn move_left(buffer: &str, cursor: usize) -> usize {
    grapheme::prev_boundary(buffer, clamp_cursor(buffer, cursor))
}

/// One grapheme right.
pub fn move_right(buffer: &str, cursor: usize) -> usize {
    grapheme::next_boundary(buffer, clamp_cursor(buffer, cursor))
}

pub fn home(_buffer: &str) -> usize {
    0
}

pub fn end(buffer: &str) -> usize {
    buffer.len()
}

/// Truncate the buffer at the cursor (Ctrl-K).
pub fn kill_to_end(buffer: &str, cursor: usize) -> Edit {
    let at = clamp_cursor(buffer, cursor);
    Edit {
        buffer: buffer[..at].to_string(),
        cursor: at,
    }
}

/// Empty the line (Ctrl-U).
pub fn clear_line() -> Edit {
    Edit::default()
}

/// Delete from the start of the previous word up to the cursor (Ctrl-W, Alt-Backspace).
pub fn delete_word_back(buffer: &str, cursor: usize) -> Edit {
    let at = clamp_cursor(buffer, cursor);
    let start = word_left(buffer, at);
    Edit {
        buffer: format!("{}{}", &buffer[..start], &buffer[at..]),
        cursor: start,
    }
}

/// Delete from the cursor to the end of the next word (Alt-d, Alt-Delete). Cursor stays put.
pub fn delete_word_forward(buffer: &str, cursor: usize) -> Edit {
    let at = clamp_cursor(buffer, cursor);
    let stop = word_right(buffer, at);
    Edit {
        buffer: format!("{}{}", &buffer[..at], &buffer[stop..]),
        cursor: at,
    }
}
