//! Dotted identifier scanning (`sys.shell`, `file.re|`) used by completion and doc lookup.

use core_text::lexer::is_ident_continue;

fn is_qualified_char(c: char) -> bool {
    is_ident_continue(c) || c == '.'
}

fn floor_char_boundary(line: &str, at: usize) -> usize {
    let mut at = at.min(line.len());
    while !line.is_char_boundary(at) {
        at -= 1;
    }
    at
}

/// Byte offset where the dotted identifier ending at `end` begins.
pub fn qualified_start(line: &str, end: usize) -> usize {
    let end = floor_char_boundary(line, end);
    line[..end]
        .char_indices()
        .rev()
        .find(|(_, c)| !is_qualified_char(*c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0)
}

/// Dotted identifier touching `cursor`, trimmed of leading/trailing dots.
pub fn qualified_ident_at(line: &str, cursor: usize) -> Option<&str> {
    let cursor = floor_char_boundary(line, cursor);
    let start = qualified_start(line, cursor);
    let end = line[cursor..]
        .char_indices()
        .find(|(_, c)| !is_qualified_char(*c))
        .map(|(i, _)| cursor + i)
        .unwrap_or(line.len());
    let ident = line[start..end].trim_matches('.');
    (!ident.is_empty()).then_some(ident)
}
