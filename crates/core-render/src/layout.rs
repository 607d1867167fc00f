//! Row/column arithmetic for text drawn from the left edge of a fixed-width grid.
//!
//! Wrapping is eager: a cluster that fills the last column moves the position to column 0 of
//! the next row, and a wide cluster that does not fit wraps before it is placed. Explicit line
//! breaks (`\n`, `\r\n`) always start a new row.

use core_text::grapheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

/// Position reached after drawing `text[..byte]`.
pub fn position_of(text: &str, byte: usize, width: usize) -> Position {
    let width = width.max(1);
    let mut pos = Position::default();
    let byte = byte.min(text.len());
    for g in grapheme::iter(&text[..byte]) {
        if g == "\n" || g == "\r\n" {
            pos.row += 1;
            pos.col = 0;
            continue;
        }
        let w = grapheme::cluster_width(g);
        if w == 0 {
            continue;
        }
        if pos.col + w > width {
            pos.row += 1;
            pos.col = 0;
        }
        pos.col += w;
        if pos.col >= width {
            pos.row += 1;
            pos.col = 0;
        }
    }
    pos
}

/// Position after drawing all of `text`.
pub fn end_position(text: &str, width: usize) -> Position {
    position_of(text, text.len(), width)
}

/// Number of grid rows `text` occupies.
pub fn row_count(text: &str, width: usize) -> usize {
    end_position(text, width).row + 1
}

/// Rows a fresh row of `text` drawn from column `indent` occupies on screen. A row that ends
/// exactly on the last column stays in pending-wrap and does not claim the next one.
pub fn rows_spanned(text: &str, indent: usize, width: usize) -> usize {
    let padded = format!("{}{text}", " ".repeat(indent));
    let end = end_position(&padded, width);
    if ends_on_wrap(&padded, width) {
        end.row.max(1)
    } else {
        end.row + 1
    }
}

/// True when drawing `text` leaves the terminal in its pending-wrap state: the last cluster
/// filled the final column, so the terminal cursor is still on that row while the logical
/// position is the start of the next one.
pub fn ends_on_wrap(text: &str, width: usize) -> bool {
    !text.is_empty() && !text.ends_with('\n') && end_position(text, width).col == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line_is_one_row() {
        assert_eq!(end_position(">>> abc", 80), Position { row: 0, col: 7 });
        assert_eq!(row_count(">>> abc", 80), 1);
        assert!(!ends_on_wrap(">>> abc", 80));
    }

    #[test]
    fn overflow_wraps_and_exact_fill_moves_to_next_row() {
        assert_eq!(end_position("abcdefg", 5), Position { row: 1, col: 2 });
        assert_eq!(end_position("abcde", 5), Position { row: 1, col: 0 });
        assert!(ends_on_wrap("abcde", 5));
        assert_eq!(row_count("abcde", 5), 2);
    }

    #[test]
    fn spanned_rows_account_for_indent_and_pending_wrap() {
        assert_eq!(rows_spanned("abc", 0, 10), 1);
        assert_eq!(rows_spanned("abcdefghij", 0, 10), 1);
        assert_eq!(rows_spanned("abcdefgh", 3, 10), 2);
        assert_eq!(rows_spanned(&"x".repeat(23), 0, 10), 3);
        assert_eq!(rows_spanned("", 4, 10), 1);
    }

    #[test]
    fn explicit_breaks_start_rows() {
        assert_eq!(end_position("ab\ncd\r\ne", 80), Position { row: 2, col: 1 });
        assert!(!ends_on_wrap("ab\n", 80));
    }

    #[test]
    fn wide_cluster_wraps_before_placement() {
        // Two cells left, then a wide cluster needs a fresh row.
        assert_eq!(end_position("abc界", 4), Position { row: 1, col: 2 });
        assert_eq!(position_of("a界b", 1, 80), Position { row: 0, col: 1 });
        assert_eq!(position_of("a界b", 4, 80), Position { row: 0, col: 3 });
    }

    #[test]
    fn zero_width_is_treated_as_one() {
        assert_eq!(end_position("ab", 0), Position { row: 2, col: 0 });
    }
}
