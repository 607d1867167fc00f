//! Single-line text primitives for the prompt editor.
//!
//! Everything here is pure: functions take the current `(buffer, cursor)` pair and return the
//! new value. Cursor offsets are byte indices that always sit on a grapheme boundary; callers
//! never need to reason about UTF-8 widths themselves.

pub mod edit;
pub mod lexer;
pub mod width;

pub use edit::Edit;
pub use width::{egc_width, str_width};

/// Grapheme and width utilities. Pure helpers operating on a single line.
pub mod grapheme {
    use crate::egc_width;
    use unicode_segmentation::UnicodeSegmentation;

    /// Iterate grapheme clusters in a line.
    pub fn iter(line: &str) -> impl Iterator<Item = &str> {
        line.graphemes(true)
    }

    /// Previous grapheme boundary (returns 0 if already at or below 1st boundary).
    pub fn prev_boundary(line: &str, byte: usize) -> usize {
        if byte == 0 || byte > line.len() {
            return 0;
        }
        let mut last = 0;
        for (idx, _) in line.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            last = idx;
        }
        last
    }

    /// Next grapheme boundary (returns line.len() if at or beyond end).
    pub fn next_boundary(line: &str, byte: usize) -> usize {
        if byte >= line.len() {
            return line.len();
        }
        for (idx, _) in line.grapheme_indices(true) {
            if idx > byte {
                return idx;
            }
        }
        line.len()
    }

    /// Snap an arbitrary byte offset down onto the nearest grapheme boundary at or before it.
    pub fn floor_boundary(line: &str, byte: usize) -> usize {
        if byte >= line.len() {
            return line.len();
        }
        let mut last = 0;
        for (idx, _) in line.grapheme_indices(true) {
            if idx > byte {
                break;
            }
            last = idx;
        }
        last
    }

    /// Compute visual column (terminal cells) up to (but not including) byte offset.
    pub fn visual_col(line: &str, byte: usize) -> usize {
        let mut col = 0;
        for (idx, g) in line.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            col += egc_width(g) as usize;
        }
        col
    }

    /// Width in terminal cells of this grapheme cluster.
    pub fn cluster_width(g: &str) -> usize {
        egc_width(g) as usize
    }

    /// Naive word classification: alphanumeric or underscore start.
    pub fn is_word(g: &str) -> bool {
        g.chars()
            .next()
            .map(|c| c == '_' || c.is_alphanumeric())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::grapheme;

    #[test]
    fn grapheme_basic_emoji() {
        let s = "a😀b";
        let after_a = grapheme::next_boundary(s, 0);
        let after_emoji = grapheme::next_boundary(s, after_a);
        assert_eq!(after_a, 1);
        assert_eq!(after_emoji, 5);
        assert_eq!(grapheme::prev_boundary(s, after_emoji), after_a);
        assert_eq!(grapheme::visual_col(s, after_emoji), 3);
    }

    #[test]
    fn floor_boundary_snaps_inside_cluster() {
        let s = "é!"; // 2-byte é
        assert_eq!(grapheme::floor_boundary(s, 1), 0);
        assert_eq!(grapheme::floor_boundary(s, 2), 2);
        assert_eq!(grapheme::floor_boundary(s, 99), s.len());
    }

    #[test]
    fn word_classification() {
        assert!(grapheme::is_word("_"));
        assert!(grapheme::is_word("x"));
        assert!(!grapheme::is_word("."));
        assert!(!grapheme::is_word(""));
    }
}
