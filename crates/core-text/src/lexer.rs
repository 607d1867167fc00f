//! Lossless tokenizer for the interpreter's Python-like surface syntax.
//!
//! Tokens are contiguous and cover the whole input: concatenating `&src[t.range()]` for every
//! token reproduces `src` exactly. The highlighter relies on that to keep its color spans
//! reversible, and the embedded interpreter uses bracket/string state for its completeness check.
//! Malformed input never fails; an unterminated string simply runs to the end of the input.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    Newline,
    /// `#` to end of line.
    Comment,
    /// Quoted literal; `terminated` is false when the closing quote is missing.
    Str { terminated: bool },
    Number,
    Ident,
    OpenBracket(char),
    CloseBracket(char),
    /// Operators and other punctuation (`.`, `,`, `:`, `=`, `+`, ...).
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

pub fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

pub fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Tokenize `src` into a lossless token stream.
pub fn tokenize(src: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        let kind = match c {
            '\n' | '\r' => {
                chars.next();
                TokenKind::Newline
            }
            c if c.is_whitespace() => {
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() && c != '\n' && c != '\r' {
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Whitespace
            }
            '#' => {
                while let Some(&(_, c)) = chars.peek() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                    chars.next();
                }
                TokenKind::Comment
            }
            '"' | '\'' => {
                let terminated = scan_string(src, start, &mut chars);
                TokenKind::Str { terminated }
            }
            c if c.is_ascii_digit() => {
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Number
            }
            c if is_ident_start(c) => {
                while let Some(&(_, c)) = chars.peek() {
                    if is_ident_continue(c) {
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Ident
            }
            '(' | '[' | '{' => {
                chars.next();
                TokenKind::OpenBracket(c)
            }
            ')' | ']' | '}' => {
                chars.next();
                TokenKind::CloseBracket(c)
            }
            _ => {
                chars.next();
                TokenKind::Punct
            }
        };
        let end = chars.peek().map(|&(i, _)| i).unwrap_or(src.len());
        tokens.push(Token { kind, start, end });
    }
    tokens
}

/// Consume a string literal starting at `start`. Returns whether the closing quote was found.
fn scan_string(
    src: &str,
    start: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> bool {
    let Some((_, quote)) = chars.next() else {
        return false;
    };
    let triple = src[start..].starts_with(&format!("{quote}{quote}{quote}"));
    if triple {
        chars.next();
        chars.next();
    }
    let mut escaped = false;
    while let Some(&(idx, c)) = chars.peek() {
        // A single-quoted literal stops before the line break so the newline keeps its own token.
        if !triple && (c == '\n' || c == '\r') {
            return false;
        }
        chars.next();
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if c == quote => {
                if !triple {
                    return true;
                }
                let close = format!("{quote}{quote}{quote}");
                if src[idx..].starts_with(&close) {
                    chars.next();
                    chars.next();
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Net open-bracket depth of `src`, ignoring brackets inside strings and comments.
/// Stray closers never drive the depth below zero.
pub fn bracket_depth(src: &str) -> usize {
    let mut depth = 0usize;
    for t in tokenize(src) {
        match t.kind {
            TokenKind::OpenBracket(_) => depth += 1,
            TokenKind::CloseBracket(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokens_cover_input_exactly() {
        let src = "for x in range(3):  # loop\n    print(\"a\\\"b\", 0x1F)";
        let rebuilt: String = tokenize(src).iter().map(|t| t.text(src)).collect();
        assert_eq!(rebuilt, src);
    }

    #[test]
    fn classifies_basic_statement() {
        assert_eq!(
            kinds("x = f(1)"),
            vec![
                TokenKind::Ident,
                TokenKind::Whitespace,
                TokenKind::Punct,
                TokenKind::Whitespace,
                TokenKind::Ident,
                TokenKind::OpenBracket('('),
                TokenKind::Number,
                TokenKind::CloseBracket(')'),
            ]
        );
    }

    #[test]
    fn unterminated_string_runs_to_end() {
        let toks = tokenize("print('abc");
        let last = toks.last().unwrap();
        assert_eq!(last.kind, TokenKind::Str { terminated: false });
        assert_eq!(last.end, "print('abc".len());
    }

    #[test]
    fn triple_quoted_string_spans_newlines() {
        let src = "'''a\nb'''";
        assert_eq!(kinds(src), vec![TokenKind::Str { terminated: true }]);
    }

    #[test]
    fn brackets_in_strings_do_not_count() {
        assert_eq!(bracket_depth("f('(', [1,"), 2);
        assert_eq!(bracket_depth(")))"), 0);
        assert_eq!(bracket_depth("# ((("), 0);
    }
}
