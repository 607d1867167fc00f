//! Syntax highlighting for the prompt line.
//!
//! `classify` maps the lossless token stream onto color classes; `highlight` wraps every
//! non-plain span in an SGR color and resets right after it, so `strip_sgr(highlight(s)) == s`.
//!
//! Builtins are matched longest-first against the documentation registry so `sys.shell` wins
//! over `sys`. An identifier right after a `.` is a method name and is colored when any
//! registry entry ends in that segment.

use core_interp::{DocRegistry, KEYWORDS, LITERALS};
use core_text::lexer::{Token, TokenKind, is_ident_continue, tokenize};
use crossterm::style::{Color, Stylize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Plain,
    Keyword,
    Literal,
    Builtin,
    Str,
    Comment,
    Number,
    /// `odd` is the parity of the nesting depth the bracket belongs to.
    Bracket { odd: bool },
}

impl Class {
    fn color(self) -> Option<Color> {
        match self {
            Class::Plain => None,
            Class::Keyword => Some(Color::Magenta),
            Class::Literal => Some(Color::DarkYellow),
            Class::Builtin => Some(Color::Cyan),
            Class::Str => Some(Color::Green),
            Class::Comment => Some(Color::DarkGrey),
            Class::Number => Some(Color::Yellow),
            Class::Bracket { odd: false } => Some(Color::Blue),
            Class::Bracket { odd: true } => Some(Color::DarkMagenta),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Highlighter {
    builtins: Vec<String>,
    members: HashSet<String>,
}

impl Highlighter {
    pub fn new(docs: &DocRegistry) -> Self {
        let builtins = docs.names_longest_first().to_vec();
        let members = builtins
            .iter()
            .filter_map(|name| name.rsplit_once('.').map(|(_, last)| last.to_string()))
            .collect();
        Self { builtins, members }
    }

    pub fn classify(&self, src: &str) -> Vec<(Range<usize>, Class)> {
        let tokens = tokenize(src);
        let mut spans = Vec::with_capacity(tokens.len());
        let mut depth = 0usize;
        let mut i = 0;
        while i < tokens.len() {
            let t = tokens[i];
            let class = match t.kind {
                TokenKind::Ident => {
                    let after_dot = i > 0 && tokens[i - 1].text(src) == ".";
                    if !after_dot && let Some(end_idx) = self.builtin_at(src, &tokens, i) {
                        spans.push((t.start..tokens[end_idx].end, Class::Builtin));
                        i = end_idx + 1;
                        continue;
                    }
                    let text = t.text(src);
                    if after_dot && self.members.contains(text) {
                        Class::Builtin
                    } else if KEYWORDS.contains(&text) {
                        Class::Keyword
                    } else if LITERALS.contains(&text) {
                        Class::Literal
                    } else {
                        Class::Plain
                    }
                }
                TokenKind::Str { .. } => Class::Str,
                TokenKind::Comment => Class::Comment,
                TokenKind::Number => Class::Number,
                TokenKind::OpenBracket(_) => {
                    let class = Class::Bracket { odd: depth % 2 == 1 };
                    depth += 1;
                    class
                }
                TokenKind::CloseBracket(_) => {
                    depth = depth.saturating_sub(1);
                    Class::Bracket { odd: depth % 2 == 1 }
                }
                TokenKind::Whitespace | TokenKind::Newline | TokenKind::Punct => Class::Plain,
            };
            spans.push((t.range(), class));
            i += 1;
        }
        spans
    }

    /// Longest registry name starting at token `i` and ending on a token boundary. Returns the
    /// index of the last token it covers.
    fn builtin_at(&self, src: &str, tokens: &[Token], i: usize) -> Option<usize> {
        let start = tokens[i].start;
        let rest = &src[start..];
        for name in &self.builtins {
            if !rest.starts_with(name.as_str()) {
                continue;
            }
            let end = start + name.len();
            if src[end..].chars().next().is_some_and(is_ident_continue) {
                continue;
            }
            if let Some(offset) = tokens[i..].iter().position(|t| t.end == end) {
                return Some(i + offset);
            }
        }
        None
    }

    /// `src` with SGR colors around each classified span. `strip_sgr` recovers `src` exactly
    /// as long as it holds no ESC of its own; edit buffers never do, since control bytes are
    /// dropped before text reaches them.
    pub fn highlight(&self, src: &str) -> String {
        let mut out = String::with_capacity(src.len() * 2);
        for (range, class) in self.classify(src) {
            let text = &src[range];
            match class.color() {
                Some(color) => {
                    let _ = write!(out, "{}", text.with(color));
                }
                None => out.push_str(text),
            }
        }
        out
    }
}

/// Remove SGR sequences (`ESC [ params m`). Other control sequences are kept. SGR-shaped text
/// that was already in the input is removed too, so this only inverts `highlight` for
/// ESC-free sources.
pub fn strip_sgr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(idx) = rest.find("\x1b[") {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 2..];
        let params = after
            .find(|c: char| !(c.is_ascii_digit() || c == ';'))
            .unwrap_or(after.len());
        if after[params..].starts_with('m') {
            rest = &after[params + 1..];
        } else {
            out.push_str("\x1b[");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}
