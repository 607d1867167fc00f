//! Embedded statement-completeness checker and completion engine.
//!
//! The client does not evaluate statements; it decides when a block is ready to send and what
//! the server should receive. Completeness follows the interactive convention of the target
//! language: open brackets or an unterminated string need more input, a block header (line
//! ending in `:`) or any multi-line block is closed by an empty line, a single line is complete.

use crate::docs::DocRegistry;
use crate::ident::qualified_start;
use crate::{Completions, InputOutcome, Interpreter, KEYWORDS, LITERALS};
use core_text::lexer::{TokenKind, tokenize};
use std::sync::Arc;
use tracing::trace;

const OPERATOR_CHARS: &str = "+-*/%=<>!&|^~.,:;@";

#[derive(Debug, Clone)]
pub struct EmbeddedRepl {
    buffer: String,
    docs: Arc<DocRegistry>,
}

impl EmbeddedRepl {
    pub fn new(docs: Arc<DocRegistry>) -> Self {
        Self {
            buffer: String::new(),
            docs,
        }
    }

    pub fn docs(&self) -> &Arc<DocRegistry> {
        &self.docs
    }

    fn take_complete(&mut self) -> InputOutcome {
        let payload = std::mem::take(&mut self.buffer);
        InputOutcome::complete(Some(payload))
    }

    /// Top-level names: keywords, literals and the first segment of every registry key.
    fn top_level_names(&self) -> Vec<String> {
        let mut names: Vec<String> = KEYWORDS
            .iter()
            .chain(LITERALS.iter())
            .map(|s| s.to_string())
            .collect();
        for name in self.docs.names() {
            let head = name.split('.').next().unwrap_or(name);
            names.push(head.to_string());
        }
        names
    }

    fn member_names(&self, qualifier: &str) -> Vec<String> {
        let prefix = format!("{qualifier}.");
        self.docs
            .names()
            .filter_map(|name| name.strip_prefix(prefix.as_str()))
            .map(|rest| rest.split('.').next().unwrap_or(rest).to_string())
            .collect()
    }
}

/// `!cmd` shorthand for a system shell call. `!=` is an operator, not the shorthand.
fn expand_shell_shorthand(trimmed: &str) -> Option<String> {
    let cmd = trimmed.strip_prefix('!')?;
    if cmd.starts_with('=') {
        return None;
    }
    let escaped = cmd.trim().replace('\\', "\\\\").replace('"', "\\\"");
    Some(format!("sys.shell(\"{escaped}\")"))
}

/// First character the surface syntax has no use for, if any.
fn unexpected_char(src: &str) -> Option<char> {
    tokenize(src)
        .into_iter()
        .filter(|t| t.kind == TokenKind::Punct)
        .filter_map(|t| t.text(src).chars().next())
        .find(|c| !OPERATOR_CHARS.contains(*c))
}

impl Interpreter for EmbeddedRepl {
    fn input(&mut self, line: &str) -> InputOutcome {
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);

        let trimmed = self.buffer.trim();
        if let Some(expanded) = expand_shell_shorthand(trimmed) {
            self.buffer.clear();
            return InputOutcome::complete(Some(expanded));
        }
        if trimmed == "exit" {
            return self.take_complete();
        }

        let tokens = tokenize(&self.buffer);
        let mut depth = 0usize;
        let mut open_string = false;
        for t in &tokens {
            match t.kind {
                TokenKind::OpenBracket(_) => depth += 1,
                TokenKind::CloseBracket(_) => depth = depth.saturating_sub(1),
                // Still open at end of input: more may follow. One cut short by a line break is
                // reported below.
                TokenKind::Str { terminated: false } if t.end == self.buffer.len() => {
                    open_string = true;
                }
                _ => {}
            }
        }
        if depth > 0 || open_string {
            trace!(target: "interp", depth, open_string, "incomplete");
            return InputOutcome::incomplete(None);
        }

        if let Some(c) = unexpected_char(&self.buffer) {
            self.buffer.clear();
            return InputOutcome::error(format!("unexpected character '{c}'"));
        }
        if let Some(t) = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Str { terminated: false })
        {
            let col = t.start;
            self.buffer.clear();
            return InputOutcome::error(format!(
                "unterminated string literal (newline) at offset {col}"
            ));
        }

        let trimmed = self.buffer.trim();
        let ends_with_colon = trimmed.ends_with(':');
        let line_count = self.buffer.lines().count();

        if line_count <= 1 && !ends_with_colon {
            return self.take_complete();
        }
        if (line_count > 1 || ends_with_colon) && line.trim().is_empty() {
            return self.take_complete();
        }
        InputOutcome::incomplete(None)
    }

    fn complete(&self, line: &str, cursor: usize) -> Completions {
        let mut cursor = cursor.min(line.len());
        while !line.is_char_boundary(cursor) {
            cursor -= 1;
        }
        let head = &line[..cursor];

        // No completion inside string literals or comments.
        if let Some(last) = tokenize(head).last()
            && matches!(
                last.kind,
                TokenKind::Str { terminated: false } | TokenKind::Comment
            )
        {
            return Completions::empty(cursor);
        }

        let expr_start = qualified_start(line, cursor);
        let expr = &line[expr_start..cursor];
        let (candidates, start, partial) = match expr.rfind('.') {
            Some(dot) => {
                let qualifier = &expr[..dot];
                if qualifier.is_empty() {
                    return Completions::empty(cursor);
                }
                let partial = &expr[dot + 1..];
                (
                    self.member_names(qualifier),
                    expr_start + dot + 1,
                    partial,
                )
            }
            None => {
                if expr.is_empty() {
                    return Completions::empty(cursor);
                }
                (self.top_level_names(), expr_start, expr)
            }
        };

        let mut suggestions: Vec<String> = candidates
            .into_iter()
            .filter(|c| c.starts_with(partial))
            .collect();
        suggestions.sort();
        suggestions.dedup();
        trace!(target: "interp", candidates = suggestions.len(), start, "complete");
        Completions { suggestions, start }
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InputStatus;

    fn repl() -> EmbeddedRepl {
        EmbeddedRepl::new(Arc::new(DocRegistry::builtin()))
    }

    #[test]
    fn single_line_is_complete_with_payload() {
        let mut r = repl();
        let out = r.input("print('hello')");
        assert_eq!(out.status, InputStatus::Complete);
        assert_eq!(out.payload.as_deref(), Some("print('hello')"));
    }

    #[test]
    fn open_bracket_needs_more_input() {
        let mut r = repl();
        assert_eq!(r.input("x = [1,").status, InputStatus::Incomplete);
        // Balanced again, but a multi-line block still waits for the closing empty line.
        assert_eq!(r.input("2]").status, InputStatus::Incomplete);
        let out = r.input("");
        assert_eq!(out.status, InputStatus::Complete);
        assert_eq!(out.payload.as_deref(), Some("x = [1,\n2]\n"));
    }

    #[test]
    fn block_header_closes_on_empty_line() {
        let mut r = repl();
        assert_eq!(r.input("for i in range(3):").status, InputStatus::Incomplete);
        assert_eq!(r.input("    print(i)").status, InputStatus::Incomplete);
        let out = r.input("");
        assert_eq!(out.status, InputStatus::Complete);
        assert_eq!(
            out.payload.as_deref(),
            Some("for i in range(3):\n    print(i)\n")
        );
    }

    #[test]
    fn open_string_continues() {
        let mut r = repl();
        assert_eq!(r.input("s = '''a").status, InputStatus::Incomplete);
        assert_eq!(r.input("b'''").status, InputStatus::Incomplete);
        assert_eq!(r.input("").status, InputStatus::Complete);
        assert_eq!(r.input("print('abc").status, InputStatus::Incomplete);
    }

    #[test]
    fn bang_expands_to_shell_call() {
        let mut r = repl();
        let out = r.input("!ls -la \"/tmp\"");
        assert_eq!(out.status, InputStatus::Complete);
        assert_eq!(
            out.payload.as_deref(),
            Some("sys.shell(\"ls -la \\\"/tmp\\\"\")")
        );
        assert_eq!(r.input("x != 1").status, InputStatus::Complete);
    }

    #[test]
    fn stray_character_and_broken_string_are_errors() {
        let mut r = repl();
        let out = r.input("x = $y");
        assert_eq!(out.status, InputStatus::Error);
        assert!(out.message.unwrap().contains('$'));

        assert_eq!(r.input("x = 'abc").status, InputStatus::Incomplete);
        let out = r.input("def");
        assert_eq!(out.status, InputStatus::Error);
        // Buffer was discarded, so the next line starts fresh.
        assert_eq!(r.input("1").payload.as_deref(), Some("1"));
    }

    #[test]
    fn reset_discards_partial_block() {
        let mut r = repl();
        r.input("if x:");
        r.reset();
        assert_eq!(r.input("y").payload.as_deref(), Some("y"));
    }

    #[test]
    fn completes_members_after_dot() {
        let r = repl();
        let c = r.complete("file.re", 7);
        assert_eq!(c.start, 5);
        assert_eq!(c.suggestions, ["read", "read_binary", "remove"]);

        let c = r.complete("x = sys.", 8);
        assert_eq!(c.start, 8);
        assert!(c.suggestions.contains(&"shell".to_string()));
    }

    #[test]
    fn completes_top_level_names() {
        let r = repl();
        let c = r.complete("pri", 3);
        assert_eq!(c.suggestions, ["print"]);
        assert_eq!(c.start, 0);
        let c = r.complete("fi", 2);
        assert_eq!(c.suggestions, ["file"]);
    }

    #[test]
    fn no_completion_inside_strings_or_for_blank_prefix() {
        let r = repl();
        assert!(r.complete("print('fi", 9).suggestions.is_empty());
        assert!(r.complete("x = ", 4).suggestions.is_empty());
    }
}
