//! Interpreter capability used by the prompt.
//!
//! The dispatcher only sees the `Interpreter` trait: `input` classifies a line as complete,
//! incomplete or erroneous (and may rewrite the statement into a `payload` for the wire),
//! `complete` proposes identifiers, `reset` drops a partial block. `EmbeddedRepl` is the
//! in-process implementation; it is loaded asynchronously by `loader` together with the
//! documentation registry the highlighter and doc lookup share.

pub mod docs;
pub mod ident;
pub mod loader;
pub mod repl;

pub use docs::{DocEntry, DocRegistry};
pub use loader::{LoadError, LoadedInterpreter, load_interpreter, spawn_loader};
pub use repl::EmbeddedRepl;

pub const KEYWORDS: &[&str] = &[
    "and", "break", "continue", "def", "elif", "else", "for", "if", "in", "lambda", "load",
    "not", "or", "pass", "return", "while",
];

/// Literal operands highlighted apart from keywords.
pub const LITERALS: &[&str] = &["True", "False", "None"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStatus {
    Complete,
    Incomplete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputOutcome {
    pub status: InputStatus,
    /// Continuation prompt for `Incomplete`; the caller defaults to `".. "`.
    pub prompt: Option<String>,
    /// Error text for `Error`.
    pub message: Option<String>,
    /// Statement to send instead of the raw block for `Complete`.
    pub payload: Option<String>,
}

impl InputOutcome {
    pub fn complete(payload: Option<String>) -> Self {
        Self {
            status: InputStatus::Complete,
            prompt: None,
            message: None,
            payload,
        }
    }

    pub fn incomplete(prompt: Option<String>) -> Self {
        Self {
            status: InputStatus::Incomplete,
            prompt,
            message: None,
            payload: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: InputStatus::Error,
            prompt: None,
            message: Some(message.into()),
            payload: None,
        }
    }
}

/// Candidate replacements for `line[start..cursor]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completions {
    pub suggestions: Vec<String>,
    pub start: usize,
}

impl Completions {
    pub fn empty(cursor: usize) -> Self {
        Self {
            suggestions: Vec::new(),
            start: cursor,
        }
    }
}

pub trait Interpreter: Send {
    fn input(&mut self, line: &str) -> InputOutcome;
    fn complete(&self, line: &str, cursor: usize) -> Completions;
    fn reset(&mut self);
}
