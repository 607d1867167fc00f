//! Key handling for the prompt: per-mode transitions from `(SessionState, Key)` to effects.
//!
//! Dispatch mutates the session state in place and returns the side effects the runtime must
//! perform, in order. Nothing here touches the terminal or the network; the runtime applies
//! `Effect`s through the renderer, transport and history backend.

pub mod dispatcher;

pub use dispatcher::{DispatchContext, dispatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawKind {
    /// Redraw now and cancel any pending debounced redraw.
    Immediate,
    /// Single-character edit at the end of the line; coalesce behind the debounce deadline.
    Debounced,
}

/// Colour class of text printed above the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Error,
    Warning,
    Dim,
}

/// A line leaving the editable area: drawn one last time (with an optional trailing marker such
/// as `^C`) and then left in the scrollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedLine {
    pub prompt: String,
    pub buffer: String,
    pub marker: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Redraw(RedrawKind),
    Commit(CommittedLine),
    /// Text printed above the prompt.
    Print { text: String, tone: Tone },
    /// Statement to forward over the session transport.
    Send(String),
    PersistHistory,
    ClearScreen,
    /// End the session (Ctrl-D on an empty line).
    Close,
}

impl Effect {
    pub fn print(text: impl Into<String>, tone: Tone) -> Self {
        Effect::Print {
            text: text.into(),
            tone,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Effect::Redraw(RedrawKind::Immediate) => "redraw",
            Effect::Redraw(RedrawKind::Debounced) => "redraw_debounced",
            Effect::Commit(_) => "commit",
            Effect::Print { .. } => "print",
            Effect::Send(_) => "send",
            Effect::PersistHistory => "persist_history",
            Effect::ClearScreen => "clear_screen",
            Effect::Close => "close",
        }
    }
}
