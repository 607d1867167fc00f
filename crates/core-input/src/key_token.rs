//! Logical key vocabulary consumed by the dispatcher.
//!
//! Decoded items are mapped onto `Key` here so mode handlers match on intent (`WordLeft`,
//! `Interrupt`) instead of raw bytes. Text runs are sanitised on the way through: the edit buffer
//! never holds control characters, and tabs expand to four spaces.

use crate::decoder::{Decoded, EscapeSeq};

pub const TAB_INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Backspace,
    Delete,
    /// Bare ESC.
    Escape,
    /// Ctrl-C.
    Interrupt,
    /// Ctrl-G.
    Cancel,
    /// Ctrl-D.
    EndOfInput,
    /// Ctrl-R.
    ReverseSearch,
    /// Ctrl-L.
    ClearScreen,
    /// Ctrl-U.
    ClearLine,
    /// Ctrl-K.
    KillToEnd,
    DeleteWordBack,
    DeleteWordForward,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    WordLeft,
    WordRight,
    /// Alt-h.
    ShowDocs,
    Text(String),
    /// Recognised but unbound input; dispatch ignores it.
    Ignored,
}

impl Key {
    pub fn label(&self) -> &'static str {
        match self {
            Key::Text(_) => "text",
            Key::Ignored => "ignored",
            Key::Enter => "enter",
            Key::Tab => "tab",
            Key::Interrupt => "interrupt",
            Key::Escape => "escape",
            _ => "edit",
        }
    }
}

pub fn map_control(byte: u8) -> Key {
    match byte {
        b'\r' | b'\n' => Key::Enter,
        b'\t' => Key::Tab,
        0x7f | 0x08 => Key::Backspace,
        0x1b => Key::Escape,
        0x03 => Key::Interrupt,
        0x07 => Key::Cancel,
        0x04 => Key::EndOfInput,
        0x12 => Key::ReverseSearch,
        0x0c => Key::ClearScreen,
        0x01 => Key::Home,
        0x05 => Key::End,
        0x15 => Key::ClearLine,
        0x0b => Key::KillToEnd,
        0x17 => Key::DeleteWordBack,
        0x02 => Key::Left,
        0x06 => Key::Right,
        0x10 => Key::Up,
        0x0e => Key::Down,
        _ => Key::Ignored,
    }
}

pub fn map_escape(seq: EscapeSeq) -> Key {
    match seq {
        EscapeSeq::Up => Key::Up,
        EscapeSeq::Down => Key::Down,
        EscapeSeq::Left => Key::Left,
        EscapeSeq::Right => Key::Right,
        EscapeSeq::Home => Key::Home,
        EscapeSeq::End => Key::End,
        EscapeSeq::Delete => Key::Delete,
        EscapeSeq::WordLeft => Key::WordLeft,
        EscapeSeq::WordRight => Key::WordRight,
        EscapeSeq::DeleteWordBack => Key::DeleteWordBack,
        EscapeSeq::DeleteWordForward => Key::DeleteWordForward,
        EscapeSeq::ShowDocs => Key::ShowDocs,
        EscapeSeq::Unbound => Key::Ignored,
    }
}

/// Strip control characters and expand tabs so inserted text is always printable.
pub fn sanitize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\t' {
            out.push_str(TAB_INDENT);
        } else if !c.is_control() {
            out.push(c);
        }
    }
    out
}

pub fn map_decoded(item: Decoded) -> Key {
    match item {
        Decoded::ControlChar(b) => map_control(b),
        Decoded::EscapeSequence(seq) => map_escape(seq),
        Decoded::TextRun(text) => {
            let clean = sanitize_text(&text);
            if clean.is_empty() {
                Key::Ignored
            } else {
                Key::Text(clean)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_bytes_map_to_editing_keys() {
        assert_eq!(map_control(0x03), Key::Interrupt);
        assert_eq!(map_control(0x12), Key::ReverseSearch);
        assert_eq!(map_control(0x7f), Key::Backspace);
        assert_eq!(map_control(b'\n'), Key::Enter);
        assert_eq!(map_control(0x1f), Key::Ignored);
    }

    #[test]
    fn text_runs_drop_controls_and_expand_tabs() {
        assert_eq!(
            map_decoded(Decoded::TextRun("a\tb\x07".into())),
            Key::Text("a    b".into())
        );
        assert_eq!(map_decoded(Decoded::TextRun("\x00".into())), Key::Ignored);
    }

    #[test]
    fn unbound_escape_is_ignored() {
        assert_eq!(map_decoded(Decoded::EscapeSequence(EscapeSeq::Unbound)), Key::Ignored);
    }
}
