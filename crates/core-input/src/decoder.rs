//! Raw chunk decoder.
//!
//! A chunk is whatever one terminal read produced: a single keystroke, a burst of fast typing,
//! or an entire paste. Decoding classifies it into `ControlChar`, atomic `EscapeSequence` and
//! `TextRun` items without ever splitting a recognised escape sequence into characters.
//!
//! Rules:
//! * A recognised sequence at the head of the remaining input is emitted whole; whatever follows
//!   it is decoded independently.
//! * A multi-character run containing CR, LF or CRLF is a paste: every complete line becomes a
//!   `TextRun` followed by a synthetic Enter; a trailing unterminated fragment stays a `TextRun`.
//! * A single control byte is a `ControlChar`; control bytes embedded in a typed burst are split
//!   out as their own `ControlChar` items so coalesced keystrokes are not lost. Bracketed paste
//!   content is taken literally instead.
//! * Bracketed paste (`ESC[200~` .. `ESC[201~`) content is always line split, even across chunks.
//! * A partial escape sequence at the end of a chunk is held until the next chunk, or flushed as
//!   literal input by `flush_held` when the caller's timer expires. A lone ESC is emitted
//!   immediately (it closes popups) rather than waiting for a follow-up byte.

use core_events::{ESCAPE_SEQUENCES, PASTE_LINES};
use std::sync::atomic::Ordering;
use tracing::trace;

pub const ESC: char = '\x1b';
pub const PASTE_START: &str = "\x1b[200~";
pub const PASTE_END: &str = "\x1b[201~";
/// Byte used for the synthetic Enter produced by paste splitting.
pub const ENTER: u8 = b'\r';

/// Logical identity of a recognised escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EscapeSeq {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Delete,
    WordLeft,
    WordRight,
    DeleteWordBack,
    DeleteWordForward,
    /// Alt-h: documentation for the identifier under the cursor.
    ShowDocs,
    /// A complete CSI/SS3 sequence with no binding (PageUp, F-keys, focus reports...).
    Unbound,
}

/// Fixed-length sequences recognised atomically. Kept sorted longest-first so a shorter entry
/// never claims the prefix of a longer one.
const KNOWN_SEQUENCES: &[(&str, EscapeSeq)] = &[
    ("\x1b[1;3D", EscapeSeq::WordLeft),
    ("\x1b[1;5D", EscapeSeq::WordLeft),
    ("\x1b[1;3C", EscapeSeq::WordRight),
    ("\x1b[1;5C", EscapeSeq::WordRight),
    ("\x1b[3;3~", EscapeSeq::DeleteWordForward),
    ("\x1b\x1b[D", EscapeSeq::WordLeft),
    ("\x1b\x1b[C", EscapeSeq::WordRight),
    ("\x1b[1~", EscapeSeq::Home),
    ("\x1b[4~", EscapeSeq::End),
    ("\x1b[3~", EscapeSeq::Delete),
    ("\x1b[A", EscapeSeq::Up),
    ("\x1b[B", EscapeSeq::Down),
    ("\x1b[C", EscapeSeq::Right),
    ("\x1b[D", EscapeSeq::Left),
    ("\x1b[H", EscapeSeq::Home),
    ("\x1b[F", EscapeSeq::End),
    ("\x1bOA", EscapeSeq::Up),
    ("\x1bOB", EscapeSeq::Down),
    ("\x1bOC", EscapeSeq::Right),
    ("\x1bOD", EscapeSeq::Left),
    ("\x1bOH", EscapeSeq::Home),
    ("\x1bOF", EscapeSeq::End),
    ("\x1b\x7f", EscapeSeq::DeleteWordBack),
    ("\x1b\x08", EscapeSeq::DeleteWordBack),
    ("\x1bb", EscapeSeq::WordLeft),
    ("\x1bf", EscapeSeq::WordRight),
    ("\x1bd", EscapeSeq::DeleteWordForward),
    ("\x1bh", EscapeSeq::ShowDocs),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    ControlChar(u8),
    EscapeSequence(EscapeSeq),
    TextRun(String),
}

impl Decoded {
    pub fn enter() -> Self {
        Decoded::ControlChar(ENTER)
    }
}

#[derive(Debug, Default)]
enum PasteFsm {
    #[default]
    Idle,
    Active {
        buf: String,
    },
}

/// Stateful decoder: remembers an incomplete escape prefix and an open bracketed paste between
/// chunks. Everything else is decided per chunk.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: String,
    paste: PasteFsm,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a bracketed paste is open or an escape prefix is buffered.
    pub fn is_mid_sequence(&self) -> bool {
        !self.pending.is_empty() || matches!(self.paste, PasteFsm::Active { .. })
    }

    /// True when an escape prefix outside a bracketed paste is waiting for its next byte.
    pub fn has_held_escape(&self) -> bool {
        !self.pending.is_empty() && matches!(self.paste, PasteFsm::Idle)
    }

    /// Give up on a held escape prefix: ESC becomes its own key and the rest is literal input.
    /// Called when no follow-up byte arrived in time (Alt-[ sends `ESC [` and nothing more).
    pub fn flush_held(&mut self) -> Vec<Decoded> {
        if !self.has_held_escape() {
            return Vec::new();
        }
        let held = std::mem::take(&mut self.pending);
        trace!(target: "input.decode", len = held.len(), "held_escape_flushed");
        let mut out = vec![Decoded::ControlChar(0x1b)];
        decode_segment(held.get(1..).unwrap_or_default(), &mut out);
        out
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<Decoded> {
        let mut owned;
        let mut rest: &str = if self.pending.is_empty() {
            chunk
        } else {
            owned = std::mem::take(&mut self.pending);
            owned.push_str(chunk);
            owned.as_str()
        };
        let mut out = Vec::new();

        loop {
            if let PasteFsm::Active { buf } = &mut self.paste {
                match rest.find(PASTE_END) {
                    Some(idx) => {
                        buf.push_str(&rest[..idx]);
                        let content = std::mem::take(buf);
                        self.paste = PasteFsm::Idle;
                        trace!(target: "input.paste", len = content.len(), "bracketed_end");
                        split_lines(&content, &mut out);
                        rest = &rest[idx + PASTE_END.len()..];
                        continue;
                    }
                    None => {
                        // Keep a possible partial end marker out of the content.
                        let keep = partial_suffix_len(rest, PASTE_END);
                        buf.push_str(&rest[..rest.len() - keep]);
                        self.pending = rest[rest.len() - keep..].to_string();
                        break;
                    }
                }
            }

            if rest.is_empty() {
                break;
            }

            if let Some(after) = rest.strip_prefix(PASTE_START) {
                trace!(target: "input.paste", "bracketed_start");
                self.paste = PasteFsm::Active { buf: String::new() };
                rest = after;
                continue;
            }

            if rest.starts_with(ESC) {
                match classify_escape(rest) {
                    EscapeMatch::Known(seq, len) => {
                        ESCAPE_SEQUENCES.fetch_add(1, Ordering::Relaxed);
                        out.push(Decoded::EscapeSequence(seq));
                        rest = &rest[len..];
                    }
                    EscapeMatch::Incomplete => {
                        self.pending = rest.to_string();
                        break;
                    }
                    EscapeMatch::Lone => {
                        out.push(Decoded::ControlChar(0x1b));
                        rest = &rest[1..];
                    }
                }
                continue;
            }

            // Plain segment runs up to the next escape.
            let end = rest.find(ESC).unwrap_or(rest.len());
            let segment = &rest[..end];
            decode_segment(segment, &mut out);
            rest = &rest[end..];
        }

        trace!(target: "input.decode", items = out.len(), "chunk_decoded");
        out
    }
}

/// Stateless convenience: decode a single self-contained chunk.
pub fn decode_chunk(chunk: &str) -> Vec<Decoded> {
    let mut decoder = ChunkDecoder::new();
    let mut out = decoder.feed(chunk);
    // Flush a dangling prefix as literal text; a one-shot caller has no next chunk.
    if !decoder.pending.is_empty() {
        let pending = std::mem::take(&mut decoder.pending);
        if let PasteFsm::Active { mut buf } = std::mem::take(&mut decoder.paste) {
            buf.push_str(&pending);
            split_lines(&buf, &mut out);
        } else {
            out.push(Decoded::TextRun(pending));
        }
    } else if let PasteFsm::Active { buf } = std::mem::take(&mut decoder.paste) {
        split_lines(&buf, &mut out);
    }
    out
}

enum EscapeMatch {
    Known(EscapeSeq, usize),
    Incomplete,
    Lone,
}

fn classify_escape(rest: &str) -> EscapeMatch {
    for (raw, seq) in KNOWN_SEQUENCES {
        if rest.starts_with(raw) {
            return EscapeMatch::Known(*seq, raw.len());
        }
    }
    if rest.len() > 1 && PASTE_START.starts_with(rest) {
        return EscapeMatch::Incomplete;
    }
    if rest.len() > 1 && KNOWN_SEQUENCES.iter().any(|(raw, _)| raw.starts_with(rest)) {
        return EscapeMatch::Incomplete;
    }
    // Swallow complete but unbound CSI / SS3 sequences so their bytes never reach the buffer.
    let bytes = rest.as_bytes();
    if bytes.len() >= 2 && (bytes[1] == b'[' || bytes[1] == b'O') {
        for (i, b) in bytes.iter().enumerate().skip(2) {
            if (0x40..=0x7e).contains(b) {
                return EscapeMatch::Known(EscapeSeq::Unbound, i + 1);
            }
            if !(0x20..=0x3f).contains(b) {
                break;
            }
        }
        if bytes[2..].iter().all(|b| (0x20..=0x3f).contains(b)) {
            return EscapeMatch::Incomplete;
        }
    }
    EscapeMatch::Lone
}

/// Length of the longest suffix of `s` that is a proper prefix of `marker`.
fn partial_suffix_len(s: &str, marker: &str) -> usize {
    (1..marker.len().min(s.len() + 1))
        .rev()
        .find(|&n| s.is_char_boundary(s.len() - n) && marker.starts_with(&s[s.len() - n..]))
        .unwrap_or(0)
}

fn decode_segment(segment: &str, out: &mut Vec<Decoded>) {
    if segment.is_empty() {
        return;
    }
    let mut chars = segment.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_control() {
            out.push(Decoded::ControlChar(c as u8));
        } else {
            out.push(Decoded::TextRun(segment.to_string()));
        }
        return;
    }

    if segment.contains(['\r', '\n']) {
        for_each_line(segment, out, push_keys);
        return;
    }
    push_keys(segment, out);
}

/// Typed burst: printable runs stay together, control bytes (except tab) are keys.
fn push_keys(segment: &str, out: &mut Vec<Decoded>) {
    let mut run = String::new();
    for c in segment.chars() {
        if c.is_ascii_control() && c != '\t' {
            if !run.is_empty() {
                out.push(Decoded::TextRun(std::mem::take(&mut run)));
            }
            out.push(Decoded::ControlChar(c as u8));
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        out.push(Decoded::TextRun(run));
    }
}

/// Paste splitting: each complete line becomes `TextRun` + Enter, a trailing fragment stays a
/// bare `TextRun`. CRLF counts as one break.
fn split_lines(text: &str, out: &mut Vec<Decoded>) {
    for_each_line(text, out, push_text);
}

fn push_text(line: &str, out: &mut Vec<Decoded>) {
    if !line.is_empty() {
        out.push(Decoded::TextRun(line.to_string()));
    }
}

/// Runs `line` over every line of `text` with a synthetic Enter after each complete one.
fn for_each_line(text: &str, out: &mut Vec<Decoded>, line: fn(&str, &mut Vec<Decoded>)) {
    let mut rest = text;
    while let Some(idx) = rest.find(['\r', '\n']) {
        line(&rest[..idx], out);
        out.push(Decoded::enter());
        PASTE_LINES.fetch_add(1, Ordering::Relaxed);
        let skip = if rest[idx..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[idx + skip..];
    }
    line(rest, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Decoded {
        Decoded::TextRun(s.to_string())
    }

    #[test]
    fn known_sequence_followed_by_text_is_atomic() {
        let out = decode_chunk("\x1b[Dabc");
        assert_eq!(out, vec![Decoded::EscapeSequence(EscapeSeq::Left), text("abc")]);
    }

    #[test]
    fn word_jump_variants_map_to_same_motion() {
        for raw in ["\x1b[1;3D", "\x1b[1;5D", "\x1b\x1b[D", "\x1bb"] {
            assert_eq!(
                decode_chunk(raw),
                vec![Decoded::EscapeSequence(EscapeSeq::WordLeft)],
                "{raw:?}"
            );
        }
    }

    #[test]
    fn paste_with_crlf_splits_into_lines() {
        let out = decode_chunk("echo 1\r\necho 2");
        assert_eq!(out, vec![text("echo 1"), Decoded::enter(), text("echo 2")]);
    }

    #[test]
    fn paste_with_empty_lines_emits_bare_enter() {
        let out = decode_chunk("a\n\nb\n");
        assert_eq!(
            out,
            vec![text("a"), Decoded::enter(), Decoded::enter(), text("b"), Decoded::enter()]
        );
    }

    #[test]
    fn single_enter_is_control_char() {
        assert_eq!(decode_chunk("\r"), vec![Decoded::ControlChar(b'\r')]);
        assert_eq!(decode_chunk("\x03"), vec![Decoded::ControlChar(0x03)]);
    }

    #[test]
    fn paste_without_breaks_is_one_run() {
        assert_eq!(decode_chunk("print(1 + 2)"), vec![text("print(1 + 2)")]);
    }

    #[test]
    fn enter_not_first_in_chunk_still_submits() {
        assert_eq!(decode_chunk("x\r"), vec![text("x"), Decoded::enter()]);
    }

    #[test]
    fn coalesced_backspaces_are_keys() {
        assert_eq!(
            decode_chunk("ab\x7f\x7f"),
            vec![text("ab"), Decoded::ControlChar(0x7f), Decoded::ControlChar(0x7f)]
        );
    }

    #[test]
    fn control_bytes_in_a_multi_line_burst_are_keys() {
        assert_eq!(
            decode_chunk("ls\x7f\x7fpwd\r"),
            vec![
                text("ls"),
                Decoded::ControlChar(0x7f),
                Decoded::ControlChar(0x7f),
                text("pwd"),
                Decoded::enter(),
            ]
        );
    }

    #[test]
    fn held_escape_prefix_flushes_as_literal_input() {
        let mut d = ChunkDecoder::new();
        assert!(d.feed("\x1b[").is_empty());
        assert!(d.has_held_escape());
        assert_eq!(d.flush_held(), vec![Decoded::ControlChar(0x1b), text("[")]);
        assert!(!d.has_held_escape());
        assert_eq!(d.feed("a"), vec![text("a")]);
        assert!(d.flush_held().is_empty());
    }

    #[test]
    fn open_paste_is_not_flushed() {
        let mut d = ChunkDecoder::new();
        assert!(d.feed("\x1b[200~abc\x1b[20").is_empty());
        assert!(!d.has_held_escape());
        assert!(d.flush_held().is_empty());
    }

    #[test]
    fn lone_escape_is_control_char() {
        assert_eq!(decode_chunk("\x1b"), vec![Decoded::ControlChar(0x1b)]);
    }

    #[test]
    fn unbound_csi_is_swallowed() {
        assert_eq!(
            decode_chunk("\x1b[5~x"),
            vec![Decoded::EscapeSequence(EscapeSeq::Unbound), text("x")]
        );
    }

    #[test]
    fn split_escape_prefix_waits_for_next_chunk() {
        let mut d = ChunkDecoder::new();
        assert!(d.feed("\x1b[").is_empty());
        assert!(d.is_mid_sequence());
        assert_eq!(d.feed("A"), vec![Decoded::EscapeSequence(EscapeSeq::Up)]);
        assert!(!d.is_mid_sequence());
    }

    #[test]
    fn bracketed_paste_spans_chunks() {
        let mut d = ChunkDecoder::new();
        let first = d.feed("\x1b[200~for i in x:\n    pri");
        assert!(first.is_empty());
        let second = d.feed("nt(i)\x1b[201~");
        assert_eq!(
            second,
            vec![text("for i in x:"), Decoded::enter(), text("    print(i)")]
        );
    }

    #[test]
    fn bracketed_single_char_paste_is_text() {
        let out = decode_chunk("\x1b[200~\r\x1b[201~");
        assert_eq!(out, vec![Decoded::enter()]);
        let out = decode_chunk("\x1b[200~x\x1b[201~");
        assert_eq!(out, vec![text("x")]);
    }

    #[test]
    fn split_paste_end_marker_is_not_content() {
        let mut d = ChunkDecoder::new();
        assert!(d.feed("\x1b[200~abc\x1b[20").is_empty());
        assert_eq!(d.feed("1~"), vec![text("abc")]);
    }
}
