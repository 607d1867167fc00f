//! Terminal writer: an ordered command list flushed in one go.
//!
//! Every draw builds a fresh `Writer`, queues relative motions and prints, then flushes to the
//! output once so a frame is never observed half-drawn. Zero-distance motions are dropped at
//! queue time; terminals treat `CSI 0 A` as a one-row move.

use anyhow::Result;
use crossterm::{
    cursor::{MoveTo, MoveToColumn, MoveUp},
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MoveUp(u16),
    MoveToColumn(u16),
    /// Clear from the cursor to the end of the screen.
    ClearDown,
    ClearAll,
    Home,
    Print(String),
    /// `\r\n`: the terminal is in raw mode, so a bare `\n` would keep the column.
    NewLine,
}

#[derive(Debug, Default)]
pub struct Writer {
    cmds: Vec<Command>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_up(&mut self, rows: usize) {
        if rows > 0 {
            self.cmds.push(Command::MoveUp(to_u16(rows)));
        }
    }

    pub fn move_to_column(&mut self, col: usize) {
        self.cmds.push(Command::MoveToColumn(to_u16(col)));
    }

    pub fn clear_down(&mut self) {
        self.cmds.push(Command::ClearDown);
    }

    pub fn clear_all(&mut self) {
        self.cmds.push(Command::ClearAll);
        self.cmds.push(Command::Home);
    }

    /// Print `s`, translating every `\n` into `\r\n`.
    pub fn print<S: AsRef<str>>(&mut self, s: S) {
        let s = s.as_ref();
        if s.is_empty() {
            return;
        }
        self.cmds.push(Command::Print(to_crlf(s)));
    }

    pub fn newline(&mut self) {
        self.cmds.push(Command::NewLine);
    }

    pub fn commands(&self) -> &[Command] {
        &self.cmds
    }

    pub fn flush<W: Write>(self, out: &mut W) -> Result<()> {
        for c in self.cmds {
            match c {
                Command::MoveUp(n) => queue!(out, MoveUp(n))?,
                Command::MoveToColumn(col) => queue!(out, MoveToColumn(col))?,
                Command::ClearDown => queue!(out, Clear(ClearType::FromCursorDown))?,
                Command::ClearAll => queue!(out, Clear(ClearType::All))?,
                Command::Home => queue!(out, MoveTo(0, 0))?,
                Command::Print(s) => queue!(out, Print(s))?,
                Command::NewLine => queue!(out, Print("\r\n"))?,
            }
        }
        out.flush()?;
        Ok(())
    }
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// `\n` → `\r\n`, leaving existing `\r\n` pairs alone.
pub fn to_crlf(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut prev = '\0';
    for c in s.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
    out
}
