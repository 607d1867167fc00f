//! Reassembles UTF-8 sequences split across stdin reads.
//!
//! Reads use a fixed buffer, so a multi-byte character can straddle two reads. The trailing
//! incomplete bytes are held back and prepended to the next read; genuinely invalid bytes become
//! U+FFFD.

use std::borrow::Cow;

const MAX_PARTIAL: usize = 4;

#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    partial: [u8; MAX_PARTIAL],
    partial_len: usize,
}

impl Utf8Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_partial(&self) -> bool {
        self.partial_len > 0
    }

    pub fn accumulate<'a>(&mut self, data: &'a [u8]) -> Cow<'a, str> {
        if self.partial_len == 0
            && let Ok(s) = std::str::from_utf8(data)
        {
            return Cow::Borrowed(s);
        }

        let mut buf: Vec<u8>;
        let combined: &[u8] = if self.partial_len > 0 {
            buf = Vec::with_capacity(self.partial_len + data.len());
            buf.extend_from_slice(&self.partial[..self.partial_len]);
            buf.extend_from_slice(data);
            self.partial_len = 0;
            &buf
        } else {
            data
        };

        let valid_up_to = match std::str::from_utf8(combined) {
            Ok(_) => combined.len(),
            Err(e) => e.valid_up_to(),
        };
        let trailing = &combined[valid_up_to..];

        if !trailing.is_empty() && is_truncated_sequence(trailing) {
            self.partial[..trailing.len()].copy_from_slice(trailing);
            self.partial_len = trailing.len();
            return Cow::Owned(String::from_utf8_lossy(&combined[..valid_up_to]).into_owned());
        }

        Cow::Owned(String::from_utf8_lossy(combined).into_owned())
    }
}

/// A lead byte followed by fewer continuation bytes than it announces.
fn is_truncated_sequence(bytes: &[u8]) -> bool {
    let expected = match bytes[0] {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return false,
    };
    bytes.len() < expected && bytes[1..].iter().all(|b| (0x80..=0xBF).contains(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_input_borrows() {
        let mut acc = Utf8Accumulator::new();
        assert!(matches!(acc.accumulate(b"print(1)"), Cow::Borrowed(_)));
    }

    #[test]
    fn split_three_byte_char() {
        let mut acc = Utf8Accumulator::new();
        // '€' = E2 82 AC
        assert_eq!(&*acc.accumulate(b"x = '\xE2\x82"), "x = '");
        assert!(acc.has_partial());
        assert_eq!(&*acc.accumulate(b"\xAC'"), "€'");
        assert!(!acc.has_partial());
    }

    #[test]
    fn invalid_byte_is_replaced() {
        let mut acc = Utf8Accumulator::new();
        assert_eq!(&*acc.accumulate(b"a\xFFb"), "a\u{FFFD}b");
    }
}
