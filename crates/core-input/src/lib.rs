//! Terminal input: raw stdin chunks in, logical keys out.
//!
//! The reader task forwards whole chunks (one read = one chunk) so the decoder can tell a single
//! keystroke from a paste. `KeyStream` owns the stateful decoder and turns each chunk into the
//! ordered `Key` list the dispatcher consumes.

mod async_service;
pub mod decoder;
pub mod key_token;
pub mod utf8;

pub use async_service::AsyncInputShutdown;
pub use decoder::{ChunkDecoder, Decoded, EscapeSeq, decode_chunk};
pub use key_token::{Key, TAB_INDENT, map_decoded, sanitize_text};

use core_events::Event;
use tokio::task::JoinHandle;

/// Spawn the stdin reader task. Raw mode must already be enabled by the terminal backend.
pub fn spawn_stdin_input(
    sender: tokio::sync::mpsc::Sender<Event>,
) -> (JoinHandle<()>, AsyncInputShutdown) {
    async_service::spawn_reader_task(sender, tokio::io::stdin())
}

/// Spawn the reader over an arbitrary byte source.
pub fn spawn_reader_input<R>(
    sender: tokio::sync::mpsc::Sender<Event>,
    reader: R,
) -> (JoinHandle<()>, AsyncInputShutdown)
where
    R: tokio::io::AsyncRead + Send + Unpin + 'static,
{
    async_service::spawn_reader_task(sender, reader)
}

/// Chunk-to-key pipeline with decoder state carried across chunks.
#[derive(Debug, Default)]
pub struct KeyStream {
    decoder: ChunkDecoder,
}

impl KeyStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<Key> {
        let keys: Vec<Key> = self
            .decoder
            .feed(chunk)
            .into_iter()
            .map(map_decoded)
            .filter(|k| *k != Key::Ignored)
            .collect();
        tracing::trace!(target: "input.decode", chunk_len = chunk.len(), keys = keys.len(), "keys");
        keys
    }

    /// An escape prefix is waiting for more bytes; see `flush_held`.
    pub fn has_held_escape(&self) -> bool {
        self.decoder.has_held_escape()
    }

    /// Keys for a held escape prefix whose follow-up never came.
    pub fn flush_held(&mut self) -> Vec<Key> {
        self.decoder
            .flush_held()
            .into_iter()
            .map(map_decoded)
            .filter(|k| *k != Key::Ignored)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paste_becomes_text_and_enter_keys() {
        let mut ks = KeyStream::new();
        assert_eq!(
            ks.feed("x = 1\ny = 2\n"),
            vec![
                Key::Text("x = 1".into()),
                Key::Enter,
                Key::Text("y = 2".into()),
                Key::Enter,
            ]
        );
    }

    #[test]
    fn held_prefix_flushes_to_escape_and_text() {
        let mut ks = KeyStream::new();
        assert!(ks.feed("\x1b[").is_empty());
        assert!(ks.has_held_escape());
        assert_eq!(ks.flush_held(), vec![Key::Escape, Key::Text("[".into())]);
        assert_eq!(ks.feed("a"), vec![Key::Text("a".into())]);
    }

    #[test]
    fn unbound_sequences_are_filtered() {
        let mut ks = KeyStream::new();
        assert_eq!(ks.feed("\x1b[5~"), Vec::<Key>::new());
        assert_eq!(ks.feed("\x1b[1;5C"), vec![Key::WordRight]);
    }
}
