//! Pasted multi-line input through the full key pipeline and the embedded interpreter.

use core_actions::{DispatchContext, Effect, dispatch};
use core_input::KeyStream;
use core_interp::{DocRegistry, EmbeddedRepl};
use core_state::{PRIMARY_PROMPT, SessionState};
use std::sync::Arc;

struct Harness {
    state: SessionState,
    repl: EmbeddedRepl,
    docs: Arc<DocRegistry>,
    keys: KeyStream,
}

impl Harness {
    fn new() -> Self {
        let docs = Arc::new(DocRegistry::builtin());
        Self {
            state: SessionState::default(),
            repl: EmbeddedRepl::new(docs.clone()),
            docs,
            keys: KeyStream::new(),
        }
    }

    fn feed(&mut self, chunk: &str) -> Vec<Effect> {
        let mut ctx = DispatchContext {
            interp: &mut self.repl,
            docs: &self.docs,
            trigger_chars: &['.'],
        };
        let mut effects = Vec::new();
        for key in self.keys.feed(chunk) {
            effects.extend(dispatch(&mut self.state, key, &mut ctx));
        }
        effects
    }
}

fn sent(effects: &[Effect]) -> Vec<&str> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Send(s) => Some(s.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn pasted_lines_submit_one_at_a_time() {
    let mut h = Harness::new();
    let effects = h.feed("echo 1\r\necho 2");
    assert_eq!(sent(&effects), ["echo 1"]);
    assert_eq!(h.state.buffer, "echo 2");
    assert_eq!(h.state.history.entries(), ["echo 1"]);
}

#[test]
fn pasted_block_with_blank_terminator_sends_once() {
    let mut h = Harness::new();
    let effects = h.feed("\x1b[200~for x in [1, 2]:\n    print(x)\n\n\x1b[201~");
    let statements = sent(&effects);
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("for x in [1, 2]:\n    print(x)"));
    assert_eq!(h.state.prompt, PRIMARY_PROMPT);
    assert!(h.state.pending_block.is_empty());
}

#[test]
fn shell_shorthand_is_expanded_before_sending() {
    let mut h = Harness::new();
    let effects = h.feed("!whoami\r");
    assert_eq!(sent(&effects), ["sys.shell(\"whoami\")"]);
    assert_eq!(h.state.history.entries(), ["!whoami"]);
}

#[test]
fn split_escape_sequence_moves_cursor_once() {
    let mut h = Harness::new();
    h.feed("abc");
    h.feed("\x1b[");
    assert_eq!(h.state.cursor, 3);
    h.feed("D");
    assert_eq!(h.state.cursor, 2);
    assert_eq!(h.state.buffer, "abc");
}
