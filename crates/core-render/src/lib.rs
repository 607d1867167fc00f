//! Inline rendering of the prompt line below the session's scrollback.
//!
//! The REPL never takes over the screen: remote output scrolls normally and the prompt block
//! is redrawn in place at the bottom.
//!
//! - `layout`: row/column arithmetic with wrapping and wide graphemes.
//! - `highlight`: token classification, SGR color spans, `strip_sgr`.
//! - `popup`: windowed completion list.
//! - `writer`: ordered terminal command list flushed once per draw.
//! - `renderer`: redraw / commit / print-above over a remembered cursor row.
//! - `scheduler`: debounce deadline for fast typing at the end of the line.

pub mod highlight;
pub mod layout;
pub mod popup;
pub mod renderer;
pub mod scheduler;
pub mod writer;

pub use highlight::{Highlighter, strip_sgr};
pub use renderer::Renderer;
pub use scheduler::{DEFAULT_DEBOUNCE, RedrawScheduler};
