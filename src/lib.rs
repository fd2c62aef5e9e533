//! An embeddable, UTF-8 and grapheme-aware single-field line editor for
//! interactive terminals.
//!
//! ```no_run
//! use replline::{Editor, UnixTerm};
//!
//! let mut editor = Editor::new(UnixTerm::new());
//! editor.set_prompt("> ");
//! while let Ok(line) = editor.read_line() {
//!     println!("you said: {line}");
//! }
//! ```
//!
//! The editor core (`editor.rs`) is the state machine everything else
//! exists to support; the rest of the crate is laid out by concern:
//! terminal I/O (`tty`), UTF-8/grapheme handling (`unicode`), the edited
//! line itself (`line_buffer`), history/completion storage
//! (`string_list`), key decoding (`keys`), and drawing (`render`).

mod editor;

pub mod completion;
pub mod config;
pub mod error;
pub mod highlight;
pub mod keys;
pub mod line_buffer;
pub mod render;
pub mod string_list;
pub mod tty;
pub mod unicode;
pub mod validate;

pub use completion::{add_suggestion, Completer};
pub use config::{BellStyle, Builder, Config, ColorMode};
pub use editor::Editor;
pub use error::{EditError, Result};
pub use highlight::{Color, ColorMap, Emphasis, Token, TokenKind, Tokenizer};
pub use keys::{KeyCode, KeyEvent, Modifiers};
pub use line_buffer::{Buffer, Coord};
pub use string_list::StringList;
pub use tty::{RawMode, RawReader, Renderer, Term, TermKind};
pub use unicode::{CodepointSplitter, GraphemeSplitter, GraphemeWidthCache, UnicodeSegmentationSplitter};
pub use validate::Continuation;

#[cfg(unix)]
pub use tty::UnixTerm;

/// Whether stdin and stdout are both attached to a terminal,
/// independent of `TERM`'s capability classification.
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    let term = UnixTerm::new();
    term.is_input_tty() && term.is_output_tty()
}
