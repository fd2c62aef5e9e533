//! Terminal adapter: capability classification, raw mode, and the
//! `RawReader`/`Renderer` traits the editor core drives.

use crate::Result;

/// Terminal names refused for raw mode, compared case-insensitively.
const UNSUPPORTED_TERM: [&str; 3] = ["dumb", "cons25", "emacs"];

/// The three capability classes recognized when a read begins.
/// `NotTty` and `Unsupported` both fall back to the degenerate
/// line-readers described alongside the editor core; only `Supported` runs the full
/// interactive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    NotTty,
    Unsupported,
    Supported,
}

/// RAII-ish handle to the terminal state captured before entering raw
/// mode. Dropping it does *not* restore the terminal: callers must
/// call [`RawMode::disable_raw_mode`] explicitly; an at-exit hook is the
/// fallback for the non-ordinary exit paths that skip it.
pub trait RawMode: Sized {
    fn disable_raw_mode(&self) -> Result<()>;
}

/// Reads bytes from the input side of the terminal.
pub trait RawReader {
    /// Blocking read of exactly one byte.
    fn read_byte(&mut self) -> Result<u8>;

    /// Non-blocking check for more input, used both to decide whether a
    /// keypress burst continues (a zero-timeout poll) and, with a
    /// small positive timeout, to read the remaining bytes of an escape
    /// sequence without hanging forever on a lone ESC.
    fn poll_ready(&mut self, timeout_ms: i32) -> Result<bool>;
}

/// Writes bytes to the output side of the terminal and can query its
/// dimensions and cursor position.
pub trait Renderer {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;

    /// Current terminal width in columns, re-queried on every call
    /// falls back to 80 on failure.
    fn width(&mut self) -> usize;

    /// Writes `ESC[6n` and parses the `ESC[row;colR` reply from `reader`,
    /// returning the reported column (1-based). Used by `measure_width`
    /// to measure an unknown grapheme's on-screen width by
    /// diffing the cursor column before and after writing it.
    fn query_cursor_column(&mut self, reader: &mut dyn RawReader) -> Result<usize>;
}

/// Ties a concrete raw-mode guard, reader, and renderer to one terminal
/// backend, and exposes the capability classification and raw-mode
/// enter/exit.
pub trait Term {
    type Reader: RawReader;
    type Writer: Renderer;
    type Mode: RawMode;

    fn classify(&self) -> TermKind;
    fn is_input_tty(&self) -> bool;
    fn is_output_tty(&self) -> bool;

    /// Enables raw mode, returning a guard that restores the original
    /// state when [`RawMode::disable_raw_mode`] is called on it.
    fn enable_raw_mode(&mut self) -> Result<Self::Mode>;

    fn reader(&self) -> Self::Reader;
    fn writer(&self) -> Self::Writer;
}

/// Case-insensitive `TERM` check against the unsupported list, used by
/// [`classify_term`].
pub fn is_unsupported_term() -> bool {
    match std::env::var("TERM") {
        Ok(term) => UNSUPPORTED_TERM.iter().any(|u| u.eq_ignore_ascii_case(&term)),
        Err(_) => true,
    }
}

/// Classifies the terminal from whether stdin/stdout are TTYs and the
/// `TERM` environment variable, independent of any particular [`Term`]
/// backend.
#[must_use]
pub fn classify_term(is_input_tty: bool, is_output_tty: bool) -> TermKind {
    if !is_input_tty || !is_output_tty {
        TermKind::NotTty
    } else if is_unsupported_term() {
        TermKind::Unsupported
    } else {
        TermKind::Supported
    }
}

pub mod ansi {
    //! The fixed set of ANSI CSI sequences the render engine emits
    //! Kept as plain `String`-builders rather than constants
    //! since most of them are parameterized.

    pub const ERASE_LINE: &str = "\x1b[2K";
    pub const ERASE_TO_EOL: &str = "\x1b[0K";
    pub const HOME: &str = "\r";
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const UNDERLINE: &str = "\x1b[4m";
    pub const REVERSE: &str = "\x1b[7m";
    pub const QUERY_CURSOR: &str = "\x1b[6n";

    #[must_use]
    pub fn set_color(ansi_digit: u8) -> String {
        format!("\x1b[3{ansi_digit}m")
    }

    /// `n == 0` emits nothing: xterm-family terminals clamp `ESC[0C` to a
    /// move of 1, so a zero-column move must not be written at all.
    #[must_use]
    pub fn move_to_column(n: usize) -> String {
        if n == 0 {
            String::new()
        } else {
            format!("\r\x1b[{n}C")
        }
    }

    /// `n == 0` emits nothing: `ESC[0A` is clamped to a move of 1 by
    /// xterm-family terminals rather than being a no-op.
    #[must_use]
    pub fn move_up(n: usize) -> String {
        if n == 0 {
            String::new()
        } else {
            format!("\x1b[{n}A")
        }
    }

    /// `n == 0` emits nothing, for the same reason as [`move_up`].
    #[must_use]
    pub fn move_down(n: usize) -> String {
        if n == 0 {
            String::new()
        } else {
            format!("\x1b[{n}B")
        }
    }
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::UnixTerm;

/// A synthetic terminal backend (in-memory stdin/stdout) used by this
/// crate's own tests and available to host test suites that want to
/// drive an [`crate::Editor`] without a real PTY.
pub mod test;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_not_tty_wins_over_term_name() {
        assert_eq!(classify_term(false, true), TermKind::NotTty);
        assert_eq!(classify_term(true, false), TermKind::NotTty);
    }
}
