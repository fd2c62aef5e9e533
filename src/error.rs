//! Contains the error type for I/O and terminal related failures.
#[cfg(unix)]
use nix;
use std::error;
use std::fmt;
use std::io;

/// The error type returned by [`crate::Editor::read_line`] and friends.
///
/// Most failure modes an editing session can hit (allocation failure,
/// tokenizer stall, an unterminated escape sequence, an unknown key) are
/// absorbed locally and never reach the caller as an `EditError`:
/// the editor must remain usable even when those occur, so they are only
/// logged (see the `log` calls throughout `editor` and `render`).
#[derive(Debug)]
#[non_exhaustive]
pub enum EditError {
    /// Underlying I/O error while reading from or writing to the terminal.
    Io(io::Error),
    /// The input stream closed (e.g. a piped stdin reaching EOF). Ctrl-D is
    /// not special-cased here: per the key-binding table it always deletes
    /// the character at `posn`, even on an empty line.
    Eof,
    /// A unix syscall (termios, ioctl, poll, ...) failed.
    #[cfg(unix)]
    Errno(nix::Error),
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::Io(err) => err.fmt(f),
            EditError::Eof => write!(f, "EOF"),
            #[cfg(unix)]
            EditError::Errno(err) => err.fmt(f),
        }
    }
}

impl error::Error for EditError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            EditError::Io(err) => Some(err),
            #[cfg(unix)]
            EditError::Errno(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for EditError {
    fn from(err: io::Error) -> EditError {
        EditError::Io(err)
    }
}

#[cfg(unix)]
impl From<nix::Error> for EditError {
    fn from(err: nix::Error) -> EditError {
        EditError::Errno(err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EditError>;
