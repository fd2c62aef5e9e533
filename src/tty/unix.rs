//! Unix terminal backend: `termios` raw mode, `select`-based polling,
//! and `ioctl(TIOCGWINSZ)` width queries.

use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::sync::{Once, OnceLock};
use std::sync::Mutex;

use log::{debug, warn};
use nix::poll::{PollFd, PollFlags, PollTimeout};
use nix::sys::termios::{
    self, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices,
};

use super::{ansi, RawMode, RawReader, Renderer, Term, TermKind};
use crate::error::EditError;
use crate::Result;

const STDIN_FILENO: RawFd = libc::STDIN_FILENO;
const STDOUT_FILENO: RawFd = libc::STDOUT_FILENO;

nix::ioctl_read_bad!(win_size, libc::TIOCGWINSZ, libc::winsize);

fn is_a_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) != 0 }
}

/// Reads stdin directly through `libc::read`, retrying on `EINTR` rather
/// than giving up the moment a signal interrupts the call.
fn read_stdin_byte() -> io::Result<u8> {
    let mut byte = [0u8; 1];
    loop {
        let n = unsafe { libc::read(STDIN_FILENO, byte.as_mut_ptr().cast(), 1) };
        match n {
            1 => return Ok(byte[0]),
            0 => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed")),
            _ => {
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
        }
    }
}

/// The terminal state captured just before the first entry into raw mode,
/// and a guard so the `atexit` restore hook is installed at most once per
/// process.
static ORIGINAL_TERMIOS: OnceLock<Mutex<Option<termios::Termios>>> = OnceLock::new();
static AT_EXIT_GUARD: Once = Once::new();

extern "C" fn restore_terminal_at_exit() {
    if let Some(lock) = ORIGINAL_TERMIOS.get() {
        if let Ok(guard) = lock.lock() {
            if let Some(original) = guard.as_ref() {
                let _ = termios::tcsetattr(STDIN_FILENO, SetArg::TCSADRAIN, original);
                print!("\r");
                let _ = io::stdout().flush();
            }
        }
    }
}

pub struct PosixMode {
    original: termios::Termios,
}

impl RawMode for PosixMode {
    fn disable_raw_mode(&self) -> Result<()> {
        termios::tcsetattr(STDIN_FILENO, SetArg::TCSADRAIN, &self.original)?;
        // A bare carriage return so a following shell prompt doesn't
        // inherit whatever column the cursor was left at.
        print!("\r");
        let _ = io::stdout().flush();
        Ok(())
    }
}

pub struct PosixRawReader;

impl RawReader for PosixRawReader {
    fn read_byte(&mut self) -> Result<u8> {
        Ok(read_stdin_byte()?)
    }

    fn poll_ready(&mut self, timeout_ms: i32) -> Result<bool> {
        let timeout = PollTimeout::try_from(timeout_ms).unwrap_or(PollTimeout::NONE);
        let mut fds = [PollFd::new(
            unsafe { std::os::fd::BorrowedFd::borrow_raw(STDIN_FILENO) },
            PollFlags::POLLIN,
        )];
        match nix::poll::poll(&mut fds, timeout) {
            Ok(n) => Ok(n > 0),
            Err(nix::errno::Errno::EINTR) => Ok(false),
            Err(e) => Err(EditError::Errno(e)),
        }
    }
}

pub struct PosixRenderer;

impl Renderer for PosixRenderer {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        io::stdout().write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        io::stdout().flush()?;
        Ok(())
    }

    fn width(&mut self) -> usize {
        unsafe {
            let mut size: libc::winsize = std::mem::zeroed();
            match win_size(STDOUT_FILENO, &mut size) {
                Ok(0) if size.ws_col != 0 => size.ws_col as usize,
                _ => 80,
            }
        }
    }

    fn query_cursor_column(&mut self, reader: &mut dyn RawReader) -> Result<usize> {
        self.write_all(ansi::QUERY_CURSOR.as_bytes())?;
        self.flush()?;
        // Expect `ESC [ row ; col R`.
        let mut buf = Vec::with_capacity(16);
        loop {
            if buf.len() >= 32 {
                warn!("cursor position query did not terminate");
                return Ok(1);
            }
            let byte = reader.read_byte()?;
            buf.push(byte);
            if byte == b'R' {
                break;
            }
        }
        parse_cursor_report(&buf).ok_or(()).or_else(|()| {
            warn!("unparseable cursor position report: {buf:?}");
            Ok(1)
        })
    }
}

fn parse_cursor_report(buf: &[u8]) -> Option<usize> {
    let s = std::str::from_utf8(buf).ok()?;
    let body = s.strip_prefix("\x1b[")?.strip_suffix('R')?;
    let (_row, col) = body.split_once(';')?;
    col.parse().ok()
}

pub struct UnixTerm {
    input_tty: bool,
    output_tty: bool,
}

impl UnixTerm {
    #[must_use]
    pub fn new() -> Self {
        UnixTerm {
            input_tty: is_a_tty(STDIN_FILENO),
            output_tty: is_a_tty(STDOUT_FILENO),
        }
    }
}

impl Default for UnixTerm {
    fn default() -> Self {
        Self::new()
    }
}

impl Term for UnixTerm {
    type Reader = PosixRawReader;
    type Writer = PosixRenderer;
    type Mode = PosixMode;

    fn classify(&self) -> TermKind {
        super::classify_term(self.input_tty, self.output_tty)
    }

    fn is_input_tty(&self) -> bool {
        self.input_tty
    }

    fn is_output_tty(&self) -> bool {
        self.output_tty
    }

    fn enable_raw_mode(&mut self) -> Result<Self::Mode> {
        if !self.input_tty {
            return Err(EditError::Eof);
        }
        let original = termios::tcgetattr(STDIN_FILENO)?;
        let cell = ORIGINAL_TERMIOS.get_or_init(|| Mutex::new(None));
        *cell.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(original.clone());
        AT_EXIT_GUARD.call_once(|| unsafe {
            libc::atexit(restore_terminal_at_exit);
        });
        let mut raw = original.clone();
        raw.input_flags &= !(InputFlags::BRKINT
            | InputFlags::ICRNL
            | InputFlags::INPCK
            | InputFlags::ISTRIP
            | InputFlags::IXON);
        raw.output_flags &= !OutputFlags::OPOST;
        raw.control_flags |= ControlFlags::CS8;
        raw.local_flags &=
            !(LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::IEXTEN | LocalFlags::ISIG);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(STDIN_FILENO, SetArg::TCSADRAIN, &raw)?;
        debug!("raw mode enabled");
        Ok(PosixMode { original })
    }

    fn reader(&self) -> Self::Reader {
        PosixRawReader
    }

    fn writer(&self) -> Self::Writer {
        PosixRenderer
    }
}
