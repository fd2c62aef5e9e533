//! A synthetic terminal backend used by the test suite: a `VecDeque<u8>`
//! stands in for stdin, a `Vec<u8>` sink stands in for stdout, so editor
//! behavior can be tested without a real PTY.

use std::collections::VecDeque;
use std::rc::Rc;
use std::cell::RefCell;

use super::{RawMode, RawReader, Renderer, Term, TermKind};
use crate::error::EditError;
use crate::Result;

/// Shared state between a [`TestTerm`] and the readers/writers it hands
/// out, so a test can inspect what was written after the fact.
#[derive(Default)]
struct Shared {
    input: VecDeque<u8>,
    output: Vec<u8>,
    width: usize,
    /// Simulated cursor column, advanced by one per byte written that
    /// isn't part of an escape sequence; read by `query_cursor_column`
    /// instead of round-tripping through `input`.
    column: usize,
    /// Number of times `query_cursor_column` has been called, so tests
    /// can assert a grapheme is measured at most once (width cache
    /// monotonicity).
    cursor_queries: usize,
}

#[derive(Clone)]
pub struct TestTerm {
    shared: Rc<RefCell<Shared>>,
    kind: TermKind,
}

impl TestTerm {
    #[must_use]
    pub fn new(kind: TermKind, width: usize) -> Self {
        TestTerm {
            shared: Rc::new(RefCell::new(Shared {
                width,
                ..Shared::default()
            })),
            kind,
        }
    }

    /// Queue bytes as if they had arrived on stdin.
    pub fn feed(&self, bytes: &[u8]) {
        self.shared.borrow_mut().input.extend(bytes.iter().copied());
    }

    /// Snapshot of everything written to the simulated stdout so far.
    #[must_use]
    pub fn output(&self) -> Vec<u8> {
        self.shared.borrow().output.clone()
    }

    pub fn clear_output(&self) {
        self.shared.borrow_mut().output.clear();
    }

    pub fn set_width(&self, width: usize) {
        self.shared.borrow_mut().width = width;
    }

    /// Number of real cursor-position round trips performed so far
    /// (i.e. how many times a grapheme width actually had to be
    /// measured rather than served from the cache).
    #[must_use]
    pub fn cursor_queries(&self) -> usize {
        self.shared.borrow().cursor_queries
    }
}

pub struct TestReader {
    shared: Rc<RefCell<Shared>>,
}

impl RawReader for TestReader {
    fn read_byte(&mut self) -> Result<u8> {
        self.shared
            .borrow_mut()
            .input
            .pop_front()
            .ok_or(EditError::Eof)
    }

    /// A zero timeout is specifically the edit loop's burst-coalescing
    /// check. A synthetic feed delivers every queued byte at
    /// once, with no inter-keystroke gap to distinguish; reporting
    /// "ready" there would collapse a whole `feed()` into one burst and
    /// starve suggestion regeneration, which runs once per burst. Any
    /// other timeout is an escape-sequence continuation read, which
    /// still checks the real queue.
    fn poll_ready(&mut self, timeout_ms: i32) -> Result<bool> {
        if timeout_ms == 0 {
            return Ok(false);
        }
        Ok(!self.shared.borrow().input.is_empty())
    }
}

pub struct TestRenderer {
    shared: Rc<RefCell<Shared>>,
}

impl Renderer for TestRenderer {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut shared = self.shared.borrow_mut();
        shared.output.extend_from_slice(bytes);
        // A crude but adequate column simulator for tests that exercise
        // `measure_width`: count bytes outside of `ESC ... letter`
        // sequences as one column each.
        let mut in_escape = false;
        for &b in bytes {
            if in_escape {
                if b.is_ascii_alphabetic() {
                    in_escape = false;
                }
                continue;
            }
            if b == 0x1b {
                in_escape = true;
            } else if b == b'\r' {
                shared.column = 0;
            } else if b == b'\n' {
                // line feed doesn't move the column in this simulator
            } else {
                shared.column += 1;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn width(&mut self) -> usize {
        self.shared.borrow().width
    }

    fn query_cursor_column(&mut self, _reader: &mut dyn RawReader) -> Result<usize> {
        let mut shared = self.shared.borrow_mut();
        shared.cursor_queries += 1;
        Ok(shared.column + 1) // 1-based, like the real reply
    }
}

pub struct TestMode;

impl RawMode for TestMode {
    fn disable_raw_mode(&self) -> Result<()> {
        Ok(())
    }
}

impl Term for TestTerm {
    type Reader = TestReader;
    type Writer = TestRenderer;
    type Mode = TestMode;

    fn classify(&self) -> TermKind {
        self.kind
    }

    fn is_input_tty(&self) -> bool {
        self.kind != TermKind::NotTty
    }

    fn is_output_tty(&self) -> bool {
        self.kind != TermKind::NotTty
    }

    fn enable_raw_mode(&mut self) -> Result<Self::Mode> {
        Ok(TestMode)
    }

    fn reader(&self) -> Self::Reader {
        TestReader {
            shared: Rc::clone(&self.shared),
        }
    }

    fn writer(&self) -> Self::Writer {
        TestRenderer {
            shared: Rc::clone(&self.shared),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn feed_and_read_byte() {
        let term = TestTerm::new(TermKind::Supported, 80);
        term.feed(b"hi");
        let mut reader = term.reader();
        assert_eq!(reader.read_byte().unwrap(), b'h');
        assert_eq!(reader.read_byte().unwrap(), b'i');
        assert!(reader.read_byte().is_err());
    }

    #[test]
    fn write_tracks_simulated_column() {
        let term = TestTerm::new(TermKind::Supported, 80);
        let mut writer = term.writer();
        let mut reader = term.reader();
        writer.write_all(b"ab").unwrap();
        assert_eq!(writer.query_cursor_column(&mut reader).unwrap(), 3);
        writer.write_all(b"\r").unwrap();
        assert_eq!(writer.query_cursor_column(&mut reader).unwrap(), 1);
    }
}
