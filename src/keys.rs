//! Key types produced by the key decoder.
use bitflags::bitflags;
use log::debug;

use crate::tty::RawReader;
use crate::unicode;
use crate::Result;

bitflags! {
    /// Modifiers recognized alongside a [`KeyCode`].
    ///
    /// The only modifier the decoder ever produces on its own is
    /// [`Modifiers::SHIFT`] (for `shift+arrow`); `Ctrl` combinations are
    /// folded directly into [`KeyCode::Ctrl`] instead of being expressed as
    /// `KeyCode::Char` + `Modifiers::CTRL`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const NONE  = 0;
        const SHIFT = 1 << 0;
    }
}

/// A decoded logical keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum KeyCode {
    /// A printable grapheme-starting UTF-8 character.
    Char(char),
    /// `Ctrl+<letter>`.
    Ctrl(char),
    Tab,
    Enter,
    /// The terminal's "Delete/backspace" key (byte 127): removes the
    /// character, or selection, to the left of the cursor.
    Delete,
    Up,
    Down,
    Left,
    Right,
    /// Anything the decoder could not classify: an unterminated or
    /// unrecognized escape sequence, or an unhandled control byte.
    Unknown,
}

/// A single key event: a code plus whatever modifiers apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent(pub KeyCode, pub Modifiers);

impl KeyEvent {
    pub const fn new(code: KeyCode, mods: Modifiers) -> Self {
        KeyEvent(code, mods)
    }

    pub const fn plain(code: KeyCode) -> Self {
        KeyEvent(code, Modifiers::NONE)
    }
}

/// Classify a single non-escape, non-UTF8-lead control byte (1..=26, TAB,
/// RETURN, DELETE).
///
/// Returns `None` if `byte` is not one of the bytes this function handles
/// (the caller should treat that as [`KeyCode::Unknown`]).
pub fn decode_control_byte(byte: u8) -> Option<KeyEvent> {
    match byte {
        9 => Some(KeyEvent::plain(KeyCode::Tab)),
        13 => Some(KeyEvent::plain(KeyCode::Enter)),
        127 => Some(KeyEvent::plain(KeyCode::Delete)),
        1..=26 => {
            let letter = (byte + b'A' - 1) as char;
            Some(KeyEvent::plain(KeyCode::Ctrl(letter)))
        }
        _ => None,
    }
}

/// Decode the body of a `CSI` escape sequence (everything after `ESC [`)
/// collected up to and including its terminating alphabetic byte.
///
/// `body` does not include the leading `ESC` or `[`. Plain `A`/`B`/`C`/`D`
/// are arrow keys; `1;2C` / `1;2D` are shift+arrow; anything else is
/// unknown.
pub fn decode_csi_body(body: &[u8]) -> KeyEvent {
    match body {
        [b'A'] => KeyEvent::plain(KeyCode::Up),
        [b'B'] => KeyEvent::plain(KeyCode::Down),
        [b'C'] => KeyEvent::plain(KeyCode::Right),
        [b'D'] => KeyEvent::plain(KeyCode::Left),
        b"1;2C" => KeyEvent::new(KeyCode::Right, Modifiers::SHIFT),
        b"1;2D" => KeyEvent::new(KeyCode::Left, Modifiers::SHIFT),
        _ => KeyEvent::plain(KeyCode::Unknown),
    }
}

/// Longest CSI body the decoder buffers before giving up.
const MAX_ESCAPE_LEN: usize = 8;

/// Reads one logical keypress from `reader`: a single control byte,
/// a `CSI` escape sequence, or a UTF-8-encoded character. Blocks on the
/// first byte; anything after a leading `ESC` is read non-blockingly,
/// bounded by `keyseq_timeout_ms` (`None` means block on each subsequent
/// byte too, i.e. no timeout).
pub fn read_key(reader: &mut dyn RawReader, keyseq_timeout_ms: Option<u16>) -> Result<KeyEvent> {
    let first = reader.read_byte()?;
    if let Some(event) = decode_control_byte(first) {
        return Ok(event);
    }
    if first == 27 {
        return read_escape_sequence(reader, keyseq_timeout_ms);
    }
    let len = unicode::byte_len(first);
    if len == 0 {
        debug!("dropped stray UTF-8 continuation byte {first:#x}");
        return Ok(KeyEvent::plain(KeyCode::Unknown));
    }
    if len == 1 {
        return Ok(KeyEvent::plain(KeyCode::Char(first as char)));
    }
    let mut buf = [0u8; 4];
    buf[0] = first;
    for slot in buf.iter_mut().take(len).skip(1) {
        *slot = reader.read_byte()?;
    }
    Ok(KeyEvent::plain(KeyCode::Char(unicode::decode(&buf[..len]))))
}

/// Decodes everything after a leading `ESC`: `ESC [` starts a
/// `CSI` sequence, read up to [`MAX_ESCAPE_LEN`] bytes until an alphabetic
/// terminator; anything else (a lone `ESC`, or `ESC` not followed by `[`)
/// is [`KeyCode::Unknown`].
fn read_escape_sequence(reader: &mut dyn RawReader, keyseq_timeout_ms: Option<u16>) -> Result<KeyEvent> {
    let poll_timeout = keyseq_timeout_ms.map_or(-1, i32::from);
    if !reader.poll_ready(poll_timeout)? {
        debug!("unterminated escape sequence: lone ESC");
        return Ok(KeyEvent::plain(KeyCode::Unknown));
    }
    if reader.read_byte()? != b'[' {
        return Ok(KeyEvent::plain(KeyCode::Unknown));
    }
    let mut body = Vec::with_capacity(MAX_ESCAPE_LEN);
    loop {
        if body.len() >= MAX_ESCAPE_LEN {
            debug!("escape sequence buffer filled without a terminator; discarding");
            return Ok(KeyEvent::plain(KeyCode::Unknown));
        }
        if !reader.poll_ready(poll_timeout)? {
            debug!("unterminated escape sequence: ESC [ {body:?}");
            return Ok(KeyEvent::plain(KeyCode::Unknown));
        }
        let byte = reader.read_byte()?;
        body.push(byte);
        if byte.is_ascii_alphabetic() {
            break;
        }
    }
    Ok(decode_csi_body(&body))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tty::test::TestTerm;
    use crate::tty::TermKind;

    #[test]
    fn ctrl_letters() {
        assert_eq!(
            decode_control_byte(1),
            Some(KeyEvent::plain(KeyCode::Ctrl('A')))
        );
        assert_eq!(
            decode_control_byte(7),
            Some(KeyEvent::plain(KeyCode::Ctrl('G')))
        );
        assert_eq!(decode_control_byte(9), Some(KeyEvent::plain(KeyCode::Tab)));
        assert_eq!(
            decode_control_byte(13),
            Some(KeyEvent::plain(KeyCode::Enter))
        );
        assert_eq!(
            decode_control_byte(127),
            Some(KeyEvent::plain(KeyCode::Delete))
        );
        assert_eq!(decode_control_byte(0), None);
    }

    #[test]
    fn csi_arrows() {
        assert_eq!(decode_csi_body(b"A"), KeyEvent::plain(KeyCode::Up));
        assert_eq!(decode_csi_body(b"D"), KeyEvent::plain(KeyCode::Left));
        assert_eq!(
            decode_csi_body(b"1;2C"),
            KeyEvent::new(KeyCode::Right, Modifiers::SHIFT)
        );
        assert_eq!(
            decode_csi_body(b"1;2D"),
            KeyEvent::new(KeyCode::Left, Modifiers::SHIFT)
        );
        assert_eq!(decode_csi_body(b"99Z"), KeyEvent::plain(KeyCode::Unknown));
    }

    #[test]
    fn read_key_ascii_char() {
        let term = TestTerm::new(TermKind::Supported, 80);
        term.feed(b"a");
        let mut reader = term.reader();
        assert_eq!(
            read_key(&mut reader, None).unwrap(),
            KeyEvent::plain(KeyCode::Char('a'))
        );
    }

    #[test]
    fn read_key_multibyte_char() {
        let term = TestTerm::new(TermKind::Supported, 80);
        term.feed("é".as_bytes());
        let mut reader = term.reader();
        assert_eq!(
            read_key(&mut reader, None).unwrap(),
            KeyEvent::plain(KeyCode::Char('é'))
        );
    }

    #[test]
    fn read_key_csi_arrow() {
        let term = TestTerm::new(TermKind::Supported, 80);
        term.feed(b"\x1b[C");
        let mut reader = term.reader();
        assert_eq!(read_key(&mut reader, None).unwrap(), KeyEvent::plain(KeyCode::Right));
    }

    #[test]
    fn read_key_shift_arrow() {
        let term = TestTerm::new(TermKind::Supported, 80);
        term.feed(b"\x1b[1;2D");
        let mut reader = term.reader();
        assert_eq!(
            read_key(&mut reader, None).unwrap(),
            KeyEvent::new(KeyCode::Left, Modifiers::SHIFT)
        );
    }

    #[test]
    fn read_key_lone_esc_is_unknown() {
        let term = TestTerm::new(TermKind::Supported, 80);
        term.feed(b"\x1b");
        let mut reader = term.reader();
        assert_eq!(read_key(&mut reader, None).unwrap(), KeyEvent::plain(KeyCode::Unknown));
    }

    #[test]
    fn read_key_ctrl_and_control_bytes() {
        let term = TestTerm::new(TermKind::Supported, 80);
        term.feed(&[7, 9, 13, 127]);
        let mut reader = term.reader();
        assert_eq!(
            read_key(&mut reader, None).unwrap(),
            KeyEvent::plain(KeyCode::Ctrl('G'))
        );
        assert_eq!(read_key(&mut reader, None).unwrap(), KeyEvent::plain(KeyCode::Tab));
        assert_eq!(read_key(&mut reader, None).unwrap(), KeyEvent::plain(KeyCode::Enter));
        assert_eq!(read_key(&mut reader, None).unwrap(), KeyEvent::plain(KeyCode::Delete));
    }
}
