//! Syntax coloring: token types, the eight-color palette, and the
//! tokenizer callback contract.

/// The eight ANSI foreground colors the renderer can emit, plus the
/// terminal's own default (`ESC[39m`/`ESC[0m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    /// The terminal's ambient foreground color; renders as a reset
    /// rather than an explicit `ESC[3<n>m`.
    Default,
}

impl Color {
    /// The `<n>` in `ESC[3<n>m`, or `None` for [`Color::Default`] (which
    /// instead emits a plain reset).
    #[must_use]
    pub fn ansi_digit(self) -> Option<u8> {
        match self {
            Color::Black => Some(0),
            Color::Red => Some(1),
            Color::Green => Some(2),
            Color::Yellow => Some(3),
            Color::Blue => Some(4),
            Color::Magenta => Some(5),
            Color::Cyan => Some(6),
            Color::White => Some(7),
            Color::Default => None,
        }
    }
}

bitflags::bitflags! {
    /// Text emphasis, combinable with a [`Color`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Emphasis: u8 {
        const NONE      = 0;
        const BOLD      = 1 << 0;
        const UNDERLINE = 1 << 1;
        const REVERSE   = 1 << 2;
    }
}

/// An opaque token type assigned by the host; the editor never
/// interprets these values itself, only looks them up in a
/// [`ColorMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKind(pub i32);

/// A single lexical token, as reported by a [`Tokenizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the buffer where the token starts.
    pub start: usize,
    /// Length of the token in bytes.
    pub length: usize,
}

/// Supplies syntax-highlighting tokens for the render engine.
///
/// Called repeatedly by the renderer, advancing `pos` with each call.
/// Returning `None` stops coloring for the rest of the buffer; a
/// tokenizer that returns `Some` without advancing `pos` triggers the
/// stall guard in the render engine rather than looping forever.
pub trait Tokenizer {
    /// Attempt to recognize one token starting at or after `pos` in
    /// `buffer`. `None` means "no more tokens": the remainder of the
    /// buffer is rendered in the default color.
    fn next_token(&mut self, buffer: &str, pos: usize) -> Option<Token>;
}

impl Tokenizer for () {
    fn next_token(&mut self, _buffer: &str, _pos: usize) -> Option<Token> {
        None
    }
}

/// A `(token type → color)` table, kept sorted by [`TokenKind`] so
/// lookups are a binary search.
#[derive(Debug, Default, Clone)]
pub struct ColorMap {
    entries: Vec<(TokenKind, Color)>,
}

impl ColorMap {
    #[must_use]
    pub fn new(mut pairs: Vec<(TokenKind, Color)>) -> Self {
        pairs.sort_by_key(|(kind, _)| *kind);
        ColorMap { entries: pairs }
    }

    /// Color mapped to `kind`, or [`Color::Default`] if `kind` has no
    /// entry.
    #[must_use]
    pub fn color_of(&self, kind: TokenKind) -> Color {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(&kind))
            .ok()
            .map_or(Color::Default, |i| self.entries[i].1)
    }
}
