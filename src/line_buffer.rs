//! The dynamic string that backs the edited line.
//!
//! Character positions here are **grapheme positions**: when a
//! [`GraphemeSplitter`] is installed, index `i` denotes the start of the
//! `i`-th grapheme cluster; with no splitter installed it falls back to
//! the `i`-th Unicode code point. Every public method that takes a
//! character position therefore also takes the splitter, so the mapping
//! is computed consistently in one place.

use unicode_width::UnicodeWidthStr;

use crate::unicode::{self, GraphemeSplitter, GraphemeWidthCache};

/// Minimum capacity a freshly created buffer reserves, and the growth
/// factor used when more room is needed.
const MIN_CAPACITY: usize = 8;
const GROWTH_FACTOR: f64 = 1.5;

/// A growable, UTF-8 valid, `\n`-aware line buffer with grapheme-indexed
/// editing operations.
#[derive(Debug, Default, Clone)]
pub struct Buffer {
    buf: String,
}

/// `(column, row)` position within a rendered buffer, `\n` being the only
/// line break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Buffer {
    #[must_use]
    pub fn new() -> Self {
        Buffer {
            buf: String::with_capacity(MIN_CAPACITY),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    fn reserve_for(&mut self, extra: usize) {
        let needed = self.buf.len() + extra;
        if needed > self.buf.capacity() {
            let grown = ((self.buf.capacity() as f64) * GROWTH_FACTOR) as usize;
            self.buf.reserve(needed.max(grown).max(MIN_CAPACITY) - self.buf.len());
        }
    }

    /// Number of grapheme clusters (or code points, with no splitter) in
    /// the buffer.
    #[must_use]
    pub fn char_count(&self, splitter: Option<&dyn GraphemeSplitter>) -> usize {
        let mut count = 0;
        let mut rest = self.buf.as_str();
        while !rest.is_empty() {
            let len = unicode::grapheme_len(rest, splitter).max(1);
            rest = &rest[len.min(rest.len())..];
            count += 1;
        }
        count
    }

    /// Maps a character position to a byte offset, by walking grapheme by
    /// grapheme from the start. A position at or beyond the character
    /// length maps to `byte_len()`.
    #[must_use]
    pub fn char_to_byte(&self, splitter: Option<&dyn GraphemeSplitter>, char_posn: usize) -> usize {
        let mut byte = 0;
        let mut rest = &self.buf[..];
        for _ in 0..char_posn {
            if rest.is_empty() {
                return self.buf.len();
            }
            let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
            byte += len;
            rest = &rest[len..];
        }
        byte
    }

    /// Insert `s` at `char_posn`. If `char_posn` is beyond the end of the
    /// buffer, appends instead.
    pub fn insert(&mut self, splitter: Option<&dyn GraphemeSplitter>, char_posn: usize, s: &str) {
        if s.is_empty() {
            return;
        }
        self.reserve_for(s.len());
        let byte = self.char_to_byte(splitter, char_posn);
        if byte >= self.buf.len() {
            self.buf.push_str(s);
        } else {
            self.buf.insert_str(byte, s);
        }
    }

    /// Remove `char_count` characters starting at `char_posn`, clamped to
    /// the buffer's length. Returns the removed text.
    pub fn delete(
        &mut self,
        splitter: Option<&dyn GraphemeSplitter>,
        char_posn: usize,
        char_count: usize,
    ) -> String {
        if char_count == 0 {
            return String::new();
        }
        let start = self.char_to_byte(splitter, char_posn);
        let end = self.char_to_byte(splitter, char_posn + char_count);
        let (start, end) = (start.min(self.buf.len()), end.min(self.buf.len()));
        if start >= end {
            return String::new();
        }
        self.buf.drain(start..end).collect()
    }

    /// Byte-range slice between two character positions.
    #[must_use]
    pub fn slice(
        &self,
        splitter: Option<&dyn GraphemeSplitter>,
        start_char: usize,
        end_char: usize,
    ) -> &str {
        let start = self.char_to_byte(splitter, start_char);
        let end = self.char_to_byte(splitter, end_char.max(start_char));
        &self.buf[start.min(self.buf.len())..end.min(self.buf.len())]
    }

    /// Number of `\n` characters in the buffer.
    #[must_use]
    pub fn count_lines(&self) -> usize {
        memchr::memchr_iter(b'\n', self.buf.as_bytes()).count()
    }

    /// Sum of grapheme display widths up to (not including) `char_posn`,
    /// consulting `cache` and falling back to `measure` on a cache miss
    /// Passing `char_posn = char_count()`
    /// measures the whole buffer.
    pub fn display_width_to(
        &self,
        splitter: Option<&dyn GraphemeSplitter>,
        cache: &mut GraphemeWidthCache,
        measure: &mut dyn FnMut(&str) -> usize,
        char_posn: usize,
    ) -> usize {
        let mut width = 0;
        let mut rest = self.buf.as_str();
        for _ in 0..char_posn {
            if rest.is_empty() {
                break;
            }
            let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
            let grapheme = &rest[..len];
            width += width_of(grapheme, cache, measure);
            rest = &rest[len..];
        }
        width
    }

    /// `(x, y)` display coordinates of `char_posn`, treating `\n` as the
    /// only line break and consulting the width cache for column widths
    pub fn coords_of(
        &self,
        splitter: Option<&dyn GraphemeSplitter>,
        cache: &mut GraphemeWidthCache,
        measure: &mut dyn FnMut(&str) -> usize,
        char_posn: usize,
    ) -> Coord {
        let mut x = 0;
        let mut y = 0;
        let mut rest = self.buf.as_str();
        let limit = char_posn.min(self.char_count(splitter));
        for _ in 0..limit {
            if rest.is_empty() {
                break;
            }
            let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
            let grapheme = &rest[..len];
            if grapheme == "\n" {
                x = 0;
                y += 1;
            } else {
                x += width_of(grapheme, cache, measure);
            }
            rest = &rest[len..];
        }
        Coord { x, y }
    }

    /// Inverse of [`Buffer::coords_of`]: the character position at
    /// `(x, y)`. `x < 0` (represented here as `None`) means "end of that
    /// line".
    pub fn posn_of(
        &self,
        splitter: Option<&dyn GraphemeSplitter>,
        cache: &mut GraphemeWidthCache,
        measure: &mut dyn FnMut(&str) -> usize,
        x: Option<usize>,
        y: usize,
    ) -> usize {
        let mut cur_x = 0;
        let mut cur_y = 0;
        let mut posn = 0;
        let mut rest = self.buf.as_str();
        loop {
            if cur_y == y {
                if let Some(x) = x {
                    if cur_x >= x {
                        return posn;
                    }
                }
            } else if cur_y > y {
                return posn.saturating_sub(1);
            }
            if rest.is_empty() {
                return posn;
            }
            let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
            let grapheme = &rest[..len];
            if grapheme == "\n" {
                if cur_y == y && x.is_none() {
                    return posn;
                }
                cur_x = 0;
                cur_y += 1;
            } else {
                cur_x += width_of(grapheme, cache, measure);
            }
            rest = &rest[len..];
            posn += 1;
        }
    }
}

/// Estimated display width of a grapheme: cache/known-width lookup,
/// falling back to `unicode-width`'s East-Asian-Width table on a cache
/// miss, without measuring or mutating the cache. Used for cursor-position
/// bookkeeping that must not write probe bytes to the terminal outside of
/// an actual render pass (e.g. computing a selection anchor before the
/// next redraw has had a chance to measure a freshly typed grapheme).
fn width_estimate(grapheme: &str, cache: &GraphemeWidthCache) -> usize {
    unicode::grapheme_width(grapheme, cache).unwrap_or_else(|| grapheme.width().max(1))
}

impl Buffer {
    /// Non-measuring counterpart to [`Buffer::coords_of`]: unknown
    /// grapheme widths are estimated as `1` rather than measured against
    /// the live terminal. Safe to call outside of an actual redraw.
    #[must_use]
    pub fn coords_of_estimate(
        &self,
        splitter: Option<&dyn GraphemeSplitter>,
        cache: &GraphemeWidthCache,
        char_posn: usize,
    ) -> Coord {
        let mut x = 0;
        let mut y = 0;
        let mut rest = self.buf.as_str();
        let limit = char_posn.min(self.char_count(splitter));
        for _ in 0..limit {
            if rest.is_empty() {
                break;
            }
            let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
            let grapheme = &rest[..len];
            if grapheme == "\n" {
                x = 0;
                y += 1;
            } else {
                x += width_estimate(grapheme, cache);
            }
            rest = &rest[len..];
        }
        Coord { x, y }
    }

    /// Non-measuring counterpart to [`Buffer::display_width_to`].
    #[must_use]
    pub fn display_width_estimate(
        &self,
        splitter: Option<&dyn GraphemeSplitter>,
        cache: &GraphemeWidthCache,
    ) -> usize {
        let mut width = 0;
        let mut rest = self.buf.as_str();
        while !rest.is_empty() {
            let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
            width += width_estimate(&rest[..len], cache);
            rest = &rest[len..];
        }
        width
    }

    /// Non-measuring counterpart to [`Buffer::posn_of`].
    #[must_use]
    pub fn posn_of_estimate(
        &self,
        splitter: Option<&dyn GraphemeSplitter>,
        cache: &GraphemeWidthCache,
        x: Option<usize>,
        y: usize,
    ) -> usize {
        let mut cur_x = 0;
        let mut cur_y = 0;
        let mut posn = 0;
        let mut rest = self.buf.as_str();
        loop {
            if cur_y == y {
                if let Some(x) = x {
                    if cur_x >= x {
                        return posn;
                    }
                }
            } else if cur_y > y {
                return posn.saturating_sub(1);
            }
            if rest.is_empty() {
                return posn;
            }
            let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
            let grapheme = &rest[..len];
            if grapheme == "\n" {
                if cur_y == y && x.is_none() {
                    return posn;
                }
                cur_x = 0;
                cur_y += 1;
            } else {
                cur_x += width_estimate(grapheme, cache);
            }
            rest = &rest[len..];
            posn += 1;
        }
    }

    /// Character-index bounds `[start, end)` of the `\n`-delimited line
    /// containing `char_posn`, `end` being the index of the line's `\n`
    /// (or the buffer's end if it is the last line). Used for `Ctrl-A` /
    /// `Ctrl-E` (move to start/end of the current display line).
    #[must_use]
    pub fn line_bounds(&self, splitter: Option<&dyn GraphemeSplitter>, char_posn: usize) -> (usize, usize) {
        let total = self.char_count(splitter);
        let char_posn = char_posn.min(total);
        let mut start = 0;
        let mut idx = 0;
        let mut rest = self.buf.as_str();
        while idx < char_posn {
            let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
            if &rest[..len] == "\n" {
                start = idx + 1;
            }
            rest = &rest[len..];
            idx += 1;
        }
        let mut end = idx;
        while end < total {
            let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
            if &rest[..len] == "\n" {
                break;
            }
            rest = &rest[len..];
            end += 1;
        }
        (start, end)
    }
}

fn width_of(
    grapheme: &str,
    cache: &mut GraphemeWidthCache,
    measure: &mut dyn FnMut(&str) -> usize,
) -> usize {
    if let Some(w) = unicode::grapheme_width(grapheme, cache) {
        return w;
    }
    let w = measure(grapheme);
    cache.insert(grapheme, w);
    w
}
