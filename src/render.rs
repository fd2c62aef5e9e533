//! Render engine: turns `(prompt, buffer, suggestion)` into terminal
//! bytes, computing cursor coordinates and diffing against the
//! previously drawn block height.
//!
//! Rather than flattening prompt/coloring/selection into one byte string
//! and then re-scanning it for embedded escape sequences while writing it
//! out, the styled output here is built directly as a sequence of
//! [`Piece`]s, so "this is a literal escape to forward verbatim" is known
//! at construction time rather than re-derived by scanning for `ESC`.

use log::warn;

use crate::highlight::{Color, ColorMap, Emphasis, Tokenizer};
use crate::line_buffer::Buffer;
use crate::string_list::StringList;
use crate::tty::{ansi, RawReader, Renderer};
use crate::unicode::{self, GraphemeSplitter, GraphemeWidthCache};
use crate::Result;

/// One piece of the styled output.
enum Piece {
    /// Bytes to forward to the terminal verbatim: carries no display
    /// width and never advances the column counter.
    Escape(String),
    /// One grapheme (possibly a single control character) taken from
    /// the buffer or suggestion, subject to the render loop's
    /// column-counting and window-clipping policy.
    Content(String),
}

/// Tracks the on-screen block height and cursor row across redraws, so
/// the next redraw knows how much to grow, shrink, or simply reposition.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameState {
    vpos: usize,
    nlines: usize,
    /// Set once a tokenizer stall has already been warned about, so a
    /// tokenizer that keeps stalling doesn't re-log on every keystroke.
    tokenizer_warned: bool,
}

impl FrameState {
    #[must_use]
    pub fn new() -> Self {
        FrameState::default()
    }

    pub fn reset(&mut self) {
        *self = FrameState::default();
    }
}

/// Everything [`redraw`] needs to know about the current edit state.
pub struct RedrawInput<'a> {
    pub prompt: &'a str,
    pub continuation_prompt: &'a str,
    pub buffer: &'a Buffer,
    pub posn: usize,
    /// `(min, max)` character-index bounds of an active selection.
    pub selection: Option<(usize, usize)>,
    pub suggestions: &'a StringList,
    pub splitter: Option<&'a dyn GraphemeSplitter>,
    pub tokenizer: Option<&'a mut dyn Tokenizer>,
    pub color_map: Option<&'a ColorMap>,
}

/// Redraws the whole on-screen block: grows/shrinks it to match the new
/// buffer height, then writes prompt + colored/selected buffer +
/// suggestion, and parks the cursor at the right column.
pub fn redraw(
    renderer: &mut dyn Renderer,
    reader: &mut dyn RawReader,
    cache: &mut GraphemeWidthCache,
    frame: &mut FrameState,
    input: RedrawInput<'_>,
) -> Result<()> {
    let cursor = input
        .buffer
        .coords_of_estimate(input.splitter, cache, input.posn);
    let new_lines = input.buffer.count_lines();

    change_height(renderer, frame.nlines, new_lines, frame.vpos, cursor.y)?;

    let prompt_width = display_width_estimate(input.prompt, input.splitter, cache);
    let suggestion = current_suggestion(input.buffer, input.posn, input.suggestions, input.splitter);

    let ops = build_ops(
        input.buffer.as_str(),
        input.selection,
        input.splitter,
        input.tokenizer,
        input.color_map,
        suggestion,
        &mut frame.tokenizer_warned,
    );

    renderer.write_all(ansi::move_up(cursor.y).as_bytes())?;
    renderer.write_all(ansi::HOME.as_bytes())?;
    renderer.write_all(ansi::RESET.as_bytes())?;
    renderer.write_all(input.prompt.as_bytes())?;

    // Current policy: no horizontal scrolling window.
    let window = (0, usize::MAX);
    write_ops(renderer, reader, cache, input.splitter, &ops, input.continuation_prompt, window)?;

    renderer.write_all(ansi::ERASE_TO_EOL.as_bytes())?;
    renderer.write_all(ansi::move_up(new_lines.saturating_sub(cursor.y)).as_bytes())?;
    let column = prompt_width + cursor.x;
    renderer.write_all(ansi::move_to_column(column).as_bytes())?;
    renderer.flush()?;

    frame.vpos = cursor.y;
    frame.nlines = new_lines;
    Ok(())
}

fn display_width_estimate(s: &str, splitter: Option<&dyn GraphemeSplitter>, cache: &GraphemeWidthCache) -> usize {
    let mut width = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
        width += unicode::grapheme_width(&rest[..len], cache).unwrap_or(1);
        rest = &rest[len..];
    }
    width
}

fn current_suggestion<'a>(
    buffer: &Buffer,
    posn: usize,
    suggestions: &'a StringList,
    splitter: Option<&dyn GraphemeSplitter>,
) -> Option<&'a str> {
    if posn != buffer.char_count(splitter) {
        return None;
    }
    suggestions.current()
}

/// Grow, shrink, or simply reposition the on-screen block.
fn change_height(
    renderer: &mut dyn Renderer,
    old_height: usize,
    new_height: usize,
    old_vpos: usize,
    new_vpos: usize,
) -> Result<()> {
    use std::cmp::Ordering;
    match new_height.cmp(&old_height) {
        Ordering::Equal => match new_vpos.cmp(&old_vpos) {
            Ordering::Greater => renderer.write_all(ansi::move_down(new_vpos - old_vpos).as_bytes()),
            Ordering::Less => renderer.write_all(ansi::move_up(old_vpos - new_vpos).as_bytes()),
            Ordering::Equal => Ok(()),
        },
        Ordering::Greater => {
            let feed = "\n".repeat(new_height - old_height);
            renderer.write_all(feed.as_bytes())
        }
        Ordering::Less => {
            for _ in 0..old_height.saturating_sub(old_vpos) {
                renderer.write_all(ansi::ERASE_LINE.as_bytes())?;
                renderer.write_all(b"\n")?;
            }
            for _ in 0..old_height.saturating_sub(new_vpos) {
                renderer.write_all(ansi::ERASE_LINE.as_bytes())?;
                renderer.write_all(ansi::move_up(1).as_bytes())?;
            }
            Ok(())
        }
    }
}

/// Builds the styled output: reset, colored/selected buffer, then (if
/// the cursor is at the end) the current suggestion in bold, then reset
/// building the styled output, then any trailing suggestion in bold.
fn build_ops(
    buffer: &str,
    selection: Option<(usize, usize)>,
    splitter: Option<&dyn GraphemeSplitter>,
    tokenizer: Option<&mut dyn Tokenizer>,
    color_map: Option<&ColorMap>,
    suggestion: Option<&str>,
    tokenizer_warned: &mut bool,
) -> Vec<Piece> {
    let mut ops = vec![Piece::Escape(ansi::RESET.to_string())];

    let spans = match (tokenizer, color_map) {
        (Some(tokenizer), Some(color_map)) => {
            Some(tokenize_spans(buffer, tokenizer, color_map, tokenizer_warned))
        }
        _ => None,
    };

    let mut byte_pos = 0;
    let mut char_idx = 0;
    let mut current_color = Color::Default;
    let mut in_selection = false;
    let mut rest = buffer;
    while !rest.is_empty() {
        let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
        let grapheme = &rest[..len];

        let color = spans
            .as_ref()
            .and_then(|spans| color_at(spans, byte_pos))
            .unwrap_or(Color::Default);
        if color != current_color {
            ops.push(Piece::Escape(color_escape(color)));
            current_color = color;
        }

        let selected = selection.is_some_and(|(start, end)| char_idx >= start && char_idx < end);
        if selected && !in_selection {
            ops.push(Piece::Escape(ansi::REVERSE.to_string()));
            in_selection = true;
        } else if !selected && in_selection {
            // A plain color escape doesn't clear REVERSE; reset fully before
            // re-applying the current token color.
            ops.push(Piece::Escape(ansi::RESET.to_string()));
            ops.push(Piece::Escape(color_escape(current_color)));
            in_selection = false;
        }

        ops.push(Piece::Content(grapheme.to_string()));

        rest = &rest[len..];
        byte_pos += len;
        char_idx += 1;
    }
    if in_selection {
        ops.push(Piece::Escape(ansi::RESET.to_string()));
        ops.push(Piece::Escape(color_escape(current_color)));
    }

    if let Some(suggestion) = suggestion {
        ops.push(Piece::Escape(ansi::BOLD.to_string()));
        let mut rest = suggestion;
        while !rest.is_empty() {
            let len = unicode::grapheme_len(rest, splitter).max(1).min(rest.len());
            ops.push(Piece::Content(rest[..len].to_string()));
            rest = &rest[len..];
        }
        ops.push(Piece::Escape(ansi::RESET.to_string()));
    }

    ops
}

fn color_escape(color: Color) -> String {
    match color.ansi_digit() {
        Some(digit) => ansi::set_color(digit),
        None => ansi::RESET.to_string(),
    }
}

fn color_at(spans: &[(std::ops::Range<usize>, Color)], byte_pos: usize) -> Option<Color> {
    spans
        .iter()
        .find(|(range, _)| range.contains(&byte_pos))
        .map(|(_, color)| *color)
}

/// Repeatedly calls the tokenizer to build `(byte range, color)` spans
/// over the whole buffer. Aborts (logging once) if the tokenizer fails
/// to advance, rather than looping forever on a buggy tokenizer.
pub(crate) fn tokenize_spans(
    buffer: &str,
    tokenizer: &mut dyn Tokenizer,
    color_map: &ColorMap,
    tokenizer_warned: &mut bool,
) -> Vec<(std::ops::Range<usize>, Color)> {
    let mut spans = Vec::new();
    let mut pos = 0;
    let max_iterations = buffer.len() + 1;
    for _ in 0..max_iterations {
        if pos > buffer.len() {
            break;
        }
        match tokenizer.next_token(buffer, pos) {
            None => break,
            Some(token) => {
                if token.length == 0 || token.start < pos {
                    if !*tokenizer_warned {
                        warn!(
                            "tokenizer stalled at byte {pos}; disabling syntax coloring for this redraw"
                        );
                        *tokenizer_warned = true;
                    }
                    break;
                }
                spans.push((token.start..token.start + token.length, color_map.color_of(token.kind)));
                pos = token.start + token.length;
            }
        }
    }
    spans
}

/// Writes the styled [`Piece`]s to the terminal, applying a fixed
/// per-character policy: `\r` resets the column, `\n` clears to end of
/// line and emits the continuation prompt, `\t` becomes a single space,
/// other control characters are dropped unless they start a forwarded
/// escape, and printable graphemes in the window are written (measuring
/// unknown widths as they go).
fn write_ops(
    renderer: &mut dyn Renderer,
    reader: &mut dyn RawReader,
    cache: &mut GraphemeWidthCache,
    splitter: Option<&dyn GraphemeSplitter>,
    ops: &[Piece],
    continuation_prompt: &str,
    window: (usize, usize),
) -> Result<()> {
    let _ = splitter;
    let mut column = 0usize;
    for op in ops {
        match op {
            Piece::Escape(bytes) => renderer.write_all(bytes.as_bytes())?,
            Piece::Content(grapheme) => {
                if grapheme == "\r" {
                    renderer.write_all(b"\r")?;
                    column = 0;
                } else if grapheme == "\n" {
                    renderer.write_all(b"\x1b[K\n\r")?;
                    renderer.write_all(continuation_prompt.as_bytes())?;
                    column = 0;
                } else if grapheme == "\t" {
                    renderer.write_all(b" ")?;
                    column += 1;
                } else if grapheme.len() == 1 && grapheme.as_bytes()[0].is_ascii_control() {
                    if grapheme.as_bytes()[0] == 0x1b {
                        renderer.write_all(grapheme.as_bytes())?;
                    }
                    // other control bytes: silently dropped
                } else {
                    match unicode::grapheme_width(grapheme, cache) {
                        Some(_) => {
                            if column >= window.0 && column < window.1 {
                                renderer.write_all(grapheme.as_bytes())?;
                            }
                        }
                        None => {
                            measure_and_write(renderer, reader, cache, grapheme)?;
                        }
                    }
                    column += 1;
                }
            }
        }
    }
    Ok(())
}

/// Writes `grapheme` to the terminal and measures its display width by
/// diffing the cursor column before and after.
fn measure_and_write(
    renderer: &mut dyn Renderer,
    reader: &mut dyn RawReader,
    cache: &mut GraphemeWidthCache,
    grapheme: &str,
) -> Result<()> {
    let before = renderer.query_cursor_column(reader)?;
    renderer.write_all(grapheme.as_bytes())?;
    let after = renderer.query_cursor_column(reader)?;
    let width = if after > before { after - before } else { 1 };
    cache.insert(grapheme, width);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::highlight::TokenKind;
    use crate::tty::test::TestTerm;
    use crate::tty::TermKind;

    #[test]
    fn simple_redraw_writes_prompt_and_buffer() {
        let term = TestTerm::new(TermKind::Supported, 80);
        let mut renderer = term.writer();
        let mut reader = term.reader();
        let mut cache = GraphemeWidthCache::new();
        let mut frame = FrameState::new();
        let mut buffer = Buffer::new();
        buffer.insert(None, 0, "hi");
        let suggestions = StringList::new();

        redraw(
            &mut renderer,
            &mut reader,
            &mut cache,
            &mut frame,
            RedrawInput {
                prompt: "> ",
                continuation_prompt: "... ",
                buffer: &buffer,
                posn: 2,
                selection: None,
                suggestions: &suggestions,
                splitter: None,
                tokenizer: None,
                color_map: None,
            },
        )
        .unwrap();

        let out = String::from_utf8(term.output()).unwrap();
        assert!(out.contains("> "));
        assert!(out.contains("hi"));
        assert_eq!(frame.nlines, 0);
    }

    #[test]
    fn suggestion_rendered_only_at_end_of_buffer() {
        let term = TestTerm::new(TermKind::Supported, 80);
        let mut renderer = term.writer();
        let mut reader = term.reader();
        let mut cache = GraphemeWidthCache::new();
        let mut frame = FrameState::new();
        let mut buffer = Buffer::new();
        buffer.insert(None, 0, "pri");
        let mut suggestions = StringList::new();
        suggestions.push_front("nt");

        redraw(
            &mut renderer,
            &mut reader,
            &mut cache,
            &mut frame,
            RedrawInput {
                prompt: "",
                continuation_prompt: "",
                buffer: &buffer,
                posn: 3,
                selection: None,
                suggestions: &suggestions,
                splitter: None,
                tokenizer: None,
                color_map: None,
            },
        )
        .unwrap();
        let out = String::from_utf8(term.output()).unwrap();
        assert!(out.contains("nt"));
    }

    struct WordColor;
    impl Tokenizer for WordColor {
        fn next_token(&mut self, buffer: &str, pos: usize) -> Option<crate::highlight::Token> {
            let rest = &buffer[pos.min(buffer.len())..];
            let start = rest.find(|c: char| !c.is_whitespace())?;
            let word_len = rest[start..]
                .find(char::is_whitespace)
                .unwrap_or(rest.len() - start);
            Some(crate::highlight::Token {
                kind: TokenKind(1),
                start: pos + start,
                length: word_len,
            })
        }
    }

    #[test]
    fn tokenizer_colors_are_applied() {
        let term = TestTerm::new(TermKind::Supported, 80);
        let mut renderer = term.writer();
        let mut reader = term.reader();
        let mut cache = GraphemeWidthCache::new();
        let mut frame = FrameState::new();
        let mut buffer = Buffer::new();
        buffer.insert(None, 0, "let x");
        let suggestions = StringList::new();
        let color_map = ColorMap::new(vec![(TokenKind(1), Color::Green)]);
        let mut tokenizer = WordColor;

        redraw(
            &mut renderer,
            &mut reader,
            &mut cache,
            &mut frame,
            RedrawInput {
                prompt: "",
                continuation_prompt: "",
                buffer: &buffer,
                posn: 5,
                selection: None,
                suggestions: &suggestions,
                splitter: None,
                tokenizer: Some(&mut tokenizer),
                color_map: Some(&color_map),
            },
        )
        .unwrap();
        let out = term.output();
        assert!(out.windows(ansi::set_color(2).len()).any(|w| w == ansi::set_color(2).as_bytes()));
    }
}
