//! The state machine binding keypresses to buffer mutations, mode
//! transitions, completion regeneration, and the main `read_line` loop.
//! This is the component the rest of the crate exists to support.

use log::{debug, warn};

use crate::completion::Completer;
use crate::config::{BellStyle, Config};
use crate::error::EditError;
use crate::highlight::{Color, ColorMap, Emphasis, Tokenizer};
use crate::keys::{read_key, KeyCode, KeyEvent, Modifiers};
use crate::line_buffer::Buffer;
use crate::render::{self, FrameState, RedrawInput};
use crate::string_list::StringList;
use crate::tty::{self, RawMode, RawReader, Renderer, Term, TermKind};
use crate::unicode::{GraphemeSplitter, GraphemeWidthCache};
use crate::validate::Continuation;
use crate::Result;

/// Current editing mode. `Selection` always carries a `sposn`
/// anchor; `History` means the buffer currently displays a (possibly
/// just-snapshotted) entry from `history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Default,
    Selection,
    History,
}

/// An interactive single-field line editor.
///
/// Bound to a terminal backend `T`; most hosts use
/// [`crate::tty::UnixTerm`] on unix. Construction, callback registration,
/// and `read_line` together form the public API; everything else on
/// this type is the editor core's internal state machine.
pub struct Editor<T: Term> {
    term: T,
    config: Config,
    mode: Mode,
    posn: usize,
    sposn: Option<usize>,
    ncols: usize,
    prompt: String,
    continuation_prompt: String,
    buffer: Buffer,
    clipboard: String,
    history: StringList,
    suggestions: StringList,
    color_map: Option<ColorMap>,
    tokenizer: Option<Box<dyn Tokenizer>>,
    completer: Option<Box<dyn Completer>>,
    multiline: Option<Box<dyn Continuation>>,
    splitter: Option<Box<dyn GraphemeSplitter>>,
    width_cache: GraphemeWidthCache,
    frame: FrameState,
}

/// Outcome of applying one decoded key (internal to the edit loop).
enum KeyResult {
    /// Keep editing. `cycled` is `true` if this key only moved the
    /// suggestion cursor (DOWN with suggestions present), which
    /// suppresses the post-burst suggestion regeneration.
    Continue { cycled: bool },
    /// End `read_line`. `true` on an ordinary accept (RETURN), `false` on
    /// abort (Ctrl-G).
    Accept(bool),
}

impl<T: Term> Editor<T> {
    /// Default prompt `">"`, no callbacks, empty history.
    #[must_use]
    pub fn new(term: T) -> Self {
        Editor::with_config(term, Config::default())
    }

    #[must_use]
    pub fn with_config(term: T, config: Config) -> Self {
        Editor {
            term,
            config,
            mode: Mode::Default,
            posn: 0,
            sposn: None,
            ncols: 80,
            prompt: ">".to_string(),
            continuation_prompt: String::new(),
            buffer: Buffer::new(),
            clipboard: String::new(),
            history: StringList::new(),
            suggestions: StringList::new(),
            color_map: None,
            tokenizer: None,
            completer: None,
            multiline: None,
            splitter: None,
            width_cache: GraphemeWidthCache::new(),
            frame: FrameState::new(),
        }
    }

    /// Resets all owned state, including freeing the width cache,
    /// without dropping the instance.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.clipboard.clear();
        self.history.clear();
        self.suggestions.clear();
        self.width_cache.clear();
        self.posn = 0;
        self.sposn = None;
        self.mode = Mode::Default;
        self.frame.reset();
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn set_continuation_prompt(&mut self, prompt: impl Into<String>) {
        self.continuation_prompt = prompt.into();
    }

    /// Installs the tokenizer and its `(token type → color)` table.
    pub fn set_syntax_color<Z>(&mut self, tokenizer: Z, color_map: ColorMap)
    where
        Z: Tokenizer + 'static,
    {
        self.tokenizer = Some(Box::new(tokenizer));
        self.color_map = Some(color_map);
    }

    pub fn set_autocomplete<C>(&mut self, completer: C)
    where
        C: Completer + 'static,
    {
        self.completer = Some(Box::new(completer));
    }

    /// Installs the continuation predicate and the prompt shown on
    /// continuation lines.
    pub fn set_multiline<P>(&mut self, predicate: P, continuation_prompt: impl Into<String>)
    where
        P: Continuation + 'static,
    {
        self.multiline = Some(Box::new(predicate));
        self.continuation_prompt = continuation_prompt.into();
    }

    pub fn set_grapheme_splitter<G>(&mut self, splitter: G)
    where
        G: GraphemeSplitter + 'static,
    {
        self.splitter = Some(Box::new(splitter));
    }

    /// Re-queries and returns the terminal width.
    pub fn terminal_width(&mut self) -> usize {
        let mut writer = self.term.writer();
        self.ncols = writer.width();
        self.ncols
    }

    #[must_use]
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter()
    }

    /// Print `s` outside of an editing session, styled with `color` and
    /// `emphasis`.
    pub fn display_styled(&mut self, s: &str, color: Color, emphasis: Emphasis) -> Result<()> {
        let mut writer = self.term.writer();
        if emphasis.contains(Emphasis::BOLD) {
            writer.write_all(tty::ansi::BOLD.as_bytes())?;
        }
        if emphasis.contains(Emphasis::UNDERLINE) {
            writer.write_all(tty::ansi::UNDERLINE.as_bytes())?;
        }
        if emphasis.contains(Emphasis::REVERSE) {
            writer.write_all(tty::ansi::REVERSE.as_bytes())?;
        }
        if let Some(digit) = color.ansi_digit() {
            writer.write_all(tty::ansi::set_color(digit).as_bytes())?;
        }
        writer.write_all(s.as_bytes())?;
        writer.write_all(tty::ansi::RESET.as_bytes())?;
        writer.flush()
    }

    /// Print `s` outside of an editing session, colored by whatever
    /// tokenizer is currently installed.
    pub fn display_with_syntax_coloring(&mut self, s: &str) -> Result<()> {
        let mut warned = false;
        let spans = match (self.tokenizer.as_deref_mut(), self.color_map.as_ref()) {
            (Some(tokenizer), Some(color_map)) => {
                render::tokenize_spans(s, tokenizer, color_map, &mut warned)
            }
            _ => Vec::new(),
        };
        let mut writer = self.term.writer();
        writer.write_all(tty::ansi::RESET.as_bytes())?;
        let mut pos = 0;
        let mut current = Color::Default;
        for (range, color) in &spans {
            if range.start > pos {
                writer.write_all(tty::ansi::RESET.as_bytes())?;
                current = Color::Default;
                writer.write_all(s[pos..range.start].as_bytes())?;
            }
            if *color != current {
                match color.ansi_digit() {
                    Some(digit) => writer.write_all(tty::ansi::set_color(digit).as_bytes())?,
                    None => writer.write_all(tty::ansi::RESET.as_bytes())?,
                }
                current = *color;
            }
            writer.write_all(s[range.start..range.end].as_bytes())?;
            pos = range.end;
        }
        if pos < s.len() {
            writer.write_all(tty::ansi::RESET.as_bytes())?;
            writer.write_all(s[pos..].as_bytes())?;
        }
        writer.write_all(tty::ansi::RESET.as_bytes())?;
        writer.flush()
    }

    /// One interactive read: dispatches on terminal capability class,
    /// resets per-session state, and returns the accepted or
    /// EOF-terminated buffer.
    pub fn read_line(&mut self) -> Result<String> {
        self.buffer.clear();
        self.mode = Mode::Default;
        self.posn = 0;
        self.sposn = None;
        self.suggestions.clear();

        match self.term.classify() {
            TermKind::NotTty => self.read_not_tty(),
            TermKind::Unsupported => self.read_unsupported(),
            TermKind::Supported => self.read_supported(),
        }
    }

    /// Degenerate reader for [`TermKind::NotTty`]: reads until newline
    /// or EOF with no escape handling, no redraw.
    fn read_not_tty(&mut self) -> Result<String> {
        let mut reader = self.term.reader();
        let mut out = Vec::new();
        loop {
            match reader.read_byte() {
                Ok(b'\n') => break,
                Ok(b) => out.push(b),
                Err(EditError::Eof) => {
                    if out.is_empty() {
                        return Err(EditError::Eof);
                    }
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Degenerate reader for [`TermKind::Unsupported`]: prints the
    /// prompt, does one buffered read, strips trailing control bytes.
    fn read_unsupported(&mut self) -> Result<String> {
        {
            let mut writer = self.term.writer();
            writer.write_all(self.prompt.as_bytes())?;
            writer.flush()?;
        }
        let mut reader = self.term.reader();
        let mut out = Vec::new();
        loop {
            match reader.read_byte() {
                Ok(b'\n') => break,
                Ok(b) => out.push(b),
                Err(EditError::Eof) => break,
                Err(e) => return Err(e),
            }
        }
        while matches!(out.last(), Some(b) if b.is_ascii_control()) {
            out.pop();
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// The full interactive path: enter raw mode, run the edit loop,
    /// then leave raw mode and return the buffer.
    fn read_supported(&mut self) -> Result<String> {
        let mode_guard = match self.term.enable_raw_mode() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("failed to enter raw mode ({e}); falling back to the unsupported-terminal path");
                return self.read_unsupported();
            }
        };

        self.terminal_width();
        self.mode = Mode::Default;
        self.posn = 0;
        if let Err(e) = self.redraw() {
            if !Self::is_recoverable(&e) {
                let _ = mode_guard.disable_raw_mode();
                return Err(e);
            }
            warn!("initial redraw failed: {e}");
        }

        let accepted = self.edit_loop()?;

        // Exit sequence: park the cursor at the end, drop suggestions,
        // and redraw once more so the final state is fully drawn before
        // leaving raw mode.
        self.suggestions.clear();
        self.posn = self.buffer.char_count(self.splitter.as_deref());
        if let Err(e) = self.redraw() {
            if Self::is_recoverable(&e) {
                warn!("final redraw failed: {e}");
            }
        }
        mode_guard.disable_raw_mode()?;

        {
            let mut writer = self.term.writer();
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        let text = self.buffer.as_str().to_string();
        if accepted && !text.is_empty() {
            self.history.push_front(text.clone());
            if let Some(max) = self.config.max_history_size() {
                self.history.truncate(max);
            }
        }
        Ok(text)
    }

    fn edit_loop(&mut self) -> Result<bool> {
        loop {
            let key = {
                let mut reader = self.term.reader();
                read_key(&mut reader, self.config.keyseq_timeout_ms())
            };
            let key = match key {
                Ok(k) => k,
                Err(EditError::Eof) => return Ok(true),
                Err(e) if Self::is_recoverable(&e) => {
                    warn!("terminal read failed: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            debug!("key: {key:?}");

            let mut cycled = false;
            match self.apply_key(key)? {
                KeyResult::Accept(ok) => return Ok(ok),
                KeyResult::Continue { cycled: c } => cycled = c,
            }

            // Drain any further keypresses already buffered, coalescing
            // them into one redraw.
            loop {
                let ready = {
                    let mut reader = self.term.reader();
                    reader.poll_ready(0)
                };
                match ready {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) if Self::is_recoverable(&e) => break,
                    Err(e) => return Err(e),
                }
                let key = {
                    let mut reader = self.term.reader();
                    read_key(&mut reader, self.config.keyseq_timeout_ms())
                };
                let key = match key {
                    Ok(k) => k,
                    Err(EditError::Eof) => return Ok(true),
                    Err(e) if Self::is_recoverable(&e) => break,
                    Err(e) => return Err(e),
                };
                debug!("key (burst): {key:?}");
                match self.apply_key(key)? {
                    KeyResult::Accept(ok) => return Ok(ok),
                    KeyResult::Continue { cycled: c } => cycled = c,
                }
            }

            if !cycled {
                self.regenerate_suggestions();
            }
            if let Err(e) = self.redraw() {
                if Self::is_recoverable(&e) {
                    warn!("redraw failed: {e}");
                } else {
                    return Err(e);
                }
            }
        }
    }

    fn apply_key(&mut self, key: KeyEvent) -> Result<KeyResult> {
        let KeyEvent(code, mods) = key;
        let mut cycled = false;
        match code {
            KeyCode::Char(ch) => {
                self.leave_history_if_needed();
                let mut tmp = [0u8; 4];
                self.insert_text(ch.encode_utf8(&mut tmp));
                self.leave_selection();
            }
            KeyCode::Tab => {
                self.leave_history_if_needed();
                if self.has_committable_suggestion() {
                    self.commit_suggestion();
                } else {
                    self.insert_text("\t");
                }
                self.leave_selection();
            }
            KeyCode::Enter => {
                let continues = self
                    .multiline
                    .as_mut()
                    .is_some_and(|predicate| predicate.should_continue(self.buffer.as_str()));
                if continues {
                    self.leave_history_if_needed();
                    self.insert_text("\n");
                    self.leave_selection();
                } else {
                    self.leave_history_if_needed();
                    return Ok(KeyResult::Accept(true));
                }
            }
            KeyCode::Delete => {
                self.leave_history_if_needed();
                self.delete_backward_or_selection();
                self.leave_selection();
            }
            KeyCode::Left => {
                self.handle_arrow(mods, -1);
            }
            KeyCode::Right => {
                self.handle_arrow(mods, 1);
            }
            KeyCode::Up => self.history_older(),
            KeyCode::Down => {
                if self.mode == Mode::History {
                    self.history_newer();
                } else if !self.suggestions.is_empty() {
                    self.cycle_suggestion();
                    cycled = true;
                }
            }
            KeyCode::Ctrl('G') => {
                self.leave_history_if_needed();
                self.buffer.clear();
                self.posn = 0;
                self.sposn = None;
                self.mode = Mode::Default;
                return Ok(KeyResult::Accept(false));
            }
            KeyCode::Ctrl(letter) => self.apply_ctrl(letter),
            KeyCode::Unknown => {}
        }
        Ok(KeyResult::Continue { cycled })
    }

    fn handle_arrow(&mut self, mods: Modifiers, direction: isize) {
        if mods.contains(Modifiers::SHIFT) {
            if self.mode != Mode::Selection {
                self.sposn = Some(self.posn);
                self.mode = Mode::Selection;
            }
        } else {
            self.leave_selection();
        }
        if direction < 0 {
            self.posn = self.posn.saturating_sub(1);
        } else {
            let count = self.buffer.char_count(self.splitter.as_deref());
            self.posn = (self.posn + 1).min(count);
        }
    }

    fn apply_ctrl(&mut self, letter: char) {
        match letter {
            'A' => {
                let (start, _) = self.buffer.line_bounds(self.splitter.as_deref(), self.posn);
                self.posn = start;
            }
            'E' => {
                let (_, end) = self.buffer.line_bounds(self.splitter.as_deref(), self.posn);
                self.posn = end;
            }
            'B' => self.handle_arrow(Modifiers::NONE, -1),
            'F' => self.handle_arrow(Modifiers::NONE, 1),
            'C' => {
                if let Some((start, end)) = self.selection_range() {
                    self.clipboard = self
                        .buffer
                        .slice(self.splitter.as_deref(), start, end)
                        .to_string();
                }
            }
            'D' => {
                self.leave_history_if_needed();
                let splitter = self.splitter.as_deref();
                self.buffer.delete(splitter, self.posn, 1);
            }
            'L' => {
                self.leave_history_if_needed();
                self.buffer.clear();
                self.posn = 0;
                self.leave_selection();
            }
            'N' => self.move_vertical(1),
            'P' => self.move_vertical(-1),
            'V' => {
                self.leave_history_if_needed();
                let text = self.clipboard.clone();
                self.insert_text(&text);
                self.leave_selection();
            }
            _ => {}
        }
    }

    fn move_vertical(&mut self, direction: isize) {
        let splitter = self.splitter.as_deref();
        let coord = self
            .buffer
            .coords_of_estimate(splitter, &self.width_cache, self.posn);
        let total_lines = self.buffer.count_lines();
        let new_y = if direction < 0 {
            coord.y.saturating_sub(1)
        } else {
            (coord.y + 1).min(total_lines)
        };
        self.posn = self
            .buffer
            .posn_of_estimate(splitter, &self.width_cache, Some(coord.x), new_y);
    }

    fn delete_backward_or_selection(&mut self) {
        if let Some((start, end)) = self.selection_range() {
            let splitter = self.splitter.as_deref();
            self.buffer.delete(splitter, start, end - start);
            self.posn = start;
            self.sposn = None;
        } else if self.posn > 0 {
            let splitter = self.splitter.as_deref();
            self.buffer.delete(splitter, self.posn - 1, 1);
            self.posn -= 1;
        } else {
            self.ring_bell();
        }
    }

    /// Inserts `text` at `posn`, advancing `posn` by however many new
    /// grapheme clusters it actually introduced. A flat `+= 1` is wrong
    /// whenever the inserted bytes join an existing trailing cluster (a
    /// combining mark, or a ZWJ continuing an emoji sequence) rather than
    /// starting a new one; computing the before/after character count
    /// keeps the `0 <= posn <= char_count` invariant in that case too.
    fn insert_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let splitter = self.splitter.as_deref();
        let before = self.buffer.char_count(splitter);
        self.buffer.insert(splitter, self.posn, text);
        let after = self.buffer.char_count(splitter);
        self.posn += after.saturating_sub(before);
    }

    fn selection_range(&self) -> Option<(usize, usize)> {
        if self.mode != Mode::Selection {
            return None;
        }
        let sposn = self.sposn?;
        Some((sposn.min(self.posn), sposn.max(self.posn)))
    }

    fn leave_selection(&mut self) {
        self.mode = Mode::Default;
        self.sposn = None;
    }

    fn leave_history_if_needed(&mut self) {
        if self.mode == Mode::History {
            self.history.remove(0);
            self.mode = Mode::Default;
        }
    }

    fn history_older(&mut self) {
        if self.mode != Mode::History {
            let snapshot = self.buffer.as_str().to_string();
            self.history.push_front(snapshot);
            self.history.select(0);
            self.mode = Mode::History;
        }
        let next = self.history.posn() + 1;
        if let Some(entry) = self.history.select(next).map(str::to_string) {
            self.load_history_entry(&entry);
        }
    }

    fn history_newer(&mut self) {
        let prev = self.history.posn().saturating_sub(1);
        if let Some(entry) = self.history.select(prev).map(str::to_string) {
            self.load_history_entry(&entry);
        }
    }

    fn load_history_entry(&mut self, entry: &str) {
        self.buffer.clear();
        let splitter = self.splitter.as_deref();
        self.buffer.insert(splitter, 0, entry);
        self.posn = self.buffer.char_count(splitter);
        self.sposn = None;
    }

    fn has_committable_suggestion(&self) -> bool {
        let splitter = self.splitter.as_deref();
        self.posn == self.buffer.char_count(splitter) && self.suggestions.current().is_some()
    }

    fn commit_suggestion(&mut self) {
        if let Some(suffix) = self.suggestions.current().map(str::to_string) {
            let splitter = self.splitter.as_deref();
            let end = self.buffer.char_count(splitter);
            self.buffer.insert(splitter, end, &suffix);
            self.posn = self.buffer.char_count(splitter);
        }
        self.suggestions.clear();
    }

    /// Cycles to the next suggestion, wrapping from the last entry back
    /// to the first.
    fn cycle_suggestion(&mut self) {
        let count = self.suggestions.count();
        if count == 0 {
            return;
        }
        let next = (self.suggestions.posn() + 1) % count;
        self.suggestions.select(next);
    }

    /// Rebuilds the suggestion list after a keypress burst: only runs
    /// when the cursor sits at the end of the buffer and a completer is
    /// registered.
    fn regenerate_suggestions(&mut self) {
        self.suggestions.clear();
        let splitter = self.splitter.as_deref();
        if self.posn != self.buffer.char_count(splitter) {
            return;
        }
        if let Some(completer) = self.completer.as_mut() {
            let buffer = self.buffer.as_str().to_string();
            completer.complete(&buffer, &mut self.suggestions);
        }
    }

    fn coloring_enabled(&self) -> bool {
        use crate::config::ColorMode;
        match self.config.color_mode() {
            ColorMode::Disabled => false,
            ColorMode::Forced => true,
            ColorMode::Enabled => self.term.classify() == TermKind::Supported,
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let selection = self.selection_range();
        let color_map = if self.coloring_enabled() {
            self.color_map.as_ref()
        } else {
            None
        };
        let mut writer = self.term.writer();
        let mut reader = self.term.reader();
        let input = RedrawInput {
            prompt: &self.prompt,
            continuation_prompt: &self.continuation_prompt,
            buffer: &self.buffer,
            posn: self.posn,
            selection,
            suggestions: &self.suggestions,
            splitter: self.splitter.as_deref(),
            tokenizer: self.tokenizer.as_deref_mut(),
            color_map,
        };
        render::redraw(&mut writer, &mut reader, &mut self.width_cache, &mut self.frame, input)
    }

    fn ring_bell(&mut self) {
        if self.config.bell_style() == BellStyle::Audible {
            let mut writer = self.term.writer();
            let _ = writer.write_all(b"\x07");
            let _ = writer.flush();
        }
    }

    #[cfg(unix)]
    fn is_recoverable(err: &EditError) -> bool {
        matches!(err, EditError::Io(_) | EditError::Errno(_))
    }

    #[cfg(not(unix))]
    fn is_recoverable(err: &EditError) -> bool {
        matches!(err, EditError::Io(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use crate::tty::test::TestTerm;
    use crate::tty::TermKind;

    fn editor(width: usize) -> (Editor<TestTerm>, TestTerm) {
        let term = TestTerm::new(TermKind::Supported, width);
        let editor = Editor::new(term.clone());
        (editor, term)
    }

    #[test]
    fn hi_return_is_accepted() {
        let (mut ed, term) = editor(80);
        term.feed(b"hi\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "hi");
        assert_eq!(ed.history().collect::<Vec<_>>(), vec!["hi"]);
    }

    #[test]
    fn delete_removes_char_to_the_left() {
        let (mut ed, term) = editor(80);
        // a, b, c, LEFT, LEFT, DELETE, RETURN -> "bc"
        term.feed(b"abc\x1b[D\x1b[D\x7f\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "bc");
    }

    #[test]
    fn shift_select_then_delete() {
        let (mut ed, term) = editor(80);
        // x, y, LEFT, SHIFT_LEFT, DELETE, RETURN -> "y"
        term.feed(b"xy\x1b[D\x1b[1;2D\x7f\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "y");
    }

    #[test]
    fn multiline_predicate_waits_for_balanced_braces() {
        let (mut ed, term) = editor(80);
        struct Braces;
        impl Continuation for Braces {
            fn should_continue(&mut self, buffer: &str) -> bool {
                buffer.matches('{').count() > buffer.matches('}').count()
            }
        }
        ed.set_multiline(Braces, "... ");
        term.feed(b"f{\r}\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "f{\n}");
    }

    #[test]
    fn tab_commits_suggestion() {
        let (mut ed, term) = editor(80);
        ed.set_autocomplete(|buffer: &str, suggestions: &mut StringList| {
            if buffer == "he" {
                suggestions.push_front("llo");
            }
        });
        term.feed(b"he\t\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "hello");
    }

    #[test]
    fn up_then_down_returns_to_live_buffer() {
        let (mut ed, term) = editor(80);
        term.feed(b"first\r");
        ed.read_line().unwrap();
        term.clear_output();
        term.feed(b"seco\x1b[A\x1b[B\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "seco");
    }

    #[test]
    fn up_arrow_recalls_previous_entry() {
        let (mut ed, term) = editor(80);
        term.feed(b"first\r");
        ed.read_line().unwrap();
        term.clear_output();
        term.feed(b"\x1b[A\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "first");
        // Accepting from history mode must drop the snapshot that
        // `history_older` pushed, not leave it behind as a stale entry.
        assert_eq!(ed.history().collect::<Vec<_>>(), vec!["first", "first"]);
    }

    #[test]
    fn ctrl_g_from_history_mode_drops_the_snapshot() {
        let (mut ed, term) = editor(80);
        term.feed(b"first\r");
        ed.read_line().unwrap();
        term.clear_output();
        term.feed(b"\x1b[A\x07");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "");
        assert_eq!(ed.history().collect::<Vec<_>>(), vec!["first"]);
    }

    #[test]
    fn ctrl_g_aborts_with_empty_buffer() {
        let (mut ed, term) = editor(80);
        term.feed(b"abc\x07");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "");
        assert!(ed.history().next().is_none());
    }

    #[test]
    fn ctrl_a_and_ctrl_e_move_to_line_bounds() {
        let (mut ed, term) = editor(80);
        // "ab", Ctrl-A, Ctrl-E, DELETE, RETURN -> deletes the trailing 'b'
        term.feed(&[b'a', b'b', 1, 5, 127, b'\r']);
        let line = ed.read_line().unwrap();
        assert_eq!(line, "a");
    }

    #[test]
    fn ctrl_v_pastes_clipboard() {
        let (mut ed, term) = editor(80);
        // "ab" (cursor after 'b'), SHIFT_LEFT selects "b", Ctrl-C copies it,
        // RIGHT drops the selection and returns to the end, Ctrl-V pastes.
        term.feed(b"ab\x1b[1;2D\x03\x1b[C\x16\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "abb");
    }

    #[test]
    fn history_up_stops_at_oldest_entry() {
        let (mut ed, term) = editor(80);
        term.feed(b"one\r");
        ed.read_line().unwrap();
        term.feed(b"two\r");
        ed.read_line().unwrap();
        term.clear_output();
        // Three UPs from a blank line: "two", then "one", then stay on "one".
        term.feed(b"\x1b[A\x1b[A\x1b[A\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "one");
    }

    #[test]
    fn suggestion_cycling_wraps_from_last_to_first() {
        let (mut ed, term) = editor(80);
        ed.set_autocomplete(|buffer: &str, suggestions: &mut StringList| {
            if buffer == "f" {
                // pushed front-first, so iteration order is "bar", "baz", "foo"
                suggestions.push_front("oo");
                suggestions.push_front("az");
                suggestions.push_front("ar");
            }
        });
        term.feed(b"f");
        // DOWN cycles 0->1->2->0 (wrap); committing with TAB appends whichever
        // suggestion is current.
        term.feed(b"\x1b[B\x1b[B\x1b[B\t\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "far");
    }

    #[test]
    fn zwj_family_emoji_is_one_character_and_measured_once() {
        // A ZWJ family grapheme delivered as one CHARACTER keypress's worth
        // of bytes (here fed byte-for-byte, as the key decoder would see
        // them arrive, since the decoder itself only understands single
        // code points: a grapheme splitter is what makes the editor core
        // treat the whole sequence as one character position; without one
        // installed each code point still advances `posn` independently,
        // but every one of them must be measured exactly once on first
        // draw and served from the cache afterwards).
        let (mut ed, term) = editor(80);
        let family = "\u{1f468}\u{200d}\u{1f469}\u{200d}\u{1f467}"; // man-ZWJ-woman-ZWJ-girl
        term.feed(family.as_bytes());
        term.feed(b"\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, family);
        let queries_after_first_accept = term.cursor_queries();
        assert!(queries_after_first_accept > 0, "unknown-width graphemes must be measured");

        term.clear_output();
        term.feed(b"\x1b[A\r"); // recall it from history and accept again
        ed.read_line().unwrap();
        assert_eq!(
            term.cursor_queries(),
            queries_after_first_accept,
            "a previously measured grapheme must not be re-measured"
        );
    }

    #[test]
    fn closed_stream_reports_eof() {
        let term = TestTerm::new(TermKind::NotTty, 80);
        let mut ed = Editor::new(term);
        let err = ed.read_line().unwrap_err();
        assert_matches!(err, EditError::Eof);
    }

    #[test]
    fn ctrl_d_on_empty_line_deletes_nothing_and_never_signals_eof() {
        let (mut ed, term) = editor(80);
        // Ctrl-D always deletes the character at posn, even on an empty
        // line; it never aborts the edit with EditError::Eof.
        term.feed(b"\x04hi\r");
        let line = ed.read_line().unwrap();
        assert_eq!(line, "hi");
    }
}
