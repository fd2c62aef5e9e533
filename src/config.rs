//! User-configurable behavior that sits outside the fixed key-binding
//! table.
//!
//! There is deliberately no `EditMode` here (Emacs vs. Vi): the binding
//! table is fixed, so a `Config` only ever tunes bell, history retention,
//! coloring, and escape-sequence timing around it.

/// User preferences for an [`crate::Editor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    tab_stop: u8,
    bell_style: BellStyle,
    max_history_size: Option<usize>,
    keyseq_timeout_ms: Option<u16>,
    color_mode: ColorMode,
}

impl Config {
    #[must_use]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Horizontal space a literal tab character occupies when rendered.
    #[must_use]
    pub fn tab_stop(&self) -> u8 {
        self.tab_stop
    }

    #[must_use]
    pub fn bell_style(&self) -> BellStyle {
        self.bell_style
    }

    /// Maximum number of entries retained in history; `None` means
    /// unbounded, trimmed only if the host sets a limit.
    #[must_use]
    pub fn max_history_size(&self) -> Option<usize> {
        self.max_history_size
    }

    /// How long, in milliseconds, the decoder keeps reading bytes of an
    /// escape sequence before giving up. `None` means block until a
    /// terminator byte or buffer-full, the decoder's default behavior.
    #[must_use]
    pub fn keyseq_timeout_ms(&self) -> Option<u16> {
        self.keyseq_timeout_ms
    }

    #[must_use]
    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tab_stop: 8,
            bell_style: BellStyle::default(),
            max_history_size: None,
            keyseq_timeout_ms: None,
            color_mode: ColorMode::Enabled,
        }
    }
}

/// Beep, flash, or do nothing, on an edit that has no effect (e.g.
/// `DELETE` at the start of the buffer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BellStyle {
    Audible,
    /// Flash the screen. Not implemented by any terminal adapter; kept
    /// as a distinct variant so a host can detect and reject it rather
    /// than silently getting [`BellStyle::None`] behavior.
    Visible,
    /// No bell at all; the default.
    #[default]
    None,
}

/// Whether syntax coloring and selection reverse-video are emitted at
/// all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Color if a tokenizer is installed and the terminal is classified
    /// [`crate::tty::TermKind::Supported`].
    #[default]
    Enabled,
    /// Never emit color escapes, even with a tokenizer installed.
    Disabled,
    /// Emit color escapes even on an unsupported terminal classification.
    Forced,
}

/// Builder for [`Config`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Builder {
    p: Config,
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Builder {
            p: Config::default(),
        }
    }

    #[must_use]
    pub fn tab_stop(mut self, tab_stop: u8) -> Self {
        self.p.tab_stop = tab_stop.max(1);
        self
    }

    #[must_use]
    pub fn bell_style(mut self, bell_style: BellStyle) -> Self {
        self.p.bell_style = bell_style;
        self
    }

    #[must_use]
    pub fn max_history_size(mut self, max_size: usize) -> Self {
        self.p.max_history_size = Some(max_size);
        self
    }

    #[must_use]
    pub fn unbounded_history(mut self) -> Self {
        self.p.max_history_size = None;
        self
    }

    #[must_use]
    pub fn keyseq_timeout_ms(mut self, timeout_ms: u16) -> Self {
        self.p.keyseq_timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn color_mode(mut self, color_mode: ColorMode) -> Self {
        self.p.color_mode = color_mode;
        self
    }

    #[must_use]
    pub fn build(self) -> Config {
        self.p
    }
}
