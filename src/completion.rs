//! Completion callback used for tab-completion suggestions.

use crate::string_list::StringList;

/// To be called for tab-completion.
///
/// Given the current buffer, pushes zero or more suffixes (only the
/// *unmatched tail* to append, not the whole candidate) into
/// `suggestions`. The editor shows the entry at `suggestions.posn()`
/// inline after the buffer and cycles through the rest with `DOWN`.
pub trait Completer {
    fn complete(&mut self, buffer: &str, suggestions: &mut StringList);
}

impl Completer for () {
    fn complete(&mut self, _buffer: &str, _suggestions: &mut StringList) {}
}

/// Host-side helper for use inside a [`Completer::complete`] implementation.
/// Pushes one more unmatched-tail suggestion onto the list the editor will
/// cycle through.
pub fn add_suggestion(suggestions: &mut StringList, s: impl Into<String>) {
    suggestions.push_front(s);
}

/// Adapter for the common case of a completer expressed as a plain
/// closure over the buffer.
impl<F> Completer for F
where
    F: FnMut(&str, &mut StringList),
{
    fn complete(&mut self, buffer: &str, suggestions: &mut StringList) {
        self(buffer, suggestions)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn closure_completer_pushes_suggestions() {
        let mut completer = |buffer: &str, suggestions: &mut StringList| {
            if buffer == "pri" {
                suggestions.push_front("nt");
            }
        };
        let mut list = StringList::new();
        completer.complete("pri", &mut list);
        assert_eq!(list.get(0), Some("nt"));
    }
}
