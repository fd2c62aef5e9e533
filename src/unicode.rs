//! UTF-8 decoding and grapheme-cluster width measurement.
//!
//! This layer never touches the terminal directly; the render engine calls
//! [`GraphemeWidthCache::insert`] after doing the actual cursor-diff
//! measurement.


use unicode_segmentation::UnicodeSegmentation;

/// Returns the byte length of the UTF-8 sequence starting with `byte`:
/// 1-4 for a lead byte, 0 for a continuation byte (corrupt/mid-sequence).
#[must_use]
pub fn byte_len(byte: u8) -> usize {
    if byte & 0xc0 == 0x80 {
        0
    } else if byte & 0xf8 == 0xf0 {
        4
    } else if byte & 0xf0 == 0xe0 {
        3
    } else if byte & 0xe0 == 0xc0 {
        2
    } else {
        1
    }
}

/// Decodes the code point starting at `bytes[0]`. `bytes` must contain at
/// least `byte_len(bytes[0])` bytes of valid UTF-8.
#[must_use]
pub fn decode(bytes: &[u8]) -> char {
    std::str::from_utf8(&bytes[..byte_len(bytes[0]).max(1)])
        .ok()
        .and_then(|s| s.chars().next())
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Counts the number of UTF-8 characters in the first `n` bytes of `s`.
/// Returns `None` if a lead byte claims more bytes than remain, or a
/// continuation byte is found where a lead byte was expected.
pub fn count_chars(s: &[u8], n: usize) -> Option<usize> {
    let mut count = 0;
    let mut i = 0;
    while i < n {
        let len = byte_len(s[i]);
        if len == 0 || i + len > n {
            return None;
        }
        i += len;
        count += 1;
    }
    Some(count)
}

/// Splits off the next grapheme cluster, in bytes, of a host-supplied
/// splitter. See [`GraphemeSplitter`].
pub trait GraphemeSplitter {
    /// Returns the byte length of the next grapheme cluster starting at
    /// the beginning of `s`, scanning at most `max_len` bytes. `0` means
    /// "end of input / could not determine".
    fn split(&self, s: &str, max_len: usize) -> usize;
}

/// Default splitter used when the host registers none: one grapheme per
/// Unicode code point.
pub struct CodepointSplitter;

impl GraphemeSplitter for CodepointSplitter {
    fn split(&self, s: &str, _max_len: usize) -> usize {
        s.chars().next().map_or(0, char::len_utf8)
    }
}

/// A splitter backed by `unicode-segmentation`'s extended grapheme cluster
/// algorithm. Not installed by default, since grapheme splitting is modeled
/// as an optional host callback, but available for hosts who want correct
/// clustering without implementing their own splitter.
pub struct UnicodeSegmentationSplitter;

impl GraphemeSplitter for UnicodeSegmentationSplitter {
    fn split(&self, s: &str, max_len: usize) -> usize {
        match s.get(..max_len.min(s.len())) {
            Some(bounded) => bounded
                .grapheme_indices(true)
                .nth(1)
                .map_or(bounded.len(), |(i, _)| i),
            None => 0,
        }
    }
}

/// Returns the byte length of the next grapheme cluster in `s`, delegating
/// to `splitter` if one is registered, else falling back to one code point.
pub fn grapheme_len(s: &str, splitter: Option<&dyn GraphemeSplitter>) -> usize {
    if s.is_empty() {
        return 0;
    }
    match splitter {
        Some(splitter) => splitter.split(s, usize::MAX),
        None => CodepointSplitter.split(s, usize::MAX),
    }
}

const MIN_CAPACITY: usize = 8;

/// FNV-1a 32-bit hash over raw bytes.
fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

struct Slot {
    grapheme: Box<str>,
    width: usize,
}

/// Open-addressed cache from grapheme-cluster bytes to measured display
/// width. Resizes (doubling) once occupancy exceeds 3/4 of capacity,
/// starting from a minimum capacity of 8.
#[derive(Default)]
pub struct GraphemeWidthCache {
    slots: Vec<Option<Slot>>,
    count: usize,
}

impl GraphemeWidthCache {
    #[must_use]
    pub fn new() -> Self {
        GraphemeWidthCache {
            slots: Vec::new(),
            count: 0,
        }
    }

    fn find(&self, grapheme: &str) -> Result<usize, usize> {
        if self.slots.is_empty() {
            return Err(0);
        }
        let hash = fnv1a(grapheme.as_bytes());
        let cap = self.slots.len();
        let start = hash as usize % cap;
        let mut i = start;
        loop {
            match &self.slots[i] {
                None => return Err(i),
                Some(slot) if &*slot.grapheme == grapheme => return Ok(i),
                Some(_) => {
                    i = (i + 1) % cap;
                    if i == start {
                        return Err(i);
                    }
                }
            }
        }
    }

    /// Look up a previously measured width. Once stored, a grapheme's
    /// width never changes for the lifetime of the cache.
    #[must_use]
    pub fn lookup(&self, grapheme: &str) -> Option<usize> {
        match self.find(grapheme) {
            Ok(i) => self.slots[i].as_ref().map(|s| s.width),
            Err(_) => None,
        }
    }

    /// Record the measured `width` of `grapheme`. Resizes first if the
    /// table is getting full.
    pub fn insert(&mut self, grapheme: &str, width: usize) {
        if self.slots.is_empty() {
            self.resize(MIN_CAPACITY);
        } else if self.count + 1 > (self.slots.len() >> 1) + (self.slots.len() >> 2) {
            self.resize(self.slots.len() * 2);
        }
        match self.find(grapheme) {
            Ok(_) => {}
            Err(i) => {
                self.slots[i] = Some(Slot {
                    grapheme: grapheme.into(),
                    width,
                });
                self.count += 1;
            }
        }
    }

    fn resize(&mut self, new_capacity: usize) {
        let old = std::mem::replace(&mut self.slots, vec![]);
        self.slots = (0..new_capacity).map(|_| None).collect();
        self.count = 0;
        for slot in old.into_iter().flatten() {
            self.insert(&slot.grapheme, slot.width);
        }
    }

    /// Drop every cached entry, freeing their owned grapheme strings.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.count = 0;
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Display width of a single grapheme if it is already known without
/// consulting the cache: `0` for a single-byte control character, `1` for
/// any other single-byte (ASCII printable) grapheme. Multi-byte graphemes
/// must go through the cache (and, if missing, be measured).
#[must_use]
pub fn known_width(grapheme: &str) -> Option<usize> {
    if grapheme.len() == 1 {
        let b = grapheme.as_bytes()[0];
        Some(if b.is_ascii_control() { 0 } else { 1 })
    } else {
        None
    }
}

/// Display width of a grapheme if it can be determined without measuring:
/// [`known_width`] for single-byte graphemes, else a cache lookup.
#[must_use]
pub fn grapheme_width(grapheme: &str, cache: &GraphemeWidthCache) -> Option<usize> {
    known_width(grapheme).or_else(|| cache.lookup(grapheme))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn byte_len_classes() {
        assert_eq!(byte_len(b'a'), 1);
        assert_eq!(byte_len(0b1100_0010), 2);
        assert_eq!(byte_len(0b1110_0010), 3);
        assert_eq!(byte_len(0b1111_0000), 4);
        assert_eq!(byte_len(0b1000_0000), 0);
    }

    #[test]
    fn count_chars_ascii_and_multibyte() {
        assert_eq!(count_chars("hi".as_bytes(), 2), Some(2));
        assert_eq!(count_chars("héllo".as_bytes(), "héllo".len()), Some(5));
        assert_eq!(count_chars(&[0x80], 1), None);
    }

    #[test]
    fn grapheme_len_fallback_is_one_codepoint() {
        assert_eq!(grapheme_len("a", None), 1);
        assert_eq!(grapheme_len("é", None), 'é'.len_utf8());
        assert_eq!(grapheme_len("", None), 0);
    }

    #[test]
    fn width_cache_roundtrip_and_monotone() {
        let mut cache = GraphemeWidthCache::new();
        assert_eq!(cache.lookup("👨‍👩‍👧"), None);
        cache.insert("👨‍👩‍👧", 2);
        assert_eq!(cache.lookup("👨‍👩‍👧"), Some(2));
        // Inserting again with a different width is ignored: first write wins.
        cache.insert("👨‍👩‍👧", 99);
        assert_eq!(cache.lookup("👨‍👩‍👧"), Some(2));
    }

    #[test]
    fn width_cache_resizes() {
        let mut cache = GraphemeWidthCache::new();
        for i in 0..100 {
            let g = format!("g{i}");
            cache.insert(&g, 1);
        }
        assert!(cache.capacity() >= 100);
        for i in 0..100 {
            let g = format!("g{i}");
            assert_eq!(cache.lookup(&g), Some(1));
        }
    }

    #[test]
    fn known_width_controls_vs_printable() {
        assert_eq!(known_width("\n"), Some(0));
        assert_eq!(known_width("a"), Some(1));
        assert_eq!(known_width("é"), None);
    }
}
