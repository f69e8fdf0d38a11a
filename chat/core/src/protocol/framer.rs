//! Newline-delimited framing
//!
//! Accumulates decoded text and cuts it into complete lines. Carriage
//! returns are stripped on the way in so `\r\n` and `\n` frame identically.
//! Whatever follows the last newline stays buffered until more text arrives.

/// Splits a text stream into trimmed, non-empty lines
#[derive(Debug, Default)]
pub struct LineFramer {
    /// Text received but not yet emitted as a frame
    buffer: String,
}

impl LineFramer {
    /// Create an empty framer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and iterate over every frame it completes.
    ///
    /// Frames are produced lazily in arrival order. Dropping the iterator
    /// early leaves the remaining complete lines buffered; they come out of
    /// the next `feed` call.
    pub fn feed(&mut self, text: &str) -> Frames<'_> {
        self.buffer.extend(text.chars().filter(|c| *c != '\r'));
        Frames { framer: self }
    }

    /// Take the unterminated remainder at end of stream.
    ///
    /// Returns `None` when the remainder is empty after trimming.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let trimmed = rest.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Discard everything buffered
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Bytes currently buffered
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn next_frame(&mut self) -> Option<String> {
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        None
    }
}

/// Lazy iterator over the frames completed by one [`LineFramer::feed`]
#[derive(Debug)]
pub struct Frames<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Frames<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_frame()
    }
}
