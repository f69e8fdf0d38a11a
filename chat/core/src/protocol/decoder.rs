//! UTF-8 decoding across chunk boundaries
//!
//! HTTP chunk boundaries have nothing to do with character boundaries, so a
//! multi-byte code point regularly arrives split over two reads. Decoding
//! each chunk on its own (`String::from_utf8_lossy`) would turn both halves
//! into replacement characters. [`ByteDecoder`] holds the incomplete tail
//! back and prepends it to the next chunk instead.

/// Longest possible UTF-8 sequence; anything held back is shorter than this
const MAX_UTF8_LEN: usize = 4;

/// Incremental UTF-8 decoder for one ordered byte stream
#[derive(Debug, Default)]
pub struct ByteDecoder {
    /// Bytes of a code point whose remainder has not arrived yet
    pending: Vec<u8>,
}

impl ByteDecoder {
    /// Create a decoder with nothing buffered
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently held back
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Decode the next chunk.
    ///
    /// Invalid sequences in the middle of the input become U+FFFD. A
    /// sequence that is merely incomplete at the end is kept for the next
    /// call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // `valid_up_to` marks a prefix that is known to be UTF-8
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());

                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            debug_assert!(after.len() < MAX_UTF8_LEN);
                            self.pending.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream.
    ///
    /// Whatever is still held back can never be completed, so it is decoded
    /// lossily. Never fails.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = std::mem::take(&mut self.pending);
        tracing::debug!(bytes = tail.len(), "Flushing incomplete UTF-8 tail");
        String::from_utf8_lossy(&tail).into_owned()
    }
}
