//! Response Stream Protocol
//!
//! The backend answers a chat request with a chunked body of newline-delimited
//! JSON objects. Turning that body into events is a three-stage pipeline:
//!
//! ```text
//! bytes ──► ByteDecoder ──► LineFramer ──► event::parse ──► StreamEvent
//!           (UTF-8 across     (lines,        (JSON → typed
//!            chunk splits)     \r stripped)   event, or drop)
//! ```
//!
//! [`FrameReader`] bundles the first two stages so the stream session only
//! deals with whole frames.

mod decoder;
pub mod event;
mod framer;

pub use decoder::ByteDecoder;
pub use event::{SourceDoc, StreamEvent};
pub use framer::{Frames, LineFramer};

/// Decoder and framer for one response body
#[derive(Debug, Default)]
pub struct FrameReader {
    decoder: ByteDecoder,
    framer: LineFramer,
}

impl FrameReader {
    /// Create a reader with empty buffers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one body chunk and collect the frames it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decoder.decode(chunk);
        self.framer.feed(&text).collect()
    }

    /// End of body: flush the decoder and emit any unterminated last line
    pub fn finish(&mut self) -> Vec<String> {
        let tail = self.decoder.finish();
        let mut frames: Vec<String> = self.framer.feed(&tail).collect();
        frames.extend(self.framer.finish());
        frames
    }
}
