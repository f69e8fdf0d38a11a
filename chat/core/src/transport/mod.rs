//! Chat Transport
//!
//! How a chat turn reaches the backend and how its answer comes back as raw
//! bytes. The stream session never sees HTTP; it only consumes a
//! [`ByteStream`].

mod http;
mod traits;

pub use http::HttpTransport;
pub use traits::{ByteStream, ChatRequest, ChatTransport};
