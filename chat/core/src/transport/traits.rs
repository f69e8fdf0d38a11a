//! Transport Traits
//!
//! The stream session only needs two things from the network: a way to open
//! a response body for a request, and a way to ask whether the backend is up.
//! Keeping that behind a trait lets tests script byte streams chunk by chunk.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::session::HistoryEntry;

/// Response body as an ordered stream of byte chunks
///
/// Dropping the stream aborts the underlying request.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Body of one chat turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The new user query
    pub query: String,
    /// Prior conversation, role and content only
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl ChatRequest {
    /// Create a request with no history
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            history: Vec::new(),
        }
    }

    /// Attach conversation history
    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }
}

/// Chat backend transport
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name for logs (e.g. "HTTP")
    fn name(&self) -> &str;

    /// Check whether the backend is reachable and ready
    async fn health_check(&self) -> bool;

    /// Send `request` and return the response body once headers arrived.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Status`] for a non-2xx answer and
    /// [`TransportError::Request`] when the request could not be sent.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;
}
