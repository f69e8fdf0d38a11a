//! Error Types
//!
//! Every failure the core can report, grouped by the layer that produces it.
//! Stream-level failures never escape a single turn: the stream session folds
//! them into a terminal phase and the app state decides what gets persisted.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionId;

/// Terminal failures of the HTTP transport.
///
/// User cancellation is deliberately absent: an aborted stream is a
/// `Cancelled` outcome, never a transport error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The backend answered with a non-2xx status
    #[error("Server Error: {status} {reason}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase (may be empty)
        reason: String,
    },

    /// The request could not be sent or the headers never arrived
    #[error("Request failed: {0}")]
    Request(String),

    /// Reading the response body failed mid-stream
    #[error("Stream read failed: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            };
        }
        if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Why a single frame could not be turned into an event.
///
/// Always recoverable: the frame is dropped and the stream continues.
#[derive(Debug, Error)]
pub enum EventParseError {
    /// The frame is not valid JSON
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON object has no string `type` field
    #[error("frame has no `type` field")]
    MissingType,

    /// The `type` is known but its `data` has the wrong shape
    #[error("invalid `{kind}` payload: {reason}")]
    InvalidPayload {
        /// Event type whose payload was rejected
        kind: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("session store I/O failed at {path}: {source}")]
    Io {
        /// File that was being accessed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The backing file exists but does not hold a valid snapshot
    #[error("session store at {path} is corrupt: {source}")]
    Corrupt {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying parse error
        source: serde_json::Error,
    },

    /// The in-memory snapshot could not be serialized
    #[error("failed to serialize sessions: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors returned by [`crate::ChatAppState`] operations
#[derive(Debug, Error)]
pub enum ChatError {
    /// Queries must contain non-whitespace text
    #[error("query is empty")]
    EmptyQuery,

    /// A stream is already in flight for the current session
    #[error("a response is already streaming; cancel it first")]
    StreamInFlight,

    /// No session with the given id exists
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// Session titles must contain non-whitespace text
    #[error("session title is empty")]
    EmptyTitle,

    /// Persisting the session map failed
    #[error(transparent)]
    Store(#[from] StoreError),
}
