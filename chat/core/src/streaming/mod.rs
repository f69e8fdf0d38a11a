//! Streaming Module
//!
//! Drives a single chat turn from request to terminal state and exposes the
//! cancellation handle the front-end uses to stop it.

mod cancel;
mod stream_session;

pub use cancel::{cancel_pair, CancelHandle, CancelToken, StreamController};
pub use stream_session::{
    backend_error_annotation, transport_error_annotation, StreamOutcome, StreamPhase,
    StreamSession, StreamState, StreamStats, BACKEND_ERROR_LABEL, STOP_ANNOTATION,
    TRANSPORT_ERROR_LABEL,
};
