//! Stream Session
//!
//! One request/response cycle:
//!
//! ```text
//! Idle ──▶ Sending ──▶ Streaming ──▶ Completed
//!             │            │
//!             │            ├───────▶ Cancelled
//!             └────────────┴───────▶ Failed
//! ```
//!
//! The session owns the accumulating answer, the current source batch and the
//! "first token seen" flag. Bytes flow through a [`FrameReader`] into
//! [`event::parse`], every parsed event is applied to the state and asks the
//! [`RenderThrottle`] for a render. Terminal transitions always flush.
//!
//! Persistence is not done here: the caller receives a [`StreamOutcome`] and
//! decides what to commit.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;

use super::cancel::CancelToken;
use crate::error::TransportError;
use crate::protocol::{event, FrameReader, SourceDoc, StreamEvent};
use crate::render::{RenderSink, RenderThrottle};
use crate::session::ChatMessage;
use crate::transport::{ByteStream, ChatRequest, ChatTransport};

/// Appended to the answer when the user stops the stream
pub const STOP_ANNOTATION: &str = "\n\n_⏹ Stopped_";

/// Label of an inline backend-reported error
pub const BACKEND_ERROR_LABEL: &str = "**Backend Error:**";

/// Label of an inline transport failure
pub const TRANSPORT_ERROR_LABEL: &str = "**Error:**";

/// Inline annotation for a `type: "error"` event
#[must_use]
pub fn backend_error_annotation(message: &str) -> String {
    format!("\n{BACKEND_ERROR_LABEL} {message}")
}

/// Inline annotation shown (never committed) for a transport failure
#[must_use]
pub fn transport_error_annotation(error: &TransportError) -> String {
    format!("\n\n{TRANSPORT_ERROR_LABEL} {error}")
}

// ============================================================================
// State
// ============================================================================

/// Lifecycle phase of a stream session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    /// Constructed, nothing sent
    Idle,
    /// Request sent, waiting for response headers
    Sending,
    /// Reading the response body
    Streaming,
    /// Body ended cleanly
    Completed,
    /// Stopped by the user
    Cancelled,
    /// Transport failure
    Failed,
}

impl StreamPhase {
    /// Whether no further transition can happen
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Lowercase name for logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient state of one in-flight answer
#[derive(Clone, Debug, Default)]
pub struct StreamState {
    /// Whether the user stopped the stream
    pub cancelled: bool,
    /// Whether a `token` event has arrived (clears the waiting indicator)
    pub first_token_seen: bool,
    /// Answer text so far; only ever appended to
    pub text: String,
    /// Latest source batch
    pub sources: Vec<SourceDoc>,
}

/// Counters for one cycle
#[derive(Clone, Debug, Default)]
pub struct StreamStats {
    /// Body bytes received
    pub bytes: usize,
    /// Body chunks received
    pub chunks: usize,
    /// Non-empty frames extracted
    pub frames: usize,
    /// Frames that parsed into an event
    pub events: usize,
    /// Frames dropped as malformed
    pub malformed: usize,
    /// Renders performed (throttled and flushed)
    pub renders: u32,
    /// Renders postponed because the sink was busy
    pub deferred_renders: u32,
    /// Wall time from send to termination
    pub duration: Duration,
}

/// Terminal snapshot of a cycle
#[derive(Clone, Debug)]
pub struct StreamOutcome {
    /// Terminal phase
    pub phase: StreamPhase,
    /// Accumulated answer text, without terminal annotations
    pub text: String,
    /// Latest source batch
    pub sources: Vec<SourceDoc>,
    /// Transport failure, when `phase` is `Failed`
    pub error: Option<TransportError>,
    /// Cycle counters
    pub stats: StreamStats,
}

impl StreamOutcome {
    /// The assistant message to commit, or `None` when nothing should be
    /// persisted (failure)
    #[must_use]
    pub fn assistant_message(&self) -> Option<ChatMessage> {
        match self.phase {
            StreamPhase::Completed => Some(ChatMessage::assistant(
                self.text.clone(),
                self.sources.clone(),
            )),
            StreamPhase::Cancelled => Some(ChatMessage::assistant(
                format!("{}{STOP_ANNOTATION}", self.text),
                self.sources.clone(),
            )),
            _ => None,
        }
    }
}

/// How the read loop ended
enum Termination {
    Completed,
    Cancelled,
    Failed(TransportError),
}

// ============================================================================
// Stream Session
// ============================================================================

/// Drives one request/response cycle against a [`ChatTransport`]
#[derive(Debug)]
pub struct StreamSession {
    phase: StreamPhase,
    state: StreamState,
    reader: FrameReader,
    throttle: RenderThrottle,
    stats: StreamStats,
}

impl StreamSession {
    /// Create an idle session that renders at most once per `render_interval`
    #[must_use]
    pub fn new(render_interval: Duration) -> Self {
        Self {
            phase: StreamPhase::Idle,
            state: StreamState::default(),
            reader: FrameReader::new(),
            throttle: RenderThrottle::new(render_interval),
            stats: StreamStats::default(),
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Send `request` and stream the answer into `sink` until the body ends,
    /// the transport fails, or `cancel` fires.
    pub async fn run<S>(
        mut self,
        transport: &dyn ChatTransport,
        request: &ChatRequest,
        sink: &mut S,
        mut cancel: CancelToken,
    ) -> StreamOutcome
    where
        S: RenderSink + ?Sized,
    {
        let started = Instant::now();
        self.phase = StreamPhase::Sending;
        tracing::debug!(
            transport = transport.name(),
            history = request.history.len(),
            "Sending chat request"
        );

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = transport.open_stream(request) => Some(result),
        };

        let termination = match opened {
            None => Termination::Cancelled,
            Some(Err(error)) => Termination::Failed(error),
            Some(Ok(body)) => {
                self.phase = StreamPhase::Streaming;
                self.pump(body, sink, &mut cancel).await
            }
        };

        self.stats.duration = started.elapsed();
        self.terminate(termination, sink)
    }

    /// Read the body until it ends, fails, or is cancelled.
    ///
    /// Returning drops `body`, which aborts the transport.
    async fn pump<S>(
        &mut self,
        mut body: ByteStream,
        sink: &mut S,
        cancel: &mut CancelToken,
    ) -> Termination
    where
        S: RenderSink + ?Sized,
    {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Termination::Cancelled,
                () = self.throttle.wait(), if self.throttle.is_pending() => {
                    self.throttle.fire(sink, &self.state.text, &self.state.sources);
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        self.stats.chunks += 1;
                        self.stats.bytes += bytes.len();
                        for frame in self.reader.push(&bytes) {
                            self.handle_frame(&frame, sink);
                        }
                    }
                    Some(Err(error)) => return Termination::Failed(error),
                    None => {
                        for frame in self.reader.finish() {
                            self.handle_frame(&frame, sink);
                        }
                        return Termination::Completed;
                    }
                },
            }
        }
    }

    fn handle_frame<S>(&mut self, frame: &str, sink: &mut S)
    where
        S: RenderSink + ?Sized,
    {
        self.stats.frames += 1;
        match event::parse(frame) {
            Ok(event) => {
                self.stats.events += 1;
                self.apply(event, sink);
            }
            Err(e) => {
                self.stats.malformed += 1;
                tracing::debug!(error = %e, frame_len = frame.len(), "Dropped malformed frame");
            }
        }
    }

    /// Apply one event to the state and request a throttled render
    pub fn apply<S>(&mut self, event: StreamEvent, sink: &mut S)
    where
        S: RenderSink + ?Sized,
    {
        match event {
            StreamEvent::Token(fragment) => {
                if !self.state.first_token_seen {
                    self.state.first_token_seen = true;
                    sink.clear_waiting();
                }
                self.state.text.push_str(&fragment);
            }
            StreamEvent::Sources(batch) => {
                if batch.is_empty() {
                    return;
                }
                tracing::debug!(count = batch.len(), "Received source batch");
                self.state.sources = batch;
            }
            StreamEvent::Error(message) => {
                tracing::warn!(message = %message, "Backend reported an error");
                self.state.text.push_str(&backend_error_annotation(&message));
            }
            StreamEvent::Unknown(kind) => {
                tracing::debug!(kind = %kind, "Ignoring unknown event type");
                return;
            }
        }
        self.throttle.request(sink);
    }

    /// Enter the terminal phase and flush the final frame
    fn terminate<S>(mut self, termination: Termination, sink: &mut S) -> StreamOutcome
    where
        S: RenderSink + ?Sized,
    {
        if !self.state.first_token_seen {
            sink.clear_waiting();
        }

        let (phase, error, display) = match termination {
            Termination::Completed => (StreamPhase::Completed, None, self.state.text.clone()),
            Termination::Cancelled => {
                self.state.cancelled = true;
                (
                    StreamPhase::Cancelled,
                    None,
                    format!("{}{STOP_ANNOTATION}", self.state.text),
                )
            }
            Termination::Failed(error) => {
                let display = format!("{}{}", self.state.text, transport_error_annotation(&error));
                (StreamPhase::Failed, Some(error), display)
            }
        };
        self.phase = phase;

        // The final frame bypasses the throttle, also when the follow-tail
        // sample is stale
        self.throttle.request(sink);
        self.throttle.flush(sink, &display, &self.state.sources);
        self.stats.renders = self.throttle.renders();
        self.stats.deferred_renders = self.throttle.deferred();

        tracing::info!(
            phase = %self.phase,
            bytes = self.stats.bytes,
            chunks = self.stats.chunks,
            frames = self.stats.frames,
            events = self.stats.events,
            malformed = self.stats.malformed,
            renders = self.stats.renders,
            duration_ms = u64::try_from(self.stats.duration.as_millis()).unwrap_or(u64::MAX),
            "Stream cycle finished"
        );
        if let Some(ref error) = error {
            tracing::warn!(error = %error, "Stream failed");
        }

        StreamOutcome {
            phase: self.phase,
            text: self.state.text,
            sources: self.state.sources,
            error,
            stats: self.stats,
        }
    }
}
