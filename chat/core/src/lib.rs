//! RAG Chat Core - Headless streaming chat client
//!
//! This crate holds everything a chat front-end needs to talk to a
//! retrieval-augmented chat backend, independent of any UI framework. A
//! terminal REPL, a GUI or a scripted test drive it the same way.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Front-ends                               │
//! │   ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │   │ terminal CLI │   │ HeadlessSink │   │ any RenderSink impl  │  │
//! │   └──────┬───────┘   └──────┬───────┘   └──────────┬───────────┘  │
//! │          └──────────────────┴──────────────────────┘              │
//! │                 dispatch / cancel (down)                          │
//! │                 render_answer / set_loading (up)                  │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                │
//! ┌──────────────────────────────┼────────────────────────────────────┐
//! │                        RAGCHAT CORE                               │
//! │  ┌───────────────────────────┴──────────────────────────────────┐ │
//! │  │                       ChatAppState                            │ │
//! │  │   ┌───────────┐   ┌───────────────┐   ┌────────────────────┐ │ │
//! │  │   │ Sessions  │   │ StreamSession │   │  StreamController  │ │ │
//! │  │   │ + Store   │   │ + Throttle    │   │  (cancel)          │ │ │
//! │  │   └───────────┘   └───────┬───────┘   └────────────────────┘ │ │
//! │  └───────────────────────────┼──────────────────────────────────┘ │
//! │        bytes ─► ByteDecoder ─► LineFramer ─► event::parse         │
//! │                              │                                    │
//! │                       ChatTransport (HTTP)                        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatAppState`]: process-wide state, runs one turn at a time
//! - [`StreamSession`]: one request/response cycle as a state machine
//! - [`RenderSink`]: what a front-end implements to display answers
//! - [`RenderThrottle`]: at most one render per interval, flushed on exit
//! - [`ChatTransport`] / [`HttpTransport`]: where the bytes come from
//! - [`SessionStore`]: whole-snapshot persistence of conversations
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ragchat_core::{
//!     load_config, ChatAppState, FileSessionStore, HeadlessSink, HttpTransport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let transport = Arc::new(HttpTransport::from_config(&config)?);
//!     let store = Arc::new(FileSessionStore::new(&config.store_path));
//!     let mut app = ChatAppState::init(config, transport, store)?;
//!
//!     let mut sink = HeadlessSink::new();
//!     let report = app.dispatch("What is in the index?", &mut sink).await?;
//!     println!("{}", sink.text());
//!
//!     app.teardown()?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`protocol`]: byte decoding, line framing and event parsing
//! - [`streaming`]: stream session state machine and cancellation
//! - [`render`]: render sink boundary and throttling
//! - [`session`]: sessions, messages and their persistence
//! - [`transport`]: chat backend transport (HTTP)
//! - [`config`]: layered configuration (CLI > env > TOML > defaults)
//! - [`app`]: the process-wide chat state
//! - [`error`]: error types
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on crossterm, clap or any other
//! front-end library.

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod config;
pub mod error;
pub mod protocol;
pub mod render;
pub mod session;
pub mod streaming;
pub mod transport;

// Re-exports for convenience
pub use app::{ChatAppState, TurnReport};
pub use error::{ChatError, EventParseError, StoreError, TransportError};

// Protocol exports
pub use protocol::{ByteDecoder, FrameReader, LineFramer, SourceDoc, StreamEvent};

// Render exports
pub use render::{
    HeadlessSink, RenderSink, RenderThrottle, ViewportPositionProbe, DEFAULT_RENDER_INTERVAL,
};

// Session exports
pub use session::{
    ChatMessage, FileSessionStore, HistoryEntry, MemorySessionStore, MessageRole, Session,
    SessionId, SessionMap, SessionStore, SessionSummary,
};

// Streaming exports
pub use streaming::{
    CancelHandle, CancelToken, StreamController, StreamOutcome, StreamPhase, StreamSession,
    StreamState, StreamStats, STOP_ANNOTATION,
};

// Transport exports
pub use transport::{ByteStream, ChatRequest, ChatTransport, HttpTransport};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfig, ClientToml,
    ConfigError, ConfigOverrides, ConfigSource,
};
