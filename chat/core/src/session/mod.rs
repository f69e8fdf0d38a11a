//! Session Management
//!
//! A session is one saved conversation: an ordered, append-only log of
//! messages plus a title and a last-modified timestamp. Sessions are kept in
//! a [`SessionMap`] keyed by id and persisted as a whole snapshot through a
//! [`SessionStore`].
//!
//! # Invariants
//!
//! - Committed messages are never edited; the log only grows, except for
//!   rolling back a user message whose turn failed and whole-session deletion.
//! - `timestamp` strictly increases on every mutation, so "newest first"
//!   ordering is stable even when saves land in the same millisecond.

mod store;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::SourceDoc;

pub use store::{FileSessionStore, MemorySessionStore, SessionStore};

/// Default cap on title length, in characters
pub const DEFAULT_TITLE_MAX_CHARS: usize = 30;

/// Suffix appended to titles that were cut short
pub const TITLE_ELLIPSIS: &str = "...";

/// All known sessions, keyed by id
pub type SessionMap = BTreeMap<SessionId, Session>;

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The person asking
    User,
    /// The backend's answer
    Assistant,
}

impl MessageRole {
    /// Wire name of the role
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Opaque, time-derived session identifier
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate an id from the current time in milliseconds.
    ///
    /// Collisions with ids already present in `existing` are resolved by
    /// counting upwards.
    #[must_use]
    pub fn generate(existing: &SessionMap) -> Self {
        let mut millis = now_ms();
        loop {
            let candidate = Self(millis.to_string());
            if !existing.contains_key(&candidate) {
                return candidate;
            }
            millis += 1;
        }
    }

    /// Borrow the id as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A committed message in the conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message
    pub role: MessageRole,
    /// Raw message text (Markdown for assistant answers)
    pub content: String,
    /// Sources shown with an assistant answer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceDoc>,
}

impl ChatMessage {
    /// A user query
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            sources: Vec::new(),
        }
    }

    /// An assistant answer with its sources
    pub fn assistant(content: impl Into<String>, sources: Vec<SourceDoc>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            sources,
        }
    }
}

/// A message as sent back to the backend: role and content only
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who sent the message
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// A saved conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session id
    pub id: SessionId,
    /// Sidebar title, derived from the first query unless renamed
    pub title: String,
    /// Last modification (Unix timestamp ms)
    pub timestamp: i64,
    /// Conversation log in append order
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Session {
    /// Create an empty session titled after its first query
    #[must_use]
    pub fn new(id: SessionId, first_query: &str, title_max_chars: usize) -> Self {
        Self {
            id,
            title: make_title(first_query, title_max_chars),
            timestamp: now_ms(),
            messages: Vec::new(),
        }
    }

    /// Append a message and bump the timestamp
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.touch();
    }

    /// Remove the trailing user message of a turn that produced no answer.
    ///
    /// Returns `None` and leaves the log untouched when the last message is
    /// not from the user.
    pub fn rollback_user_message(&mut self) -> Option<ChatMessage> {
        if self.messages.last()?.role != MessageRole::User {
            return None;
        }
        let removed = self.messages.pop();
        self.touch();
        removed
    }

    /// Replace the title
    pub fn rename(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Bump the last-modified timestamp, strictly increasing
    pub fn touch(&mut self) {
        self.timestamp = now_ms().max(self.timestamp + 1);
    }

    /// Conversation log stripped down to what the backend accepts
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages.iter().map(HistoryEntry::from).collect()
    }

    /// Whether the session holds no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Sidebar summary of this session
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            timestamp: self.timestamp,
            message_count: self.messages.len(),
        }
    }
}

/// Lightweight listing entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session id
    pub id: SessionId,
    /// Session title
    pub title: String,
    /// Last modification (Unix timestamp ms)
    pub timestamp: i64,
    /// Number of committed messages
    pub message_count: usize,
}

/// Summaries of all sessions, newest first
#[must_use]
pub fn summaries(sessions: &SessionMap) -> Vec<SessionSummary> {
    let mut list: Vec<_> = sessions.values().map(Session::summary).collect();
    list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
    list
}

/// Build a title from a query: at most `max_chars` characters, with an
/// ellipsis appended when the query was longer
#[must_use]
pub fn make_title(query: &str, max_chars: usize) -> String {
    let query = query.trim();
    match query.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TITLE_ELLIPSIS}", &query[..cut]),
        None => query.to_string(),
    }
}

/// Current timestamp in milliseconds
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
