//! Chat Application State
//!
//! One [`ChatAppState`] per process. It owns the session map, the current
//! selection, the store, the transport and the [`StreamController`], and is
//! passed by reference to whatever front-end drives it.
//!
//! The session log is only mutated from here, and only at the edges of a
//! turn: the user message when the turn is dispatched, the assistant message
//! (or the rollback) once the stream is terminal.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::{ChatError, StoreError};
use crate::render::RenderSink;
use crate::session::{
    summaries, ChatMessage, MessageRole, Session, SessionId, SessionMap, SessionStore,
    SessionSummary,
};
use crate::streaming::{StreamController, StreamOutcome, StreamPhase, StreamSession};
use crate::transport::{ChatRequest, ChatTransport};

/// Result of one dispatched turn
#[derive(Debug)]
pub struct TurnReport {
    /// Session the turn ran in
    pub session_id: SessionId,
    /// Whether the turn created that session
    pub created_session: bool,
    /// Terminal snapshot of the stream
    pub outcome: StreamOutcome,
    /// Failure to persist the terminal state, if any
    pub store_error: Option<StoreError>,
}

impl TurnReport {
    /// Terminal phase of the turn
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.outcome.phase
    }
}

/// Process-wide chat state
pub struct ChatAppState {
    config: ClientConfig,
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn SessionStore>,
    sessions: SessionMap,
    current: Option<SessionId>,
    controller: StreamController,
}

impl std::fmt::Debug for ChatAppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAppState")
            .field("transport", &self.transport.name())
            .field("sessions", &self.sessions.len())
            .field("current", &self.current)
            .field("streaming", &self.controller.is_active())
            .finish_non_exhaustive()
    }
}

impl ChatAppState {
    /// Load saved sessions and start on a new chat.
    ///
    /// A corrupt store is logged and replaced by an empty map on the next
    /// save.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`] when the store exists but cannot be read.
    pub fn init(
        config: ClientConfig,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, ChatError> {
        let sessions = match store.load() {
            Ok(sessions) => sessions,
            Err(StoreError::Corrupt { path, source }) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "Session store is corrupt, starting with no sessions"
                );
                SessionMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            sessions = sessions.len(),
            transport = transport.name(),
            endpoint = %config.endpoint,
            "Chat state initialized"
        );

        Ok(Self {
            config,
            transport,
            store,
            sessions,
            current: None,
            controller: StreamController::new(),
        })
    }

    /// Stop any in-flight stream and write the final snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`] when the snapshot cannot be written.
    pub fn teardown(self) -> Result<(), ChatError> {
        if self.controller.cancel() {
            tracing::debug!("Cancelled in-flight stream during teardown");
        }
        self.store.save(&self.sessions)?;
        tracing::info!(sessions = self.sessions.len(), "Chat state torn down");
        Ok(())
    }

    /// Resolved configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Transport in use
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// Handle for stopping the in-flight stream
    #[must_use]
    pub fn controller(&self) -> StreamController {
        self.controller.clone()
    }

    /// All sessions by id
    #[must_use]
    pub fn sessions(&self) -> &SessionMap {
        &self.sessions
    }

    /// Look up a session
    #[must_use]
    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Id of the selected session (`None` for a new chat)
    #[must_use]
    pub fn current_session_id(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    /// Selected session
    #[must_use]
    pub fn current_session(&self) -> Option<&Session> {
        self.current.as_ref().and_then(|id| self.sessions.get(id))
    }

    /// Session summaries, newest first
    #[must_use]
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        summaries(&self.sessions)
    }

    /// Deselect; the next query starts a new session
    pub fn start_new_chat(&mut self) {
        self.current = None;
    }

    /// Select `id` and replay its log to `sink`
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnknownSession`] if no such session exists.
    pub fn open_session<S>(&mut self, id: &SessionId, sink: &mut S) -> Result<(), ChatError>
    where
        S: RenderSink + ?Sized,
    {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| ChatError::UnknownSession(id.clone()))?;

        for message in &session.messages {
            match message.role {
                MessageRole::User => sink.show_user_message(&message.content),
                MessageRole::Assistant => {
                    sink.begin_answer();
                    sink.clear_waiting();
                    sink.render_answer(&message.content, &message.sources);
                }
            }
        }
        sink.scroll_to_end();

        self.current = Some(id.clone());
        tracing::debug!(session = %id, messages = session.messages.len(), "Opened session");
        Ok(())
    }

    /// Rename a session
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyTitle`] for a blank title,
    /// [`ChatError::UnknownSession`] for an unknown id, and
    /// [`ChatError::Store`] if the change cannot be persisted.
    pub fn rename_session(&mut self, id: &SessionId, title: &str) -> Result<(), ChatError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::EmptyTitle);
        }
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| ChatError::UnknownSession(id.clone()))?;
        session.rename(title);
        self.store.save(&self.sessions)?;
        Ok(())
    }

    /// Delete a whole session. Deleting the selected one resets to a new chat.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnknownSession`] for an unknown id and
    /// [`ChatError::Store`] if the change cannot be persisted.
    pub fn delete_session(&mut self, id: &SessionId) -> Result<(), ChatError> {
        if self.sessions.remove(id).is_none() {
            return Err(ChatError::UnknownSession(id.clone()));
        }
        if self.current.as_ref() == Some(id) {
            self.start_new_chat();
        }
        self.store.save(&self.sessions)?;
        tracing::debug!(session = %id, "Deleted session");
        Ok(())
    }

    /// Run one chat turn in the selected session (creating one if needed).
    ///
    /// The user message is persisted before the request goes out. Once the
    /// stream is terminal the answer is committed (completed or cancelled) or
    /// the user message is rolled back (failed). Persistence failures after
    /// dispatch are logged and reported in the [`TurnReport`]. Dropping the
    /// returned future mid-stream rolls the user message back and frees the
    /// controller.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyQuery`] for a blank query,
    /// [`ChatError::StreamInFlight`] while another turn is streaming, and
    /// [`ChatError::Store`] if the user message cannot be persisted (the turn
    /// is then not sent).
    pub async fn dispatch<S>(&mut self, query: &str, sink: &mut S) -> Result<TurnReport, ChatError>
    where
        S: RenderSink + ?Sized,
    {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        let cancel = self.controller.arm().ok_or(ChatError::StreamInFlight)?;

        let (session_id, created_session) = self.select_or_create(query);
        let request = match self.record_user_message(&session_id, query) {
            Ok(request) => request,
            Err(e) => {
                self.rollback(&session_id, created_session);
                self.controller.disarm();
                return Err(e.into());
            }
        };

        let turn = TurnGuard {
            app: self,
            session_id,
            created_session,
            settled: false,
        };

        sink.set_loading(true);
        sink.show_user_message(query);
        sink.begin_answer();

        let outcome = StreamSession::new(turn.app.config.render_interval)
            .run(turn.app.transport.as_ref(), &request, sink, cancel)
            .await;
        let report = turn.settle(outcome);

        sink.set_loading(false);
        sink.scroll_to_end();

        Ok(report)
    }

    fn select_or_create(&mut self, query: &str) -> (SessionId, bool) {
        if let Some(id) = self.current.as_ref().filter(|id| self.sessions.contains_key(*id)) {
            return (id.clone(), false);
        }
        let id = SessionId::generate(&self.sessions);
        let session = Session::new(id.clone(), query, self.config.title_max_chars);
        self.sessions.insert(id.clone(), session);
        self.current = Some(id.clone());
        tracing::debug!(session = %id, "Created session");
        (id, true)
    }

    /// Append and persist the user message, then build the request from the
    /// updated log
    fn record_user_message(
        &mut self,
        session_id: &SessionId,
        query: &str,
    ) -> Result<ChatRequest, StoreError> {
        let history = match self.sessions.get_mut(session_id) {
            Some(session) => {
                session.push(ChatMessage::user(query));
                session.history()
            }
            None => Vec::new(),
        };
        self.store.save(&self.sessions)?;
        Ok(ChatRequest::new(query).with_history(history))
    }

    fn commit(
        &mut self,
        session_id: &SessionId,
        created_session: bool,
        outcome: &StreamOutcome,
    ) -> Result<(), StoreError> {
        match outcome.assistant_message() {
            Some(message) => {
                if let Some(session) = self.sessions.get_mut(session_id) {
                    session.push(message);
                }
            }
            None => self.rollback(session_id, created_session),
        }
        self.store.save(&self.sessions)
    }

    /// Remove the unanswered user message; drop the session too if this turn
    /// created it and nothing else is left
    fn rollback(&mut self, session_id: &SessionId, created_session: bool) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        session.rollback_user_message();
        if created_session && session.is_empty() {
            self.sessions.remove(session_id);
            if self.current.as_ref() == Some(session_id) {
                self.current = None;
            }
        }
        tracing::debug!(session = %session_id, "Rolled back unanswered user message");
    }
}

/// An armed turn between the persisted user message and the terminal commit.
///
/// Dropping it unsettled (the `dispatch` future was dropped mid-stream)
/// releases the controller and rolls the user message back.
struct TurnGuard<'a> {
    app: &'a mut ChatAppState,
    session_id: SessionId,
    created_session: bool,
    settled: bool,
}

impl TurnGuard<'_> {
    /// Release the controller and commit the outcome
    fn settle(mut self, outcome: StreamOutcome) -> TurnReport {
        self.settled = true;
        self.app.controller.disarm();

        let store_error = self
            .app
            .commit(&self.session_id, self.created_session, &outcome)
            .err();
        if let Some(ref e) = store_error {
            tracing::warn!(session = %self.session_id, error = %e, "Failed to persist turn");
        }

        TurnReport {
            session_id: self.session_id.clone(),
            created_session: self.created_session,
            outcome,
            store_error,
        }
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.app.controller.disarm();
        self.app.rollback(&self.session_id, self.created_session);
        if let Err(e) = self.app.store.save(&self.app.sessions) {
            tracing::warn!(session = %self.session_id, error = %e, "Failed to persist rollback");
        }
        tracing::debug!(session = %self.session_id, "Turn abandoned before the stream ended");
    }
}
