//! Per-conversation state: message history, scope binding, and the
//! one-generation-in-flight rule.
//!
//! A session moves `Idle -> Awaiting` when an exchange begins and back to
//! `Idle` when it settles. A second `send` while `Awaiting` is rejected, not
//! queued, so history ordering stays well-defined. On success the fully
//! assembled assistant text is appended as one message; on failure the
//! partial text is discarded and the history keeps only the user's query.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::message::Message;
use crate::types::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Awaiting,
}

#[derive(Debug)]
struct Session {
    scope_id: String,
    history: Vec<Message>,
    state: ExchangeState,
    last_activity: Instant,
}

/// Shared registry of conversation sessions. Cheap to clone.
#[derive(Clone, Default)]
pub struct SessionManager {
    inner: Arc<Mutex<HashMap<String, Session>>>,
}

/// Everything the exchange task needs, captured atomically at begin time:
/// the settle guard, the retrieval scope, and a history snapshot taken
/// before the current query was appended.
pub struct ExchangeContext {
    pub guard: ExchangeGuard,
    pub scope_id: String,
    pub history: Vec<Message>,
}

/// Settles the session exactly once. Dropping an unsettled guard releases
/// the in-flight slot without appending anything.
pub struct ExchangeGuard {
    manager: SessionManager,
    session_id: String,
    settled: bool,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session bound to a document or case scope.
    pub fn start_session(&self, scope_id: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.inner.lock().insert(
            session_id.clone(),
            Session {
                scope_id: scope_id.to_string(),
                history: Vec::new(),
                state: ExchangeState::Idle,
                last_activity: Instant::now(),
            },
        );
        session_id
    }

    pub fn history(&self, session_id: &str) -> Result<Vec<Message>, RagError> {
        self.inner
            .lock()
            .get(session_id)
            .map(|session| session.history.clone())
            .ok_or_else(|| RagError::UnknownSession(session_id.to_string()))
    }

    pub fn state(&self, session_id: &str) -> Result<ExchangeState, RagError> {
        self.inner
            .lock()
            .get(session_id)
            .map(|session| session.state)
            .ok_or_else(|| RagError::UnknownSession(session_id.to_string()))
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Claim the session's single in-flight slot and append the user query.
    pub fn begin_exchange(
        &self,
        session_id: &str,
        query: &str,
    ) -> Result<ExchangeContext, RagError> {
        let mut sessions = self.inner.lock();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| RagError::UnknownSession(session_id.to_string()))?;
        if session.state == ExchangeState::Awaiting {
            return Err(RagError::SessionBusy(session_id.to_string()));
        }

        let history = session.history.clone();
        session.history.push(Message::user(query));
        session.state = ExchangeState::Awaiting;
        session.last_activity = Instant::now();

        Ok(ExchangeContext {
            guard: ExchangeGuard {
                manager: self.clone(),
                session_id: session_id.to_string(),
                settled: false,
            },
            scope_id: session.scope_id.clone(),
            history,
        })
    }

    /// Drop sessions idle for longer than `max_idle`. Sessions with a
    /// generation in flight are never swept.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.inner.lock();
        let before = sessions.len();
        sessions.retain(|_, session| {
            session.state == ExchangeState::Awaiting || session.last_activity.elapsed() < max_idle
        });
        before - sessions.len()
    }

    fn settle(&self, session_id: &str, assistant_text: Option<String>) {
        if let Some(session) = self.inner.lock().get_mut(session_id) {
            session.state = ExchangeState::Idle;
            session.last_activity = Instant::now();
            if let Some(text) = assistant_text {
                if !text.is_empty() {
                    session.history.push(Message::assistant(&text));
                }
            }
        }
    }
}

impl ExchangeGuard {
    /// Successful exchange: append the assembled assistant answer.
    pub fn complete(mut self, assistant_text: String) {
        self.settled = true;
        self.manager.settle(&self.session_id, Some(assistant_text));
    }

    /// Failed exchange: release the slot, discard any partial answer.
    pub fn fail(mut self) {
        self.settled = true;
        self.manager.settle(&self.session_id, None);
    }
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.manager.settle(&self.session_id, None);
        }
    }
}
