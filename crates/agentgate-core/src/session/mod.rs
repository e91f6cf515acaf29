//! Per-user conversation history
//!
//! History lives in memory only and is bounded to the most recent
//! `history_limit` messages. Each session sits behind its own async mutex;
//! holding it for the length of a turn serializes messages from one user
//! while different users proceed in parallel.

use crate::types::ChatMessage;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Shared handle to one user's session
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// One user's conversation
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    history_limit: usize,
}

impl Session {
    pub fn new(user_id: impl Into<String>, history_limit: usize) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            messages: Vec::new(),
            created_at: now,
            last_active: now,
            history_limit: history_limit.max(1),
        }
    }

    /// Append a message, dropping the oldest ones past the limit
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.messages.len() > self.history_limit {
            let excess = self.messages.len() - self.history_limit;
            self.messages.drain(..excess);
        }
        self.last_active = Utc::now();
    }

    /// Copy of the history for one turn
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_active).to_std().unwrap_or_default()
    }
}

/// Sessions keyed by user id
#[derive(Debug)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    history_limit: usize,
}

impl SessionManager {
    pub fn new(history_limit: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            history_limit,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Get or create the session for `user_id`
    pub fn session(&self, user_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock();
        Arc::clone(sessions.entry(user_id.to_string()).or_insert_with(|| {
            debug!(user = user_id, "Creating session");
            Arc::new(tokio::sync::Mutex::new(Session::new(user_id, self.history_limit)))
        }))
    }

    pub fn get(&self, user_id: &str) -> Option<SessionHandle> {
        self.sessions.lock().get(user_id).cloned()
    }

    pub async fn snapshot(&self, user_id: &str) -> Vec<ChatMessage> {
        match self.get(user_id) {
            Some(session) => session.lock().await.snapshot(),
            None => Vec::new(),
        }
    }

    pub fn remove(&self, user_id: &str) -> bool {
        self.sessions.lock().remove(user_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Drop sessions idle for longer than `max_age`. Sessions in use by a
    /// running turn are kept. Returns the number removed.
    pub fn cleanup_idle(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|user_id, session| match session.try_lock() {
            Ok(session) if session.idle_for(now) > max_age => {
                debug!(user = user_id.as_str(), "Dropping idle session");
                false
            }
            _ => true,
        });
        before - sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HISTORY_LIMIT)
    }
}
