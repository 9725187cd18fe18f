//! Conversation sessions.
//!
//! A session is an append-only transcript of (query, answer) exchanges,
//! bounded to the most recent `max_history` exchanges and rendered as
//! `User:` / `Assistant:` lines for the model's system instruction.

use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// One question and its answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub query: String,
    pub answer: String,
    pub at: DateTime<Utc>,
}

/// Storage for conversation transcripts.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a new, empty session and return its id.
    async fn create_session(&self) -> Result<String>;

    /// Rendered history, or `None` for an unknown or empty session.
    async fn get_history(&self, session_id: &str) -> Result<Option<String>>;

    /// Append an exchange, creating the session if needed.
    async fn add_exchange(&self, session_id: &str, query: &str, answer: &str) -> Result<()>;

    /// Drop every exchange in a session.
    async fn clear_session(&self, session_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct Session {
    exchanges: VecDeque<Exchange>,
}

/// In-memory session store.
#[derive(Debug)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Session>>,
    max_history: usize,
}

impl SessionManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_history,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .lock()
            .map_err(|_| SyllabusError::Session("session store lock poisoned".to_string()))
    }

    /// Exchanges currently kept for a session, oldest first.
    pub fn exchanges(&self, session_id: &str) -> Result<Vec<Exchange>> {
        Ok(self
            .lock()?
            .get(session_id)
            .map(|s| s.exchanges.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn session_count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(2)
    }
}

#[async_trait]
impl SessionStore for SessionManager {
    async fn create_session(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.lock()?.insert(id.clone(), Session::default());
        debug!("Created session {}", id);
        Ok(id)
    }

    async fn get_history(&self, session_id: &str) -> Result<Option<String>> {
        let sessions = self.lock()?;
        let Some(session) = sessions.get(session_id) else {
            return Ok(None);
        };
        if session.exchanges.is_empty() {
            return Ok(None);
        }

        let lines: Vec<String> = session
            .exchanges
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.query, e.answer))
            .collect();
        Ok(Some(lines.join("\n")))
    }

    async fn add_exchange(&self, session_id: &str, query: &str, answer: &str) -> Result<()> {
        let mut sessions = self.lock()?;
        let session = sessions.entry(session_id.to_string()).or_default();
        session.exchanges.push_back(Exchange {
            query: query.to_string(),
            answer: answer.to_string(),
            at: Utc::now(),
        });
        while session.exchanges.len() > self.max_history {
            session.exchanges.pop_front();
        }
        Ok(())
    }

    async fn clear_session(&self, session_id: &str) -> Result<()> {
        if let Some(session) = self.lock()?.get_mut(session_id) {
            session.exchanges.clear();
        }
        Ok(())
    }
}
