//! In-memory conversation sessions.
//!
//! History is append-only and scoped to one browser session: it lives only as
//! long as the process and is never persisted.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A conversation with its ordered message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message; messages are never removed or reordered.
    pub fn push(&mut self, role: Role, content: String) {
        let now = Utc::now();
        self.messages.push(ChatMessage {
            role,
            content,
            timestamp: now,
        });
        self.updated_at = now;
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds all live sessions, keyed by session id.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, ChatSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a session, creating a new one when the id is unknown or absent.
    /// Returns the effective session id.
    pub fn ensure(&self, id: Option<Uuid>) -> Uuid {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match id {
            Some(id) if sessions.contains_key(&id) => id,
            _ => {
                let session = ChatSession::new();
                let id = session.id;
                sessions.insert(id, session);
                id
            }
        }
    }

    /// Snapshot of a session's history, oldest first.
    pub fn history(&self, id: Uuid) -> Vec<ChatMessage> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(&id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Append a message to a session. Unknown ids are ignored.
    pub fn append(&self, id: Uuid, role: Role, content: String) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = sessions.get_mut(&id) {
            session.push(role, content);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
