//! Per-session conversation history.
//!
//! Each session keeps at most `max_messages` messages; the oldest message is
//! evicted first. State lives in process memory only.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::models::{ChatMessage, Role};

pub struct ChatMemory {
    max_messages: usize,
    sessions: Mutex<HashMap<String, VecDeque<ChatMessage>>>,
}

impl ChatMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages: max_messages.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<ChatMessage>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_message(&self, session_id: &str, role: Role, content: impl Into<String>) {
        let message = ChatMessage {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        let mut sessions = self.lock();
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push_back(message);
        while history.len() > self.max_messages {
            history.pop_front();
        }
    }

    /// Messages for `session_id`, oldest first. Unknown sessions are empty.
    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.lock()
            .get(session_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a session. Returns `false` if it did not exist.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }
}
