//! Leveled tutoring chat with a rolling history and cached PDF annotations.

mod engine;
mod levels;

pub use engine::{ChatInput, ChatReply, DocumentMode, TutorEngine};
pub use levels::Level;

use crate::provider::Message;
use crate::store::StoredSession;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-client tutoring state, keyed by the client-supplied session id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorSession {
    pub id: String,
    /// Rolling window of user/assistant messages
    pub history: Vec<Message>,
    /// Parsed-document annotations from the last processed upload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
    /// File name of the most recently uploaded PDF
    pub current_document: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TutorSession {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            history: Vec::new(),
            annotations: None,
            current_document: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append one exchange and drop the oldest messages beyond `limit`.
    pub fn push_exchange(&mut self, user: Message, assistant: Message, limit: usize) {
        self.history.push(user);
        self.history.push(assistant);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
            tracing::debug!(session = %arena_common::util::short_id(&self.id), limit, "Trimmed tutor history");
        }
        self.updated_at = Utc::now();
    }

    /// The last `window` messages.
    pub fn recent(&self, window: usize) -> &[Message] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }
}

impl StoredSession for TutorSession {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_capped() {
        let mut session = TutorSession::new("abc");
        for i in 0..15 {
            session.push_exchange(
                Message::user(format!("q{i}")),
                Message::assistant(format!("a{i}")),
                20,
            );
        }
        assert_eq!(session.history.len(), 20);
        assert_eq!(session.history[0].content.text(), "q5");
        assert_eq!(session.history[19].content.text(), "a14");
    }

    #[test]
    fn test_recent_window() {
        let mut session = TutorSession::new("abc");
        session.push_exchange(Message::user("q"), Message::assistant("a"), 20);
        assert_eq!(session.recent(30).len(), 2);
        assert_eq!(session.recent(1)[0].content.text(), "a");
        assert!(session.recent(0).is_empty());
    }
}
