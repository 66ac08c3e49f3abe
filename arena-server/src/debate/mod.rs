//! Two-persona debate: session state, turn order, prompts, and turn execution.

mod engine;
mod persona;
mod scheduler;

pub use engine::{DebateEngine, TurnOutcome, TurnResult};
pub use persona::{Persona, PromptBuilder, Stance};
pub use scheduler::{next_turn, Turn};

use crate::store::{SessionStore, StoredSession};
use arena_common::{Result, ResultExt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two scripted debaters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaId {
    /// Opens the debate and argues for the theme
    Ai1,
    /// Always takes the opposite side of ai1
    Ai2,
}

impl PersonaId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ai1 => "ai1",
            Self::Ai2 => "ai2",
        }
    }

    /// The other debater.
    pub fn opponent(self) -> Self {
        match self {
            Self::Ai1 => Self::Ai2,
            Self::Ai2 => Self::Ai1,
        }
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn's text in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub speaker: PersonaId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Utterance {
    pub fn new(speaker: PersonaId, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// State of one debate.
///
/// `round` counts committed turns: it starts at 1 with the opening turn and
/// every later turn advances it, so `round == transcript.len()` once the
/// opening turn is recorded. The session is inactive once
/// `round >= max_rounds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateSession {
    pub id: String,
    pub theme: String,
    pub transcript: Vec<Utterance>,
    pub round: u32,
    pub max_rounds: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DebateSession {
    /// A fresh session with a random id, `round = 1` and an empty transcript.
    pub fn new(theme: impl Into<String>, max_rounds: u32) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            theme: theme.into(),
            transcript: Vec::new(),
            round: 1,
            max_rounds: max_rounds.max(1),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Speaker of the most recent utterance.
    pub fn last_speaker(&self) -> Option<PersonaId> {
        self.transcript.last().map(|u| u.speaker)
    }

    /// Whether the round ceiling has been reached or the debate was stopped.
    pub fn is_finished(&self) -> bool {
        !self.active || self.round >= self.max_rounds
    }

    /// Push an utterance without touching the round counter.
    pub fn append(&mut self, utterance: Utterance) {
        self.transcript.push(utterance);
        self.updated_at = Utc::now();
    }

    /// Advance the round counter, deactivating the session at the ceiling.
    pub fn advance_round(&mut self) {
        if self.round < self.max_rounds {
            self.round += 1;
        }
        self.close_if_exhausted();
        self.updated_at = Utc::now();
    }

    /// Record a completed turn. The opening turn keeps `round = 1`; every
    /// later turn advances the counter.
    pub fn record_turn(&mut self, speaker: PersonaId, text: impl Into<String>) {
        let opening = self.transcript.is_empty();
        self.append(Utterance::new(speaker, text));
        if opening {
            self.close_if_exhausted();
        } else {
            self.advance_round();
        }
    }

    /// State a concurrent writer can change: transcript length, round and
    /// the active flag. Commits compare it against their snapshot.
    pub fn revision(&self) -> (usize, u32, bool) {
        (self.transcript.len(), self.round, self.active)
    }

    /// Explicitly end the debate.
    pub fn stop(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }

    fn close_if_exhausted(&mut self) {
        if self.round >= self.max_rounds {
            self.active = false;
        }
    }
}

impl StoredSession for DebateSession {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Debate-specific operations on top of any [`SessionStore`].
///
/// These are read-modify-write helpers without a turn guard; the engine
/// commits turns through `compare_and_update` instead.
#[async_trait]
pub trait DebateStore: SessionStore<DebateSession> {
    /// Store a fresh session and return its id.
    async fn create(&self, theme: &str, max_rounds: u32) -> String {
        let session = DebateSession::new(theme, max_rounds);
        let id = session.id.clone();
        self.insert(session).await;
        id
    }

    /// Append an utterance without advancing the round.
    async fn append(&self, id: &str, utterance: Utterance) -> Result<DebateSession> {
        let mut session = self.get(id).await.context("appending utterance")?;
        session.append(utterance);
        self.update(session.clone()).await?;
        Ok(session)
    }

    /// Advance the round, deactivating the session at the ceiling.
    async fn advance_round(&self, id: &str) -> Result<DebateSession> {
        let mut session = self.get(id).await.context("advancing round")?;
        session.advance_round();
        self.update(session.clone()).await?;
        Ok(session)
    }
}

impl<T: SessionStore<DebateSession> + ?Sized> DebateStore for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use std::time::Duration;

    #[test]
    fn test_new_session() {
        let session = DebateSession::new("cats vs dogs", 3);
        assert_eq!(session.round, 1);
        assert!(session.active);
        assert!(session.transcript.is_empty());
        assert_eq!(session.id.len(), 36);
        assert_ne!(session.id, DebateSession::new("cats vs dogs", 3).id);
    }

    #[test]
    fn test_zero_max_rounds_is_clamped() {
        assert_eq!(DebateSession::new("x", 0).max_rounds, 1);
    }

    #[test]
    fn test_record_turn_tracks_transcript_length() {
        let mut session = DebateSession::new("cats vs dogs", 3);

        session.record_turn(PersonaId::Ai1, "cats");
        assert_eq!(session.round, 1);
        assert!(session.active);

        session.record_turn(PersonaId::Ai2, "dogs");
        assert_eq!(session.round, 2);
        assert!(session.active);

        session.record_turn(PersonaId::Ai1, "cats again");
        assert_eq!(session.round, 3);
        assert!(!session.active);
        assert_eq!(session.round as usize, session.transcript.len());
    }

    #[test]
    fn test_single_round_debate_closes_after_opening() {
        let mut session = DebateSession::new("x", 1);
        session.record_turn(PersonaId::Ai1, "opening");
        assert!(!session.active);
        assert!(session.is_finished());
    }

    #[test]
    fn test_advance_round_never_exceeds_ceiling() {
        let mut session = DebateSession::new("x", 2);
        session.advance_round();
        session.advance_round();
        session.advance_round();
        assert_eq!(session.round, 2);
        assert!(!session.active);
    }

    #[test]
    fn test_stop() {
        let mut session = DebateSession::new("x", 10);
        session.stop();
        assert!(session.is_finished());
        assert_eq!(session.round, 1);
    }

    #[test]
    fn test_revision_changes_on_stop() {
        let mut session = DebateSession::new("x", 10);
        session.record_turn(PersonaId::Ai1, "opening");
        let before = session.revision();
        session.stop();
        assert_ne!(session.revision(), before);
        assert_eq!(session.revision().0, before.0);
    }

    #[test]
    fn test_persona_id_serde() {
        assert_eq!(serde_json::to_string(&PersonaId::Ai2).unwrap(), "\"ai2\"");
        assert_eq!(PersonaId::Ai1.opponent(), PersonaId::Ai2);
        assert_eq!(PersonaId::Ai2.to_string(), "ai2");
    }

    #[tokio::test]
    async fn test_debate_store_helpers() {
        let store = MemorySessionStore::<DebateSession>::new(4, Duration::from_secs(60));
        let id = store.create("cats vs dogs", 2).await;

        let session = store.append(&id, Utterance::new(PersonaId::Ai1, "cats")).await.unwrap();
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.round, 1);

        let session = store.advance_round(&id).await.unwrap();
        assert_eq!(session.round, 2);
        assert!(!session.active);
        assert_eq!(store.get(&id).await.unwrap(), session);

        assert!(store.advance_round("missing").await.unwrap_err().is_not_found());
    }
}
