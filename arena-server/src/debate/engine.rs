//! Turn execution: guard, prompt, remote call, commit.

use super::{next_turn, DebateSession, Persona, PersonaId, PromptBuilder, Turn};
use crate::provider::Provider;
use crate::store::SessionStore;
use arena_common::util::short_id;
use arena_common::{Error, Result};
use serde::Serialize;
use std::sync::Arc;

const STOP_ATTEMPTS: usize = 3;

/// A committed turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub debate_id: String,
    pub persona: PersonaId,
    pub response: String,
    pub round: u32,
    pub finished: bool,
}

/// Result of asking a persona to speak.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnResult {
    Spoke(TurnOutcome),
    /// The debate is over; nothing was sent upstream.
    Finished,
}

/// Drives debates stored in a [`SessionStore`].
pub struct DebateEngine {
    store: Arc<dyn SessionStore<DebateSession>>,
    provider: Arc<dyn Provider>,
    builder: PromptBuilder,
    ai1: Persona,
    ai2: Persona,
    default_max_rounds: u32,
}

impl DebateEngine {
    pub fn new(
        store: Arc<dyn SessionStore<DebateSession>>,
        provider: Arc<dyn Provider>,
        builder: PromptBuilder,
        default_max_rounds: u32,
    ) -> Self {
        Self {
            store,
            provider,
            builder,
            ai1: Persona::ai1(),
            ai2: Persona::ai2(),
            default_max_rounds: default_max_rounds.max(1),
        }
    }

    fn persona(&self, id: PersonaId) -> &Persona {
        match id {
            PersonaId::Ai1 => &self.ai1,
            PersonaId::Ai2 => &self.ai2,
        }
    }

    /// Open a debate with ai1's first turn.
    ///
    /// The session is stored only once the opening turn succeeded, so a failed
    /// remote call leaves nothing behind.
    pub async fn start(
        &self,
        theme: &str,
        max_rounds: Option<i64>,
        referer: Option<String>,
    ) -> Result<TurnOutcome> {
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(Error::InvalidInput("Theme is required".into()));
        }
        let max_rounds = match max_rounds {
            None => self.default_max_rounds,
            Some(n) if n >= 1 => u32::try_from(n)
                .map_err(|_| Error::InvalidInput(format!("maxRounds is too large: {n}")))?,
            Some(n) => {
                return Err(Error::InvalidInput(format!(
                    "maxRounds must be at least 1, got {n}"
                )))
            }
        };

        let mut session = DebateSession::new(theme, max_rounds);
        let mut request = self.builder.build(&self.ai1, &session);
        request.referer = referer;

        let response = self.provider.chat(request).await?;
        session.record_turn(PersonaId::Ai1, response.content.clone());

        let outcome = TurnOutcome {
            debate_id: session.id.clone(),
            persona: PersonaId::Ai1,
            response: response.content,
            round: session.round,
            finished: session.is_finished(),
        };
        tracing::info!(
            debate = %short_id(&session.id),
            opener = %self.ai1.name,
            max_rounds,
            latency_ms = response.latency_ms,
            "Debate started"
        );
        self.store.insert(session).await;
        Ok(outcome)
    }

    /// ai1's next turn.
    pub async fn next_round(&self, id: &str, referer: Option<String>) -> Result<TurnResult> {
        self.take_turn(id, PersonaId::Ai1, referer).await
    }

    /// ai2's next turn.
    pub async fn continue_debate(&self, id: &str, referer: Option<String>) -> Result<TurnResult> {
        self.take_turn(id, PersonaId::Ai2, referer).await
    }

    /// Run one turn for `speaker`.
    ///
    /// Fails with `NotFound` for unknown ids and `Conflict` when it is the
    /// other persona's turn or the session changed during the remote call.
    pub async fn take_turn(
        &self,
        id: &str,
        speaker: PersonaId,
        referer: Option<String>,
    ) -> Result<TurnResult> {
        let session = self.store.get(id).await?;

        match next_turn(&session) {
            Turn::Finished => {
                tracing::debug!(debate = %short_id(id), "Debate already finished");
                return Ok(TurnResult::Finished);
            }
            Turn::Speak(expected) if expected != speaker => {
                return Err(Error::Conflict(format!(
                    "it is {expected}'s turn, not {speaker}'s"
                )));
            }
            Turn::Speak(_) => {}
        }

        let mut request = self.builder.build(self.persona(speaker), &session);
        request.referer = referer;
        let response = self.provider.chat(request).await?;

        let seen = session.revision();
        let mut updated = session;
        updated.record_turn(speaker, response.content.clone());

        let unchanged = move |current: &DebateSession| current.revision() == seen;
        self.store
            .compare_and_update(updated.clone(), &unchanged)
            .await?;

        let persona = self.persona(speaker);
        tracing::info!(
            debate = %short_id(id),
            persona = %persona.name,
            stance = ?persona.stance,
            round = updated.round,
            finished = updated.is_finished(),
            latency_ms = response.latency_ms,
            "Debate turn committed"
        );

        Ok(TurnResult::Spoke(TurnOutcome {
            debate_id: updated.id.clone(),
            persona: speaker,
            response: response.content,
            round: updated.round,
            finished: updated.is_finished(),
        }))
    }

    /// Mark a debate as finished. Idempotent.
    ///
    /// A turn committed between the read and the write makes the commit
    /// conflict; the stop is then retried on the fresh record.
    pub async fn stop(&self, id: &str) -> Result<DebateSession> {
        let mut attempts = 0;
        loop {
            let mut session = self.store.get(id).await?;
            if !session.active {
                return Ok(session);
            }
            let seen = session.revision();
            session.stop();
            let unchanged = move |current: &DebateSession| current.revision() == seen;
            match self.store.compare_and_update(session.clone(), &unchanged).await {
                Ok(()) => {
                    tracing::info!(debate = %short_id(id), round = session.round, "Debate stopped");
                    return Ok(session);
                }
                Err(e) if e.is_conflict() && attempts + 1 < STOP_ATTEMPTS => {
                    attempts += 1;
                    tracing::debug!(debate = %short_id(id), attempts, "Retrying stop after concurrent turn");
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<DebateSession> {
        self.store.get(id).await
    }

    /// Remove a debate. Unknown ids are not an error.
    pub async fn delete(&self, id: &str) -> bool {
        let existed = self.store.delete(id).await;
        if existed {
            tracing::info!(debate = %short_id(id), "Debate deleted");
        }
        existed
    }

    pub async fn count(&self) -> usize {
        self.store.len().await
    }

    pub async fn list(&self) -> Vec<DebateSession> {
        self.store.list().await
    }

    /// Drop idle sessions, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse, ProviderError, TokenUsage};
    use crate::store::MemorySessionStore;
    use arena_common::config::ReplyContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Scripted {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(ProviderError {
                    provider: "scripted".into(),
                    model: request.model,
                    message: "OpenRouter API error: 502. bad gateway".into(),
                    status_code: Some(502),
                });
            }
            Ok(ChatResponse {
                provider: "scripted".into(),
                model: request.model,
                content: format!("reply {n}"),
                annotations: None,
                usage: TokenUsage::default(),
                finish_reason: Some("stop".into()),
                latency_ms: 1,
            })
        }
    }

    /// Holds replies until released once armed.
    #[derive(Default)]
    struct Gated {
        armed: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Provider for Gated {
        fn name(&self) -> &str {
            "gated"
        }

        async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            if self.armed.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(ChatResponse {
                provider: "gated".into(),
                model: request.model,
                content: "late reply".into(),
                annotations: None,
                usage: TokenUsage::default(),
                finish_reason: None,
                latency_ms: 1,
            })
        }
    }

    fn engine_with(provider: Arc<dyn Provider>) -> DebateEngine {
        let store = Arc::new(MemorySessionStore::<DebateSession>::new(16, Duration::from_secs(60)));
        DebateEngine::new(
            store,
            provider,
            PromptBuilder::new("m/x", 1000, ReplyContext::LastUtterance),
            10,
        )
    }

    fn engine(fail: bool) -> (DebateEngine, Arc<Scripted>) {
        let provider = Arc::new(Scripted {
            calls: AtomicUsize::new(0),
            fail,
        });
        (engine_with(provider.clone()), provider)
    }

    fn spoke(result: TurnResult) -> TurnOutcome {
        match result {
            TurnResult::Spoke(outcome) => outcome,
            TurnResult::Finished => panic!("expected a turn"),
        }
    }

    #[tokio::test]
    async fn test_full_three_round_debate() {
        let (engine, provider) = engine(false);

        let opening = engine.start("cats vs dogs", Some(3), None).await.unwrap();
        assert_eq!(opening.round, 1);
        assert!(!opening.finished);

        let second = spoke(engine.continue_debate(&opening.debate_id, None).await.unwrap());
        assert_eq!(second.persona, PersonaId::Ai2);
        assert_eq!(second.round, 2);
        assert!(!second.finished);

        let third = spoke(engine.next_round(&opening.debate_id, None).await.unwrap());
        assert_eq!(third.persona, PersonaId::Ai1);
        assert_eq!(third.round, 3);
        assert!(third.finished);

        let session = engine.get(&opening.debate_id).await.unwrap();
        let speakers: Vec<_> = session.transcript.iter().map(|u| u.speaker).collect();
        assert_eq!(speakers, vec![PersonaId::Ai1, PersonaId::Ai2, PersonaId::Ai1]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

        assert_eq!(
            engine.continue_debate(&opening.debate_id, None).await.unwrap(),
            TurnResult::Finished
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_start_rejects_bad_input() {
        let (engine, provider) = engine(false);
        assert_eq!(engine.start("   ", None, None).await.unwrap_err().status_code(), 400);
        assert_eq!(engine.start("x", Some(0), None).await.unwrap_err().status_code(), 400);
        assert_eq!(engine.start("x", Some(-4), None).await.unwrap_err().status_code(), 400);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.count().await, 0);
    }

    #[tokio::test]
    async fn test_default_max_rounds() {
        let (engine, _) = engine(false);
        let opening = engine.start("x", None, None).await.unwrap();
        assert_eq!(engine.get(&opening.debate_id).await.unwrap().max_rounds, 10);
    }

    #[tokio::test]
    async fn test_out_of_turn_is_conflict() {
        let (engine, provider) = engine(false);
        let opening = engine.start("x", Some(5), None).await.unwrap();
        let err = engine.next_round(&opening.debate_id, None).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_start_stores_nothing() {
        let (engine, _) = engine(true);
        let err = engine.start("x", Some(3), None).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("502"));
        assert_eq!(engine.count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (engine, provider) = engine(false);
        assert!(engine.next_round("nope", None).await.unwrap_err().is_not_found());
        assert!(engine.continue_debate("nope", None).await.unwrap_err().is_not_found());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.count().await, 0);
    }

    #[tokio::test]
    async fn test_stop_and_delete() {
        let (engine, _) = engine(false);
        let opening = engine.start("x", Some(5), None).await.unwrap();

        let stopped = engine.stop(&opening.debate_id).await.unwrap();
        assert!(!stopped.active);
        assert_eq!(
            engine.continue_debate(&opening.debate_id, None).await.unwrap(),
            TurnResult::Finished
        );

        assert!(engine.delete(&opening.debate_id).await);
        assert!(!engine.delete(&opening.debate_id).await);
        assert!(engine.get(&opening.debate_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_stop_wins_over_turn_in_flight() {
        let provider = Arc::new(Gated::default());
        let engine = engine_with(provider.clone());
        let opening = engine.start("x", Some(5), None).await.unwrap();
        let id = opening.debate_id.as_str();

        provider.armed.store(true, Ordering::SeqCst);
        let (turn, stopped) = tokio::join!(engine.continue_debate(id, None), async {
            provider.entered.notified().await;
            let stopped = engine.stop(id).await;
            provider.release.notify_one();
            stopped
        });

        assert!(!stopped.unwrap().active);
        assert!(turn.unwrap_err().is_conflict());

        let session = engine.get(id).await.unwrap();
        assert!(!session.active);
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.round, 1);
    }
}
