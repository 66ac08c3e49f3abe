//! Arena Server - scripted LLM debates and leveled tutoring over HTTP.
//!
//! This crate provides:
//! - A two-persona debate engine with strict turn alternation and a round ceiling
//! - A tutoring chat with five explanation levels, rolling history and PDF annotations
//! - Pluggable session storage with LRU + idle TTL eviction
//! - The OpenRouter completion client
//!
//! ## Architecture
//!
//! ```text
//! Client → routes → DebateEngine / TutorEngine → Provider (OpenRouter)
//!                          ↓
//!                    SessionStore
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod debate;
pub mod provider;
pub mod routes;
pub mod store;
pub mod tutor;

pub use debate::{DebateEngine, DebateSession, PersonaId, PromptBuilder};
pub use provider::{ChatRequest, ChatResponse, OpenRouterProvider, Provider, ProviderError};
pub use routes::{build_router, AppState};
pub use store::{MemorySessionStore, SessionStore, StoredSession};
pub use tutor::{TutorEngine, TutorSession};

use anyhow::Context;
use arena_common::config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Wire engines, stores and the OpenRouter provider from configuration.
pub fn build_state(config: &Config) -> AppState {
    let provider: Arc<dyn Provider> = Arc::new(OpenRouterProvider::new(
        config.secrets.openrouter.as_deref(),
        &config.llm,
    ));
    build_state_with_provider(config, provider)
}

/// Like [`build_state`] but with a caller-supplied provider.
pub fn build_state_with_provider(config: &Config, provider: Arc<dyn Provider>) -> AppState {
    let ttl = Duration::from_secs(config.sessions.idle_ttl_secs);
    let debate_store = Arc::new(MemorySessionStore::<DebateSession>::new(
        config.sessions.max_sessions,
        ttl,
    ));
    let tutor_store = Arc::new(MemorySessionStore::<TutorSession>::new(
        config.sessions.max_sessions,
        ttl,
    ));

    let debates = DebateEngine::new(
        debate_store,
        provider.clone(),
        PromptBuilder::from_config(config.llm.debate_model.as_str(), &config.debate),
        config.debate.default_max_rounds,
    );
    let tutor = TutorEngine::new(
        tutor_store,
        provider,
        config.llm.tutor_model.as_str(),
        config.tutor.clone(),
    );

    AppState::new(debates, tutor)
}

/// Periodically drop idle sessions from both stores.
pub fn spawn_sweeper(state: &AppState, interval: Duration) -> tokio::task::JoinHandle<()> {
    let debates = state.debates.clone();
    let tutor = state.tutor.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = debates.purge_expired().await + tutor.purge_expired().await;
            if purged > 0 {
                tracing::info!(purged, "Swept idle sessions");
            }
        }
    })
}

/// Start the arena server and run until Ctrl-C.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let ip = config
        .bind_address()
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("invalid bind address: {}", config.bind_address()))?;
    let addr = SocketAddr::from((ip, config.server.port));

    if !config.has_api_key() {
        tracing::warn!("OpenRouter API key not configured; completion requests will fail");
    }

    let state = build_state(config);
    let sweeper = spawn_sweeper(&state, Duration::from_secs(config.sessions.sweep_interval_secs));
    let router = build_router(config, state);

    tracing::info!("Starting Arena server on {}", addr);
    tracing::info!(
        debate_model = %config.llm.debate_model,
        tutor_model = %config.llm.tutor_model,
        history_limit = config.tutor.history_limit,
        "Models configured"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Arena server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
