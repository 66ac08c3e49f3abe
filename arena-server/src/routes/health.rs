//! Health and debug handlers.

use super::AppState;
use arena_common::util::{short_id, truncate_with_ellipsis};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub active_debates: usize,
    pub tutor_sessions: usize,
    pub timestamp: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateSummary {
    pub id: String,
    pub theme: String,
    pub round: u32,
    pub max_rounds: u32,
    pub active: bool,
    pub utterances: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorSummary {
    pub id: String,
    pub messages: usize,
    #[serde(rename = "hasPDF")]
    pub has_pdf: bool,
    pub pdf_name: Option<String>,
}

/// Session listing. Ids are truncated, so two entries may show the same
/// `id`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSessionsResponse {
    pub active_debates: usize,
    pub active_sessions: usize,
    pub debates: Vec<DebateSummary>,
    pub sessions: Vec<TutorSummary>,
}

pub(super) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        active_debates: state.debates.count().await,
        tutor_sessions: state.tutor.count().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub(super) async fn debug_sessions_handler(
    State(state): State<AppState>,
) -> Json<DebugSessionsResponse> {
    let debates: Vec<_> = state
        .debates
        .list()
        .await
        .into_iter()
        .map(|d| DebateSummary {
            id: short_id(&d.id),
            theme: truncate_with_ellipsis(&d.theme, 40),
            round: d.round,
            max_rounds: d.max_rounds,
            active: d.active,
            utterances: d.transcript.len(),
        })
        .collect();

    let sessions: Vec<_> = state
        .tutor
        .list()
        .await
        .into_iter()
        .map(|s| TutorSummary {
            id: short_id(&s.id),
            messages: s.history.len(),
            has_pdf: s.current_document.is_some(),
            pdf_name: s.current_document,
        })
        .collect();

    Json(DebugSessionsResponse {
        active_debates: debates.len(),
        active_sessions: sessions.len(),
        debates,
        sessions,
    })
}
