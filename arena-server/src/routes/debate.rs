//! Debate handlers.

use super::{referer, ApiError, ApiResult, AppState};
use crate::debate::{DebateSession, PersonaId, TurnOutcome, TurnResult};
use arena_common::Error;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

/// Start request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDebateRequest {
    #[serde(default, alias = "topic")]
    pub theme: Option<String>,
    #[serde(default)]
    pub max_rounds: Option<i64>,
}

/// Body for endpoints addressing an existing debate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateIdRequest {
    #[serde(default)]
    pub debate_id: Option<String>,
}

impl DebateIdRequest {
    fn id(self) -> Result<String, ApiError> {
        self.debate_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidInput("debateId is required".into()).into())
    }
}

/// Turn response. A finished debate serializes as `{"finished": true}`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<PersonaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    pub finished: bool,
}

impl From<TurnOutcome> for TurnResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            debate_id: Some(outcome.debate_id),
            response: Some(outcome.response),
            ai: Some(outcome.persona),
            round: Some(outcome.round),
            finished: outcome.finished,
        }
    }
}

impl From<TurnResult> for TurnResponse {
    fn from(result: TurnResult) -> Self {
        match result {
            TurnResult::Spoke(outcome) => Self {
                debate_id: None,
                ..outcome.into()
            },
            TurnResult::Finished => Self {
                finished: true,
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

pub(super) async fn start_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<StartDebateRequest>, JsonRejection>,
) -> ApiResult<TurnResponse> {
    let Json(request) = payload?;
    let theme = request.theme.unwrap_or_default();
    let outcome = state
        .debates
        .start(&theme, request.max_rounds, referer(&headers))
        .await?;
    Ok(Json(outcome.into()))
}

pub(super) async fn next_round_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DebateIdRequest>, JsonRejection>,
) -> ApiResult<TurnResponse> {
    let Json(request) = payload?;
    let result = state
        .debates
        .next_round(&request.id()?, referer(&headers))
        .await?;
    Ok(Json(result.into()))
}

pub(super) async fn continue_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DebateIdRequest>, JsonRejection>,
) -> ApiResult<TurnResponse> {
    let Json(request) = payload?;
    let result = state
        .debates
        .continue_debate(&request.id()?, referer(&headers))
        .await?;
    Ok(Json(result.into()))
}

pub(super) async fn stop_handler(
    State(state): State<AppState>,
    payload: Result<Json<DebateIdRequest>, JsonRejection>,
) -> ApiResult<TurnResponse> {
    let Json(request) = payload?;
    let session = state.debates.stop(&request.id()?).await?;
    Ok(Json(TurnResponse {
        debate_id: Some(session.id),
        round: Some(session.round),
        finished: true,
        ..TurnResponse::default()
    }))
}

pub(super) async fn get_handler(
    State(state): State<AppState>,
    Path(debate_id): Path<String>,
) -> ApiResult<DebateSession> {
    Ok(Json(state.debates.get(&debate_id).await?))
}

pub(super) async fn delete_handler(
    State(state): State<AppState>,
    Path(debate_id): Path<String>,
) -> Json<DeleteResponse> {
    state.debates.delete(&debate_id).await;
    Json(DeleteResponse {
        message: "Debate deleted".into(),
    })
}
