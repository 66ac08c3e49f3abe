//! Tutoring chat handlers.

use super::{referer, ApiResult, AppState};
use crate::tutor::{ChatInput, Level};
use arena_common::Error;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `/api/chat` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    #[serde(default)]
    pub prompt: Option<String>,
    /// 1-5, as a number or a numeric string
    #[serde(default)]
    pub level: Option<Value>,
    /// Any truthy value marks the prompt as a question about the PDF
    #[serde(default)]
    pub document_prompt: Option<Value>,
    #[serde(default)]
    pub pdf_data: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponseBody {
    pub success: bool,
    pub response: String,
    pub has_annotations: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(super) async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequestBody>, JsonRejection>,
) -> ApiResult<ChatResponseBody> {
    let Json(body) = payload?;

    let level = match body.level.as_ref().filter(|v| is_truthy(v)) {
        Some(value) => Some(Level::from_json(value)?),
        None => None,
    };

    let input = ChatInput {
        prompt: body.prompt.unwrap_or_default(),
        level,
        document_prompt: body.document_prompt.as_ref().is_some_and(is_truthy),
        pdf_data: body.pdf_data,
        file_name: body.file_name,
        session_id: body.session_id,
        referer: referer(&headers),
    };

    let reply = state.tutor.chat(input).await?;
    Ok(Json(ChatResponseBody {
        success: true,
        response: reply.response,
        has_annotations: reply.has_annotations,
    }))
}

pub(super) async fn clear_handler(
    State(state): State<AppState>,
    payload: Result<Json<ClearRequest>, JsonRejection>,
) -> ApiResult<ClearResponse> {
    let Json(body) = payload?;
    let session_id = body
        .session_id
        .ok_or_else(|| Error::InvalidInput("Session ID is required".into()))?;
    state.tutor.clear(&session_id).await?;
    Ok(Json(ClearResponse {
        success: true,
        message: "PDF and conversation history cleared".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        for value in [json!(true), json!(1), json!("yes"), json!({}), json!([])] {
            assert!(is_truthy(&value), "{value}");
        }
        for value in [json!(false), json!(0), json!(""), json!(null)] {
            assert!(!is_truthy(&value), "{value}");
        }
    }

    #[test]
    fn test_chat_body_is_camel_case() {
        let body: ChatRequestBody = serde_json::from_value(json!({
            "prompt": "hi",
            "level": "2",
            "documentPrompt": true,
            "fileName": "notes.pdf",
            "sessionId": "abc"
        }))
        .unwrap();
        assert_eq!(body.file_name.as_deref(), Some("notes.pdf"));
        assert_eq!(body.session_id.as_deref(), Some("abc"));
        assert!(body.pdf_data.is_none());
    }
}
