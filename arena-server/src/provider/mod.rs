//! Remote completion service abstraction.
//!
//! The debate and tutor flows only depend on the [`Provider`] trait, so the
//! OpenRouter client can be swapped for a scripted stub in tests.

mod openrouter;

pub use openrouter::OpenRouterProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Provider Trait
// ============================================================================

/// Unified interface for LLM completion providers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Send a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Error from a provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{provider}:{model}] {message}")]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub message: String,
    pub status_code: Option<u16>,
}

impl From<ProviderError> for arena_common::Error {
    fn from(err: ProviderError) -> Self {
        arena_common::Error::Upstream(err.message)
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message body: plain text or a list of typed parts (text + attached file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of the message, ignoring attachments.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::File { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Whether a file part is attached.
    pub fn has_file(&self) -> bool {
        matches!(self, Self::Parts(parts) if parts.iter().any(|p| matches!(p, ContentPart::File { .. })))
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A typed content part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    File { file: FileAttachment },
}

/// An inline file, usually a base64 PDF data URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub filename: String,
    pub file_data: String,
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    /// Parsed-file annotations returned earlier by the provider; replaying
    /// them lets the provider skip re-parsing the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
}

impl Message {
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            annotations: None,
        }
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            annotations: None,
        }
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            annotations: None,
        }
    }
}

/// Provider plugin directive (OpenRouter `plugins` array entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<PdfPluginOptions>,
}

impl Plugin {
    /// The `file-parser` plugin with the given PDF engine.
    pub fn file_parser(engine: impl Into<String>) -> Self {
        Self {
            id: "file-parser".into(),
            pdf: Some(PdfPluginOptions {
                engine: engine.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfPluginOptions {
    pub engine: String,
}

/// Unified chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Provider plugins (file parsing)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<Plugin>,
    /// Referer to forward; not part of the payload
    #[serde(skip)]
    pub referer: Option<String>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: Some(max_tokens),
            plugins: Vec::new(),
            referer: None,
        }
    }
}

/// Unified chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Provider name
    pub provider: String,
    /// Model used
    pub model: String,
    /// Response content
    pub content: String,
    /// Parsed-file annotations, when a file was processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
    /// Token usage
    pub usage: TokenUsage,
    /// Finish reason
    pub finish_reason: Option<String>,
    /// Response latency in milliseconds
    pub latency_ms: u64,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_message_serializes_as_string() {
        let value = serde_json::to_value(Message::user("Hola")).unwrap();
        assert_eq!(value, json!({ "role": "user", "content": "Hola" }));
    }

    #[test]
    fn test_file_message_serializes_as_parts() {
        let message = Message::user(MessageContent::Parts(vec![
            ContentPart::Text {
                text: "summarise".into(),
            },
            ContentPart::File {
                file: FileAttachment {
                    filename: "notes.pdf".into(),
                    file_data: "data:application/pdf;base64,AAAA".into(),
                },
            },
        ]));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["content"][0], json!({ "type": "text", "text": "summarise" }));
        assert_eq!(value["content"][1]["type"], "file");
        assert_eq!(value["content"][1]["file"]["filename"], "notes.pdf");
        assert!(message.content.has_file());
        assert_eq!(message.content.text(), "summarise");
    }

    #[test]
    fn test_request_omits_empty_plugins_and_referer() {
        let mut request = ChatRequest::new("m/x", vec![Message::user("hi")], 1000);
        request.referer = Some("http://localhost:8000".into());
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("plugins").is_none());
        assert!(value.get("referer").is_none());
        assert_eq!(value["max_tokens"], 1000);
    }

    #[test]
    fn test_file_parser_plugin_shape() {
        let value = serde_json::to_value(Plugin::file_parser("pdf-text")).unwrap();
        assert_eq!(value, json!({ "id": "file-parser", "pdf": { "engine": "pdf-text" } }));
    }

    #[test]
    fn test_provider_error_maps_to_upstream() {
        let err = ProviderError {
            provider: "openrouter".into(),
            model: "m/x".into(),
            message: "API error (502): bad gateway".into(),
            status_code: Some(502),
        };
        assert_eq!(err.to_string(), "[openrouter:m/x] API error (502): bad gateway");
        let common: arena_common::Error = err.into();
        assert_eq!(common.status_code(), 500);
        assert!(common.to_string().contains("502"));
    }
}
