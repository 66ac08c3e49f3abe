//! OpenRouter provider.
//!
//! OpenRouter exposes an OpenAI-compatible `chat/completions` endpoint and
//! understands the `file-parser` plugin used for PDF uploads.

use super::{ChatRequest, ChatResponse, Message, Plugin, Provider, ProviderError, TokenUsage};
use arena_common::config::LlmConfig;
use arena_common::util::sanitize_for_log;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// OpenRouter completion client.
pub struct OpenRouterProvider {
    api_key: Option<String>,
    base_url: String,
    app_title: String,
    default_referer: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "no_plugins")]
    plugins: &'a [Plugin],
}

fn no_plugins(plugins: &&[Plugin]) -> bool {
    plugins.is_empty()
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    #[serde(default)]
    choices: Vec<OpenRouterChoice>,
    #[serde(default)]
    usage: Option<OpenRouterUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    annotations: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterUsage {
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    total_tokens: Option<i64>,
}

impl OpenRouterProvider {
    /// Create a provider from the LLM settings.
    ///
    /// Falls back to `OPENROUTER_API_KEY` when no key is given.
    pub fn new(api_key: Option<&str>, settings: &LlmConfig) -> Self {
        let resolved_key = api_key
            .filter(|k| !k.is_empty())
            .map(String::from)
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .filter(|k| !k.is_empty());

        Self {
            api_key: resolved_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            app_title: settings.app_title.clone(),
            default_referer: settings.frontend_url.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(settings.request_timeout_secs))
                .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn error(&self, model: &str, message: impl Into<String>, status_code: Option<u16>) -> ProviderError {
        ProviderError {
            provider: "openrouter".into(),
            model: model.to_string(),
            message: message.into(),
            status_code,
        }
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| self.error(&request.model, "OpenRouter API key not configured", None))?;

        let body = OpenRouterRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            plugins: &request.plugins,
        };

        let referer = request
            .referer
            .as_deref()
            .unwrap_or(&self.default_referer);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("HTTP-Referer", referer)
            .header("X-Title", &self.app_title)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.error(&request.model, format!("Request failed: {e}"), None))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %sanitize_for_log(&error_text),
                "OpenRouter API error"
            );
            return Err(self.error(
                &request.model,
                format!("OpenRouter API error: {}. {}", status.as_u16(), error_text),
                Some(status.as_u16()),
            ));
        }

        let result: OpenRouterResponse = response.json().await.map_err(|e| {
            self.error(&request.model, format!("Failed to parse response: {e}"), None)
        })?;

        let unexpected =
            || self.error(&request.model, "Unexpected response format from OpenRouter API", None);

        let choice = result.choices.into_iter().next().ok_or_else(unexpected)?;
        let content = choice.message.content.ok_or_else(unexpected)?;

        let usage = result.usage.map_or(TokenUsage::default(), |u| TokenUsage {
            input_tokens: u.prompt_tokens.unwrap_or(0),
            output_tokens: u.completion_tokens.unwrap_or(0),
            total_tokens: u.total_tokens.unwrap_or(0),
        });

        Ok(ChatResponse {
            provider: "openrouter".into(),
            model: request.model,
            content,
            annotations: choice.message.annotations,
            usage,
            finish_reason: choice.finish_reason,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
