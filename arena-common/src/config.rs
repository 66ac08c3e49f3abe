//! Configuration management for Arena services.
//!
//! The server reads `~/.arena/config.json`, merged with `~/.arena/secrets.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `ARENA_CONFIG` → alternative config directory
//! - `PORT` / `ARENA_PORT` → server.port
//! - `ARENA_BIND_ADDRESS` → network.bind
//! - `OPENROUTER_API_KEY` → secrets.openrouter
//! - `FRONTEND_URL` → llm.frontend_url
//! - `ARENA_LOG_LEVEL` → observability.log_level
//! - `ARENA_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config_loader::load_modular_config;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ARENA_CONFIG") {
        return PathBuf::from(dir);
    }

    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".arena"),
        |dirs| dirs.home_dir().join(".arena"),
    )
}

// ============================================================================
// Network / Server
// ============================================================================

/// Network configuration.
///
/// Default is `127.0.0.1` (local only). Set to `0.0.0.0` to allow remote access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    3001
}

// ============================================================================
// Secrets
// ============================================================================

/// Credentials. Usually kept in `secrets.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// OpenRouter API key
    #[serde(default)]
    pub openrouter: Option<String>,
}

// ============================================================================
// LLM
// ============================================================================

/// Remote completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for debate turns
    #[serde(default = "default_debate_model")]
    pub debate_model: String,

    /// Model used for tutoring turns
    #[serde(default = "default_tutor_model")]
    pub tutor_model: String,

    /// Value sent as `X-Title`
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Fallback `HTTP-Referer` when the incoming request has none
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Overall request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            debate_model: default_debate_model(),
            tutor_model: default_tutor_model(),
            app_title: default_app_title(),
            frontend_url: default_frontend_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

fn default_debate_model() -> String {
    "google/gemini-flash-1.5-8b".into()
}

fn default_tutor_model() -> String {
    "deepseek/deepseek-chat-v3.1".into()
}

fn default_app_title() -> String {
    "AI FightArena".into()
}

fn default_frontend_url() -> String {
    "http://localhost:8000".into()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    10
}

// ============================================================================
// Debate / Tutor
// ============================================================================

/// How much of the transcript a replying persona sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplyContext {
    /// Only the opponent's most recent utterance
    #[default]
    LastUtterance,
    /// The whole transcript, labelled by speaker
    FullTranscript,
}

/// Debate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    /// Round ceiling used when the client does not send one
    #[serde(default = "default_max_rounds")]
    pub default_max_rounds: u32,

    /// Token budget per debate turn
    #[serde(default = "default_debate_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub reply_context: ReplyContext,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            default_max_rounds: default_max_rounds(),
            max_tokens: default_debate_max_tokens(),
            reply_context: ReplyContext::default(),
        }
    }
}

fn default_max_rounds() -> u32 {
    10
}

fn default_debate_max_tokens() -> u32 {
    1000
}

/// Tutoring chat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorConfig {
    /// Token budget per tutoring turn
    #[serde(default = "default_tutor_max_tokens")]
    pub max_tokens: u32,

    /// Stored history entries per session (10 exchanges)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// History entries replayed into each request
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Engine name for the file-parser plugin
    #[serde(default = "default_pdf_engine")]
    pub pdf_engine: String,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_tutor_max_tokens(),
            history_limit: default_history_limit(),
            context_window: default_context_window(),
            pdf_engine: default_pdf_engine(),
        }
    }
}

fn default_tutor_max_tokens() -> u32 {
    2000
}

fn default_history_limit() -> usize {
    20
}

fn default_context_window() -> usize {
    30
}

fn default_pdf_engine() -> String {
    "pdf-text".into()
}

// ============================================================================
// Sessions / CORS / Limits / Observability
// ============================================================================

/// Session eviction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Maximum sessions kept per store; least recently used is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle time after which a session is dropped
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,

    /// Interval of the background expiry sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_ttl_secs: default_idle_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_max_sessions() -> usize {
    1000
}

fn default_idle_ttl() -> u64 {
    2 * 60 * 60
}

fn default_sweep_interval() -> u64 {
    60
}

/// CORS configuration. An empty origin list allows any origin.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum JSON body size in megabytes (PDF uploads are inlined)
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

fn default_body_limit_mb() -> usize {
    50
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets forced to `warn`
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub debate: DebateConfig,

    #[serde(default)]
    pub tutor: TutorConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default directory.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&config_dir())
    }

    /// Load configuration from `config.json` + `secrets.json` in `dir`.
    ///
    /// Missing files yield defaults.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let value = load_modular_config(dir)?;
        serde_json::from_value(value)
            .with_context(|| format!("Failed to parse config from {}", dir.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        for var in ["PORT", "ARENA_PORT"] {
            if let Ok(port) = std::env::var(var) {
                if let Ok(p) = port.parse() {
                    self.server.port = p;
                }
            }
        }

        if let Ok(bind) = std::env::var("ARENA_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.is_empty() {
                self.secrets.openrouter = Some(key);
            }
        }

        if let Ok(url) = std::env::var("FRONTEND_URL") {
            self.llm.frontend_url = url;
        }

        if let Ok(level) = std::env::var("ARENA_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Ok(format) = std::env::var("ARENA_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Effective bind address.
    pub fn bind_address(&self) -> &str {
        &self.network.bind
    }

    /// Whether an OpenRouter key is configured.
    pub fn has_api_key(&self) -> bool {
        self.secrets
            .openrouter
            .as_deref()
            .is_some_and(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.bind_address(), "127.0.0.1");
        assert_eq!(config.debate.default_max_rounds, 10);
        assert_eq!(config.debate.max_tokens, 1000);
        assert_eq!(config.tutor.max_tokens, 2000);
        assert_eq!(config.tutor.history_limit, 20);
        assert_eq!(config.tutor.context_window, 30);
        assert_eq!(config.limits.body_limit_mb, 50);
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "server": { "port": 9000 }, "debate": { "reply_context": "full_transcript" } }"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.debate.reply_context, ReplyContext::FullTranscript);
        assert_eq!(config.debate.default_max_rounds, 10);
        assert_eq!(config.llm.debate_model, "google/gemini-flash-1.5-8b");
    }

    #[test]
    fn test_observability_aliases() {
        let config: Config =
            serde_json::from_str(r#"{ "observability": { "level": "debug", "format": "json" } }"#)
                .unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_load_from_empty_dir_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn test_load_merges_secrets() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{ "server": { "port": 4000 } }"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("secrets.json"),
            r#"{ "openrouter": "sk-or-test" }"#,
        )
        .unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.secrets.openrouter.as_deref(), Some("sk-or-test"));
        assert!(config.has_api_key());
    }
}
