//! Configuration validation.
//!
//! Checks ranges and enumerated values before the server starts.

use thiserror::Error;

use crate::config::{
    Config, DebateConfig, LimitsConfig, LlmConfig, ObservabilityConfig, ServerConfig,
    SessionsConfig, TutorConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

fn positive(field: &str, value: u64) -> ValidationResult<()> {
    if value == 0 {
        return Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: "must be greater than 0".into(),
        });
    }
    Ok(())
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 7] = [
            &self.server,
            &self.llm,
            &self.debate,
            &self.tutor,
            &self.sessions,
            &self.limits,
            &self.observability,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        if self.network.bind.parse::<std::net::IpAddr>().is_err() {
            errors.push(ValidationError::InvalidValue {
                field: "network.bind".into(),
                reason: format!("not an IP address: {}", self.network.bind),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load, apply environment overrides, and validate.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }
        Ok(())
    }
}

impl Validate for LlmConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.base_url".into(),
            });
        }
        if self.debate_model.is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.debate_model".into(),
            });
        }
        if self.tutor_model.is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.tutor_model".into(),
            });
        }
        positive("llm.request_timeout_secs", self.request_timeout_secs)
    }
}

impl Validate for DebateConfig {
    fn validate(&self) -> ValidationResult<()> {
        positive("debate.default_max_rounds", u64::from(self.default_max_rounds))?;
        positive("debate.max_tokens", u64::from(self.max_tokens))
    }
}

impl Validate for TutorConfig {
    fn validate(&self) -> ValidationResult<()> {
        positive("tutor.max_tokens", u64::from(self.max_tokens))?;
        positive("tutor.history_limit", self.history_limit as u64)?;
        if self.pdf_engine.is_empty() {
            return Err(ValidationError::MissingField {
                field: "tutor.pdf_engine".into(),
            });
        }
        Ok(())
    }
}

impl Validate for SessionsConfig {
    fn validate(&self) -> ValidationResult<()> {
        positive("sessions.max_sessions", self.max_sessions as u64)?;
        positive("sessions.idle_ttl_secs", self.idle_ttl_secs)?;
        positive("sessions.sweep_interval_secs", self.sweep_interval_secs)
    }
}

impl Validate for LimitsConfig {
    fn validate(&self) -> ValidationResult<()> {
        positive("limits.body_limit_mb", self.body_limit_mb as u64)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.observability.log_level = "loud".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "observability.log_level"
        ));
    }

    #[test]
    fn test_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidPort { port: 0, .. })
        ));
    }

    #[test]
    fn test_zero_max_rounds() {
        let mut config = Config::default();
        config.debate.default_max_rounds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_bind_address() {
        let mut config = Config::default();
        config.network.bind = "localhost:3000".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multiple_errors_are_collected() {
        let mut config = Config::default();
        config.sessions.max_sessions = 0;
        config.limits.body_limit_mb = 0;
        match config.validate() {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }
}
