//! Arena Common - Shared configuration, errors, and logging for the Arena services.
//!
//! This crate provides:
//! - Configuration types and loading (file + environment)
//! - Configuration validation
//! - The unified error type with HTTP status mapping
//! - Logging setup
//! - Small string utilities

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    Config, CorsConfig, DebateConfig, LimitsConfig, LlmConfig, ObservabilityConfig,
    ReplyContext, SessionsConfig, TutorConfig,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};
