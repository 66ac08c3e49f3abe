//! Modular configuration loader.
//!
//! Configuration is split across two files in the config directory:
//! - `config.json` - Core configuration
//! - `secrets.json` - Credentials, merged under the `secrets` key
//!
//! Environment overrides are applied separately by `Config::apply_env_overrides`.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Configuration file names
pub const CONFIG_FILES: &[&str] = &["config.json", "secrets.json"];

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => merge_json(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Load `config.json` and merge `secrets.json` into its `secrets` section.
pub fn load_modular_config(dir: &Path) -> Result<Value> {
    let mut config =
        load_json_file(&dir.join("config.json"))?.unwrap_or(Value::Object(Default::default()));

    tracing::debug!("Loading config from {}", dir.display());

    if let Some(secrets) = load_json_file(&dir.join("secrets.json"))? {
        if let Some(config_obj) = config.as_object_mut() {
            match config_obj.get_mut("secrets") {
                Some(existing) => merge_json(existing, secrets),
                None => {
                    config_obj.insert("secrets".to_string(), secrets);
                }
            }
        }
        tracing::debug!("Loaded secrets.json");
    }

    Ok(config)
}

/// Check which config files exist.
pub fn check_config_files(dir: &Path) -> Vec<(String, bool)> {
    CONFIG_FILES
        .iter()
        .map(|file| (file.to_string(), dir.join(file).exists()))
        .collect()
}
