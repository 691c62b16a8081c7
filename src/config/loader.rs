//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::CounterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CounterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: CounterConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load configuration from `path` if given, otherwise start from defaults.
/// Environment overrides and validation apply either way.
pub fn load(path: Option<&Path>) -> Result<CounterConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = CounterConfig::default();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Apply environment overrides on top of file values.
///
/// `PORT` replaces the port of the bind address, which is how serverless
/// platforms tell the process where to listen.
pub fn apply_env_overrides<F>(config: &mut CounterConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if let Some(level) = lookup("COUNTER_LOG_LEVEL") {
        config.observability.log_level = level;
    }

    let firestore = &mut config.store.firestore;
    if firestore.project_id.is_empty() {
        if let Some(project) = lookup("FIRESTORE_PROJECT_ID").or_else(|| lookup("GOOGLE_CLOUD_PROJECT")) {
            firestore.project_id = project;
        }
    }
    if let Some(host) = lookup("FIRESTORE_EMULATOR_HOST").filter(|h| !h.is_empty()) {
        firestore.emulator_host = Some(host);
    }
    if let Some(token) = lookup("FIRESTORE_ACCESS_TOKEN").filter(|t| !t.is_empty()) {
        firestore.access_token = Some(token);
    }
}
