//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts > 0, timeouts > 0)
//! - Check that addresses parse and the store backend is fully configured
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CounterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderValue;

use crate::config::schema::{CounterConfig, StoreBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g., "increment.max_attempts").
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &CounterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    for (field, value) in [
        ("counter.collection", &config.counter.collection),
        ("counter.document", &config.counter.document),
        ("counter.field", &config.counter.field),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        } else if value.contains('/') {
            errors.push(ValidationError::new(field, "must not contain '/'"));
        }
    }

    if config.increment.max_attempts == 0 {
        errors.push(ValidationError::new("increment.max_attempts", "must be at least 1"));
    }
    if config.increment.base_delay_ms > config.increment.max_delay_ms {
        errors.push(ValidationError::new(
            "increment.base_delay_ms",
            "must not exceed increment.max_delay_ms",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    for (field, value) in [
        ("cors.allow_origin", &config.cors.allow_origin),
        ("cors.allow_methods", &config.cors.allow_methods),
        ("cors.allow_headers", &config.cors.allow_headers),
    ] {
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(field, "is not a valid header value"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.store.backend == StoreBackend::Firestore {
        let firestore = &config.store.firestore;
        if firestore.project_id.is_empty() {
            errors.push(ValidationError::new(
                "store.firestore.project_id",
                "is required for the firestore backend",
            ));
        }
        if firestore.database.is_empty() {
            errors.push(ValidationError::new("store.firestore.database", "must not be empty"));
        }
        if firestore.emulator_host.is_none() && url::Url::parse(&firestore.endpoint).is_err() {
            errors.push(ValidationError::new("store.firestore.endpoint", "is not a valid URL"));
        }
        if firestore.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "store.firestore.request_timeout_secs",
                "must be greater than 0",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CounterConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = CounterConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.counter.collection = String::new();
        config.increment.max_attempts = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "counter.collection", "increment.max_attempts"]
        );
    }

    #[test]
    fn test_firestore_requires_project() {
        let mut config = CounterConfig::default();
        config.store.backend = StoreBackend::Firestore;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "store.firestore.project_id");

        config.store.firestore.project_id = "demo".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_path_separators() {
        let mut config = CounterConfig::default();
        config.counter.document = "a/b".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "counter.document: must not contain '/'");
    }
}
