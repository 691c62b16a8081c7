//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the counter.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the visitor counter.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CounterConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Which document holds the counter.
    pub counter: CounterDocumentConfig,

    /// How the counter is incremented.
    pub increment: IncrementConfig,

    /// Document store backend.
    pub store: StoreConfig,

    /// Cross-origin response headers.
    pub cors: CorsConfig,

    /// HTTP method handling.
    pub methods: MethodConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Location of the counter document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CounterDocumentConfig {
    pub collection: String,
    pub document: String,
    /// Integer field holding the count.
    pub field: String,
}

impl Default for CounterDocumentConfig {
    fn default() -> Self {
        Self {
            collection: "site_data".to_string(),
            document: "visitor_count".to_string(),
            field: "count".to_string(),
        }
    }
}

/// Increment strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncrementStrategy {
    /// Atomic increment when the store supports it, compare-and-swap otherwise.
    #[default]
    Auto,
    /// Store-side atomic increment only.
    Atomic,
    /// Revision-guarded read-modify-write with retries.
    CompareAndSwap,
}

impl IncrementStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncrementStrategy::Auto => "auto",
            IncrementStrategy::Atomic => "atomic",
            IncrementStrategy::CompareAndSwap => "compare_and_swap",
        }
    }
}

/// Increment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IncrementConfig {
    pub strategy: IncrementStrategy,

    /// Maximum compare-and-swap attempts before giving up.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for IncrementConfig {
    fn default() -> Self {
        Self {
            strategy: IncrementStrategy::Auto,
            max_attempts: 10,
            base_delay_ms: 10,
            max_delay_ms: 500,
        }
    }
}

/// Document store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process store. State is lost on restart.
    #[default]
    Memory,
    /// Google Cloud Firestore over REST.
    Firestore,
}

/// Document store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub firestore: FirestoreConfig,
}

/// Firestore REST client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FirestoreConfig {
    /// Google Cloud project ID.
    pub project_id: String,

    /// Database ID within the project.
    pub database: String,

    /// API endpoint, without the `/v1` suffix.
    pub endpoint: String,

    /// Emulator host (e.g., "localhost:8081"). Overrides `endpoint` and disables auth.
    pub emulator_host: Option<String>,

    /// Static bearer token. When unset, tokens come from the metadata server.
    pub access_token: Option<String>,

    /// Metadata server base URL used to mint access tokens.
    pub metadata_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            database: "(default)".to_string(),
            endpoint: "https://firestore.googleapis.com".to_string(),
            emulator_host: None,
            access_token: None,
            metadata_url: "http://metadata.google.internal".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// CORS header values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET".to_string(),
            allow_headers: "Content-Type".to_string(),
            max_age_secs: 3600,
        }
    }
}

/// How non-GET, non-OPTIONS methods are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MethodPolicy {
    /// Every non-OPTIONS method increments the counter.
    #[default]
    Permissive,
    /// Only GET and HEAD increment; anything else gets 405.
    Strict,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MethodConfig {
    pub policy: MethodPolicy,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Time allowed for in-flight requests to drain on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
