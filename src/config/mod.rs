//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply env overrides)
//!     → validation.rs (semantic checks)
//!     → CounterConfig (validated, immutable)
//!     → handed to the store, counter and HTTP server at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_config, ConfigError};
pub use schema::{
    CorsConfig, CounterConfig, CounterDocumentConfig, FirestoreConfig, IncrementConfig,
    IncrementStrategy, ListenerConfig, LogFormat, MethodConfig, MethodPolicy, ObservabilityConfig, StoreBackend,
    StoreConfig, TimeoutConfig,
};
