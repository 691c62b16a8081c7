//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Build the single store client shared by every request
//! - Bind the listener and serve until a termination signal

use axum::http::header::InvalidHeaderValue;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::CounterConfig;
use crate::counter::CounterError;
use crate::http::CounterServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::store::{build_store, StoreError};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to initialize store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to initialize counter: {0}")]
    Counter(#[from] CounterError),

    #[error("Invalid CORS header value: {0}")]
    Cors(#[from] InvalidHeaderValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the service with a validated configuration until shutdown.
pub async fn run(config: CounterConfig) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = ?config.store.backend,
        strategy = config.increment.strategy.as_str(),
        method_policy = ?config.methods.policy,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = build_store(&config.store)?;
    let server = CounterServer::new(config, store)?;

    let listener = TcpListener::bind(&server.config().listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(signals::shutdown_on_signal(shutdown));

    server.run(listener, server_shutdown).await?;
    Ok(())
}
