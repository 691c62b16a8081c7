//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the counter handler on every path
//! - Wire up middleware (request ID, tracing, timeout, CORS, metrics)
//! - Bind server to listener
//! - Drain in-flight requests on shutdown, with a deadline

use axum::{
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::any,
    Router,
};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::CounterConfig;
use crate::counter::VisitCounter;
use crate::http::cors::{cors_middleware, CorsPolicy};
use crate::http::handler::{count_visit, AppState};
use crate::lifecycle::shutdown;
use crate::lifecycle::StartupError;
use crate::observability::metrics;
use crate::store::DocumentStore;

/// HTTP server for the visitor counter.
pub struct CounterServer {
    router: Router,
    config: CounterConfig,
}

impl CounterServer {
    /// Create a new HTTP server over an already constructed store.
    pub fn new(config: CounterConfig, store: Arc<dyn DocumentStore>) -> Result<Self, StartupError> {
        let counter = VisitCounter::new(store, &config.counter, &config.increment)?;
        let cors = CorsPolicy::from_config(&config.cors)?;

        let state = AppState {
            counter,
            method_policy: config.methods.policy,
        };

        let router = Self::build_router(&config, state, cors);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &CounterConfig, state: AppState, cors: CorsPolicy) -> Router {
        Router::new()
            .route("/", any(count_visit))
            .route("/{*path}", any(count_visit))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(cors, cors_middleware))
            .layer(middleware::from_fn(track_metrics))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    /// Run the server until a shutdown signal arrives, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let deadline_rx = shutdown_rx.resubscribe();

        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .into_future();

        tokio::select! {
            result = serve => result?,
            _ = shutdown::deadline(deadline_rx, grace) => {
                tracing::warn!(grace_secs = grace.as_secs(), "Drain deadline passed, dropping connections");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
