//! Counter endpoint.

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};

use crate::config::MethodPolicy;
use crate::counter::{CounterError, VisitCounter};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub counter: VisitCounter,
    pub method_policy: MethodPolicy,
}

/// Record a visit and answer with the new count as plain text.
pub async fn count_visit(
    State(state): State<AppState>,
    method: Method,
) -> Result<Response, CounterError> {
    if state.method_policy == MethodPolicy::Strict && method != Method::GET && method != Method::HEAD {
        tracing::debug!(method = %method, "Rejecting method");
        return Ok((
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD, OPTIONS")],
        )
            .into_response());
    }

    let count = state.counter.increment().await?;
    tracing::debug!(count, "Visit recorded");
    Ok((StatusCode::OK, count.to_string()).into_response())
}

/// Failures become a bare 500; details stay in the logs.
impl IntoResponse for CounterError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Counter increment failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
