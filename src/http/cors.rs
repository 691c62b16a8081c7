//! Cross-origin headers.
//!
//! # Responsibilities
//! - Answer `OPTIONS` preflights directly with 204 and the allow-list headers
//! - Attach `Access-Control-Allow-Origin` to every other response, errors included
//!
//! Preflights never reach the counter, so they cannot touch the store.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum::http::header::InvalidHeaderValue;

use crate::config::CorsConfig;

/// Pre-built CORS header values.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    max_age: HeaderValue,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            allow_origin: HeaderValue::from_str(&config.allow_origin)?,
            allow_methods: HeaderValue::from_str(&config.allow_methods)?,
            allow_headers: HeaderValue::from_str(&config.allow_headers)?,
            max_age: HeaderValue::from(config.max_age_secs),
        })
    }

    /// Empty 204 advertising what cross-origin callers may do.
    pub fn preflight(&self) -> Response {
        (
            StatusCode::NO_CONTENT,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone()),
                (header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone()),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone()),
                (header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone()),
            ],
        )
            .into_response()
    }

    pub fn apply(&self, response: &mut Response) {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allow_origin: HeaderValue::from_static("*"),
            allow_methods: HeaderValue::from_static("GET"),
            allow_headers: HeaderValue::from_static("Content-Type"),
            max_age: HeaderValue::from_static("3600"),
        }
    }
}

pub async fn cors_middleware(
    State(policy): State<CorsPolicy>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        tracing::debug!(uri = %request.uri(), "Answering CORS preflight");
        return policy.preflight();
    }

    let mut response = next.run(request).await;
    policy.apply(&mut response);
    response
}
