//! Shared utilities for integration testing.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use visitor_counter::config::CounterConfig;
use visitor_counter::lifecycle::Shutdown;
use visitor_counter::store::{
    Document, DocumentKey, DocumentStore, Fields, MemoryStore, Precondition, Revision, StoreError,
    StoreResult,
};
use visitor_counter::CounterServer;

/// Memory-backed store without atomic increments that counts every call.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub gets: AtomicU32,
    pub updates: AtomicU32,
    pub sets: AtomicU32,
    pub failing: bool,
}

impl CountingStore {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.gets.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
            + self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn get(&self, key: &DocumentKey) -> StoreResult<Option<Document>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(StoreError::Transport("connection refused".into()));
        }
        self.inner.get(key).await
    }

    async fn update(&self, key: &DocumentKey, fields: Fields, pre: Precondition) -> StoreResult<Revision> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(key, fields, pre).await
    }

    async fn set(&self, key: &DocumentKey, fields: Fields, pre: Precondition) -> StoreResult<Revision> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, fields, pre).await
    }
}

/// Start the counter on an ephemeral port.
pub async fn start_server(config: CounterConfig, store: Arc<dyn DocumentStore>) -> (SocketAddr, Shutdown) {
    let server = CounterServer::new(config, store).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}

/// State of the fake Firestore: one document with a `count` that is an
/// integer, or a double when `double` is set.
#[derive(Default)]
pub struct MockFirestoreState {
    pub count: Option<i64>,
    pub double: Option<f64>,
    pub version: u64,
    pub stale_updates: u32,
    pub requests: Vec<String>,
    /// Bearer tokens seen, in request order.
    pub tokens: Vec<String>,
}

impl MockFirestoreState {
    fn update_time(&self) -> String {
        format!("2024-01-01T00:00:00.{:06}Z", self.version)
    }

    fn exists(&self) -> bool {
        self.count.is_some() || self.double.is_some()
    }

    fn count_value(&self) -> Value {
        match self.double {
            Some(d) => json!({ "doubleValue": d }),
            None => json!({ "integerValue": self.count.unwrap_or(0).to_string() }),
        }
    }

    fn document(&self, name: &str) -> Value {
        json!({
            "name": name,
            "fields": { "count": self.count_value() },
            "createTime": "2024-01-01T00:00:00.000000Z",
            "updateTime": self.update_time(),
        })
    }
}

pub type MockFirestore = Arc<Mutex<MockFirestoreState>>;

fn error(status: StatusCode, code: &str) -> Response {
    let body = json!({ "error": { "code": status.as_u16(), "message": code, "status": code } });
    (status, Json(body)).into_response()
}

async fn mock_handler(
    State(state): State<MockFirestore>,
    method: Method,
    Path(rest): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(format!("{} {}", method, rest));
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        state.tokens.push(token.to_string());
    }

    if method == Method::POST && rest.ends_with("documents:commit") {
        let body: Value = serde_json::from_slice(&body).unwrap();
        let delta: i64 = body["writes"][0]["updateTransforms"][0]["increment"]["integerValue"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        match state.double {
            Some(d) => state.double = Some(d + delta as f64),
            None => state.count = Some(state.count.unwrap_or(0) + delta),
        }
        state.version += 1;
        let update_time = state.update_time();
        return Json(json!({
            "writeResults": [{
                "updateTime": update_time,
                "transformResults": [state.count_value()],
            }],
            "commitTime": update_time,
        }))
        .into_response();
    }

    match method {
        Method::GET if state.exists() => Json(state.document(&rest)).into_response(),
        Method::GET => error(StatusCode::NOT_FOUND, "NOT_FOUND"),
        Method::PATCH => {
            let params: Vec<(String, String)> = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
                .into_owned()
                .collect();
            for (name, value) in &params {
                match (name.as_str(), value.as_str()) {
                    ("currentDocument.exists", "true") if !state.exists() => {
                        return error(StatusCode::NOT_FOUND, "NOT_FOUND")
                    }
                    ("currentDocument.exists", "false") if state.exists() => {
                        return error(StatusCode::CONFLICT, "ALREADY_EXISTS")
                    }
                    ("currentDocument.updateTime", t) => {
                        if state.stale_updates > 0 {
                            state.stale_updates -= 1;
                            return error(StatusCode::BAD_REQUEST, "FAILED_PRECONDITION");
                        }
                        if !state.exists() || t != state.update_time() {
                            return error(StatusCode::BAD_REQUEST, "FAILED_PRECONDITION");
                        }
                    }
                    _ => {}
                }
            }

            let body: Value = serde_json::from_slice(&body).unwrap();
            let count: i64 = body["fields"]["count"]["integerValue"]
                .as_str()
                .unwrap()
                .parse()
                .unwrap();
            state.count = Some(count);
            state.double = None;
            state.version += 1;
            Json(state.document(&rest)).into_response()
        }
        _ => error(StatusCode::METHOD_NOT_ALLOWED, "UNIMPLEMENTED"),
    }
}

/// Start a fake Firestore REST endpoint on an ephemeral port.
pub async fn start_mock_firestore() -> (SocketAddr, MockFirestore) {
    let state: MockFirestore = Arc::new(Mutex::new(MockFirestoreState::default()));
    let app = Router::new()
        .route("/v1/{*rest}", any(mock_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, state)
}

/// State of the fake metadata server.
#[derive(Default)]
pub struct MockMetadataState {
    /// Lifetime handed out with each token, in seconds.
    pub expires_in: u64,
    pub failing: bool,
    pub fetches: u32,
    /// Whether every fetch carried `Metadata-Flavor: Google`.
    pub flavored: bool,
}

pub type MockMetadata = Arc<Mutex<MockMetadataState>>;

async fn metadata_handler(State(state): State<MockMetadata>, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap();
    let flavored = headers.get("metadata-flavor").is_some_and(|v| v == "Google");
    state.flavored = (state.fetches == 0 || state.flavored) && flavored;
    state.fetches += 1;

    if state.failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "metadata unavailable").into_response();
    }
    Json(json!({
        "access_token": format!("token-{}", state.fetches),
        "expires_in": state.expires_in,
        "token_type": "Bearer",
    }))
    .into_response()
}

/// Start a fake GCE metadata server handing out tokens valid for `expires_in` seconds.
pub async fn start_mock_metadata(expires_in: u64) -> (SocketAddr, MockMetadata) {
    let state: MockMetadata = Arc::new(Mutex::new(MockMetadataState {
        expires_in,
        ..MockMetadataState::default()
    }));
    let app = Router::new()
        .route(
            "/computeMetadata/v1/instance/service-accounts/default/token",
            any(metadata_handler),
        )
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, state)
}
