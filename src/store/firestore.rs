//! Firestore REST client.
//!
//! # Responsibilities
//! - Fetch, patch and replace documents through the v1 REST API
//! - Atomic increments through `documents:commit` field transforms
//! - Map write preconditions to `currentDocument.*` parameters
//! - Obtain access tokens (static, emulator, or metadata server)
//!
//! Revisions are the document `updateTime`, which Firestore changes on every
//! write and accepts back as a precondition.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::FirestoreConfig;
use crate::store::document::{
    Document, DocumentKey, DocumentStore, FieldValue, Fields, Precondition, Revision, StoreError,
    StoreResult,
};

/// Refresh metadata tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Wire representation of a Firestore value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum WireValue {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String),
    DoubleValue(f64),
    StringValue(String),
}

impl WireValue {
    fn into_field(self) -> Option<FieldValue> {
        match self {
            WireValue::NullValue(()) => Some(FieldValue::Null),
            WireValue::BooleanValue(b) => Some(FieldValue::Boolean(b)),
            WireValue::IntegerValue(s) => s.parse().ok().map(FieldValue::Integer),
            WireValue::DoubleValue(d) => Some(FieldValue::Double(d)),
            WireValue::StringValue(s) => Some(FieldValue::String(s)),
        }
    }
}

impl From<&FieldValue> for WireValue {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Null => WireValue::NullValue(()),
            FieldValue::Boolean(b) => WireValue::BooleanValue(*b),
            FieldValue::Integer(i) => WireValue::IntegerValue(i.to_string()),
            FieldValue::Double(d) => WireValue::DoubleValue(*d),
            FieldValue::String(s) => WireValue::StringValue(s.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDocument {
    #[serde(default)]
    fields: BTreeMap<String, serde_json::Value>,
    update_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    #[serde(default)]
    write_results: Vec<WriteResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteResult {
    #[serde(default)]
    transform_results: Vec<WireValue>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

enum TokenSource {
    Static(String),
    Metadata {
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

/// Document store backed by Cloud Firestore.
pub struct FirestoreStore {
    http: reqwest::Client,
    /// API root including the version, e.g. `https://firestore.googleapis.com/v1`.
    api_root: String,
    /// `projects/{project}/databases/{database}`
    database_path: String,
    auth: TokenSource,
}

impl FirestoreStore {
    /// Build a client from configuration. No network traffic happens here.
    pub fn new(config: &FirestoreConfig) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let (api_root, auth) = match &config.emulator_host {
            // The emulator treats the "owner" token as an admin credential.
            Some(host) => (format!("http://{}/v1", host), TokenSource::Static("owner".to_string())),
            None => {
                let auth = match &config.access_token {
                    Some(token) => TokenSource::Static(token.clone()),
                    None => TokenSource::Metadata {
                        url: format!(
                            "{}/computeMetadata/v1/instance/service-accounts/default/token",
                            config.metadata_url.trim_end_matches('/')
                        ),
                        cached: Mutex::new(None),
                    },
                };
                (format!("{}/v1", config.endpoint.trim_end_matches('/')), auth)
            }
        };

        tracing::info!(
            api_root = %api_root,
            project_id = %config.project_id,
            database = %config.database,
            "Firestore store initialized"
        );

        Ok(Self {
            http,
            api_root,
            database_path: format!("projects/{}/databases/{}", config.project_id, config.database),
            auth,
        })
    }

    fn document_name(&self, key: &DocumentKey) -> String {
        format!("{}/documents/{}", self.database_path, key.path())
    }

    fn document_url(&self, key: &DocumentKey) -> String {
        format!("{}/{}", self.api_root, self.document_name(key))
    }

    async fn token(&self) -> StoreResult<String> {
        match &self.auth {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Metadata { url, cached } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                        return Ok(token.token.clone());
                    }
                }

                let response = self
                    .http
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| StoreError::Unauthorized(format!("metadata server: {}", e)))?;
                if !response.status().is_success() {
                    return Err(StoreError::Unauthorized(format!(
                        "metadata server returned {}",
                        response.status()
                    )));
                }
                let minted: MetadataToken = response
                    .json()
                    .await
                    .map_err(|e| StoreError::Decode(e.to_string()))?;

                tracing::debug!(expires_in = minted.expires_in, "Fetched access token");
                let token = minted.access_token.clone();
                *cached = Some(CachedToken {
                    token: minted.access_token,
                    expires_at: Instant::now() + Duration::from_secs(minted.expires_in),
                });
                Ok(token)
            }
        }
    }

    async fn request(&self, method: Method, url: &str) -> StoreResult<RequestBuilder> {
        let token = self.token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<(StatusCode, String)> {
        let response = request.send().await.map_err(map_transport)?;
        let status = response.status();
        let body = response.text().await.map_err(map_transport)?;
        Ok((status, body))
    }

    async fn patch(
        &self,
        key: &DocumentKey,
        fields: &Fields,
        mask: bool,
        precondition: &Precondition,
    ) -> StoreResult<Revision> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if mask {
            query.extend(fields.keys().map(|f| ("updateMask.fieldPaths", f.clone())));
        }
        query.extend(precondition_params(precondition, mask));

        let request = self
            .request(Method::PATCH, &self.document_url(key))
            .await?
            .query(&query)
            .json(&json!({ "fields": encode_fields(fields) }));

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(error_from_response(status, &body, key));
        }
        let doc = decode_document(&body)?;
        Ok(doc.revision)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn name(&self) -> &'static str {
        "firestore"
    }

    async fn get(&self, key: &DocumentKey) -> StoreResult<Option<Document>> {
        let request = self.request(Method::GET, &self.document_url(key)).await?;
        let (status, body) = self.send(request).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(error_from_response(status, &body, key));
        }
        decode_document(&body).map(Some)
    }

    async fn update(
        &self,
        key: &DocumentKey,
        fields: Fields,
        precondition: Precondition,
    ) -> StoreResult<Revision> {
        self.patch(key, &fields, true, &precondition).await
    }

    async fn set(
        &self,
        key: &DocumentKey,
        fields: Fields,
        precondition: Precondition,
    ) -> StoreResult<Revision> {
        self.patch(key, &fields, false, &precondition).await
    }

    fn supports_atomic_increment(&self) -> bool {
        true
    }

    async fn increment(&self, key: &DocumentKey, field: &str, delta: i64) -> StoreResult<i64> {
        let url = format!("{}/{}/documents:commit", self.api_root, self.database_path);
        let request = self
            .request(Method::POST, &url)
            .await?
            .json(&increment_write(&self.document_name(key), field, delta));

        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(error_from_response(status, &body, key));
        }
        parse_increment_result(&body)
    }
}

fn map_transport(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Transport(err.to_string())
    }
}

fn encode_fields(fields: &Fields) -> BTreeMap<&str, WireValue> {
    fields
        .iter()
        .map(|(name, value)| (name.as_str(), WireValue::from(value)))
        .collect()
}

/// Decode a document body. Field kinds the counter has no use for
/// (maps, arrays, timestamps, ...) are skipped.
fn decode_document(body: &str) -> StoreResult<Document> {
    let wire: WireDocument =
        serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    let revision = wire
        .update_time
        .ok_or_else(|| StoreError::Decode("document without updateTime".to_string()))?;

    let mut fields = Fields::new();
    for (name, raw) in wire.fields {
        match serde_json::from_value::<WireValue>(raw).ok().and_then(WireValue::into_field) {
            Some(value) => {
                fields.insert(name, value);
            }
            None => tracing::debug!(field = %name, "Skipping unsupported field value"),
        }
    }

    Ok(Document {
        fields,
        revision: Revision(revision),
    })
}

/// `currentDocument` parameters for a precondition. Masked updates require
/// the document to exist, matching the semantics of a partial update.
fn precondition_params(precondition: &Precondition, masked: bool) -> Vec<(&'static str, String)> {
    match precondition {
        Precondition::None if masked => vec![("currentDocument.exists", "true".to_string())],
        Precondition::None => Vec::new(),
        Precondition::MustNotExist => vec![("currentDocument.exists", "false".to_string())],
        Precondition::Revision(rev) => vec![("currentDocument.updateTime", rev.0.clone())],
    }
}

fn increment_write(document_name: &str, field: &str, delta: i64) -> serde_json::Value {
    json!({
        "writes": [{
            "update": { "name": document_name, "fields": {} },
            "updateMask": { "fieldPaths": [] },
            "updateTransforms": [{
                "fieldPath": field,
                "increment": { "integerValue": delta.to_string() },
            }],
        }],
    })
}

fn parse_increment_result(body: &str) -> StoreResult<i64> {
    let commit: CommitResponse =
        serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    let value = commit
        .write_results
        .into_iter()
        .next()
        .and_then(|w| w.transform_results.into_iter().next())
        .ok_or_else(|| StoreError::Decode("commit response without transform result".to_string()))?;

    match value.into_field() {
        // The server clamps integer increments at the bounds, so a result at
        // the bound cannot be told apart from an overflow.
        Some(FieldValue::Integer(i64::MAX)) => Err(StoreError::Overflow(i64::MAX.to_string())),
        Some(FieldValue::Integer(i)) => Ok(i),
        // Incrementing a double field keeps it a double.
        Some(FieldValue::Double(d)) => Err(StoreError::NonInteger(d.to_string())),
        other => Err(StoreError::Decode(format!("unexpected transform result: {:?}", other))),
    }
}

fn error_from_response(status: StatusCode, body: &str, key: &DocumentKey) -> StoreError {
    let (message, code) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.to_string(), String::new()),
    };

    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(key.path()),
        StatusCode::CONFLICT => StoreError::Conflict(key.path()),
        StatusCode::BAD_REQUEST if code == "FAILED_PRECONDITION" => StoreError::Conflict(key.path()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(message),
        _ => StoreError::Backend {
            status: status.as_u16(),
            message,
        },
    }
}
