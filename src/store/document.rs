//! Document model, store trait and error definitions.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Fixed address of a document: collection plus document name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub collection: String,
    pub document: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            document: document.into(),
        }
    }

    /// Relative path, `collection/document`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.document)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.document)
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl FieldValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// Opaque token that changes whenever the document is written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(pub String);

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fetched document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub fields: Fields,
    pub revision: Revision,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Condition a write must satisfy to be applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Precondition {
    #[default]
    None,
    /// The document must not exist yet.
    MustNotExist,
    /// The document must currently be at this revision.
    Revision(Revision),
}

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("Store request timed out")]
    Timeout,

    /// A write precondition did not hold.
    #[error("Precondition failed for {0}")]
    Conflict(String),

    /// The document does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The backend does not implement this operation.
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    /// Credentials were missing or rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend answered with an unexpected status.
    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// The backend answer could not be understood.
    #[error("Decode error: {0}")]
    Decode(String),

    /// An increment would leave the integer range.
    #[error("Integer overflow on {0}")]
    Overflow(String),

    /// An increment produced a value that is not an integer.
    #[error("Field does not hold an integer: {0}")]
    NonInteger(String),
}

/// Result type for document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Remote document database seen by the counter.
///
/// Implementations must be safe for concurrent use: one instance is created
/// at startup and shared by every request.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Fetch a document, `None` if it does not exist.
    async fn get(&self, key: &DocumentKey) -> StoreResult<Option<Document>>;

    /// Partially update the given fields of an existing document.
    async fn update(
        &self,
        key: &DocumentKey,
        fields: Fields,
        precondition: Precondition,
    ) -> StoreResult<Revision>;

    /// Replace the whole document, creating it if needed.
    async fn set(
        &self,
        key: &DocumentKey,
        fields: Fields,
        precondition: Precondition,
    ) -> StoreResult<Revision>;

    fn supports_atomic_increment(&self) -> bool {
        false
    }

    /// Add `delta` to an integer field server-side and return the new value.
    /// A missing document or field counts as 0.
    async fn increment(&self, _key: &DocumentKey, _field: &str, _delta: i64) -> StoreResult<i64> {
        Err(StoreError::Unsupported("increment"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_path() {
        let key = DocumentKey::new("site_data", "visitor_count");
        assert_eq!(key.path(), "site_data/visitor_count");
        assert_eq!(key.to_string(), "site_data/visitor_count");
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::Backend {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(err.to_string(), "Backend returned 503: unavailable");
        assert_eq!(
            StoreError::Unsupported("increment").to_string(),
            "Operation not supported: increment"
        );
    }

    #[test]
    fn test_field_value_integer() {
        assert_eq!(FieldValue::from(4).as_integer(), Some(4));
        assert_eq!(FieldValue::String("4".into()).as_integer(), None);
    }
}
