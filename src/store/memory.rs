//! In-process document store.
//!
//! Backed by a sharded concurrent map. Every operation on a document runs
//! under that document's shard lock, so increments and precondition checks
//! are atomic. State is lost when the process exits.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::store::document::{
    Document, DocumentKey, DocumentStore, FieldValue, Fields, Precondition, Revision, StoreError,
    StoreResult,
};

#[derive(Debug, Clone)]
struct StoredDocument {
    fields: Fields,
    revision: u64,
}

impl StoredDocument {
    fn to_document(&self) -> Document {
        Document {
            fields: self.fields.clone(),
            revision: Revision(self.revision.to_string()),
        }
    }

    fn matches(&self, revision: &Revision) -> bool {
        self.revision.to_string() == revision.0
    }
}

/// A thread-safe in-memory document store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<DashMap<DocumentKey, StoredDocument>>,
    next_revision: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u64 {
        self.next_revision.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &DocumentKey) -> StoreResult<Option<Document>> {
        Ok(self.docs.get(key).map(|r| r.value().to_document()))
    }

    async fn update(
        &self,
        key: &DocumentKey,
        fields: Fields,
        precondition: Precondition,
    ) -> StoreResult<Revision> {
        match self.docs.entry(key.clone()) {
            Entry::Vacant(_) => match precondition {
                Precondition::Revision(_) => Err(StoreError::Conflict(key.path())),
                _ => Err(StoreError::NotFound(key.path())),
            },
            Entry::Occupied(mut occupied) => {
                let doc = occupied.get_mut();
                match &precondition {
                    Precondition::MustNotExist => return Err(StoreError::Conflict(key.path())),
                    Precondition::Revision(rev) if !doc.matches(rev) => {
                        return Err(StoreError::Conflict(key.path()))
                    }
                    _ => {}
                }
                doc.fields.extend(fields);
                doc.revision = self.bump();
                Ok(Revision(doc.revision.to_string()))
            }
        }
    }

    async fn set(
        &self,
        key: &DocumentKey,
        fields: Fields,
        precondition: Precondition,
    ) -> StoreResult<Revision> {
        match self.docs.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                if let Precondition::Revision(_) = precondition {
                    return Err(StoreError::Conflict(key.path()));
                }
                let revision = self.bump();
                vacant.insert(StoredDocument { fields, revision });
                Ok(Revision(revision.to_string()))
            }
            Entry::Occupied(mut occupied) => {
                let doc = occupied.get_mut();
                match &precondition {
                    Precondition::MustNotExist => return Err(StoreError::Conflict(key.path())),
                    Precondition::Revision(rev) if !doc.matches(rev) => {
                        return Err(StoreError::Conflict(key.path()))
                    }
                    _ => {}
                }
                doc.fields = fields;
                doc.revision = self.bump();
                Ok(Revision(doc.revision.to_string()))
            }
        }
    }

    fn supports_atomic_increment(&self) -> bool {
        true
    }

    async fn increment(&self, key: &DocumentKey, field: &str, delta: i64) -> StoreResult<i64> {
        let mut doc = self.docs.entry(key.clone()).or_insert_with(|| StoredDocument {
            fields: Fields::new(),
            revision: 0,
        });

        // Non-integer values are replaced, the same way a server-side transform would.
        let current = doc.fields.get(field).and_then(FieldValue::as_integer).unwrap_or(0);
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::Overflow(format!("{}.{}", key.path(), field)))?;
        doc.fields.insert(field.to_string(), FieldValue::Integer(next));
        doc.revision = self.bump();
        Ok(next)
    }
}
