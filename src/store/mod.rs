//! Document store subsystem.
//!
//! # Data Flow
//! ```text
//! StoreConfig
//!     → build_store() picks a backend
//!         memory.rs     (in-process, sharded map)
//!         firestore.rs  (REST v1, token source)
//!     → Arc<dyn DocumentStore> created once at startup
//!     → shared by every request through the router state
//! ```
//!
//! # Design Decisions
//! - One document model (fields + opaque revision) for every backend
//! - Writes carry explicit preconditions so callers can build compare-and-swap
//! - Backends advertise whether they can increment server-side

pub mod document;
pub mod firestore;
pub mod memory;

use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};

pub use document::{
    Document, DocumentKey, DocumentStore, FieldValue, Fields, Precondition, Revision, StoreError,
    StoreResult,
};
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

/// Construct the configured store backend.
pub fn build_store(config: &StoreConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; the counter resets on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Firestore => Arc::new(FirestoreStore::new(&config.firestore)?),
    };
    Ok(store)
}
