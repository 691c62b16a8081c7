//! Visitor counter library.
//!
//! One HTTP endpoint that durably increments a counter document and returns
//! the new value, with CORS handling for browser callers.

pub mod config;
pub mod counter;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::CounterConfig;
pub use counter::VisitCounter;
pub use http::CounterServer;
pub use lifecycle::Shutdown;
pub use store::{DocumentStore, FirestoreStore, MemoryStore};
