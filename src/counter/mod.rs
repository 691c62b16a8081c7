//! Visit counter subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → engine.rs (VisitCounter::increment)
//!         atomic:           store.increment(key, field, 1)
//!         compare-and-swap: get → update/set guarded by revision
//!                           → conflict? backoff and retry
//!     → new count returned to the handler
//! ```
//!
//! # Design Decisions
//! - The strategy is resolved once at startup, not per request
//! - Unguarded read-then-write is never used, so concurrent visits are not lost
//! - A missing or malformed count reads as zero

pub mod engine;
pub mod types;

pub use engine::VisitCounter;
pub use types::{CounterError, CounterResult};
