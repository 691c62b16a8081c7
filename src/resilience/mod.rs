//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Compare-and-swap conflict on the counter document:
//!     → backoff.rs (exponential delay with jitter before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Only precondition conflicts are retried; transport failures surface as 5xx
//! - Jittered backoff spreads out writers racing on the same document

pub mod backoff;

pub use backoff::Backoff;
