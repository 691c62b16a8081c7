//! Counter error definitions.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while incrementing the counter.
#[derive(Debug, Error)]
pub enum CounterError {
    /// The document store failed.
    #[error("Store error during {op}: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: StoreError,
    },

    /// Every compare-and-swap attempt lost to a concurrent writer.
    #[error("Counter still contended after {attempts} attempts")]
    Contended { attempts: u32 },

    /// The count cannot grow any further.
    #[error("Counter overflow")]
    Overflow,

    /// Atomic increments were requested but the backend has none.
    #[error("Store backend '{0}' does not support atomic increments")]
    AtomicUnsupported(&'static str),
}

/// Result type for counter operations.
pub type CounterResult<T> = Result<T, CounterError>;
