//! Increment algorithm over a document store.

use std::sync::Arc;

use crate::config::{CounterDocumentConfig, IncrementConfig, IncrementStrategy};
use crate::counter::types::{CounterError, CounterResult};
use crate::observability::metrics;
use crate::resilience::Backoff;
use crate::store::{Document, DocumentKey, DocumentStore, FieldValue, Fields, Precondition, StoreError};

/// Strategy after resolving `auto` against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Atomic,
    CompareAndSwap,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Atomic => "atomic",
            Mode::CompareAndSwap => "compare_and_swap",
        }
    }
}

/// Durable, concurrency-safe visitor counter.
///
/// Holds the shared store handle; cloning is cheap.
#[derive(Clone)]
pub struct VisitCounter {
    store: Arc<dyn DocumentStore>,
    key: DocumentKey,
    field: String,
    mode: Mode,
    max_attempts: u32,
    backoff: Backoff,
}

impl VisitCounter {
    /// Create a counter over `store`.
    ///
    /// Fails when atomic increments are explicitly requested from a backend
    /// that cannot provide them.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        document: &CounterDocumentConfig,
        increment: &IncrementConfig,
    ) -> CounterResult<Self> {
        let mode = match increment.strategy {
            IncrementStrategy::Auto if store.supports_atomic_increment() => Mode::Atomic,
            IncrementStrategy::Auto => Mode::CompareAndSwap,
            IncrementStrategy::Atomic if store.supports_atomic_increment() => Mode::Atomic,
            IncrementStrategy::Atomic => return Err(CounterError::AtomicUnsupported(store.name())),
            IncrementStrategy::CompareAndSwap => Mode::CompareAndSwap,
        };

        let key = DocumentKey::new(&document.collection, &document.document);
        tracing::info!(
            store = store.name(),
            document = %key,
            field = %document.field,
            strategy = mode.as_str(),
            "Visit counter ready"
        );

        Ok(Self {
            store,
            key,
            field: document.field.clone(),
            mode,
            max_attempts: increment.max_attempts.max(1),
            backoff: Backoff::from_config(increment),
        })
    }

    /// Strategy in use ("atomic" or "compare_and_swap").
    pub fn strategy(&self) -> &'static str {
        self.mode.as_str()
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Record one visit and return the new count.
    pub async fn increment(&self) -> CounterResult<u64> {
        let count = match self.mode {
            Mode::Atomic => self.increment_atomic().await?,
            Mode::CompareAndSwap => self.increment_cas().await?,
        };
        metrics::record_increment(self.mode.as_str());
        Ok(count)
    }

    /// Store-side increment. A stored value the counter reads as zero
    /// (negative or non-integer) leaves the result out of range; such a
    /// document is repaired through the compare-and-swap path.
    async fn increment_atomic(&self) -> CounterResult<u64> {
        match self.store.increment(&self.key, &self.field, 1).await {
            Ok(value) if value >= 1 => Ok(value.unsigned_abs()),
            Ok(value) => {
                tracing::warn!(document = %self.key, value, "Stored count out of range, resetting");
                self.increment_cas().await
            }
            Err(StoreError::NonInteger(value)) => {
                tracing::warn!(document = %self.key, %value, "Stored count is not an integer, resetting");
                self.increment_cas().await
            }
            Err(StoreError::Overflow(_)) => Err(CounterError::Overflow),
            Err(e) => Err(store_error("increment", e)),
        }
    }

    async fn increment_cas(&self) -> CounterResult<u64> {
        for attempt in 1..=self.max_attempts {
            let current = self
                .store
                .get(&self.key)
                .await
                .map_err(|e| store_error("get", e))?;

            let (next, written) = match current {
                Some(doc) => {
                    let next = read_count(&doc, &self.field)
                        .checked_add(1)
                        .ok_or(CounterError::Overflow)?;
                    let result = self
                        .store
                        .update(&self.key, self.fields(next), Precondition::Revision(doc.revision))
                        .await;
                    (next, result.map_err(|e| ("update", e)))
                }
                None => {
                    let result = self
                        .store
                        .set(&self.key, self.fields(1), Precondition::MustNotExist)
                        .await;
                    (1, result.map_err(|e| ("set", e)))
                }
            };

            match written {
                Ok(_) => return Ok(next.unsigned_abs()),
                Err((_, StoreError::Conflict(_))) | Err((_, StoreError::NotFound(_))) => {
                    metrics::record_cas_conflict();
                    tracing::debug!(document = %self.key, attempt, "Counter write lost a race, retrying");
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff.delay(attempt)).await;
                    }
                }
                Err((op, e)) => return Err(store_error(op, e)),
            }
        }

        tracing::warn!(document = %self.key, attempts = self.max_attempts, "Counter contention not resolved");
        Err(CounterError::Contended {
            attempts: self.max_attempts,
        })
    }

    fn fields(&self, count: i64) -> Fields {
        Fields::from([(self.field.clone(), FieldValue::Integer(count))])
    }
}

/// Current count, with missing, non-integer and negative values read as zero.
fn read_count(doc: &Document, field: &str) -> i64 {
    doc.get(field)
        .and_then(FieldValue::as_integer)
        .filter(|n| *n >= 0)
        .unwrap_or(0)
}

fn store_error(op: &'static str, source: StoreError) -> CounterError {
    metrics::record_store_error(op);
    CounterError::Store { op, source }
}
