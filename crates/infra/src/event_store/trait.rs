use std::sync::Arc;

use thiserror::Error;

use pharmastock_core::{ExpectedVersion, ProductId};
use pharmastock_events::{Event, EventEnvelope};

/// Store operation error.
///
/// These are infrastructure errors (storage, concurrency, malformed input) as
/// opposed to domain errors (validation, invariants, stock).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The stream moved since it was loaded.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    /// Read-model input rejected at ingestion (e.g. a non-positive sale quantity).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Append-only, product-scoped event store.
///
/// ## Append semantics
///
/// `append()`:
/// - checks `expected_version` against the current stream version
/// - assigns sequence numbers starting at `current_version + 1`
/// - persists the whole batch or nothing
///
/// A sale is a single `SaleAllocated` event, so an atomic append is what makes
/// allocation all-or-nothing against the store.
///
/// ## Load semantics
///
/// `load_stream()` returns the stream in sequence order, or an empty vector
/// for a product that has no events yet.
pub trait EventStore<E: Event>: Send + Sync {
    fn append(
        &self,
        product_id: ProductId,
        aggregate_type: &str,
        events: Vec<E>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<EventEnvelope<E>>, StoreError>;

    fn load_stream(&self, product_id: ProductId) -> Result<Vec<EventEnvelope<E>>, StoreError>;
}

impl<E, S> EventStore<E> for Arc<S>
where
    E: Event,
    S: EventStore<E> + ?Sized,
{
    fn append(
        &self,
        product_id: ProductId,
        aggregate_type: &str,
        events: Vec<E>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<EventEnvelope<E>>, StoreError> {
        (**self).append(product_id, aggregate_type, events, expected_version)
    }

    fn load_stream(&self, product_id: ProductId) -> Result<Vec<EventEnvelope<E>>, StoreError> {
        (**self).load_stream(product_id)
    }
}

/// Current version of a loaded stream (0 when empty).
pub fn stream_version<E>(stream: &[EventEnvelope<E>]) -> u64 {
    stream.last().map(|e| e.sequence_number()).unwrap_or(0)
}
