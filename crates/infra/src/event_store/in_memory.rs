use std::collections::HashMap;
use std::sync::RwLock;

use pharmastock_core::{ExpectedVersion, ProductId};
use pharmastock_events::{Event, EventEnvelope};

use super::r#trait::{EventStore, StoreError, stream_version};

/// In-memory append-only event store.
///
/// Every append holds the write lock across the version check and the push,
/// so concurrent commits to one product are serialised and a stale writer
/// gets `StoreError::Concurrency` instead of a partial write.
#[derive(Debug)]
pub struct InMemoryEventStore<E> {
    streams: RwLock<HashMap<ProductId, Vec<EventEnvelope<E>>>>,
}

impl<E> InMemoryEventStore<E> {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> Default for InMemoryEventStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> EventStore<E> for InMemoryEventStore<E> {
    fn append(
        &self,
        product_id: ProductId,
        aggregate_type: &str,
        events: Vec<E>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<EventEnvelope<E>>, StoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let mut streams = self.streams.write().map_err(|_| StoreError::Poisoned)?;
        let stream = streams.entry(product_id).or_default();
        let current = stream_version(stream);

        if !expected_version.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "product {product_id}: expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type() != aggregate_type {
                return Err(StoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{aggregate_type}'",
                    existing.aggregate_type()
                )));
            }
        }

        let committed: Vec<EventEnvelope<E>> = events
            .into_iter()
            .zip(current + 1..)
            .map(|(event, seq)| EventEnvelope::new(product_id, aggregate_type, seq, event))
            .collect();
        stream.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, product_id: ProductId) -> Result<Vec<EventEnvelope<E>>, StoreError> {
        let streams = self.streams.read().map_err(|_| StoreError::Poisoned)?;
        Ok(streams.get(&product_id).cloned().unwrap_or_default())
    }
}
