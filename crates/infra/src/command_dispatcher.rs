//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the product's stream from the store
//!   ↓
//! 2. Rehydrate the aggregate (apply history in sequence order)
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded version)
//! ```
//!
//! A concurrent writer between steps 1 and 4 makes the append fail with
//! `DispatchError::Concurrency`; nothing is written and the caller may retry
//! on a fresh snapshot. This module contains no IO itself.

use std::fmt;

use pharmastock_core::{Aggregate, ExpectedVersion, ProductId};
use pharmastock_events::{Event, EventEnvelope};

use crate::event_store::{EventStore, StoreError};
use crate::event_store::r#trait::stream_version;

#[derive(Debug)]
pub enum DispatchError<DE> {
    /// The aggregate rejected the command (validation, invariants, stock).
    Rejected(DE),
    /// Optimistic concurrency failure: the stream moved since it was loaded.
    Concurrency(String),
    /// Loading or persisting failed.
    Store(StoreError),
}

impl<DE> From<StoreError> for DispatchError<DE> {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl<DE: fmt::Display> fmt::Display for DispatchError<DE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Rejected(e) => write!(f, "command rejected: {e}"),
            DispatchError::Concurrency(msg) => write!(f, "concurrent modification: {msg}"),
            DispatchError::Store(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl<DE: fmt::Debug + fmt::Display> std::error::Error for DispatchError<DE> {}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone)]
pub struct Dispatched<A: Aggregate> {
    /// Aggregate state after the committed events were applied.
    pub aggregate: A,
    /// Events as committed (empty when the command was a no-op).
    pub committed: Vec<EventEnvelope<A::Event>>,
}

/// Reusable command execution engine for product-scoped aggregates.
///
/// Aggregates used here must be deterministic and side-effect free: the same
/// history always rebuilds the same state.
#[derive(Debug, Clone)]
pub struct CommandDispatcher<S> {
    store: S,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load and rehydrate an aggregate without handling a command.
    pub fn load<A>(&self, product_id: ProductId, make_aggregate: impl FnOnce(ProductId) -> A) -> Result<A, StoreError>
    where
        A: Aggregate,
        A::Event: Event,
        S: EventStore<A::Event>,
    {
        let history = self.store.load_stream(product_id)?;
        validate_loaded_stream(product_id, &history)?;
        Ok(rehydrate(make_aggregate(product_id), &history))
    }

    /// Dispatch one command through load, decide and append.
    pub fn dispatch<A>(
        &self,
        product_id: ProductId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl FnOnce(ProductId) -> A,
    ) -> Result<Dispatched<A>, DispatchError<A::Error>>
    where
        A: Aggregate,
        A::Event: Event,
        S: EventStore<A::Event>,
    {
        let history = self.store.load_stream(product_id)?;
        validate_loaded_stream(product_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = rehydrate(make_aggregate(product_id), &history);

        let decided = aggregate.handle(command).map_err(DispatchError::Rejected)?;
        if decided.is_empty() {
            return Ok(Dispatched {
                aggregate,
                committed: vec![],
            });
        }

        let committed = self
            .store
            .append(product_id, aggregate_type, decided, expected)?;
        for envelope in &committed {
            aggregate.apply(envelope.payload());
        }

        Ok(Dispatched {
            aggregate,
            committed,
        })
    }
}

/// Apply a loaded stream to a fresh aggregate.
pub fn rehydrate<A>(mut aggregate: A, history: &[EventEnvelope<A::Event>]) -> A
where
    A: Aggregate,
{
    for envelope in history {
        aggregate.apply(envelope.payload());
    }
    aggregate
}

fn validate_loaded_stream<E>(product_id: ProductId, stream: &[EventEnvelope<E>]) -> Result<(), StoreError> {
    // Guard against a backend returning a foreign or reordered stream.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.product_id() != product_id {
            return Err(StoreError::InvalidAppend(format!(
                "loaded stream contains wrong product_id at index {idx}"
            )));
        }
        if e.sequence_number() <= last {
            return Err(StoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number()
            )));
        }
        last = e.sequence_number();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use pharmastock_core::{AggregateRoot, BatchId, SaleId};
    use pharmastock_inventory::{
        AllocateSale, InventoryCommand, InventoryError, InventoryEvent, ProductInventory, ReceiveBatch,
    };

    use crate::event_store::InMemoryEventStore;

    const AGGREGATE: &str = "inventory.product";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    }

    fn receive(product_id: ProductId, qty: i64) -> InventoryCommand {
        InventoryCommand::ReceiveBatch(ReceiveBatch {
            product_id,
            batch_id: BatchId::new(),
            batch_number: "LOT-7".to_string(),
            quantity: qty,
            expiry_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            unit_cost: 20,
            unit_selling_price: None,
            received_at: t0(),
        })
    }

    fn sell(product_id: ProductId, qty: i64) -> InventoryCommand {
        InventoryCommand::AllocateSale(AllocateSale {
            product_id,
            sale_id: SaleId::new(),
            quantity: qty,
            unit_price: 35,
            occurred_at: t0(),
        })
    }

    #[test]
    fn dispatch_commits_and_returns_updated_aggregate() {
        let dispatcher = CommandDispatcher::new(Arc::new(InMemoryEventStore::<InventoryEvent>::new()));
        let p = ProductId::new();

        dispatcher
            .dispatch(p, AGGREGATE, &receive(p, 40), ProductInventory::empty)
            .unwrap();
        let sold = dispatcher
            .dispatch(p, AGGREGATE, &sell(p, 15), ProductInventory::empty)
            .unwrap();

        assert_eq!(sold.committed.len(), 1);
        assert_eq!(sold.committed[0].sequence_number(), 2);
        assert_eq!(sold.aggregate.available_quantity(), 25);
        assert_eq!(sold.aggregate.version(), 2);

        let reloaded = dispatcher.load(p, ProductInventory::empty).unwrap();
        assert_eq!(reloaded, sold.aggregate);
    }

    #[test]
    fn rejected_command_leaves_stream_untouched() {
        let store = Arc::new(InMemoryEventStore::<InventoryEvent>::new());
        let dispatcher = CommandDispatcher::new(store.clone());
        let p = ProductId::new();
        dispatcher
            .dispatch(p, AGGREGATE, &receive(p, 10), ProductInventory::empty)
            .unwrap();

        let err = dispatcher
            .dispatch(p, AGGREGATE, &sell(p, 11), ProductInventory::empty)
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Rejected(InventoryError::InsufficientStock { requested: 11, available: 10, .. })
        ));
        assert_eq!(store.load_stream(p).unwrap().len(), 1);
    }

    #[test]
    fn store_concurrency_maps_to_dispatch_concurrency() {
        let err: DispatchError<InventoryError> = StoreError::Concurrency("moved".to_string()).into();
        assert!(matches!(err, DispatchError::Concurrency(_)));
    }

    #[test]
    fn load_of_unknown_product_is_empty() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::<InventoryEvent>::new());
        let inv = dispatcher.load(ProductId::new(), ProductInventory::empty).unwrap();
        assert_eq!(inv.available_quantity(), 0);
        assert_eq!(inv.version(), 0);
    }
}
