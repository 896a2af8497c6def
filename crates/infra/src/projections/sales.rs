use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pharmastock_core::ProductId;
use pharmastock_events::EventEnvelope;
use pharmastock_forecasting::SaleObservation;
use pharmastock_inventory::InventoryEvent;

use crate::event_store::StoreError;
use crate::read_model::{AllocationLedger, SalesHistory};

use super::{ProjectionError, advance};

/// Sales projection over inventory streams.
///
/// Every `SaleAllocated` envelope appends its allocation records to the
/// ledger and one observation (requested quantity, sale time) to the sales
/// history. Receipts only advance the cursor.
pub struct SalesProjection {
    ledger: Arc<dyn AllocationLedger>,
    history: Arc<dyn SalesHistory>,
    cursors: Mutex<HashMap<ProductId, u64>>,
}

impl SalesProjection {
    pub fn new(ledger: Arc<dyn AllocationLedger>, history: Arc<dyn SalesHistory>) -> Self {
        Self {
            ledger,
            history,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn AllocationLedger> {
        &self.ledger
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<InventoryEvent>) -> Result<(), ProjectionError> {
        // Held across the writes so two appliers cannot both pass the cursor check.
        let mut cursors = self.cursors.lock().map_err(|_| StoreError::Poisoned)?;
        let product_id = envelope.product_id();
        let last = cursors.get(&product_id).copied().unwrap_or(0);

        if !advance(last, envelope.sequence_number())? {
            return Ok(());
        }

        if let InventoryEvent::SaleAllocated(e) = envelope.payload() {
            let allocation = &e.allocation;
            self.ledger.append(allocation.allocations.clone())?;
            self.history.record(SaleObservation {
                product_id: allocation.product_id,
                quantity: allocation.requested_quantity,
                occurred_at: e.occurred_at,
            })?;
        }

        cursors.insert(product_id, envelope.sequence_number());
        Ok(())
    }

    /// Apply a product stream from the start; envelopes at or below the
    /// cursor are skipped, so concurrent callers never leave a gap.
    pub fn catch_up(&self, stream: &[EventEnvelope<InventoryEvent>]) -> Result<(), ProjectionError> {
        for envelope in stream {
            self.apply_envelope(envelope)?;
        }
        Ok(())
    }

    /// Stream position applied so far for a product (0 when none).
    pub fn cursor(&self, product_id: ProductId) -> u64 {
        self.cursors
            .lock()
            .ok()
            .and_then(|c| c.get(&product_id).copied())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for SalesProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesProjection")
            .field("cursors", &self.cursors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use pharmastock_core::{BatchId, SaleId};
    use pharmastock_inventory::{AllocationRecord, BatchReceived, SaleAllocated, SaleAllocation};

    use crate::read_model::{InMemoryAllocationLedger, InMemorySalesHistory};

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, day, 12, 0, 0).unwrap()
    }

    fn received(p: ProductId) -> InventoryEvent {
        InventoryEvent::BatchReceived(BatchReceived {
            product_id: p,
            batch_id: BatchId::new(),
            batch_number: "LOT-1".to_string(),
            quantity: 100,
            expiry_date: None,
            unit_cost: 30,
            unit_selling_price: None,
            occurred_at: t(1),
        })
    }

    fn sold(p: ProductId, qty: i64) -> InventoryEvent {
        let sale_id = SaleId::new();
        InventoryEvent::SaleAllocated(SaleAllocated {
            allocation: SaleAllocation {
                sale_id,
                product_id: p,
                requested_quantity: qty,
                unit_price: 50,
                allocations: vec![AllocationRecord {
                    sale_id,
                    product_id: p,
                    batch_id: BatchId::new(),
                    batch_number: "LOT-1".to_string(),
                    quantity: qty,
                    unit_cost: 30,
                    unit_price: 50,
                    line_cost: 30 * qty as u64,
                    line_profit: 20 * qty,
                }],
                total_cost: 30 * qty as u64,
                revenue: 50 * qty as u64,
                profit: 20 * qty,
            },
            occurred_at: t(2),
        })
    }

    fn projection() -> (SalesProjection, Arc<InMemoryAllocationLedger>, Arc<InMemorySalesHistory>) {
        let ledger = Arc::new(InMemoryAllocationLedger::new());
        let history = Arc::new(InMemorySalesHistory::new());
        (SalesProjection::new(ledger.clone(), history.clone()), ledger, history)
    }

    #[test]
    fn sale_feeds_ledger_and_history() {
        let (projection, ledger, history) = projection();
        let p = ProductId::new();

        projection
            .apply_envelope(&EventEnvelope::new(p, "inventory.product", 1, received(p)))
            .unwrap();
        projection
            .apply_envelope(&EventEnvelope::new(p, "inventory.product", 2, sold(p, 12)))
            .unwrap();

        assert_eq!(ledger.for_product(p).unwrap().len(), 1);
        let obs = history.observations(p, t(1), t(3)).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].quantity, 12);
        assert_eq!(projection.cursor(p), 2);
    }

    #[test]
    fn duplicate_delivery_records_once() {
        let (projection, ledger, history) = projection();
        let p = ProductId::new();
        let receipt = EventEnvelope::new(p, "inventory.product", 1, received(p));
        let sale = EventEnvelope::new(p, "inventory.product", 2, sold(p, 4));

        projection.apply_envelope(&receipt).unwrap();
        projection.apply_envelope(&sale).unwrap();
        projection.apply_envelope(&sale).unwrap();

        assert_eq!(ledger.for_product(p).unwrap().len(), 1);
        assert_eq!(history.observations(p, t(1), t(3)).unwrap().len(), 1);
    }

    #[test]
    fn catch_up_fills_in_missed_envelopes() {
        let (projection, ledger, _) = projection();
        let p = ProductId::new();
        let stream = vec![
            EventEnvelope::new(p, "inventory.product", 1, received(p)),
            EventEnvelope::new(p, "inventory.product", 2, sold(p, 4)),
            EventEnvelope::new(p, "inventory.product", 3, sold(p, 6)),
        ];

        projection.apply_envelope(&stream[0]).unwrap();
        projection.catch_up(&stream).unwrap();
        projection.catch_up(&stream).unwrap();

        assert_eq!(ledger.for_product(p).unwrap().len(), 2);
        assert_eq!(projection.cursor(p), 3);
    }

    #[test]
    fn out_of_order_delivery_is_rejected() {
        let (projection, _, _) = projection();
        let p = ProductId::new();

        let err = projection
            .apply_envelope(&EventEnvelope::new(p, "inventory.product", 2, sold(p, 4)))
            .unwrap_err();
        assert_eq!(err, ProjectionError::NonMonotonicSequence { last: 0, found: 2 });
    }
}
