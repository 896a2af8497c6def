use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use pharmastock_core::{AggregateRoot, BatchId, DomainError, ProductId, SaleId};
use pharmastock_inventory::{
    AllocateSale, AllocationRecord, Batch, InventoryCommand, InventoryError, InventoryEvent, ProductInventory,
    ReceiveBatch, SaleAllocation,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::event_store::EventStore;
use crate::projections::SalesProjection;
use crate::read_model::ProductCatalog;
use crate::settings::AllocationSettings;

use super::{INVENTORY_AGGREGATE, InventoryEventStore, ServiceError};

/// Batch receipts and expiry-first sale allocation.
///
/// Each command is decided against a fresh snapshot of the product's
/// inventory and committed with the version that snapshot was loaded at. On a
/// conflicting commit the whole load-decide-commit cycle is retried, up to
/// `max_commit_retries` extra times, so two sales racing for the last units
/// of a batch can never both consume them.
pub struct AllocationService {
    dispatcher: CommandDispatcher<InventoryEventStore>,
    catalog: Arc<dyn ProductCatalog>,
    sales: Arc<SalesProjection>,
    max_commit_retries: u32,
}

impl AllocationService {
    pub fn new(
        store: InventoryEventStore,
        catalog: Arc<dyn ProductCatalog>,
        sales: Arc<SalesProjection>,
        settings: &AllocationSettings,
    ) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store),
            catalog,
            sales,
            max_commit_retries: settings.max_commit_retries,
        }
    }

    /// Put a new batch into stock for a catalogued product.
    pub fn receive_batch(&self, command: ReceiveBatch) -> Result<Batch, ServiceError> {
        let product_id = command.product_id;
        let batch_id = command.batch_id;
        if self.catalog.product(product_id)?.is_none() {
            return Err(ServiceError::ProductNotFound(product_id));
        }

        let dispatched = self.dispatch_with_retry(product_id, &InventoryCommand::ReceiveBatch(command))?;
        self.project_committed(product_id);

        let batch = dispatched
            .aggregate
            .batch(batch_id)
            .cloned()
            .ok_or_else(|| ServiceError::Domain(DomainError::invariant("received batch missing after commit")))?;

        info!(
            product_id = %product_id,
            batch_id = %batch_id,
            batch_number = %batch.batch_number,
            quantity = batch.quantity_remaining,
            expiry_date = ?batch.expiry_date,
            "batch received"
        );
        Ok(batch)
    }

    /// Allocate a sale of `quantity` units across the product's batches.
    ///
    /// Revenue uses the catalog price at the time of the call. Either every
    /// batch decrement of the sale is committed or none is; on
    /// `InsufficientStock` and `InvalidQuantity` stock is unchanged.
    pub fn allocate(
        &self,
        product_id: ProductId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<SaleAllocation, ServiceError> {
        let product = self
            .catalog
            .product(product_id)?
            .ok_or(ServiceError::ProductNotFound(product_id))?;

        let command = InventoryCommand::AllocateSale(AllocateSale {
            product_id,
            sale_id: SaleId::new(),
            quantity,
            unit_price: product.unit_price,
            occurred_at,
        });

        let dispatched = self
            .dispatch_with_retry(product_id, &command)
            .inspect_err(|e| {
                if let ServiceError::Inventory(InventoryError::InsufficientStock { requested, available, .. }) = e {
                    warn!(product_id = %product_id, requested, available, "sale blocked: insufficient stock");
                }
            })?;
        self.project_committed(product_id);

        let allocation = dispatched
            .committed
            .into_iter()
            .find_map(|env| match env.into_payload() {
                InventoryEvent::SaleAllocated(e) => Some(e.allocation),
                InventoryEvent::BatchReceived(_) => None,
            })
            .ok_or_else(|| ServiceError::Domain(DomainError::invariant("sale committed without an allocation")))?;

        info!(
            product_id = %product_id,
            sale_id = %allocation.sale_id,
            quantity = allocation.requested_quantity,
            batches = allocation.allocations.len(),
            revenue = allocation.revenue,
            cogs = allocation.total_cost,
            profit = allocation.profit,
            remaining = dispatched.aggregate.available_quantity(),
            "sale allocated"
        );
        Ok(allocation)
    }

    /// Current inventory snapshot for a product (empty when never stocked).
    pub fn inventory(&self, product_id: ProductId) -> Result<ProductInventory, ServiceError> {
        Ok(self.dispatcher.load(product_id, ProductInventory::empty)?)
    }

    /// Allocation records of one sale.
    pub fn allocations_for_sale(&self, sale_id: SaleId) -> Result<Vec<AllocationRecord>, ServiceError> {
        Ok(self.sales.ledger().for_sale(sale_id)?)
    }

    /// Active batches of a product expiring within `days` of `as_of`.
    pub fn expiring_batches(
        &self,
        product_id: ProductId,
        as_of: NaiveDate,
        days: i64,
    ) -> Result<Vec<Batch>, ServiceError> {
        let inventory = self.inventory(product_id)?;
        Ok(inventory
            .expiring_within(as_of, days)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn batch(&self, product_id: ProductId, batch_id: BatchId) -> Result<Option<Batch>, ServiceError> {
        Ok(self.inventory(product_id)?.batch(batch_id).cloned())
    }

    fn dispatch_with_retry(
        &self,
        product_id: ProductId,
        command: &InventoryCommand,
    ) -> Result<Dispatched<ProductInventory>, ServiceError> {
        let attempts = self.max_commit_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self
                .dispatcher
                .dispatch(product_id, INVENTORY_AGGREGATE, command, ProductInventory::empty)
            {
                Ok(dispatched) => {
                    if attempt > 1 {
                        info!(product_id = %product_id, attempt, version = dispatched.aggregate.version(), "commit succeeded after retry");
                    }
                    return Ok(dispatched);
                }
                Err(DispatchError::Concurrency(reason)) => {
                    warn!(product_id = %product_id, attempt, reason = %reason, "inventory commit conflicted; reloading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(product_id = %product_id, attempts, "giving up after repeated commit conflicts");
        Err(ServiceError::ConcurrencyExhausted {
            product_id,
            attempts,
        })
    }

    /// Bring the sales read models up to the committed stream.
    fn project(&self, product_id: ProductId) -> Result<(), ServiceError> {
        let stream = self.dispatcher.store().load_stream(product_id)?;
        self.sales.catch_up(&stream)?;
        Ok(())
    }

    /// Projection after a commit. A failure is logged and the read models
    /// stay behind until the next catch-up.
    fn project_committed(&self, product_id: ProductId) {
        if let Err(e) = self.project(product_id) {
            warn!(product_id = %product_id, error = %e, "sales read models lag the committed stream");
        }
    }
}
