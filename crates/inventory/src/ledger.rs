use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pharmastock_core::{Aggregate, AggregateRoot, BatchId, DomainError, ProductId, SaleId};
use pharmastock_events::Event;

use crate::allocation::{SaleAllocation, allocation_order, plan_allocation};
use crate::batch::{Batch, BatchStatus};
use crate::error::InventoryError;

/// Aggregate root: all batches held for one product.
///
/// This aggregate is the only place batch quantities change. A sale is one
/// `SaleAllocated` event, so a store that commits events atomically commits
/// every decrement of a sale or none of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInventory {
    id: ProductId,
    batches: Vec<Batch>,
    version: u64,
}

impl ProductInventory {
    /// Empty inventory for rehydration (or a product with no stock yet).
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            batches: Vec::new(),
            version: 0,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.id
    }

    /// Every batch ever received, depleted ones included.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, batch_id: BatchId) -> Option<&Batch> {
        self.batches.iter().find(|b| b.batch_id == batch_id)
    }

    /// Active batches in the order a sale would consume them.
    pub fn active_batches(&self) -> Vec<&Batch> {
        allocation_order(&self.batches)
    }

    /// Sum of remaining quantity over active batches.
    pub fn available_quantity(&self) -> i64 {
        self.batches
            .iter()
            .filter(|b| b.is_allocatable())
            .map(|b| b.quantity_remaining)
            .sum()
    }

    /// Active dated batches expiring on or before `as_of + days`, soonest first.
    pub fn expiring_within(&self, as_of: NaiveDate, days: i64) -> Vec<&Batch> {
        let horizon = as_of + Duration::days(days);
        self.active_batches()
            .into_iter()
            .filter(|b| b.expires_by(horizon))
            .collect()
    }

    /// Stock value at purchase cost over active batches.
    pub fn valuation(&self) -> u64 {
        self.batches
            .iter()
            .filter(|b| b.is_allocatable())
            .fold(0u64, |acc, b| acc.saturating_add(b.value()))
    }
}

impl AggregateRoot for ProductInventory {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ReceiveBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBatch {
    pub product_id: ProductId,
    pub batch_id: BatchId,
    pub batch_number: String,
    pub quantity: i64,
    pub expiry_date: Option<NaiveDate>,
    pub unit_cost: u64,
    pub unit_selling_price: Option<u64>,
    pub received_at: DateTime<Utc>,
}

/// Command: AllocateSale.
///
/// `unit_price` is the product's current price, looked up by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateSale {
    pub product_id: ProductId,
    pub sale_id: SaleId,
    pub quantity: i64,
    pub unit_price: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    ReceiveBatch(ReceiveBatch),
    AllocateSale(AllocateSale),
}

/// Event: BatchReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceived {
    pub product_id: ProductId,
    pub batch_id: BatchId,
    pub batch_number: String,
    pub quantity: i64,
    pub expiry_date: Option<NaiveDate>,
    pub unit_cost: u64,
    pub unit_selling_price: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleAllocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleAllocated {
    pub allocation: SaleAllocation,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    BatchReceived(BatchReceived),
    SaleAllocated(SaleAllocated),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::BatchReceived(_) => "inventory.batch.received",
            InventoryEvent::SaleAllocated(_) => "inventory.sale.allocated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::BatchReceived(e) => e.occurred_at,
            InventoryEvent::SaleAllocated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductInventory {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = InventoryError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::BatchReceived(e) => {
                self.id = e.product_id;
                self.batches.push(Batch {
                    batch_id: e.batch_id,
                    product_id: e.product_id,
                    batch_number: e.batch_number.clone(),
                    quantity_remaining: e.quantity,
                    expiry_date: e.expiry_date,
                    unit_cost: e.unit_cost,
                    unit_selling_price: e.unit_selling_price,
                    created_at: e.occurred_at,
                    status: BatchStatus::Active,
                });
            }
            InventoryEvent::SaleAllocated(e) => {
                for record in &e.allocation.allocations {
                    if let Some(batch) = self
                        .batches
                        .iter_mut()
                        .find(|b| b.batch_id == record.batch_id)
                    {
                        batch.quantity_remaining -= record.quantity;
                        if batch.quantity_remaining <= 0 {
                            batch.quantity_remaining = 0;
                            batch.status = BatchStatus::Depleted;
                        }
                    }
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::ReceiveBatch(cmd) => self.handle_receive(cmd),
            InventoryCommand::AllocateSale(cmd) => self.handle_allocate(cmd),
        }
    }
}

impl ProductInventory {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_receive(&self, cmd: &ReceiveBatch) -> Result<Vec<InventoryEvent>, InventoryError> {
        self.ensure_product_id(cmd.product_id)?;

        if cmd.quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(cmd.quantity));
        }
        if cmd.batch_number.trim().is_empty() {
            return Err(DomainError::validation("batch number cannot be empty").into());
        }
        if self.batch(cmd.batch_id).is_some() {
            return Err(DomainError::conflict("batch already received").into());
        }

        Ok(vec![InventoryEvent::BatchReceived(BatchReceived {
            product_id: cmd.product_id,
            batch_id: cmd.batch_id,
            batch_number: cmd.batch_number.trim().to_string(),
            quantity: cmd.quantity,
            expiry_date: cmd.expiry_date,
            unit_cost: cmd.unit_cost,
            unit_selling_price: cmd.unit_selling_price,
            occurred_at: cmd.received_at,
        })])
    }

    fn handle_allocate(&self, cmd: &AllocateSale) -> Result<Vec<InventoryEvent>, InventoryError> {
        self.ensure_product_id(cmd.product_id)?;

        let allocation = plan_allocation(&self.batches, cmd)?;

        Ok(vec![InventoryEvent::SaleAllocated(SaleAllocated {
            allocation,
            occurred_at: cmd.occurred_at,
        })])
    }
}
