//! Inventory domain module (event-sourced).
//!
//! Per-product batch ledger with expiry-first allocation. Business rules are
//! implemented as deterministic domain logic (no IO, no storage).

pub mod allocation;
pub mod batch;
pub mod error;
pub mod ledger;

pub use allocation::{AllocationRecord, SaleAllocation, allocation_order, plan_allocation};
pub use batch::{Batch, BatchStatus};
pub use error::InventoryError;
pub use ledger::{
    AllocateSale, BatchReceived, InventoryCommand, InventoryEvent, ProductInventory, ReceiveBatch,
    SaleAllocated,
};
