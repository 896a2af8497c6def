//! Read models: disposable, rebuildable views fed by projections.
//!
//! Each read model is a trait (the query/persistence boundary services depend
//! on) plus an in-memory implementation for tests and the CLI.

pub mod allocation_ledger;
pub mod catalog;
pub mod sales_history;

pub use allocation_ledger::{AllocationLedger, InMemoryAllocationLedger};
pub use catalog::ProductCatalog;
pub use sales_history::{InMemorySalesHistory, SalesHistory};
