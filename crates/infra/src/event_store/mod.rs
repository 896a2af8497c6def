//! Append-only event store boundary.
//!
//! One stream per product and aggregate kind. Implementations assign sequence
//! numbers and enforce optimistic concurrency; nothing here assumes a storage
//! engine.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, StoreError};
