//! Infrastructure layer: event stores, read models, application services and
//! settings loading.
//!
//! Domain crates decide; this crate loads state, commits decisions with
//! optimistic concurrency and keeps the read side (catalog, allocation ledger,
//! sales history) up to date.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod services;
pub mod settings;

pub use command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
pub use event_store::{EventStore, InMemoryEventStore, StoreError};
pub use services::{AllocationService, CatalogService, ForecastService, PharmacyServices, ServiceError};
pub use settings::{AllocationSettings, Settings, SettingsError};
