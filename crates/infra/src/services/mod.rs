//! Application services: load, decide, commit, project.
//!
//! Services own no business rules; aggregates and the forecaster decide, and
//! services wire them to stores and read models.

pub mod allocation;
pub mod catalog;
pub mod forecast;

use std::sync::Arc;

use thiserror::Error;

use pharmastock_core::{DomainError, ProductId};
use pharmastock_forecasting::ForecastError;
use pharmastock_inventory::{InventoryError, InventoryEvent};
use pharmastock_products::ProductEvent;

use crate::command_dispatcher::DispatchError;
use crate::event_store::{EventStore, InMemoryEventStore, StoreError};
use crate::projections::{ProductCatalogProjection, ProjectionError, SalesProjection};
use crate::read_model::{InMemoryAllocationLedger, InMemorySalesHistory};
use crate::settings::Settings;

pub use allocation::AllocationService;
pub use catalog::CatalogService;
pub use forecast::ForecastService;

/// Aggregate type of inventory streams.
pub const INVENTORY_AGGREGATE: &str = "inventory.product";
/// Aggregate type of catalog streams.
pub const PRODUCT_AGGREGATE: &str = "products.product";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("product {product_id}: gave up after {attempts} conflicting commits")]
    ConcurrencyExhausted { product_id: ProductId, attempts: u32 },
}

impl From<DispatchError<InventoryError>> for ServiceError {
    fn from(value: DispatchError<InventoryError>) -> Self {
        match value {
            DispatchError::Rejected(e) => ServiceError::Inventory(e),
            DispatchError::Concurrency(msg) => ServiceError::Store(StoreError::Concurrency(msg)),
            DispatchError::Store(e) => ServiceError::Store(e),
        }
    }
}

impl From<DispatchError<DomainError>> for ServiceError {
    fn from(value: DispatchError<DomainError>) -> Self {
        match value {
            DispatchError::Rejected(e) => ServiceError::Domain(e),
            DispatchError::Concurrency(msg) => ServiceError::Store(StoreError::Concurrency(msg)),
            DispatchError::Store(e) => ServiceError::Store(e),
        }
    }
}

pub type InventoryEventStore = Arc<dyn EventStore<InventoryEvent>>;
pub type ProductEventStore = Arc<dyn EventStore<ProductEvent>>;

/// Fully wired service set.
#[derive(Clone)]
pub struct PharmacyServices {
    pub catalog: Arc<CatalogService>,
    pub allocation: Arc<AllocationService>,
    pub forecast: Arc<ForecastService>,
}

impl PharmacyServices {
    /// Wire every service over in-memory stores and read models.
    pub fn in_memory(settings: &Settings) -> Result<Self, ServiceError> {
        let product_store: ProductEventStore = Arc::new(InMemoryEventStore::<ProductEvent>::new());
        let inventory_store: InventoryEventStore = Arc::new(InMemoryEventStore::<InventoryEvent>::new());

        let products = Arc::new(ProductCatalogProjection::new());
        let ledger = Arc::new(InMemoryAllocationLedger::new());
        let history = Arc::new(InMemorySalesHistory::new());
        let sales = Arc::new(SalesProjection::new(ledger, history.clone()));

        let catalog = Arc::new(CatalogService::new(product_store, products.clone()));
        let allocation = Arc::new(AllocationService::new(
            inventory_store.clone(),
            products.clone(),
            sales,
            &settings.allocation,
        ));
        let forecast = Arc::new(ForecastService::new(
            settings.forecast.clone(),
            settings.seasonality.clone(),
            products,
            inventory_store,
            history,
        )?);

        Ok(Self {
            catalog,
            allocation,
            forecast,
        })
    }
}
