use std::collections::BTreeMap;
use std::sync::RwLock;

use pharmastock_core::{Aggregate, AggregateRoot, ProductId};
use pharmastock_events::EventEnvelope;
use pharmastock_products::{Product, ProductEvent, ProductSnapshot};

use crate::event_store::StoreError;
use crate::read_model::ProductCatalog;

use super::{ProjectionError, advance};

/// Product catalog projection.
///
/// Keeps one rehydrated `Product` per stream; the aggregate version doubles as
/// the stream cursor.
#[derive(Debug, Default)]
pub struct ProductCatalogProjection {
    products: RwLock<BTreeMap<ProductId, Product>>,
}

impl ProductCatalogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<ProductEvent>) -> Result<(), ProjectionError> {
        let mut products = self.products.write().map_err(|_| StoreError::Poisoned)?;
        let product_id = envelope.product_id();
        let product = products
            .entry(product_id)
            .or_insert_with(|| Product::empty(product_id));

        if advance(product.version(), envelope.sequence_number())? {
            product.apply(envelope.payload());
        }
        Ok(())
    }

    /// Apply a product stream from the start, skipping what is already applied.
    pub fn catch_up(&self, stream: &[EventEnvelope<ProductEvent>]) -> Result<(), ProjectionError> {
        for envelope in stream {
            self.apply_envelope(envelope)?;
        }
        Ok(())
    }
}

impl ProductCatalog for ProductCatalogProjection {
    fn product(&self, product_id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        let products = self.products.read().map_err(|_| StoreError::Poisoned)?;
        Ok(products.get(&product_id).and_then(Product::snapshot))
    }

    fn products(&self) -> Result<Vec<ProductSnapshot>, StoreError> {
        let products = self.products.read().map_err(|_| StoreError::Poisoned)?;
        Ok(products.values().filter_map(Product::snapshot).collect())
    }
}
