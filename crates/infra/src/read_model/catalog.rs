use std::sync::Arc;

use pharmastock_core::ProductId;
use pharmastock_products::ProductSnapshot;

use crate::event_store::StoreError;

/// Product lookup: current price, category and reorder level.
pub trait ProductCatalog: Send + Sync {
    fn product(&self, product_id: ProductId) -> Result<Option<ProductSnapshot>, StoreError>;

    /// All known products, ordered by id.
    fn products(&self) -> Result<Vec<ProductSnapshot>, StoreError>;
}

impl<S> ProductCatalog for Arc<S>
where
    S: ProductCatalog + ?Sized,
{
    fn product(&self, product_id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        (**self).product(product_id)
    }

    fn products(&self) -> Result<Vec<ProductSnapshot>, StoreError> {
        (**self).products()
    }
}
