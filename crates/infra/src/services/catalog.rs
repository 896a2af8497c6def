use std::sync::Arc;

use tracing::info;

use pharmastock_core::ProductId;
use pharmastock_products::{Product, ProductCommand, ProductSnapshot};

use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;
use crate::projections::ProductCatalogProjection;
use crate::read_model::ProductCatalog;

use super::{PRODUCT_AGGREGATE, ProductEventStore, ServiceError};

/// Product catalog writes (create, reprice, reorder level, category).
pub struct CatalogService {
    dispatcher: CommandDispatcher<ProductEventStore>,
    projection: Arc<ProductCatalogProjection>,
}

impl CatalogService {
    pub fn new(store: ProductEventStore, projection: Arc<ProductCatalogProjection>) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store),
            projection,
        }
    }

    pub fn catalog(&self) -> Arc<dyn ProductCatalog> {
        self.projection.clone()
    }

    /// Execute a catalog command and return the product as it now reads.
    pub fn execute(&self, command: ProductCommand) -> Result<ProductSnapshot, ServiceError> {
        let product_id = command_product_id(&command);
        let dispatched = self
            .dispatcher
            .dispatch(product_id, PRODUCT_AGGREGATE, &command, Product::empty)?;

        let stream = self.dispatcher.store().load_stream(product_id)?;
        self.projection.catch_up(&stream)?;
        for envelope in &dispatched.committed {
            info!(
                product_id = %product_id,
                event_type = envelope.event_type(),
                sequence = envelope.sequence_number(),
                "catalog event committed"
            );
        }

        dispatched
            .aggregate
            .snapshot()
            .ok_or(ServiceError::ProductNotFound(product_id))
    }

    pub fn product(&self, product_id: ProductId) -> Result<Option<ProductSnapshot>, ServiceError> {
        Ok(self.projection.product(product_id)?)
    }
}

fn command_product_id(command: &ProductCommand) -> ProductId {
    match command {
        ProductCommand::CreateProduct(c) => c.product_id,
        ProductCommand::ChangePrice(c) => c.product_id,
        ProductCommand::SetReorderLevel(c) => c.product_id,
        ProductCommand::ChangeCategory(c) => c.product_id,
    }
}
