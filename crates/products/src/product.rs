use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pharmastock_core::{Aggregate, AggregateRoot, DomainError, ProductId};
use pharmastock_events::Event;

/// Read-side view of a product, handed to the allocator and the forecaster.
///
/// `unit_price` is the manually set sale price in the smallest currency unit.
/// It is never derived from batch costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub unit_price: u64,
    pub reorder_level: i64,
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    category: String,
    unit_price: u64,
    reorder_level: i64,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            name: String::new(),
            category: String::new(),
            unit_price: 0,
            reorder_level: 0,
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn reorder_level(&self) -> i64 {
        self.reorder_level
    }

    /// Snapshot of the current state; `None` until the product is created.
    pub fn snapshot(&self) -> Option<ProductSnapshot> {
        if !self.created {
            return None;
        }
        Some(ProductSnapshot {
            product_id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            unit_price: self.unit_price,
            reorder_level: self.reorder_level,
        })
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub unit_price: u64,
    pub reorder_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangePrice (manual price control).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePrice {
    pub product_id: ProductId,
    pub unit_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetReorderLevel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReorderLevel {
    pub product_id: ProductId,
    pub reorder_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeCategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCategory {
    pub product_id: ProductId,
    pub category: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    ChangePrice(ChangePrice),
    SetReorderLevel(SetReorderLevel),
    ChangeCategory(ChangeCategory),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub unit_price: u64,
    pub reorder_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PriceChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChanged {
    pub product_id: ProductId,
    pub previous_price: u64,
    pub unit_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReorderLevelChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderLevelChanged {
    pub product_id: ProductId,
    pub reorder_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CategoryChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryChanged {
    pub product_id: ProductId,
    pub category: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    PriceChanged(PriceChanged),
    ReorderLevelChanged(ReorderLevelChanged),
    CategoryChanged(CategoryChanged),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::PriceChanged(_) => "products.product.price_changed",
            ProductEvent::ReorderLevelChanged(_) => "products.product.reorder_level_changed",
            ProductEvent::CategoryChanged(_) => "products.product.category_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::PriceChanged(e) => e.occurred_at,
            ProductEvent::ReorderLevelChanged(e) => e.occurred_at,
            ProductEvent::CategoryChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.unit_price = e.unit_price;
                self.reorder_level = e.reorder_level;
                self.created = true;
            }
            ProductEvent::PriceChanged(e) => {
                self.unit_price = e.unit_price;
            }
            ProductEvent::ReorderLevelChanged(e) => {
                self.reorder_level = e.reorder_level;
            }
            ProductEvent::CategoryChanged(e) => {
                self.category = e.category.clone();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::ChangePrice(cmd) => self.handle_change_price(cmd),
            ProductCommand::SetReorderLevel(cmd) => self.handle_set_reorder_level(cmd),
            ProductCommand::ChangeCategory(cmd) => self.handle_change_category(cmd),
        }
    }
}

impl Product {
    fn ensure_existing(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if cmd.reorder_level < 0 {
            return Err(DomainError::validation("reorder level cannot be negative"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            name: cmd.name.trim().to_string(),
            category: cmd.category.trim().to_string(),
            unit_price: cmd.unit_price,
            reorder_level: cmd.reorder_level,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_price(&self, cmd: &ChangePrice) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_existing(cmd.product_id)?;

        if cmd.unit_price == self.unit_price {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::PriceChanged(PriceChanged {
            product_id: cmd.product_id,
            previous_price: self.unit_price,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_reorder_level(
        &self,
        cmd: &SetReorderLevel,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_existing(cmd.product_id)?;

        if cmd.reorder_level < 0 {
            return Err(DomainError::validation("reorder level cannot be negative"));
        }

        Ok(vec![ProductEvent::ReorderLevelChanged(ReorderLevelChanged {
            product_id: cmd.product_id,
            reorder_level: cmd.reorder_level,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_category(
        &self,
        cmd: &ChangeCategory,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_existing(cmd.product_id)?;

        if cmd.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }

        Ok(vec![ProductEvent::CategoryChanged(CategoryChanged {
            product_id: cmd.product_id,
            category: cmd.category.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
