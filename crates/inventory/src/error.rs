use thiserror::Error;

use pharmastock_core::{DomainError, ProductId};

/// Inventory failures. Every variant leaves batch state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Requested quantity was zero or negative (caller bug).
    #[error("invalid quantity: {0} (must be > 0)")]
    InvalidQuantity(i64),

    /// Active batches cannot cover the request; the sale must be blocked.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}
