use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pharmastock_core::{BatchId, ProductId};

/// Batch lifecycle. Depleted batches never take part in allocation again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Active,
    Depleted,
}

/// A discrete lot of stock for one product.
///
/// Money fields are in the smallest currency unit (e.g. cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: BatchId,
    pub product_id: ProductId,
    pub batch_number: String,
    pub quantity_remaining: i64,
    /// `None` means no expiry; such stock is consumed after all dated stock.
    pub expiry_date: Option<NaiveDate>,
    pub unit_cost: u64,
    /// Reference only. Revenue always uses the product price.
    pub unit_selling_price: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub status: BatchStatus,
}

impl Batch {
    pub fn is_allocatable(&self) -> bool {
        self.status == BatchStatus::Active && self.quantity_remaining > 0
    }

    /// Sort key for expiry-first consumption: expiry (absent = latest possible),
    /// then creation time, then id so the order is total.
    pub fn allocation_key(&self) -> (NaiveDate, DateTime<Utc>, BatchId) {
        (
            self.expiry_date.unwrap_or(NaiveDate::MAX),
            self.created_at,
            self.batch_id,
        )
    }

    /// Remaining stock value at purchase cost.
    pub fn value(&self) -> u64 {
        if self.quantity_remaining > 0 {
            (self.quantity_remaining as u64).saturating_mul(self.unit_cost)
        } else {
            0
        }
    }

    /// True when the batch expires on or before `date`.
    pub fn expires_by(&self, date: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= date)
    }
}
