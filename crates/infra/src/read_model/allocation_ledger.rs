use std::sync::{Arc, RwLock};

use pharmastock_core::{ProductId, SaleId};
use pharmastock_inventory::AllocationRecord;

use crate::event_store::StoreError;

/// Append-only log of per-batch allocation records (COGS and profit lines).
pub trait AllocationLedger: Send + Sync {
    /// Append the records of one sale. A sale already in the log is left as
    /// it is, so replaying a partly projected envelope does not double it.
    fn append(&self, records: Vec<AllocationRecord>) -> Result<(), StoreError>;

    /// Records of one sale, in consumption order.
    fn for_sale(&self, sale_id: SaleId) -> Result<Vec<AllocationRecord>, StoreError>;

    /// Every record for a product, oldest sale first.
    fn for_product(&self, product_id: ProductId) -> Result<Vec<AllocationRecord>, StoreError>;
}

impl<S> AllocationLedger for Arc<S>
where
    S: AllocationLedger + ?Sized,
{
    fn append(&self, records: Vec<AllocationRecord>) -> Result<(), StoreError> {
        (**self).append(records)
    }

    fn for_sale(&self, sale_id: SaleId) -> Result<Vec<AllocationRecord>, StoreError> {
        (**self).for_sale(sale_id)
    }

    fn for_product(&self, product_id: ProductId) -> Result<Vec<AllocationRecord>, StoreError> {
        (**self).for_product(product_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAllocationLedger {
    records: RwLock<Vec<AllocationRecord>>,
}

impl InMemoryAllocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(&self, keep: impl Fn(&AllocationRecord) -> bool) -> Result<Vec<AllocationRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.iter().filter(|r| keep(r)).cloned().collect())
    }
}

impl AllocationLedger for InMemoryAllocationLedger {
    fn append(&self, records: Vec<AllocationRecord>) -> Result<(), StoreError> {
        if let Some(bad) = records.iter().find(|r| r.quantity <= 0) {
            return Err(StoreError::InvalidRecord(format!(
                "allocation record for batch {} has quantity {}",
                bad.batch_number, bad.quantity
            )));
        }

        let mut log = self.records.write().map_err(|_| StoreError::Poisoned)?;
        let already_logged = records
            .first()
            .is_some_and(|first| log.iter().any(|r| r.sale_id == first.sale_id));
        if !already_logged {
            log.extend(records);
        }
        Ok(())
    }

    fn for_sale(&self, sale_id: SaleId) -> Result<Vec<AllocationRecord>, StoreError> {
        self.select(|r| r.sale_id == sale_id)
    }

    fn for_product(&self, product_id: ProductId) -> Result<Vec<AllocationRecord>, StoreError> {
        self.select(|r| r.product_id == product_id)
    }
}
