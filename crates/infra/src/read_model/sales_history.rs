use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use pharmastock_core::ProductId;
use pharmastock_forecasting::SaleObservation;

use crate::event_store::StoreError;

/// Append-only sale-quantity history, the sole input to forecasting.
pub trait SalesHistory: Send + Sync {
    /// Append one observation. Non-positive quantities are rejected here so the
    /// forecaster never sees them.
    fn record(&self, observation: SaleObservation) -> Result<(), StoreError>;

    /// Observations for a product with `since <= occurred_at < until`, ascending
    /// by time. Empty when there are none.
    fn observations(
        &self,
        product_id: ProductId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SaleObservation>, StoreError>;
}

impl<S> SalesHistory for Arc<S>
where
    S: SalesHistory + ?Sized,
{
    fn record(&self, observation: SaleObservation) -> Result<(), StoreError> {
        (**self).record(observation)
    }

    fn observations(
        &self,
        product_id: ProductId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SaleObservation>, StoreError> {
        (**self).observations(product_id, since, until)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySalesHistory {
    inner: RwLock<HashMap<ProductId, Vec<SaleObservation>>>,
}

impl InMemorySalesHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SalesHistory for InMemorySalesHistory {
    fn record(&self, observation: SaleObservation) -> Result<(), StoreError> {
        if observation.quantity <= 0 {
            return Err(StoreError::InvalidRecord(format!(
                "sale quantity must be positive, got {}",
                observation.quantity
            )));
        }

        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        map.entry(observation.product_id).or_default().push(observation);
        Ok(())
    }

    fn observations(
        &self,
        product_id: ProductId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SaleObservation>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned)?;

        let mut out: Vec<SaleObservation> = map
            .get(&product_id)
            .map(|obs| {
                obs.iter()
                    .filter(|o| o.occurred_at >= since && o.occurred_at < until)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // Back-dated sales may be recorded out of order.
        out.sort_by_key(|o| o.occurred_at);
        Ok(out)
    }
}
