use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, info};

use pharmastock_core::ProductId;
use pharmastock_forecasting::{
    DemandForecaster, ForecastConfig, ForecastInput, ForecastResult, ForecastWarning, ProductProfile,
    SeasonalityTable, Urgency,
};
use pharmastock_inventory::ProductInventory;
use pharmastock_products::ProductSnapshot;

use crate::command_dispatcher::CommandDispatcher;
use crate::read_model::{ProductCatalog, SalesHistory};

use super::{InventoryEventStore, ServiceError};

/// Read-only forecasting over catalog, stock and sales history.
///
/// Never writes; safe to call concurrently with allocations (stock may be a
/// slightly stale snapshot).
pub struct ForecastService {
    forecaster: DemandForecaster,
    catalog: Arc<dyn ProductCatalog>,
    inventory: CommandDispatcher<InventoryEventStore>,
    history: Arc<dyn SalesHistory>,
}

impl ForecastService {
    pub fn new(
        config: ForecastConfig,
        seasonality: SeasonalityTable,
        catalog: Arc<dyn ProductCatalog>,
        inventory: InventoryEventStore,
        history: Arc<dyn SalesHistory>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            forecaster: DemandForecaster::new(config, seasonality)?,
            catalog,
            inventory: CommandDispatcher::new(inventory),
            history,
        })
    }

    pub fn forecaster(&self) -> &DemandForecaster {
        &self.forecaster
    }

    /// Forecast one product over the configured history window, as of the end
    /// of `as_of`.
    pub fn forecast(&self, product_id: ProductId, as_of: NaiveDate) -> Result<ForecastResult, ServiceError> {
        let product = self.product(product_id)?;
        let input = self.input(&product, as_of, self.forecaster.config().history_window_days)?;
        Ok(self.run(&self.forecaster, &input))
    }

    /// Forecast one product over an explicit history window.
    pub fn forecast_with_window(
        &self,
        product_id: ProductId,
        as_of: NaiveDate,
        history_window_days: u32,
    ) -> Result<ForecastResult, ServiceError> {
        let forecaster = DemandForecaster::new(
            self.forecaster
                .config()
                .clone()
                .with_history_window_days(history_window_days),
            self.forecaster.seasonality().clone(),
        )?;
        let product = self.product(product_id)?;
        let input = self.input(&product, as_of, history_window_days)?;
        Ok(self.run(&forecaster, &input))
    }

    /// Forecast every catalogued product, most urgent reorder first.
    pub fn forecast_all(&self, as_of: NaiveDate) -> Result<Vec<ForecastResult>, ServiceError> {
        let window = self.forecaster.config().history_window_days;
        let inputs = self
            .catalog
            .products()?
            .iter()
            .map(|p| self.input(p, as_of, window))
            .collect::<Result<Vec<_>, _>>()?;

        let results = self.forecaster.forecast_many(&inputs);
        info!(
            as_of = %as_of,
            products = results.len(),
            needing_reorder = results
                .iter()
                .filter(|r| r.reorder.urgency != Urgency::None)
                .count(),
            "forecast run complete"
        );
        Ok(results)
    }

    fn product(&self, product_id: ProductId) -> Result<ProductSnapshot, ServiceError> {
        self.catalog
            .product(product_id)?
            .ok_or(ServiceError::ProductNotFound(product_id))
    }

    fn input(&self, product: &ProductSnapshot, as_of: NaiveDate, window_days: u32) -> Result<ForecastInput, ServiceError> {
        // Whole days: from the start of the first window day to the end of `as_of`.
        let first_day = as_of - Duration::days(i64::from(window_days.max(1)) - 1);
        let since = first_day.and_time(NaiveTime::MIN).and_utc();
        let until = (as_of + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();

        let observations = self.history.observations(product.product_id, since, until)?;
        let inventory = self
            .inventory
            .load(product.product_id, ProductInventory::empty)?;

        Ok(ForecastInput {
            product: ProductProfile {
                product_id: product.product_id,
                category: product.category.clone(),
                reorder_level: product.reorder_level,
            },
            observations,
            current_stock: inventory.available_quantity(),
            as_of,
            history_start: inventory
                .batches()
                .iter()
                .map(|b| b.created_at.date_naive())
                .min(),
        })
    }

    fn run(&self, forecaster: &DemandForecaster, input: &ForecastInput) -> ForecastResult {
        let result = forecaster.forecast(input);
        if result.warnings.contains(&ForecastWarning::NoHistory) {
            debug!(product_id = %result.product_id, "no sales history in window");
        }
        debug!(
            product_id = %result.product_id,
            demand = ?result.demand,
            trend = ?result.trend.direction,
            confidence = result.confidence,
            urgency = ?result.reorder.urgency,
            suggested_quantity = result.reorder.suggested_quantity,
            "forecast computed"
        );
        result
    }
}
