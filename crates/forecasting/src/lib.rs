//! `pharmastock-forecasting`
//!
//! **Responsibility:** demand analytics over sales history.
//!
//! This crate is intentionally **not** part of the stock model:
//! - It must not depend on the inventory or product aggregates.
//! - It must not mutate any state; every forecast is a pure function of its input.

pub mod config;
pub mod forecaster;
pub mod history;
pub mod result;
pub mod seasonality;

pub use config::{BaselineWeights, ConfidenceWeights, DemandThresholds, ForecastConfig, SeasonalFactors};
pub use forecaster::{
    DemandForecaster, ForecastInput, ProductProfile, classify_demand, classify_trend,
    confidence_score,
};
pub use history::{DailySeries, SaleObservation};
pub use result::{
    DailyForecast, DemandLevel, ForecastError, ForecastResult, ForecastWarning, MovingAverages,
    ReorderRecommendation, Seasonality, Trend, TrendDirection, Urgency,
};
pub use seasonality::{SeasonalProfile, SeasonalityTable};
