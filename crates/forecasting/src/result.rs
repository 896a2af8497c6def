use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pharmastock_core::ProductId;

/// Demand level from the 30-day average daily quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandLevel {
    High,
    Medium,
    Low,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Declining,
}

/// Week-over-week movement of daily sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Relative change (0.15 = +15%). Zero when there is no previous week to compare.
    pub change_ratio: f64,
    pub percentage: f64,
    pub recent_avg: f64,
    pub previous_avg: f64,
}

impl Trend {
    pub fn stable() -> Self {
        Self {
            direction: TrendDirection::Stable,
            change_ratio: 0.0,
            percentage: 0.0,
            recent_avg: 0.0,
            previous_avg: 0.0,
        }
    }
}

/// Seasonality as it applies on the forecast date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seasonality {
    pub seasonal: bool,
    pub peak_months: Vec<u32>,
    pub in_peak: bool,
    /// Multiplier for the current month.
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub avg_7: f64,
    pub avg_30: f64,
    pub avg_90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub quantity: f64,
    pub best_case: f64,
    pub worst_case: f64,
}

/// Reorder urgency, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Critical,
    High,
    Medium,
    Low,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderRecommendation {
    pub urgency: Urgency,
    pub suggested_quantity: i64,
    pub reorder_point: f64,
    pub safety_stock: f64,
    pub current_stock: i64,
    pub daily_usage: f64,
    /// `None` when there is no measurable usage.
    pub days_of_stock_remaining: Option<f64>,
    pub message: String,
}

/// Non-fatal conditions attached to a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastWarning {
    /// No sales in the history window; the result is a zero-confidence placeholder.
    NoHistory,
}

/// Output of one forecast run. Stable field names for report consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub product_id: ProductId,
    pub as_of: NaiveDate,
    pub history_window_days: u32,
    pub observation_count: usize,
    pub moving_averages: MovingAverages,
    pub baseline_daily_rate: f64,
    pub demand: DemandLevel,
    pub trend: Trend,
    pub seasonality: Seasonality,
    pub daily_forecast: Vec<DailyForecast>,
    pub total_forecast: f64,
    /// In \[0, 1\].
    pub confidence: f64,
    pub reorder: ReorderRecommendation,
    pub warnings: Vec<ForecastWarning>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("invalid forecast configuration: {0}")]
    InvalidConfig(String),
}
