//! Forecast tunables.
//!
//! Every threshold the pipeline uses lives here so hosts can override them
//! from configuration instead of editing forecaster logic.

use serde::{Deserialize, Serialize};

use crate::result::ForecastError;

/// Average-daily-quantity thresholds for demand classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandThresholds {
    /// At or above: high demand.
    pub high: f64,
    /// At or above (and below `high`): medium demand. Anything above zero below
    /// this is low.
    pub medium: f64,
}

impl Default for DemandThresholds {
    fn default() -> Self {
        Self {
            high: 10.0,
            medium: 3.0,
        }
    }
}

/// Blend of moving averages that forms the baseline daily rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineWeights {
    pub avg_7: f64,
    pub avg_30: f64,
    pub avg_90: f64,
}

impl Default for BaselineWeights {
    fn default() -> Self {
        Self {
            avg_7: 0.5,
            avg_30: 0.3,
            avg_90: 0.2,
        }
    }
}

impl BaselineWeights {
    fn total(&self) -> f64 {
        self.avg_7 + self.avg_30 + self.avg_90
    }
}

/// Weights and saturation points of the confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub data_points: f64,
    pub recency: f64,
    pub consistency: f64,
    /// Observation count at which the data-points score saturates.
    pub target_observations: u32,
    /// Last sale at most this many days ago scores full recency.
    pub recency_full_days: i64,
    /// Last sale this many days ago (or older) scores zero recency.
    pub recency_zero_days: i64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            data_points: 0.4,
            recency: 0.3,
            consistency: 0.3,
            target_observations: 90,
            recency_full_days: 3,
            recency_zero_days: 30,
        }
    }
}

/// Seasonal adjustment factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalFactors {
    pub peak: f64,
    pub off_peak: f64,
}

impl Default for SeasonalFactors {
    fn default() -> Self {
        Self {
            peak: 1.3,
            off_peak: 0.9,
        }
    }
}

/// Full forecaster configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Days of history considered (and the longest moving average).
    pub history_window_days: u32,
    /// Days forecast ahead.
    pub horizon_days: u32,
    pub demand: DemandThresholds,
    /// Relative change at which a trend counts as increasing/declining.
    pub trend_threshold: f64,
    pub baseline: BaselineWeights,
    pub confidence: ConfidenceWeights,
    pub seasonal: SeasonalFactors,
    /// Best/worst band half-width at zero confidence.
    pub uncertainty_scale: f64,
    pub supplier_lead_time_days: f64,
    /// Service-level z-score for safety stock (1.65 ~ 95%).
    pub service_level_z: f64,
    /// Reorder point multiple a restock should bring stock up to.
    pub restock_multiplier: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            history_window_days: 90,
            horizon_days: 30,
            demand: DemandThresholds::default(),
            trend_threshold: 0.15,
            baseline: BaselineWeights::default(),
            confidence: ConfidenceWeights::default(),
            seasonal: SeasonalFactors::default(),
            uncertainty_scale: 0.3,
            supplier_lead_time_days: 7.0,
            service_level_z: 1.65,
            restock_multiplier: 2.0,
        }
    }
}

impl ForecastConfig {
    pub fn with_history_window_days(mut self, days: u32) -> Self {
        self.history_window_days = days;
        self
    }

    /// Reject configurations the pipeline cannot evaluate meaningfully.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.history_window_days == 0 {
            return Err(invalid("history_window_days must be >= 1"));
        }
        if self.horizon_days == 0 {
            return Err(invalid("horizon_days must be >= 1"));
        }
        if !(self.demand.medium > 0.0 && self.demand.high > self.demand.medium) {
            return Err(invalid("demand thresholds must satisfy 0 < medium < high"));
        }

        let non_negative = [
            ("trend_threshold", self.trend_threshold),
            ("baseline.avg_7", self.baseline.avg_7),
            ("baseline.avg_30", self.baseline.avg_30),
            ("baseline.avg_90", self.baseline.avg_90),
            ("confidence.data_points", self.confidence.data_points),
            ("confidence.recency", self.confidence.recency),
            ("confidence.consistency", self.confidence.consistency),
            ("seasonal.peak", self.seasonal.peak),
            ("seasonal.off_peak", self.seasonal.off_peak),
            ("uncertainty_scale", self.uncertainty_scale),
            ("supplier_lead_time_days", self.supplier_lead_time_days),
            ("service_level_z", self.service_level_z),
            ("restock_multiplier", self.restock_multiplier),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("{name} must be a finite non-negative number")));
            }
        }

        if self.baseline.total() <= 0.0 {
            return Err(invalid("baseline weights must not all be zero"));
        }
        if self.confidence.target_observations == 0 {
            return Err(invalid("confidence.target_observations must be >= 1"));
        }
        if self.confidence.recency_zero_days <= self.confidence.recency_full_days {
            return Err(invalid(
                "confidence.recency_zero_days must exceed confidence.recency_full_days",
            ));
        }

        Ok(())
    }

    /// Weighted baseline, normalised so weights need not sum to one.
    pub(crate) fn blend(&self, avg_7: f64, avg_30: f64, avg_90: f64) -> f64 {
        let w = &self.baseline;
        (w.avg_7 * avg_7 + w.avg_30 * avg_30 + w.avg_90 * avg_90) / w.total()
    }
}

fn invalid(msg: impl Into<String>) -> ForecastError {
    ForecastError::InvalidConfig(msg.into())
}
