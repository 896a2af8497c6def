use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use pharmastock_core::ProductId;

use crate::config::{ConfidenceWeights, DemandThresholds, ForecastConfig};
use crate::history::{DailySeries, SaleObservation, mean, variance_sample};
use crate::result::{
    DailyForecast, DemandLevel, ForecastError, ForecastResult, ForecastWarning, MovingAverages,
    ReorderRecommendation, Seasonality, Trend, TrendDirection, Urgency,
};
use crate::seasonality::{SeasonalProfile, SeasonalityTable};

/// What the forecaster needs to know about a product.
///
/// Kept separate from the catalog aggregate so this crate stays independent
/// of the stock and catalog models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductProfile {
    pub product_id: ProductId,
    pub category: String,
    pub reorder_level: i64,
}

/// Snapshot a single forecast runs on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInput {
    pub product: ProductProfile,
    /// Sale lines, ascending by time. Lines outside the window are ignored.
    pub observations: Vec<SaleObservation>,
    /// Sum of active batch quantities (may be slightly stale).
    pub current_stock: i64,
    /// Last day of history; the forecast starts the day after.
    pub as_of: NaiveDate,
    /// First day the product could sell (its first stock receipt). `None`
    /// when it predates the history window.
    #[serde(default)]
    pub history_start: Option<NaiveDate>,
}

/// Deterministic demand forecaster.
///
/// Pipeline:
/// - bucket sales into a daily series ending at `as_of`
/// - 7/30/90-day moving averages, demand level from the 30-day average
/// - week-over-week trend
/// - category seasonality applied per forecast day
/// - confidence from data volume, recency and consistency
/// - reorder point with safety stock
#[derive(Debug, Clone)]
pub struct DemandForecaster {
    config: ForecastConfig,
    seasonality: SeasonalityTable,
}

impl DemandForecaster {
    pub fn new(config: ForecastConfig, seasonality: SeasonalityTable) -> Result<Self, ForecastError> {
        config.validate()?;
        seasonality.validate()?;
        Ok(Self {
            config,
            seasonality,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn seasonality(&self) -> &SeasonalityTable {
        &self.seasonality
    }

    /// Run the pipeline. Never fails: an empty history yields a
    /// zero-confidence result flagged with `ForecastWarning::NoHistory`.
    pub fn forecast(&self, input: &ForecastInput) -> ForecastResult {
        let cfg = &self.config;
        let series = DailySeries::build(
            &input.observations,
            input.as_of,
            cfg.history_window_days,
            input.history_start,
        );
        let profile = self.seasonality.profile(&input.product.category);
        let seasonality = seasonality_on(&profile, input.as_of, cfg);

        if series.is_empty() {
            return self.no_history(input, seasonality);
        }

        let averages = MovingAverages {
            avg_7: series.moving_average(7),
            avg_30: series.moving_average(30),
            avg_90: series.moving_average(90),
        };
        let demand = classify_demand(averages.avg_30, &cfg.demand);

        let recent = series.trailing(7);
        let previous = series.preceding(7, 7);
        let trend = if previous.is_empty() {
            Trend {
                recent_avg: mean(recent),
                ..Trend::stable()
            }
        } else {
            classify_trend(mean(recent), mean(previous), cfg.trend_threshold)
        };

        let confidence = confidence_score(&series, input.as_of, &cfg.confidence);
        let baseline = cfg.blend(averages.avg_7, averages.avg_30, averages.avg_90);
        let daily_forecast = self.project(&profile, baseline, confidence, input.as_of);
        let total_forecast = daily_forecast.iter().map(|d| d.quantity).sum();

        let reorder = self.recommend(&series, daily_usage(&averages), input);

        ForecastResult {
            product_id: input.product.product_id,
            as_of: input.as_of,
            history_window_days: cfg.history_window_days,
            observation_count: series.observation_count(),
            moving_averages: averages,
            baseline_daily_rate: baseline,
            demand,
            trend,
            seasonality,
            daily_forecast,
            total_forecast,
            confidence,
            reorder,
            warnings: Vec::new(),
        }
    }

    /// Forecast several products; the most urgent reorders come first.
    pub fn forecast_many(&self, inputs: &[ForecastInput]) -> Vec<ForecastResult> {
        let mut results: Vec<ForecastResult> = inputs.iter().map(|i| self.forecast(i)).collect();
        results.sort_by(|a, b| {
            a.reorder
                .urgency
                .cmp(&b.reorder.urgency)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        results
    }

    fn no_history(&self, input: &ForecastInput, seasonality: Seasonality) -> ForecastResult {
        let cfg = &self.config;
        let daily_forecast = (1..=i64::from(cfg.horizon_days))
            .map(|offset| DailyForecast {
                date: input.as_of + Duration::days(offset),
                quantity: 0.0,
                best_case: 0.0,
                worst_case: 0.0,
            })
            .collect();

        ForecastResult {
            product_id: input.product.product_id,
            as_of: input.as_of,
            history_window_days: cfg.history_window_days,
            observation_count: 0,
            moving_averages: MovingAverages {
                avg_7: 0.0,
                avg_30: 0.0,
                avg_90: 0.0,
            },
            baseline_daily_rate: 0.0,
            demand: DemandLevel::None,
            trend: Trend::stable(),
            seasonality,
            daily_forecast,
            total_forecast: 0.0,
            confidence: 0.0,
            reorder: ReorderRecommendation {
                urgency: Urgency::None,
                suggested_quantity: 0,
                reorder_point: 0.0,
                safety_stock: 0.0,
                current_stock: input.current_stock,
                daily_usage: 0.0,
                days_of_stock_remaining: None,
                message: format!(
                    "no sales in the last {} days; forecast confidence is zero, review stock manually",
                    cfg.history_window_days
                ),
            },
            warnings: vec![ForecastWarning::NoHistory],
        }
    }

    fn project(
        &self,
        profile: &SeasonalProfile,
        baseline: f64,
        confidence: f64,
        as_of: NaiveDate,
    ) -> Vec<DailyForecast> {
        let cfg = &self.config;
        let uncertainty = cfg.uncertainty_scale * (1.0 - confidence);

        (1..=i64::from(cfg.horizon_days))
            .map(|offset| {
                let date = as_of + Duration::days(offset);
                let quantity = baseline * profile.multiplier(date.month(), &cfg.seasonal);
                DailyForecast {
                    date,
                    quantity,
                    best_case: quantity * (1.0 + uncertainty),
                    worst_case: (quantity * (1.0 - uncertainty)).max(0.0),
                }
            })
            .collect()
    }

    fn recommend(
        &self,
        series: &DailySeries,
        daily_usage: f64,
        input: &ForecastInput,
    ) -> ReorderRecommendation {
        let cfg = &self.config;
        let variance = variance_sample(series.trailing(30));
        let safety_stock = cfg.service_level_z * variance.sqrt() * daily_usage;
        let reorder_point = daily_usage * cfg.supplier_lead_time_days + safety_stock;

        let stock = input.current_stock;
        let level = input.product.reorder_level;
        let s = stock as f64;

        let urgency = if stock <= 0 {
            Urgency::Critical
        } else if s <= 0.5 * reorder_point {
            Urgency::High
        } else if s <= reorder_point {
            Urgency::Medium
        } else if stock <= level {
            Urgency::Low
        } else {
            Urgency::None
        };

        // Without measurable usage the reorder point is zero; restock to the
        // product's reorder level instead.
        let restock_anchor = if reorder_point > 0.0 { reorder_point } else { level as f64 };
        let target = match urgency {
            Urgency::None => s,
            Urgency::Low => level as f64 * cfg.restock_multiplier,
            _ => restock_anchor * cfg.restock_multiplier,
        };
        let suggested_quantity = (target - s).ceil().max(0.0) as i64;

        let days_of_stock_remaining = if daily_usage > 0.0 {
            Some(s.max(0.0) / daily_usage)
        } else {
            None
        };

        let message = match urgency {
            Urgency::Critical => {
                format!("out of stock; order {suggested_quantity} units immediately")
            }
            Urgency::High => format!(
                "stock {stock} is at or below half the reorder point ({reorder_point:.1}); order {suggested_quantity} units"
            ),
            Urgency::Medium => format!(
                "stock {stock} is at or below the reorder point ({reorder_point:.1}); order {suggested_quantity} units"
            ),
            Urgency::Low => format!(
                "stock {stock} is at or below the reorder level ({level}); consider ordering {suggested_quantity} units"
            ),
            Urgency::None => format!("stock {stock} is above the reorder point ({reorder_point:.1})"),
        };

        ReorderRecommendation {
            urgency,
            suggested_quantity,
            reorder_point,
            safety_stock,
            current_stock: stock,
            daily_usage,
            days_of_stock_remaining,
            message,
        }
    }
}

fn seasonality_on(profile: &SeasonalProfile, as_of: NaiveDate, cfg: &ForecastConfig) -> Seasonality {
    Seasonality {
        seasonal: profile.seasonal,
        peak_months: profile.peak_months.iter().copied().collect(),
        in_peak: profile.is_peak(as_of.month()),
        multiplier: profile.multiplier(as_of.month(), &cfg.seasonal),
    }
}

/// Daily usage for reorder maths: the 30-day average, or the 90-day average
/// when the last month had no sales.
fn daily_usage(averages: &MovingAverages) -> f64 {
    if averages.avg_30 > 0.0 {
        averages.avg_30
    } else {
        averages.avg_90
    }
}

/// Demand level for an average daily quantity.
pub fn classify_demand(avg_daily: f64, thresholds: &DemandThresholds) -> DemandLevel {
    if avg_daily >= thresholds.high {
        DemandLevel::High
    } else if avg_daily >= thresholds.medium {
        DemandLevel::Medium
    } else if avg_daily > 0.0 {
        DemandLevel::Low
    } else {
        DemandLevel::None
    }
}

/// Trend from the recent and previous weekly averages.
///
/// A zero previous average cannot be compared against and reads as stable.
pub fn classify_trend(recent_avg: f64, previous_avg: f64, threshold: f64) -> Trend {
    if previous_avg <= 0.0 {
        return Trend {
            recent_avg,
            previous_avg,
            ..Trend::stable()
        };
    }

    let change_ratio = (recent_avg - previous_avg) / previous_avg;
    let direction = if change_ratio >= threshold {
        TrendDirection::Increasing
    } else if change_ratio <= -threshold {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    Trend {
        direction,
        change_ratio,
        percentage: change_ratio * 100.0,
        recent_avg,
        previous_avg,
    }
}

/// Weighted confidence in \[0, 1\]; zero for an empty series.
pub fn confidence_score(series: &DailySeries, as_of: NaiveDate, weights: &ConfidenceWeights) -> f64 {
    let Some(last_sale) = series.last_sale() else {
        return 0.0;
    };

    let data_points =
        (series.observation_count() as f64 / f64::from(weights.target_observations)).min(1.0);

    let age = (as_of - last_sale).num_days();
    let recency = if age <= weights.recency_full_days {
        1.0
    } else {
        let span = (weights.recency_zero_days - weights.recency_full_days) as f64;
        (1.0 - (age - weights.recency_full_days) as f64 / span).max(0.0)
    };

    let recent = series.trailing(30);
    let m = mean(recent);
    let consistency = if m > 0.0 {
        let cv = variance_sample(recent).sqrt() / m;
        1.0 / (1.0 + cv)
    } else {
        0.0
    };

    (weights.data_points * data_points + weights.recency * recency + weights.consistency * consistency)
        .clamp(0.0, 1.0)
}
