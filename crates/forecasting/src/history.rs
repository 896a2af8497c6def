//! Sales history input and daily bucketing.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pharmastock_core::ProductId;

/// One historical sale line. Append-only input to forecasting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleObservation {
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Zero-filled daily totals from the start of the window through `as_of`.
///
/// The window start is clamped to `history_start` when the product has a
/// shorter history, so a new product averages over the days it has existed
/// while an old product with few sales averages over the whole window.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    days: Vec<f64>,
    observation_count: usize,
    last_sale: Option<NaiveDate>,
}

impl DailySeries {
    /// Bucket observations falling in `(as_of - window_days, as_of]`.
    ///
    /// `history_start` is the first day the product could have sold; `None`
    /// means the product predates the window.
    pub fn build(
        observations: &[SaleObservation],
        as_of: NaiveDate,
        window_days: u32,
        history_start: Option<NaiveDate>,
    ) -> Self {
        let window_start = as_of - Duration::days(i64::from(window_days.max(1)) - 1);

        let in_window: Vec<(NaiveDate, i64)> = observations
            .iter()
            .map(|o| (o.occurred_at.date_naive(), o.quantity))
            .filter(|(day, _)| *day >= window_start && *day <= as_of)
            .collect();

        let Some(first_sale) = in_window.iter().map(|(day, _)| *day).min() else {
            return Self {
                days: Vec::new(),
                observation_count: 0,
                last_sale: None,
            };
        };

        let first_day = history_start
            .map_or(window_start, |start| start.max(window_start))
            .min(first_sale);

        let len = (as_of - first_day).num_days() as usize + 1;
        let mut days = vec![0.0; len];
        for (day, qty) in &in_window {
            let idx = (*day - first_day).num_days() as usize;
            days[idx] += *qty as f64;
        }

        Self {
            days,
            observation_count: in_window.len(),
            last_sale: in_window.iter().map(|(day, _)| *day).max(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observation_count == 0
    }

    pub fn observation_count(&self) -> usize {
        self.observation_count
    }

    pub fn last_sale(&self) -> Option<NaiveDate> {
        self.last_sale
    }

    /// Number of days covered (series start through `as_of`).
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// The trailing `n` days (or all of them when the series is shorter).
    pub fn trailing(&self, n: usize) -> &[f64] {
        let start = self.days.len().saturating_sub(n);
        &self.days[start..]
    }

    /// The `n` days immediately preceding the trailing `skip` days.
    pub fn preceding(&self, skip: usize, n: usize) -> &[f64] {
        let end = self.days.len().saturating_sub(skip);
        let start = end.saturating_sub(n);
        &self.days[start..end]
    }

    /// Mean daily quantity over the trailing `n` days.
    pub fn moving_average(&self, n: usize) -> f64 {
        mean(self.trailing(n))
    }
}

pub(crate) fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / (xs.len() as f64)
}

/// Sample variance (n-1); zero for fewer than two points.
pub(crate) fn variance_sample(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter()
        .map(|x| {
            let d = x - m;
            d * d
        })
        .sum::<f64>()
        / ((xs.len() - 1) as f64)
}
