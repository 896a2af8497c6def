//! Category seasonality table.
//!
//! Loaded from configuration at startup; categories not listed are treated as
//! non-seasonal. Lookups ignore case and surrounding whitespace.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::SeasonalFactors;
use crate::result::ForecastError;

/// Seasonal behaviour of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalProfile {
    pub seasonal: bool,
    /// Month numbers (1-12) with elevated demand.
    #[serde(default)]
    pub peak_months: BTreeSet<u32>,
}

impl SeasonalProfile {
    pub fn non_seasonal() -> Self {
        Self {
            seasonal: false,
            peak_months: BTreeSet::new(),
        }
    }

    pub fn peaking_in(months: impl IntoIterator<Item = u32>) -> Self {
        Self {
            seasonal: true,
            peak_months: months.into_iter().collect(),
        }
    }

    pub fn is_peak(&self, month: u32) -> bool {
        self.seasonal && self.peak_months.contains(&month)
    }

    /// Multiplier applied to the baseline rate for a day in `month`.
    pub fn multiplier(&self, month: u32, factors: &SeasonalFactors) -> f64 {
        if !self.seasonal {
            1.0
        } else if self.peak_months.contains(&month) {
            factors.peak
        } else {
            factors.off_peak
        }
    }
}

/// Mapping category -> seasonal profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, SeasonalProfile>",
    into = "BTreeMap<String, SeasonalProfile>"
)]
pub struct SeasonalityTable {
    categories: BTreeMap<String, SeasonalProfile>,
}

impl From<BTreeMap<String, SeasonalProfile>> for SeasonalityTable {
    fn from(raw: BTreeMap<String, SeasonalProfile>) -> Self {
        let mut table = Self::new();
        for (category, profile) in raw {
            table.insert(&category, profile);
        }
        table
    }
}

impl From<SeasonalityTable> for BTreeMap<String, SeasonalProfile> {
    fn from(table: SeasonalityTable) -> Self {
        table.categories
    }
}

fn normalise(category: &str) -> String {
    category.trim().to_lowercase()
}

impl SeasonalityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table shipped as the default configuration for a retail pharmacy.
    pub fn pharmacy_defaults() -> Self {
        Self::new()
            .with_category("Cold & Flu", SeasonalProfile::peaking_in([10, 11, 12, 1, 2]))
            .with_category("Allergy", SeasonalProfile::peaking_in([3, 4, 5, 6]))
            .with_category("Sun Care", SeasonalProfile::peaking_in([5, 6, 7, 8]))
            .with_category("Rehydration", SeasonalProfile::peaking_in([6, 7, 8]))
            .with_category("Pain Relief", SeasonalProfile::non_seasonal())
            .with_category("Vitamins", SeasonalProfile::non_seasonal())
    }

    pub fn with_category(mut self, category: &str, profile: SeasonalProfile) -> Self {
        self.insert(category, profile);
        self
    }

    pub fn insert(&mut self, category: &str, profile: SeasonalProfile) {
        self.categories.insert(normalise(category), profile);
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Profile for `category`; unknown categories are non-seasonal.
    pub fn profile(&self, category: &str) -> SeasonalProfile {
        self.categories
            .get(&normalise(category))
            .cloned()
            .unwrap_or_else(SeasonalProfile::non_seasonal)
    }

    /// Parse a table from JSON (`{"Cold & Flu": {"seasonal": true, "peak_months": [12, 1]}}`).
    pub fn from_json_str(json: &str) -> Result<Self, ForecastError> {
        let table: Self = serde_json::from_str(json)
            .map_err(|e| ForecastError::InvalidConfig(format!("seasonality table: {e}")))?;
        table.validate()?;
        Ok(table)
    }

    /// Every peak month must be a real month.
    pub fn validate(&self) -> Result<(), ForecastError> {
        for (category, profile) in &self.categories {
            if let Some(bad) = profile.peak_months.iter().find(|m| !(1..=12).contains(*m)) {
                return Err(ForecastError::InvalidConfig(format!(
                    "seasonality table: category '{category}' has invalid peak month {bad}"
                )));
            }
        }
        Ok(())
    }
}
