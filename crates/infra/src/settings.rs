//! Settings loading.
//!
//! Layers, later ones winning:
//! 1. Defaults in code (`Settings::default()`)
//! 2. `config/default.toml`, then `config/<environment>.toml` (both optional)
//! 3. Environment variables with the `PHARMASTOCK__` prefix, `__` between keys
//!    (`PHARMASTOCK__FORECAST__SUPPLIER_LEAD_TIME_DAYS=14`)

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pharmastock_forecasting::{ForecastConfig, ForecastError, SeasonalityTable};

/// Environment variable selecting the settings file.
pub const ENVIRONMENT_VAR: &str = "PHARMASTOCK_ENV";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error(transparent)]
    Invalid(#[from] ForecastError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationSettings {
    /// Extra attempts after a conflicting commit before a sale gives up.
    pub max_commit_retries: u32,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            max_commit_retries: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub forecast: ForecastConfig,
    pub allocation: AllocationSettings,
    pub seasonality: SeasonalityTable,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            forecast: ForecastConfig::default(),
            allocation: AllocationSettings::default(),
            seasonality: SeasonalityTable::pharmacy_defaults(),
        }
    }
}

impl Settings {
    /// Load from `./config` for the environment named by `PHARMASTOCK_ENV`
    /// (default `development`).
    pub fn load() -> Result<Self, SettingsError> {
        let environment = std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".into());
        Self::load_from("config", &environment)
    }

    pub fn load_from(dir: &str, environment: &str) -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::with_name(&format!("{dir}/default")).required(false))
            .add_source(File::with_name(&format!("{dir}/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("PHARMASTOCK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(config)
    }

    /// Parse settings from TOML text layered over the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        Self::finish(config)
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        self.forecast.validate()?;
        self.seasonality.validate()
    }

    fn finish(config: Config) -> Result<Self, SettingsError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sources_give_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.allocation.max_commit_retries, 5);
        assert!(settings.seasonality.profile("Cold & Flu").seasonal);
    }

    #[test]
    fn file_overrides_individual_tunables() {
        let settings = Settings::from_toml_str(
            r#"
            [forecast]
            supplier_lead_time_days = 14.0
            history_window_days = 60

            [forecast.demand]
            high = 20.0

            [allocation]
            max_commit_retries = 2
            "#,
        )
        .unwrap();

        assert_eq!(settings.forecast.supplier_lead_time_days, 14.0);
        assert_eq!(settings.forecast.history_window_days, 60);
        assert_eq!(settings.forecast.demand.high, 20.0);
        assert_eq!(settings.forecast.demand.medium, 3.0);
        assert_eq!(settings.allocation.max_commit_retries, 2);
    }

    #[test]
    fn seasonality_section_replaces_the_table() {
        let settings = Settings::from_toml_str(
            r#"
            [seasonality.eye_care]
            seasonal = true
            peak_months = [4, 5]
            "#,
        )
        .unwrap();

        assert_eq!(settings.seasonality.len(), 1);
        assert!(settings.seasonality.profile("Eye_Care").is_peak(4));
        assert!(!settings.seasonality.profile("Cold & Flu").seasonal);
    }

    #[test]
    fn invalid_tunables_are_rejected() {
        let err = Settings::from_toml_str(
            r#"
            [forecast]
            horizon_days = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(ForecastError::InvalidConfig(_))));
    }

    #[test]
    fn missing_files_are_optional() {
        let settings = Settings::load_from("does/not/exist", "test").unwrap();
        assert_eq!(settings.forecast, ForecastConfig::default());
    }
}
