//! # pharmastock
//!
//! Replays a pharmacy scenario (catalog, batch receipts, sales) through the
//! in-memory services and prints sale allocations, stock and forecasts as
//! JSON.
//!
//! ```bash
//! pharmastock run --scenario demos/scenario.json
//! pharmastock run --scenario demos/scenario.json --as-of 2025-06-30 --env production
//! pharmastock settings
//! ```

mod scenario;

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use pharmastock_infra::{PharmacyServices, Settings};
use pharmastock_observability::LogFormat;

use crate::scenario::Scenario;

#[derive(Parser, Debug)]
#[command(name = "pharmastock")]
#[command(about = "Expiry-first stock allocation and demand forecasting")]
#[command(version)]
struct Args {
    /// Directory holding `default.toml` and `<env>.toml`
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,

    /// Settings environment
    #[arg(long, env = "PHARMASTOCK_ENV", default_value = "development", global = true)]
    env: String,

    /// Log line format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormatArg::Json, global = true)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scenario file and print the report
    Run {
        /// Scenario JSON file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Forecast date (defaults to the scenario's, then the last sale day)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },
    /// Print the effective settings
    Settings,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Pretty => LogFormat::Pretty,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    pharmastock_observability::init(args.log_format.into());

    let config_dir = args.config_dir.to_string_lossy();
    let settings = Settings::load_from(&config_dir, &args.env)
        .with_context(|| format!("loading settings from {config_dir} ({})", args.env))?;
    tracing::info!(env = %args.env, config_dir = %config_dir, "settings loaded");

    match args.command {
        Command::Run {
            scenario,
            as_of,
            pretty,
        } => {
            let text = std::fs::read_to_string(&scenario)
                .with_context(|| format!("reading {}", scenario.display()))?;
            let mut scenario = Scenario::from_json(&text)?;
            if as_of.is_some() {
                scenario.as_of = as_of;
            }

            let services = PharmacyServices::in_memory(&settings)?;
            let report = scenario.replay(&services)?;
            print_json(&report, pretty)
        }
        Command::Settings => print_json(&settings, true),
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}
