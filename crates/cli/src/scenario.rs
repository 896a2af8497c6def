//! Scenario files: a catalog, stock receipts and a sales log replayed through
//! the in-memory services, followed by a forecast run.

use std::collections::BTreeMap;

use anyhow::{Context, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pharmastock_core::{BatchId, ProductId};
use pharmastock_forecasting::ForecastResult;
use pharmastock_infra::{PharmacyServices, ServiceError};
use pharmastock_inventory::{Batch, ReceiveBatch, SaleAllocation};
use pharmastock_products::{CreateProduct, ProductCommand};

/// Products are keyed by SKU inside a scenario; ids are minted on replay.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    pub products: Vec<ScenarioProduct>,
    #[serde(default)]
    pub batches: Vec<ScenarioBatch>,
    #[serde(default)]
    pub sales: Vec<ScenarioSale>,
    /// Look-ahead for the expiring-stock section of the report.
    #[serde(default = "default_expiry_window_days")]
    pub expiry_window_days: i64,
}

fn default_expiry_window_days() -> i64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioProduct {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub unit_price: u64,
    #[serde(default)]
    pub reorder_level: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioBatch {
    pub sku: String,
    pub batch_number: String,
    pub quantity: i64,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    pub unit_cost: u64,
    #[serde(default)]
    pub unit_selling_price: Option<u64>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSale {
    pub sku: String,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaleOutcome {
    Allocated { sku: String, allocation: SaleAllocation },
    Rejected { sku: String, quantity: i64, reason: String },
}

#[derive(Debug, Serialize)]
pub struct StockLine {
    pub sku: String,
    pub available_quantity: i64,
    pub valuation: u64,
    pub expiring: Vec<Batch>,
}

#[derive(Debug, Serialize)]
pub struct ForecastLine {
    pub sku: String,
    #[serde(flatten)]
    pub forecast: ForecastResult,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub as_of: NaiveDate,
    pub sales: Vec<SaleOutcome>,
    pub stock: Vec<StockLine>,
    pub forecasts: Vec<ForecastLine>,
}

impl Scenario {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = serde_json::from_str(text).context("invalid scenario file")?;
        scenario.check_skus()?;
        Ok(scenario)
    }

    /// Latest sale day, or today when the scenario has no sales.
    pub fn effective_as_of(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| {
            self.sales
                .iter()
                .map(|s| s.occurred_at.date_naive())
                .max()
                .unwrap_or_else(|| Utc::now().date_naive())
        })
    }

    fn check_skus(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for p in &self.products {
            if !seen.insert(p.sku.as_str()) {
                bail!("duplicate sku in scenario: {}", p.sku);
            }
        }
        let unknown = self
            .batches
            .iter()
            .map(|b| b.sku.as_str())
            .chain(self.sales.iter().map(|s| s.sku.as_str()))
            .find(|sku| !seen.contains(sku));
        if let Some(sku) = unknown {
            bail!("scenario references unknown sku: {sku}");
        }
        Ok(())
    }

    /// Replay the scenario in file order: products, then receipts, then
    /// sales sorted by time. Rejected sales are reported, not fatal.
    pub fn replay(&self, services: &PharmacyServices) -> anyhow::Result<Report> {
        let as_of = self.effective_as_of();
        let mut ids = BTreeMap::new();

        for p in &self.products {
            let product_id = ProductId::new();
            services
                .catalog
                .execute(ProductCommand::CreateProduct(CreateProduct {
                    product_id,
                    name: p.name.clone(),
                    category: p.category.clone(),
                    unit_price: p.unit_price,
                    reorder_level: p.reorder_level,
                    occurred_at: Utc::now(),
                }))
                .with_context(|| format!("creating product {}", p.sku))?;
            ids.insert(p.sku.clone(), product_id);
        }

        for b in &self.batches {
            let product_id = lookup(&ids, &b.sku)?;
            services
                .allocation
                .receive_batch(ReceiveBatch {
                    product_id,
                    batch_id: BatchId::new(),
                    batch_number: b.batch_number.clone(),
                    quantity: b.quantity,
                    expiry_date: b.expiry_date,
                    unit_cost: b.unit_cost,
                    unit_selling_price: b.unit_selling_price,
                    received_at: b.received_at,
                })
                .with_context(|| format!("receiving batch {} of {}", b.batch_number, b.sku))?;
        }

        let mut sales: Vec<&ScenarioSale> = self.sales.iter().collect();
        sales.sort_by_key(|s| s.occurred_at);

        let mut outcomes = Vec::with_capacity(sales.len());
        for s in sales {
            let product_id = lookup(&ids, &s.sku)?;
            match services.allocation.allocate(product_id, s.quantity, s.occurred_at) {
                Ok(allocation) => outcomes.push(SaleOutcome::Allocated {
                    sku: s.sku.clone(),
                    allocation,
                }),
                Err(e @ ServiceError::Inventory(_)) => {
                    warn!(sku = %s.sku, quantity = s.quantity, error = %e, "sale rejected");
                    outcomes.push(SaleOutcome::Rejected {
                        sku: s.sku.clone(),
                        quantity: s.quantity,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e).with_context(|| format!("allocating sale of {}", s.sku)),
            }
        }

        let skus: BTreeMap<ProductId, String> = ids.iter().map(|(sku, id)| (*id, sku.clone())).collect();

        let mut stock = Vec::with_capacity(ids.len());
        for (sku, product_id) in &ids {
            let inventory = services.allocation.inventory(*product_id)?;
            stock.push(StockLine {
                sku: sku.clone(),
                available_quantity: inventory.available_quantity(),
                valuation: inventory.valuation(),
                expiring: inventory
                    .expiring_within(as_of, self.expiry_window_days)
                    .into_iter()
                    .cloned()
                    .collect(),
            });
        }

        let forecasts = services
            .forecast
            .forecast_all(as_of)?
            .into_iter()
            .map(|forecast| ForecastLine {
                sku: skus.get(&forecast.product_id).cloned().unwrap_or_default(),
                forecast,
            })
            .collect();

        info!(
            as_of = %as_of,
            products = ids.len(),
            sales = outcomes.len(),
            "scenario replayed"
        );

        Ok(Report {
            as_of,
            sales: outcomes,
            stock,
            forecasts,
        })
    }
}

fn lookup(ids: &BTreeMap<String, ProductId>, sku: &str) -> anyhow::Result<ProductId> {
    ids.get(sku)
        .copied()
        .with_context(|| format!("unknown sku: {sku}"))
}
