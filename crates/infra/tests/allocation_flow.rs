//! End-to-end tests: catalog → receipts → sales → read models → forecast.
//!
//! Verifies:
//! - expiry-first consumption and profit figures across batches
//! - failed sales leave stock, ledger and history untouched
//! - concurrent sales of one product never over-consume a batch

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use pharmastock_core::{BatchId, ProductId};
use pharmastock_forecasting::{TrendDirection, Urgency};
use pharmastock_infra::projections::{ProductCatalogProjection, SalesProjection};
use pharmastock_infra::read_model::{
    AllocationLedger, InMemoryAllocationLedger, InMemorySalesHistory, SalesHistory,
};
use pharmastock_infra::services::{AllocationService, CatalogService};
use pharmastock_infra::{
    AllocationSettings, InMemoryEventStore, PharmacyServices, ServiceError, Settings,
};
use pharmastock_inventory::{BatchStatus, InventoryError, ReceiveBatch};
use pharmastock_products::{CreateProduct, ProductCommand, SetReorderLevel};

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn create_product(catalog: &CatalogService, category: &str, price: u64, reorder_level: i64) -> ProductId {
    let product_id = ProductId::new();
    catalog
        .execute(ProductCommand::CreateProduct(CreateProduct {
            product_id,
            name: format!("{category} test product"),
            category: category.to_string(),
            unit_price: price,
            reorder_level,
            occurred_at: at(2025, 1, 1),
        }))
        .unwrap();
    product_id
}

fn receive(
    allocation: &AllocationService,
    product_id: ProductId,
    number: &str,
    qty: i64,
    expiry: Option<NaiveDate>,
    cost: u64,
    received_at: DateTime<Utc>,
) -> BatchId {
    let batch_id = BatchId::new();
    allocation
        .receive_batch(ReceiveBatch {
            product_id,
            batch_id,
            batch_number: number.to_string(),
            quantity: qty,
            expiry_date: expiry,
            unit_cost: cost,
            unit_selling_price: Some(cost * 2),
            received_at,
        })
        .unwrap();
    batch_id
}

#[test]
fn expiry_first_sale_across_three_batches() {
    let svc = PharmacyServices::in_memory(&Settings::default()).unwrap();
    let p = create_product(&svc.catalog, "Pain Relief", 50, 20);

    // Received out of expiry order; the undated batch goes last.
    let undated = receive(&svc.allocation, p, "NODATE", 100, None, 10, at(2025, 1, 1));
    let late = receive(&svc.allocation, p, "LATE", 100, Some(date(2025, 12, 15)), 35, at(2025, 1, 2));
    let early = receive(&svc.allocation, p, "EARLY", 100, Some(date(2025, 12, 1)), 30, at(2025, 1, 3));

    let sale = svc.allocation.allocate(p, 150, at(2025, 11, 10)).unwrap();
    assert_eq!(sale.revenue, 7500);
    assert_eq!(sale.total_cost, 4750);
    assert_eq!(sale.profit, 2750);
    let consumed: Vec<(&str, i64)> = sale
        .allocations
        .iter()
        .map(|r| (r.batch_number.as_str(), r.quantity))
        .collect();
    assert_eq!(consumed, vec![("EARLY", 100), ("LATE", 50)]);

    let inventory = svc.allocation.inventory(p).unwrap();
    assert_eq!(inventory.batch(early).unwrap().status, BatchStatus::Depleted);
    assert_eq!(inventory.batch(late).unwrap().quantity_remaining, 50);
    assert_eq!(inventory.batch(undated).unwrap().quantity_remaining, 100);
    assert_eq!(inventory.available_quantity(), 150);
    assert_eq!(inventory.valuation(), 50 * 35 + 100 * 10);

    let records = svc.allocation.allocations_for_sale(sale.sale_id).unwrap();
    assert_eq!(records, sale.allocations);
}

#[test]
fn blocked_sale_leaves_everything_unchanged() {
    let svc = PharmacyServices::in_memory(&Settings::default()).unwrap();
    let p = create_product(&svc.catalog, "Allergy", 80, 5);
    receive(&svc.allocation, p, "A", 3, Some(date(2026, 1, 1)), 40, at(2025, 1, 1));

    let before = svc.allocation.inventory(p).unwrap();
    let err = svc.allocation.allocate(p, 4, at(2025, 2, 1)).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Inventory(InventoryError::InsufficientStock { requested: 4, available: 3, .. })
    ));
    assert_eq!(svc.allocation.inventory(p).unwrap(), before);

    let forecast = svc.forecast.forecast(p, date(2025, 2, 1)).unwrap();
    assert_eq!(forecast.observation_count, 0);
}

#[test]
fn concurrent_sales_never_over_consume() {
    let products = Arc::new(ProductCatalogProjection::new());
    let ledger = Arc::new(InMemoryAllocationLedger::new());
    let history = Arc::new(InMemorySalesHistory::new());
    let catalog = CatalogService::new(Arc::new(InMemoryEventStore::new()), products.clone());
    let allocation = Arc::new(AllocationService::new(
        Arc::new(InMemoryEventStore::new()),
        products,
        Arc::new(SalesProjection::new(ledger.clone(), history.clone())),
        &AllocationSettings {
            max_commit_retries: 10_000,
        },
    ));

    let p = create_product(&catalog, "Vitamins", 20, 0);
    receive(&allocation, p, "A", 60, Some(date(2026, 1, 1)), 5, at(2025, 1, 1));
    receive(&allocation, p, "B", 40, Some(date(2026, 2, 1)), 7, at(2025, 1, 1));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let allocation = allocation.clone();
            thread::spawn(move || {
                let mut sold = 0i64;
                for _ in 0..20 {
                    match allocation.allocate(p, 1, at(2025, 3, 1)) {
                        Ok(sale) => sold += sale.allocated_quantity(),
                        Err(ServiceError::Inventory(InventoryError::InsufficientStock { .. })) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
                sold
            })
        })
        .collect();

    let sold: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(sold, 100);

    let inventory = allocation.inventory(p).unwrap();
    assert_eq!(inventory.available_quantity(), 0);
    assert!(inventory.batches().iter().all(|b| b.quantity_remaining == 0));

    let lines = ledger.for_product(p).unwrap();
    assert_eq!(lines.iter().map(|r| r.quantity).sum::<i64>(), 100);
    let observations = history
        .observations(p, at(2025, 1, 1), at(2025, 12, 31))
        .unwrap();
    assert_eq!(observations.len(), 100);
}

#[test]
fn rising_sales_of_a_seasonal_product_raise_urgency() {
    let svc = PharmacyServices::in_memory(&Settings::default()).unwrap();
    let p = create_product(&svc.catalog, "Cold & Flu", 120, 30);
    receive(&svc.allocation, p, "FLU-1", 400, Some(date(2026, 3, 1)), 70, at(2025, 9, 1));

    let as_of = date(2025, 11, 30);
    // Two quiet weeks, then a busy one.
    for back in 7..14 {
        svc.allocation
            .allocate(p, 4, at(2025, 11, 30) - Duration::days(back))
            .unwrap();
    }
    for back in 0..7 {
        svc.allocation
            .allocate(p, 10, at(2025, 11, 30) - Duration::days(back))
            .unwrap();
    }

    let result = svc.forecast.forecast(p, as_of).unwrap();
    assert_eq!(result.trend.direction, TrendDirection::Increasing);
    assert!(result.seasonality.seasonal);
    // December forecast days are peak days for the category.
    assert!(result.daily_forecast.iter().all(|d| d.quantity > result.baseline_daily_rate));
    assert_eq!(result.reorder.current_stock, 400 - 7 * 4 - 7 * 10);

    // Raising the reorder level above current stock surfaces a low-urgency reorder.
    svc.catalog
        .execute(ProductCommand::SetReorderLevel(SetReorderLevel {
            product_id: p,
            reorder_level: 500,
            occurred_at: at(2025, 11, 30),
        }))
        .unwrap();
    let result = svc.forecast.forecast(p, as_of).unwrap();
    assert_ne!(result.reorder.urgency, Urgency::None);
}
