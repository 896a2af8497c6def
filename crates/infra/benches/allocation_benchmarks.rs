use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use pharmastock_core::{BatchId, ProductId, SaleId};
use pharmastock_forecasting::{
    DemandForecaster, ForecastConfig, ForecastInput, ProductProfile, SaleObservation, SeasonalityTable,
};
use pharmastock_infra::{PharmacyServices, Settings};
use pharmastock_inventory::{AllocateSale, Batch, BatchStatus, ReceiveBatch, plan_allocation};
use pharmastock_products::{CreateProduct, ProductCommand};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
}

fn batches(product_id: ProductId, count: usize) -> Vec<Batch> {
    (0..count)
        .map(|i| Batch {
            batch_id: BatchId::new(),
            product_id,
            batch_number: format!("LOT-{i}"),
            quantity_remaining: 10,
            // Reverse expiry order so the planner has to sort.
            expiry_date: NaiveDate::from_ymd_opt(2026, 1, 1).map(|d| d - Duration::days(i as i64)),
            unit_cost: 30 + (i as u64 % 7),
            unit_selling_price: None,
            created_at: t0(),
            status: BatchStatus::Active,
        })
        .collect()
}

/// Pure planning cost as the number of batches grows.
fn bench_plan_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_allocation");

    for count in [1usize, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("batches", count), count, |b, &count| {
            let product_id = ProductId::new();
            let stock = batches(product_id, count);
            // Consume half the stock so the sale spans many batches.
            let request = AllocateSale {
                product_id,
                sale_id: SaleId::new(),
                quantity: (count as i64 * 10) / 2 + 1,
                unit_price: 50,
                occurred_at: t0(),
            };
            b.iter(|| black_box(plan_allocation(black_box(&stock), &request).unwrap()));
        });
    }

    group.finish();
}

/// Load, decide, commit and project one sale against a growing stream.
fn bench_allocate_sale(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_sale");
    group.sample_size(200);

    group.bench_function("in_memory_end_to_end", |b| {
        let svc = PharmacyServices::in_memory(&Settings::default()).unwrap();
        let product_id = ProductId::new();
        svc.catalog
            .execute(ProductCommand::CreateProduct(CreateProduct {
                product_id,
                name: "Bench Tablets".to_string(),
                category: "Pain Relief".to_string(),
                unit_price: 50,
                reorder_level: 10,
                occurred_at: t0(),
            }))
            .unwrap();
        svc.allocation
            .receive_batch(ReceiveBatch {
                product_id,
                batch_id: BatchId::new(),
                batch_number: "BENCH".to_string(),
                quantity: i64::MAX / 4,
                expiry_date: None,
                unit_cost: 30,
                unit_selling_price: None,
                received_at: t0(),
            })
            .unwrap();

        b.iter(|| black_box(svc.allocation.allocate(product_id, black_box(1), t0()).unwrap()));
    });

    group.finish();
}

/// Full forecast pipeline over a 90-day history.
fn bench_forecast(c: &mut Criterion) {
    let forecaster = DemandForecaster::new(ForecastConfig::default(), SeasonalityTable::pharmacy_defaults()).unwrap();
    let product_id = ProductId::new();
    let as_of = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
    let observations: Vec<SaleObservation> = (0..90)
        .flat_map(|day| {
            (0..3).map(move |n| SaleObservation {
                product_id,
                quantity: 1 + ((day + n) % 5),
                occurred_at: t0() + Duration::days(364 - 89 + day) + Duration::hours(n),
            })
        })
        .collect();
    let input = ForecastInput {
        product: ProductProfile {
            product_id,
            category: "Cold & Flu".to_string(),
            reorder_level: 40,
        },
        observations,
        current_stock: 120,
        as_of,
        history_start: None,
    };

    c.bench_function("forecast_90_days", |b| {
        b.iter(|| black_box(forecaster.forecast(black_box(&input))))
    });
}

criterion_group!(benches, bench_plan_allocation, bench_allocate_sale, bench_forecast);
criterion_main!(benches);
