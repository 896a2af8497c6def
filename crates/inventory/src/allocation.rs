//! Expiry-first allocation of a sale across a product's batches.
//!
//! Revenue is always `quantity x product price`. Batch cost only feeds cost of
//! goods and profit; it never changes what the customer pays.

use serde::{Deserialize, Serialize};

use pharmastock_core::{BatchId, ProductId, SaleId};

use crate::batch::Batch;
use crate::error::InventoryError;
use crate::ledger::AllocateSale;

/// One batch's share of a sale. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub batch_id: BatchId,
    pub batch_number: String,
    pub quantity: i64,
    pub unit_cost: u64,
    /// The product's price at sale time, not the batch's stored selling price.
    pub unit_price: u64,
    pub line_cost: u64,
    pub line_profit: i64,
}

/// Full outcome of allocating one sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleAllocation {
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub requested_quantity: i64,
    pub unit_price: u64,
    pub allocations: Vec<AllocationRecord>,
    pub total_cost: u64,
    pub revenue: u64,
    pub profit: i64,
}

impl SaleAllocation {
    pub fn allocated_quantity(&self) -> i64 {
        self.allocations.iter().map(|a| a.quantity).sum()
    }
}

/// Allocatable batches in consumption order.
pub fn allocation_order(batches: &[Batch]) -> Vec<&Batch> {
    let mut active: Vec<&Batch> = batches.iter().filter(|b| b.is_allocatable()).collect();
    active.sort_by_key(|b| b.allocation_key());
    active
}

/// Decide how a sale is split across `batches` without touching them.
///
/// Fails with `InvalidQuantity` for a non-positive request and with
/// `InsufficientStock` when the active batches cannot cover it.
pub fn plan_allocation(
    batches: &[Batch],
    request: &AllocateSale,
) -> Result<SaleAllocation, InventoryError> {
    if request.quantity <= 0 {
        return Err(InventoryError::InvalidQuantity(request.quantity));
    }

    let ordered = allocation_order(batches);
    let available: i64 = ordered.iter().map(|b| b.quantity_remaining).sum();
    if available < request.quantity {
        return Err(InventoryError::InsufficientStock {
            product_id: request.product_id,
            requested: request.quantity,
            available,
        });
    }

    let mut outstanding = request.quantity;
    let mut allocations = Vec::new();

    for batch in ordered {
        if outstanding == 0 {
            break;
        }
        let take = outstanding.min(batch.quantity_remaining);
        let line_cost = (take as u64).saturating_mul(batch.unit_cost);
        let line_profit = take.saturating_mul(signed(request.unit_price).saturating_sub(signed(batch.unit_cost)));

        allocations.push(AllocationRecord {
            sale_id: request.sale_id,
            product_id: request.product_id,
            batch_id: batch.batch_id,
            batch_number: batch.batch_number.clone(),
            quantity: take,
            unit_cost: batch.unit_cost,
            unit_price: request.unit_price,
            line_cost,
            line_profit,
        });
        outstanding -= take;
    }

    let revenue = (request.quantity as u64).saturating_mul(request.unit_price);
    let total_cost = allocations
        .iter()
        .fold(0u64, |acc, a| acc.saturating_add(a.line_cost));

    Ok(SaleAllocation {
        sale_id: request.sale_id,
        product_id: request.product_id,
        requested_quantity: request.quantity,
        unit_price: request.unit_price,
        allocations,
        total_cost,
        revenue,
        profit: signed(revenue).saturating_sub(signed(total_cost)),
    })
}

/// Money amount as a signed value, saturating above `i64::MAX`.
fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchStatus;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(
        product_id: ProductId,
        number: &str,
        qty: i64,
        expiry: Option<NaiveDate>,
        cost: u64,
        created_at: DateTime<Utc>,
    ) -> Batch {
        Batch {
            batch_id: BatchId::new(),
            product_id,
            batch_number: number.to_string(),
            quantity_remaining: qty,
            expiry_date: expiry,
            unit_cost: cost,
            unit_selling_price: Some(cost.saturating_mul(2)),
            created_at,
            status: BatchStatus::Active,
        }
    }

    fn request(product_id: ProductId, quantity: i64, unit_price: u64) -> AllocateSale {
        AllocateSale {
            product_id,
            sale_id: SaleId::new(),
            quantity,
            unit_price,
            occurred_at: t0(),
        }
    }

    #[test]
    fn two_batch_sale_uses_product_price_and_batch_costs() {
        let p = ProductId::new();
        let batches = vec![
            batch(p, "B", 100, Some(date(2025, 12, 15)), 35, t0()),
            batch(p, "A", 100, Some(date(2025, 12, 1)), 30, t0() + Duration::hours(1)),
        ];

        let sale = plan_allocation(&batches, &request(p, 150, 50)).unwrap();

        assert_eq!(sale.allocations.len(), 2);
        assert_eq!(sale.allocations[0].batch_number, "A");
        assert_eq!(sale.allocations[0].quantity, 100);
        assert_eq!(sale.allocations[0].unit_cost, 30);
        assert_eq!(sale.allocations[1].batch_number, "B");
        assert_eq!(sale.allocations[1].quantity, 50);
        assert_eq!(sale.allocations[1].unit_cost, 35);
        assert_eq!(sale.revenue, 7500);
        assert_eq!(sale.total_cost, 4750);
        assert_eq!(sale.profit, 2750);
        assert_eq!(sale.allocations[0].line_profit, 2000);
        assert_eq!(sale.allocations[1].line_profit, 750);
    }

    #[test]
    fn extreme_prices_saturate_instead_of_overflowing() {
        let p = ProductId::new();
        let batches = vec![batch(p, "CHEAP", 10, None, 0, t0())];

        let gain = plan_allocation(&batches, &request(p, 3, u64::MAX)).unwrap();
        assert_eq!(gain.revenue, u64::MAX);
        assert_eq!(gain.allocations[0].line_profit, i64::MAX);
        assert_eq!(gain.profit, i64::MAX);

        let costly = vec![batch(p, "COSTLY", 10, None, u64::MAX, t0())];
        let loss = plan_allocation(&costly, &request(p, 3, 0)).unwrap();
        assert_eq!(loss.total_cost, u64::MAX);
        assert_eq!(loss.allocations[0].line_profit, i64::MIN);
        assert_eq!(loss.profit, -i64::MAX);
    }

    #[test]
    fn undated_batch_is_used_last_even_when_oldest() {
        let p = ProductId::new();
        let batches = vec![
            batch(p, "NOEXP", 10, None, 5, t0() - Duration::days(365)),
            batch(p, "DATED", 10, Some(date(2030, 1, 1)), 5, t0()),
        ];

        let sale = plan_allocation(&batches, &request(p, 12, 10)).unwrap();
        assert_eq!(sale.allocations[0].batch_number, "DATED");
        assert_eq!(sale.allocations[0].quantity, 10);
        assert_eq!(sale.allocations[1].batch_number, "NOEXP");
        assert_eq!(sale.allocations[1].quantity, 2);
    }

    #[test]
    fn same_expiry_falls_back_to_creation_order() {
        let p = ProductId::new();
        let expiry = Some(date(2026, 6, 1));
        let batches = vec![
            batch(p, "NEWER", 5, expiry, 5, t0() + Duration::days(3)),
            batch(p, "OLDER", 5, expiry, 5, t0()),
        ];

        let sale = plan_allocation(&batches, &request(p, 3, 10)).unwrap();
        assert_eq!(sale.allocations.len(), 1);
        assert_eq!(sale.allocations[0].batch_number, "OLDER");
    }

    #[test]
    fn depleted_batches_are_skipped() {
        let p = ProductId::new();
        let mut depleted = batch(p, "OLD", 0, Some(date(2025, 2, 1)), 5, t0());
        depleted.status = BatchStatus::Depleted;
        let batches = vec![depleted, batch(p, "LIVE", 4, Some(date(2025, 3, 1)), 5, t0())];

        let sale = plan_allocation(&batches, &request(p, 4, 10)).unwrap();
        assert_eq!(sale.allocations.len(), 1);
        assert_eq!(sale.allocations[0].batch_number, "LIVE");
    }

    #[test]
    fn non_positive_request_is_invalid() {
        let p = ProductId::new();
        let batches = vec![batch(p, "A", 10, None, 5, t0())];

        assert_eq!(
            plan_allocation(&batches, &request(p, 0, 10)).unwrap_err(),
            InventoryError::InvalidQuantity(0)
        );
        assert_eq!(
            plan_allocation(&batches, &request(p, -3, 10)).unwrap_err(),
            InventoryError::InvalidQuantity(-3)
        );
    }

    #[test]
    fn no_batches_is_insufficient_stock() {
        let p = ProductId::new();
        let err = plan_allocation(&[], &request(p, 1, 10)).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                product_id: p,
                requested: 1,
                available: 0,
            }
        );
    }

    #[test]
    fn selling_below_cost_yields_negative_profit() {
        let p = ProductId::new();
        let batches = vec![batch(p, "A", 10, None, 40, t0())];

        let sale = plan_allocation(&batches, &request(p, 5, 30)).unwrap();
        assert_eq!(sale.revenue, 150);
        assert_eq!(sale.total_cost, 200);
        assert_eq!(sale.allocations[0].line_profit, -50);
        assert_eq!(sale.profit, -50);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn batches_strategy() -> impl Strategy<Value = Vec<(i64, Option<u32>, u64, i64)>> {
            // (quantity, expiry offset in days, unit cost, creation offset in minutes)
            proptest::collection::vec(
                (0i64..200, proptest::option::of(0u32..720), 1u64..500, 0i64..10_000),
                0..12,
            )
        }

        fn build(p: ProductId, lots: &[(i64, Option<u32>, u64, i64)]) -> Vec<Batch> {
            let base = date(2025, 1, 1);
            lots.iter()
                .enumerate()
                .map(|(i, (qty, exp, cost, created))| {
                    batch(
                        p,
                        &format!("LOT-{i}"),
                        *qty,
                        exp.map(|d| base + Duration::days(d as i64)),
                        *cost,
                        t0() + Duration::minutes(*created),
                    )
                })
                .collect()
        }

        proptest! {
            /// Property: a coverable request is consumed exactly, in allocation order,
            /// and never takes more than a batch holds.
            #[test]
            fn coverable_requests_are_consumed_exactly(
                lots in batches_strategy(),
                fraction in 0.0f64..=1.0,
                price in 1u64..1_000,
            ) {
                let p = ProductId::new();
                let batches = build(p, &lots);
                let total: i64 = batches.iter().map(|b| b.quantity_remaining).sum();
                prop_assume!(total > 0);
                let requested = ((total as f64 * fraction).ceil() as i64).clamp(1, total);

                let sale = plan_allocation(&batches, &request(p, requested, price)).unwrap();
                prop_assert_eq!(sale.allocated_quantity(), requested);
                prop_assert_eq!(sale.revenue, requested as u64 * price);

                let order: Vec<BatchId> = allocation_order(&batches).iter().map(|b| b.batch_id).collect();
                let touched: Vec<BatchId> = sale.allocations.iter().map(|a| a.batch_id).collect();
                prop_assert_eq!(&order[..touched.len()], &touched[..]);

                for a in &sale.allocations {
                    let source = batches.iter().find(|b| b.batch_id == a.batch_id).unwrap();
                    prop_assert!(a.quantity > 0);
                    prop_assert!(a.quantity <= source.quantity_remaining);
                }
            }

            /// Property: over-asking always fails with the available total reported.
            #[test]
            fn over_requests_fail(lots in batches_strategy(), extra in 1i64..100) {
                let p = ProductId::new();
                let batches = build(p, &lots);
                let total: i64 = batches.iter().map(|b| b.quantity_remaining).sum();

                let err = plan_allocation(&batches, &request(p, total + extra, 10)).unwrap_err();
                prop_assert_eq!(err, InventoryError::InsufficientStock {
                    product_id: p,
                    requested: total + extra,
                    available: total,
                });
            }

            /// Property: undated stock is only touched once every dated batch is used up.
            #[test]
            fn undated_stock_comes_last(lots in batches_strategy(), price in 1u64..100) {
                let p = ProductId::new();
                let batches = build(p, &lots);
                let total: i64 = batches.iter().map(|b| b.quantity_remaining).sum();
                prop_assume!(total > 0);

                let sale = plan_allocation(&batches, &request(p, total, price)).unwrap();
                let mut seen_undated = false;
                for a in &sale.allocations {
                    let source = batches.iter().find(|b| b.batch_id == a.batch_id).unwrap();
                    if source.expiry_date.is_none() {
                        seen_undated = true;
                    } else {
                        prop_assert!(!seen_undated, "dated batch consumed after undated stock");
                    }
                }
            }
        }
    }
}
