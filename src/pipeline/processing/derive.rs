//! Cleaning and derived metrics.
//!
//! Missing sides of the join are zero-filled, vendor freight is spread over the
//! vendor's grains, then gross profit and the three ratios are computed. A ratio
//! with a zero denominator, or any non-finite ratio, becomes [`RATIO_SENTINEL`].

use super::aggregate::JoinedFacts;
use crate::constants::RATIO_SENTINEL;
use crate::types::{GrainTotals, VendorBrandSummary};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// How many times each ratio fell back to the sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentinelCounts {
    pub profit_margin: usize,
    pub stock_turnover: usize,
    pub sales_to_purchase_ratio: usize,
}

impl SentinelCounts {
    pub fn total(&self) -> usize {
        self.profit_margin + self.stock_turnover + self.sales_to_purchase_ratio
    }
}

#[derive(Debug, Clone, Default)]
pub struct DerivedRows {
    /// Ordered by purchase dollars descending, then vendor and brand.
    pub rows: Vec<VendorBrandSummary>,
    pub sentinels: SentinelCounts,
    /// Vendors with invoice freight but no grain to carry it.
    pub unallocated_freight: Vec<(String, f64)>,
}

/// `numerator / denominator`, or `None` when that is undefined or not finite.
pub fn checked_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let value = numerator / denominator;
    value.is_finite().then_some(value)
}

fn ratio_or_sentinel(numerator: f64, denominator: f64, substitutions: &mut usize) -> f64 {
    checked_ratio(numerator, denominator).unwrap_or_else(|| {
        *substitutions += 1;
        RATIO_SENTINEL
    })
}

pub fn derive_rows(joined: &JoinedFacts) -> DerivedRows {
    let mut rows: Vec<VendorBrandSummary> = joined.grains.iter().map(zero_filled).collect();
    let unallocated_freight = allocate_freight(&mut rows, &joined.vendor_freight);

    let mut sentinels = SentinelCounts::default();
    for row in &mut rows {
        apply_derived_metrics(row, &mut sentinels);
    }

    rows.sort_by(summary_order);

    DerivedRows {
        rows,
        sentinels,
        unallocated_freight,
    }
}

fn zero_filled(grain: &GrainTotals) -> VendorBrandSummary {
    let purchases = grain.purchases.unwrap_or_default();
    let sales = grain.sales.unwrap_or_default();
    VendorBrandSummary {
        vendor_name: grain.key.vendor_name.clone(),
        description: grain.key.description.clone(),
        total_purchase_quantity: purchases.quantity,
        total_purchase_dollars: purchases.dollars,
        total_sales_quantity: sales.quantity,
        total_sales_dollars: sales.dollars,
        purchase_price: purchases.purchase_price,
        freight: 0.0,
        gross_profit: 0.0,
        profit_margin: RATIO_SENTINEL,
        stock_turnover: RATIO_SENTINEL,
        sales_to_purchase_ratio: RATIO_SENTINEL,
    }
}

/// Gross profit first; the three ratios depend only on the aggregated totals.
pub fn apply_derived_metrics(row: &mut VendorBrandSummary, sentinels: &mut SentinelCounts) {
    row.gross_profit = row.total_sales_dollars - row.total_purchase_dollars;
    row.profit_margin = ratio_or_sentinel(
        row.gross_profit,
        row.total_sales_dollars,
        &mut sentinels.profit_margin,
    );
    row.stock_turnover = ratio_or_sentinel(
        row.total_sales_quantity,
        row.total_purchase_quantity,
        &mut sentinels.stock_turnover,
    );
    row.sales_to_purchase_ratio = ratio_or_sentinel(
        row.total_sales_dollars,
        row.total_purchase_dollars,
        &mut sentinels.sales_to_purchase_ratio,
    );
}

/// Spread each vendor's freight over its grains by share of purchase dollars,
/// or evenly when the vendor's purchase dollars sum to zero. Returns freight
/// that had no grain to land on.
pub fn allocate_freight(
    rows: &mut [VendorBrandSummary],
    vendor_freight: &BTreeMap<String, f64>,
) -> Vec<(String, f64)> {
    let mut by_vendor: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        by_vendor.entry(row.vendor_name.as_str()).or_default().push(i);
    }

    let mut shares: Vec<(usize, f64)> = Vec::with_capacity(rows.len());
    let mut unallocated = Vec::new();
    for (vendor, &freight) in vendor_freight {
        let Some(indices) = by_vendor.get(vendor.as_str()) else {
            if freight != 0.0 {
                unallocated.push((vendor.clone(), freight));
            }
            continue;
        };
        let vendor_dollars: f64 = indices.iter().map(|&i| rows[i].total_purchase_dollars).sum();
        let even = 1.0 / indices.len() as f64;
        for &i in indices {
            let share = checked_ratio(rows[i].total_purchase_dollars, vendor_dollars).unwrap_or(even);
            shares.push((i, freight * share));
        }
    }

    for (i, allocated) in shares {
        rows[i].freight = allocated;
    }
    unallocated
}

/// Purchase dollars descending, then vendor and brand ascending.
pub fn summary_order(a: &VendorBrandSummary, b: &VendorBrandSummary) -> Ordering {
    b.total_purchase_dollars
        .total_cmp(&a.total_purchase_dollars)
        .then_with(|| a.vendor_name.cmp(&b.vendor_name))
        .then_with(|| a.description.cmp(&b.description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GrainKey, PurchaseTotals, SalesTotals};

    fn grain(
        vendor: &str,
        brand: &str,
        purchases: Option<(f64, f64)>,
        sales: Option<(f64, f64)>,
    ) -> GrainTotals {
        GrainTotals {
            key: GrainKey::new(vendor, brand),
            purchases: purchases.map(|(quantity, dollars)| PurchaseTotals {
                quantity,
                dollars,
                purchase_price: if quantity != 0.0 { dollars / quantity } else { 0.0 },
            }),
            sales: sales.map(|(quantity, dollars)| SalesTotals { quantity, dollars }),
        }
    }

    fn joined(grains: Vec<GrainTotals>, freight: &[(&str, f64)]) -> JoinedFacts {
        JoinedFacts {
            grains,
            vendor_freight: freight.iter().map(|(v, f)| (v.to_string(), *f)).collect(),
            null_key_rows: Vec::new(),
        }
    }

    #[test]
    fn unsold_inventory_uses_sentinels() {
        let derived = derive_rows(&joined(
            vec![grain("Acme", "Widget", Some((100.0, 500.0)), None)],
            &[],
        ));
        let row = &derived.rows[0];

        assert_eq!(row.total_sales_dollars, 0.0);
        assert_eq!(row.gross_profit, -500.0);
        assert_eq!(row.profit_margin, 0.0);
        assert_eq!(row.stock_turnover, 0.0);
        assert_eq!(row.sales_to_purchase_ratio, 0.0);
        assert_eq!(derived.sentinels.profit_margin, 1);
        assert_eq!(derived.sentinels.stock_turnover, 0);
    }

    #[test]
    fn balanced_grain_metrics() {
        let derived = derive_rows(&joined(
            vec![grain("Acme", "Gadget", Some((50.0, 200.0)), Some((50.0, 300.0)))],
            &[],
        ));
        let row = &derived.rows[0];

        assert_eq!(row.gross_profit, 100.0);
        assert!((row.profit_margin - 100.0 / 300.0).abs() < 1e-12);
        assert_eq!(row.stock_turnover, 1.0);
        assert_eq!(row.sales_to_purchase_ratio, 1.5);
        assert_eq!(derived.sentinels.total(), 0);
    }

    #[test]
    fn phantom_sales_have_finite_turnover() {
        let derived = derive_rows(&joined(
            vec![grain("Beta", "Ghost", None, Some((4.0, 40.0)))],
            &[],
        ));
        let row = &derived.rows[0];

        assert_eq!(row.gross_profit, 40.0);
        assert_eq!(row.profit_margin, 1.0);
        assert_eq!(row.stock_turnover, 0.0);
        assert_eq!(row.sales_to_purchase_ratio, 0.0);
    }

    #[test]
    fn negative_quantities_are_kept() {
        let derived = derive_rows(&joined(
            vec![grain("Acme", "Returned", Some((-5.0, -25.0)), Some((5.0, 50.0)))],
            &[],
        ));
        let row = &derived.rows[0];

        assert_eq!(row.total_purchase_quantity, -5.0);
        assert_eq!(row.stock_turnover, -1.0);
        assert_eq!(row.gross_profit, 75.0);
    }

    #[test]
    fn overflowing_ratio_falls_back_to_sentinel() {
        assert_eq!(checked_ratio(f64::MAX, 0.5), None);
        assert_eq!(checked_ratio(1.0, 0.0), None);
        assert_eq!(checked_ratio(0.0, -0.0), None);
        assert_eq!(checked_ratio(3.0, 2.0), Some(1.5));
    }

    #[test]
    fn freight_follows_purchase_dollars() {
        let derived = derive_rows(&joined(
            vec![
                grain("Acme", "Widget", Some((10.0, 300.0)), None),
                grain("Acme", "Gadget", Some((10.0, 100.0)), None),
                grain("Beta", "Solo", Some((1.0, 10.0)), None),
            ],
            &[("Acme", 40.0), ("Beta", 7.5), ("Gone", 3.0)],
        ));

        let freight: BTreeMap<_, _> = derived
            .rows
            .iter()
            .map(|r| (r.description.as_str(), r.freight))
            .collect();
        assert_eq!(freight["Widget"], 30.0);
        assert_eq!(freight["Gadget"], 10.0);
        assert_eq!(freight["Solo"], 7.5);
        assert_eq!(derived.unallocated_freight, vec![("Gone".to_string(), 3.0)]);
    }

    #[test]
    fn freight_is_split_evenly_without_purchase_dollars() {
        let derived = derive_rows(&joined(
            vec![
                grain("Beta", "A", None, Some((1.0, 10.0))),
                grain("Beta", "B", None, Some((1.0, 10.0))),
            ],
            &[("Beta", 9.0)],
        ));

        assert!(derived.rows.iter().all(|r| r.freight == 4.5));
    }

    #[test]
    fn rows_are_ordered_by_purchase_dollars() {
        let derived = derive_rows(&joined(
            vec![
                grain("Acme", "Small", Some((1.0, 10.0)), None),
                grain("Zed", "Big", Some((1.0, 900.0)), None),
                grain("Beta", "Small", Some((1.0, 10.0)), None),
            ],
            &[],
        ));

        let order: Vec<_> = derived
            .rows
            .iter()
            .map(|r| (r.vendor_name.as_str(), r.description.as_str()))
            .collect();
        assert_eq!(order, vec![("Zed", "Big"), ("Acme", "Small"), ("Beta", "Small")]);
        assert!(derived
            .rows
            .windows(2)
            .all(|w| summary_order(&w[0], &w[1]) != Ordering::Greater));
    }
}
