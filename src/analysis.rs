//! Post-hoc analysis over an exported summary artifact.
//!
//! Reads the artifact only; nothing here feeds back into the pipeline.

use crate::error::{Result, SummaryError};
use crate::types::VendorBrandSummary;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Sales and margin of one brand across all of its vendors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandPerformance {
    pub description: String,
    pub total_sales_dollars: f64,
    /// Mean of the per-vendor profit margins.
    pub profit_margin: f64,
}

/// Brands with low sales but high margins: candidates for promotion or repricing.
#[derive(Debug, Clone, Copy)]
pub struct TargetCriteria {
    /// Brands at or below this sales quantile qualify.
    pub sales_quantile: f64,
    /// Brands at or above this margin quantile qualify.
    pub margin_quantile: f64,
}

impl Default for TargetCriteria {
    fn default() -> Self {
        Self {
            sales_quantile: 0.15,
            margin_quantile: 0.85,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetBrands {
    pub sales_threshold: f64,
    pub margin_threshold: f64,
    pub brands: Vec<BrandPerformance>,
}

pub fn read_summary<R: Read>(reader: R) -> Result<Vec<VendorBrandSummary>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let rows = csv_reader
        .deserialize()
        .collect::<std::result::Result<Vec<VendorBrandSummary>, _>>()?;
    Ok(rows)
}

pub fn read_summary_file(path: &Path) -> Result<Vec<VendorBrandSummary>> {
    let file = File::open(path).map_err(|e| {
        SummaryError::Config(format!("Failed to open summary '{}': {}", path.display(), e))
    })?;
    read_summary(file)
}

pub fn brand_performance(rows: &[VendorBrandSummary]) -> Vec<BrandPerformance> {
    let mut by_brand: BTreeMap<&str, (f64, f64, usize)> = BTreeMap::new();
    for row in rows {
        let entry = by_brand.entry(row.description.as_str()).or_insert((0.0, 0.0, 0));
        entry.0 += row.total_sales_dollars;
        entry.1 += row.profit_margin;
        entry.2 += 1;
    }
    by_brand
        .into_iter()
        .map(|(description, (sales, margin_sum, n))| BrandPerformance {
            description: description.to_string(),
            total_sales_dollars: sales,
            profit_margin: margin_sum / n as f64,
        })
        .collect()
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

pub fn target_brands(rows: &[VendorBrandSummary], criteria: TargetCriteria) -> Result<TargetBrands> {
    for q in [criteria.sales_quantile, criteria.margin_quantile] {
        if !(0.0..=1.0).contains(&q) {
            return Err(SummaryError::Config(format!(
                "Quantile {} is outside [0, 1]",
                q
            )));
        }
    }

    let brands = brand_performance(rows);
    let sales: Vec<f64> = brands.iter().map(|b| b.total_sales_dollars).collect();
    let margins: Vec<f64> = brands.iter().map(|b| b.profit_margin).collect();

    let (Some(sales_threshold), Some(margin_threshold)) = (
        quantile(&sales, criteria.sales_quantile),
        quantile(&margins, criteria.margin_quantile),
    ) else {
        return Ok(TargetBrands {
            sales_threshold: 0.0,
            margin_threshold: 0.0,
            brands: Vec::new(),
        });
    };

    let mut targets: Vec<BrandPerformance> = brands
        .into_iter()
        .filter(|b| b.total_sales_dollars <= sales_threshold && b.profit_margin >= margin_threshold)
        .collect();
    targets.sort_by(|a, b| {
        a.total_sales_dollars
            .total_cmp(&b.total_sales_dollars)
            .then_with(|| a.description.cmp(&b.description))
    });

    Ok(TargetBrands {
        sales_threshold,
        margin_threshold,
        brands: targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SUMMARY_COLUMNS;

    fn row(vendor: &str, brand: &str, sales: f64, margin: f64) -> VendorBrandSummary {
        VendorBrandSummary {
            vendor_name: vendor.to_string(),
            description: brand.to_string(),
            total_purchase_quantity: 1.0,
            total_purchase_dollars: 1.0,
            total_sales_quantity: 1.0,
            total_sales_dollars: sales,
            purchase_price: 1.0,
            freight: 0.0,
            gross_profit: sales - 1.0,
            profit_margin: margin,
            stock_turnover: 1.0,
            sales_to_purchase_ratio: sales,
        }
    }

    #[test]
    fn quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 1.0), Some(4.0));
        assert_eq!(quantile(&values, 0.5), Some(2.5));
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&values, 1.5), None);
    }

    #[test]
    fn brands_aggregate_across_vendors() {
        let rows = vec![
            row("Acme", "Widget", 10.0, 0.2),
            row("Beta", "Widget", 30.0, 0.4),
            row("Acme", "Gadget", 5.0, 0.1),
        ];
        let brands = brand_performance(&rows);

        assert_eq!(brands.len(), 2);
        assert_eq!(brands[1].description, "Widget");
        assert_eq!(brands[1].total_sales_dollars, 40.0);
        assert!((brands[1].profit_margin - 0.3).abs() < 1e-12);
    }

    #[test]
    fn targets_low_sales_high_margin() {
        let mut rows: Vec<VendorBrandSummary> = (1..=20)
            .map(|i| row("Acme", &format!("Brand{:02}", i), i as f64 * 100.0, i as f64 * 0.01))
            .collect();
        rows.push(row("Acme", "Niche", 50.0, 0.9));

        let targets = target_brands(&rows, TargetCriteria::default()).unwrap();
        let names: Vec<_> = targets.brands.iter().map(|b| b.description.as_str()).collect();

        assert_eq!(names, vec!["Niche"]);
        assert!(targets.sales_threshold >= 50.0);
    }

    #[test]
    fn reads_exported_artifact() {
        let csv = format!(
            "{}\nAcme,Widget,100.0,500.0,0.0,0.0,5.0,0.0,-500.0,0.0,0.0,0.0\n",
            SUMMARY_COLUMNS.join(",")
        );
        let rows = read_summary(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].gross_profit, -500.0);
    }

    #[test]
    fn rejects_out_of_range_quantiles() {
        let criteria = TargetCriteria {
            sales_quantile: 1.2,
            margin_quantile: 0.85,
        };
        assert!(matches!(
            target_brands(&[], criteria),
            Err(SummaryError::Config(_))
        ));
    }
}
