use super::aggregate::JoinedFacts;
use super::derive::{DerivedRows, SentinelCounts};
use crate::config::TableNames;
use crate::metrics::BuildMetrics;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Non-fatal anomaly found while building the summary.
///
/// Warnings never remove rows: one-sided grains stay in the artifact
/// zero-filled so the analysis layer can see them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityWarning {
    /// Purchased but never sold (unsold inventory).
    PurchaseOnly { grain: String },
    /// Sold but never purchased (phantom sales).
    SalesOnly { grain: String },
    /// Fact rows whose vendor or brand key was null or blank.
    NullKeyRowsDropped { table: String, rows: u64 },
    /// Purchases on record with a total quantity of zero or less.
    NonPositivePurchaseQuantity { grain: String, quantity: f64 },
    /// Invoice freight for a vendor with no grain in the summary.
    UnallocatedFreight { vendor: String, freight: f64 },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityWarning::PurchaseOnly { grain } => write!(f, "{}: purchases without sales", grain),
            IntegrityWarning::SalesOnly { grain } => write!(f, "{}: sales without purchases", grain),
            IntegrityWarning::NullKeyRowsDropped { table, rows } => {
                write!(f, "{}: {} rows dropped for a null vendor or brand", table, rows)
            }
            IntegrityWarning::NonPositivePurchaseQuantity { grain, quantity } => {
                write!(f, "{}: purchase quantity totals {}", grain, quantity)
            }
            IntegrityWarning::UnallocatedFreight { vendor, freight } => {
                write!(f, "{}: freight {} has no grain to allocate to", vendor, freight)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub grains: usize,
    pub purchase_only: usize,
    pub sales_only: usize,
    pub null_key_rows: u64,
    pub sentinels: SentinelCounts,
    pub warnings: Vec<IntegrityWarning>,
}

impl IntegrityReport {
    pub fn assess(joined: &JoinedFacts, derived: &DerivedRows, tables: &TableNames) -> Self {
        let mut report = IntegrityReport {
            grains: joined.grains.len(),
            sentinels: derived.sentinels,
            ..Default::default()
        };

        for (kind, rows) in &joined.null_key_rows {
            report.null_key_rows += rows;
            report.warnings.push(IntegrityWarning::NullKeyRowsDropped {
                table: tables.table_for(*kind).to_string(),
                rows: *rows,
            });
        }

        for grain in &joined.grains {
            match (&grain.purchases, &grain.sales) {
                (Some(purchases), sales) => {
                    if sales.is_none() {
                        report.purchase_only += 1;
                        report.warnings.push(IntegrityWarning::PurchaseOnly {
                            grain: grain.key.to_string(),
                        });
                    }
                    if purchases.quantity <= 0.0 {
                        report.warnings.push(IntegrityWarning::NonPositivePurchaseQuantity {
                            grain: grain.key.to_string(),
                            quantity: purchases.quantity,
                        });
                    }
                }
                (None, Some(_)) => {
                    report.sales_only += 1;
                    report.warnings.push(IntegrityWarning::SalesOnly {
                        grain: grain.key.to_string(),
                    });
                }
                (None, None) => {}
            }
        }

        for (vendor, freight) in &derived.unallocated_freight {
            report.warnings.push(IntegrityWarning::UnallocatedFreight {
                vendor: vendor.clone(),
                freight: *freight,
            });
        }

        report
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Log the report and publish its counts as metrics.
    pub fn emit(&self) {
        BuildMetrics::record_grains(self.grains, self.purchase_only, self.sales_only);
        BuildMetrics::record_sentinels("profit_margin", self.sentinels.profit_margin);
        BuildMetrics::record_sentinels("stock_turnover", self.sentinels.stock_turnover);
        BuildMetrics::record_sentinels(
            "sales_to_purchase_ratio",
            self.sentinels.sales_to_purchase_ratio,
        );

        for warning in &self.warnings {
            if let IntegrityWarning::NullKeyRowsDropped { table, rows } = warning {
                BuildMetrics::record_null_key_rows(table, *rows);
            }
            debug!("Integrity warning: {}", warning);
        }

        if !self.is_clean() {
            warn!(
                purchase_only = self.purchase_only,
                sales_only = self.sales_only,
                null_key_rows = self.null_key_rows,
                warnings = self.warnings.len(),
                "Summary built with integrity warnings"
            );
        }
        let sentinels = self.sentinels;
        if sentinels.total() > 0 {
            warn!(
                profit_margin = sentinels.profit_margin,
                stock_turnover = sentinels.stock_turnover,
                sales_to_purchase_ratio = sentinels.sales_to_purchase_ratio,
                "Undefined ratios replaced with sentinel"
            );
        }
    }
}
