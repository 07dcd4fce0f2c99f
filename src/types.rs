use crate::constants;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fact tables the summary is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactKind {
    /// One row per purchase transaction line.
    Purchase,
    /// One row per sales transaction line.
    Sales,
    /// One row per vendor invoice, carrying freight.
    VendorInvoice,
}

impl FactKind {
    pub const ALL: [FactKind; 3] = [FactKind::Purchase, FactKind::Sales, FactKind::VendorInvoice];

    /// Columns that must exist on the source table.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            FactKind::Purchase => &[
                constants::VENDOR_NAME,
                constants::DESCRIPTION,
                constants::PURCHASE_QUANTITY,
                constants::PURCHASE_DOLLARS,
                constants::PURCHASE_PRICE,
            ],
            FactKind::Sales => &[
                constants::VENDOR_NAME,
                constants::DESCRIPTION,
                constants::SALES_QUANTITY,
                constants::SALES_DOLLARS,
            ],
            FactKind::VendorInvoice => &[constants::VENDOR_NAME, constants::FREIGHT],
        }
    }

    /// Columns whose values must be numeric (or NULL).
    pub fn numeric_columns(&self) -> &'static [&'static str] {
        match self {
            FactKind::Purchase => &[
                constants::PURCHASE_QUANTITY,
                constants::PURCHASE_DOLLARS,
                constants::PURCHASE_PRICE,
            ],
            FactKind::Sales => &[constants::SALES_QUANTITY, constants::SALES_DOLLARS],
            FactKind::VendorInvoice => &[constants::FREIGHT],
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FactKind::Purchase => "purchase",
            FactKind::Sales => "sales",
            FactKind::VendorInvoice => "vendor_invoice",
        };
        f.write_str(name)
    }
}

/// The aggregation grain: one vendor selling one brand.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GrainKey {
    pub vendor_name: String,
    pub description: String,
}

impl GrainKey {
    pub fn new(vendor_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            vendor_name: vendor_name.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for GrainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.vendor_name, self.description)
    }
}

/// Purchase and sales totals for one grain, as produced by the join.
/// A side with no facts is `None`; it is zero-filled during cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct GrainTotals {
    pub key: GrainKey,
    pub purchases: Option<PurchaseTotals>,
    pub sales: Option<SalesTotals>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PurchaseTotals {
    pub quantity: f64,
    pub dollars: f64,
    /// Average listed unit price over the purchase lines.
    pub purchase_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SalesTotals {
    pub quantity: f64,
    pub dollars: f64,
}

/// One row of the exported summary. Field order is the artifact's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VendorBrandSummary {
    pub vendor_name: String,
    pub description: String,
    pub total_purchase_quantity: f64,
    pub total_purchase_dollars: f64,
    pub total_sales_quantity: f64,
    pub total_sales_dollars: f64,
    pub purchase_price: f64,
    pub freight: f64,
    pub gross_profit: f64,
    pub profit_margin: f64,
    pub stock_turnover: f64,
    pub sales_to_purchase_ratio: f64,
}

impl VendorBrandSummary {
    pub fn key(&self) -> GrainKey {
        GrainKey::new(self.vendor_name.clone(), self.description.clone())
    }
}
