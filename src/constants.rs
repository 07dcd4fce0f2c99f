/// Source table and column names shared by the loader, the builder and the tests.
/// These follow the raw inventory CSV exports.

// Default table names (file stems of the raw CSV files)
pub const PURCHASES_TABLE: &str = "purchases";
pub const SALES_TABLE: &str = "sales";
pub const VENDOR_INVOICE_TABLE: &str = "vendor_invoice";

// Grain key columns, present on every fact table
pub const VENDOR_NAME: &str = "VendorName";
pub const DESCRIPTION: &str = "Description";

// Purchase fact columns
pub const PURCHASE_QUANTITY: &str = "Quantity";
pub const PURCHASE_DOLLARS: &str = "Dollars";
pub const PURCHASE_PRICE: &str = "PurchasePrice";

// Sales fact columns
pub const SALES_QUANTITY: &str = "SalesQuantity";
pub const SALES_DOLLARS: &str = "SalesDollars";

// Vendor invoice columns
pub const FREIGHT: &str = "Freight";

/// Substituted for any ratio whose denominator is zero or whose result is not finite.
pub const RATIO_SENTINEL: f64 = 0.0;

/// Header of the exported artifact. Consumers depend on this exact order.
pub const SUMMARY_COLUMNS: [&str; 12] = [
    "VendorName",
    "Description",
    "TotalPurchaseQuantity",
    "TotalPurchaseDollars",
    "TotalSalesQuantity",
    "TotalSalesDollars",
    "PurchasePrice",
    "Freight",
    "GrossProfit",
    "ProfitMargin",
    "StockTurnover",
    "SalesToPurchaseRatio",
];

// Defaults for paths when neither config nor CLI provide one
pub const DEFAULT_CONFIG_FILE: &str = "vendor_summary.toml";
pub const DEFAULT_STORE_PATH: &str = "inventory.db";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_OUTPUT_PATH: &str = "vendor_sales_summary.csv";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "vendor_summary.log";

// Environment overrides
pub const ENV_STORE: &str = "VENDOR_SUMMARY_STORE";
pub const ENV_OUTPUT: &str = "VENDOR_SUMMARY_OUTPUT";
pub const ENV_DATA_DIR: &str = "VENDOR_SUMMARY_DATA_DIR";
pub const ENV_LOG_DIR: &str = "VENDOR_SUMMARY_LOG_DIR";
