//! Pre-aggregation and the outer join of purchase and sales facts.
//!
//! Each fact table is summed per trimmed (vendor, brand) before joining, so the
//! join is one-to-one and cannot multiply rows. The join keeps grains present
//! on either side: a union of the two key sets, left-joined to both
//! aggregates, which behaves as a full outer join on any SQLite version.
//!
//! Sums use `TOTAL`, which is `0.0` over no values and never NULL otherwise.
//! A NULL or non-finite total therefore means the sum overflowed.

use crate::config::TableNames;
use crate::constants;
use crate::db::quote_ident;
use crate::error::{Result, SummaryError};
use crate::types::{FactKind, GrainKey, GrainTotals, PurchaseTotals, SalesTotals};
use rusqlite::Connection;
use std::collections::BTreeMap;
use tracing::debug;

/// Everything the derived-metric step needs from the store.
#[derive(Debug, Clone, Default)]
pub struct JoinedFacts {
    /// One entry per grain, ordered by vendor then brand.
    pub grains: Vec<GrainTotals>,
    /// Total invoice freight per trimmed vendor name.
    pub vendor_freight: BTreeMap<String, f64>,
    /// Rows skipped because their vendor or brand key was null or blank.
    pub null_key_rows: Vec<(FactKind, u64)>,
}

pub fn aggregate(conn: &Connection, tables: &TableNames) -> Result<JoinedFacts> {
    let grains = join_grains(conn, tables)?;
    let vendor_freight = vendor_freight(conn, &tables.vendor_invoice)?;

    let mut null_key_rows = Vec::new();
    for kind in FactKind::ALL {
        let dropped = count_null_key_rows(conn, kind, tables.table_for(kind))?;
        if dropped > 0 {
            null_key_rows.push((kind, dropped));
        }
    }

    debug!(
        grains = grains.len(),
        vendors_with_freight = vendor_freight.len(),
        "Aggregated facts"
    );

    Ok(JoinedFacts {
        grains,
        vendor_freight,
        null_key_rows,
    })
}

/// `TRIM` over ASCII whitespace; bare `TRIM(x)` only strips spaces.
fn trimmed(quoted_col: &str) -> String {
    format!("TRIM({quoted_col}, ' ' || char(9, 10, 11, 12, 13))")
}

/// `col IS NOT NULL AND <trimmed col> <> ''` for every key column.
fn key_present(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| {
            let c = quote_ident(c);
            format!("{c} IS NOT NULL AND {} <> ''", trimmed(&c))
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn key_columns(kind: FactKind) -> &'static [&'static str] {
    match kind {
        FactKind::Purchase | FactKind::Sales => &[constants::VENDOR_NAME, constants::DESCRIPTION],
        FactKind::VendorInvoice => &[constants::VENDOR_NAME],
    }
}

fn summary_query(tables: &TableNames) -> String {
    let vendor = trimmed(&quote_ident(constants::VENDOR_NAME));
    let brand = trimmed(&quote_ident(constants::DESCRIPTION));
    let grain_filter = key_present(&[constants::VENDOR_NAME, constants::DESCRIPTION]);

    format!(
        r#"
        WITH purchase_summary AS (
            SELECT
                {vendor} AS grain_vendor,
                {brand} AS grain_brand,
                TOTAL(CAST({p_qty} AS REAL)) AS total_quantity,
                TOTAL(CAST({p_dollars} AS REAL)) AS total_dollars,
                AVG(COALESCE(CAST({p_price} AS REAL), 0.0)) AS purchase_price
            FROM {purchases}
            WHERE {grain_filter}
            GROUP BY {vendor}, {brand}
        ),
        sales_summary AS (
            SELECT
                {vendor} AS grain_vendor,
                {brand} AS grain_brand,
                TOTAL(CAST({s_qty} AS REAL)) AS total_quantity,
                TOTAL(CAST({s_dollars} AS REAL)) AS total_dollars
            FROM {sales}
            WHERE {grain_filter}
            GROUP BY {vendor}, {brand}
        ),
        grains AS (
            SELECT grain_vendor, grain_brand FROM purchase_summary
            UNION
            SELECT grain_vendor, grain_brand FROM sales_summary
        )
        SELECT
            g.grain_vendor,
            g.grain_brand,
            ps.grain_vendor IS NOT NULL AS has_purchases,
            ps.total_quantity,
            ps.total_dollars,
            ps.purchase_price,
            ss.grain_vendor IS NOT NULL AS has_sales,
            ss.total_quantity,
            ss.total_dollars
        FROM grains g
        LEFT JOIN purchase_summary ps
            ON ps.grain_vendor = g.grain_vendor
           AND ps.grain_brand = g.grain_brand
        LEFT JOIN sales_summary ss
            ON ss.grain_vendor = g.grain_vendor
           AND ss.grain_brand = g.grain_brand
        ORDER BY g.grain_vendor, g.grain_brand
        "#,
        vendor = vendor,
        brand = brand,
        grain_filter = grain_filter,
        purchases = quote_ident(&tables.purchases),
        sales = quote_ident(&tables.sales),
        p_qty = quote_ident(constants::PURCHASE_QUANTITY),
        p_dollars = quote_ident(constants::PURCHASE_DOLLARS),
        p_price = quote_ident(constants::PURCHASE_PRICE),
        s_qty = quote_ident(constants::SALES_QUANTITY),
        s_dollars = quote_ident(constants::SALES_DOLLARS),
    )
}

/// A grain row as read from the store, before totals are checked.
struct RawGrain {
    key: GrainKey,
    purchases: Option<[Option<f64>; 3]>,
    sales: Option<[Option<f64>; 2]>,
}

fn join_grains(conn: &Connection, tables: &TableNames) -> Result<Vec<GrainTotals>> {
    let mut stmt = conn.prepare(&summary_query(tables))?;
    let rows = stmt.query_map([], |row| {
        let key = GrainKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
        let purchases = if row.get::<_, bool>(2)? {
            Some([row.get(3)?, row.get(4)?, row.get(5)?])
        } else {
            None
        };
        let sales = if row.get::<_, bool>(6)? {
            Some([row.get(7)?, row.get(8)?])
        } else {
            None
        };
        Ok(RawGrain {
            key,
            purchases,
            sales,
        })
    })?;

    let mut grains = Vec::new();
    for raw in rows {
        let raw = raw?;
        let purchases = match raw.purchases {
            Some([quantity, dollars, price]) => {
                let table = &tables.purchases;
                Some(PurchaseTotals {
                    quantity: finite_total(quantity, table, constants::PURCHASE_QUANTITY, &raw.key)?,
                    dollars: finite_total(dollars, table, constants::PURCHASE_DOLLARS, &raw.key)?,
                    purchase_price: finite_total(price, table, constants::PURCHASE_PRICE, &raw.key)?,
                })
            }
            None => None,
        };
        let sales = match raw.sales {
            Some([quantity, dollars]) => {
                let table = &tables.sales;
                Some(SalesTotals {
                    quantity: finite_total(quantity, table, constants::SALES_QUANTITY, &raw.key)?,
                    dollars: finite_total(dollars, table, constants::SALES_DOLLARS, &raw.key)?,
                })
            }
            None => None,
        };
        grains.push(GrainTotals {
            key: raw.key,
            purchases,
            sales,
        });
    }
    Ok(grains)
}

fn finite_total(
    value: Option<f64>,
    table: &str,
    column: &str,
    group: &impl std::fmt::Display,
) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(SummaryError::NonFiniteTotal {
            table: table.to_string(),
            column: column.to_string(),
            group: group.to_string(),
        }),
    }
}

fn vendor_freight(conn: &Connection, invoice_table: &str) -> Result<BTreeMap<String, f64>> {
    let vendor = trimmed(&quote_ident(constants::VENDOR_NAME));
    let sql = format!(
        "SELECT {vendor}, TOTAL(CAST({freight} AS REAL))
         FROM {table}
         WHERE {filter}
         GROUP BY {vendor}",
        vendor = vendor,
        freight = quote_ident(constants::FREIGHT),
        table = quote_ident(invoice_table),
        filter = key_present(&[constants::VENDOR_NAME]),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?))
    })?;

    let mut freight = BTreeMap::new();
    for row in rows {
        let (name, total) = row?;
        let total = finite_total(total, invoice_table, constants::FREIGHT, &name)?;
        freight.insert(name, total);
    }
    Ok(freight)
}

fn count_null_key_rows(conn: &Connection, kind: FactKind, table: &str) -> Result<u64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE NOT ({})",
        quote_ident(table),
        key_present(key_columns(kind))
    );
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE purchases (VendorName TEXT, Description TEXT, Quantity INTEGER, Dollars REAL, PurchasePrice REAL);
             CREATE TABLE sales (VendorName TEXT, Description TEXT, SalesQuantity INTEGER, SalesDollars REAL);
             CREATE TABLE vendor_invoice (VendorName TEXT, Freight REAL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn many_to_many_lines_do_not_multiply() {
        let conn = store();
        conn.execute_batch(
            "INSERT INTO purchases VALUES ('Acme', 'Gadget', 20, 80.0, 4.0);
             INSERT INTO purchases VALUES ('Acme', 'Gadget', 30, 120.0, 4.0);
             INSERT INTO sales VALUES ('Acme', 'Gadget', 10, 60.0);
             INSERT INTO sales VALUES ('Acme', 'Gadget', 15, 90.0);
             INSERT INTO sales VALUES ('Acme', 'Gadget', 25, 150.0);",
        )
        .unwrap();

        let joined = aggregate(&conn, &TableNames::default()).unwrap();
        assert_eq!(joined.grains.len(), 1);

        let grain = &joined.grains[0];
        let purchases = grain.purchases.unwrap();
        let sales = grain.sales.unwrap();
        assert_eq!(purchases.quantity, 50.0);
        assert_eq!(purchases.dollars, 200.0);
        assert_eq!(purchases.purchase_price, 4.0);
        assert_eq!(sales.quantity, 50.0);
        assert_eq!(sales.dollars, 300.0);
    }

    #[test]
    fn one_sided_grains_survive_the_join() {
        let conn = store();
        conn.execute_batch(
            "INSERT INTO purchases VALUES ('Acme', 'Widget', 100, 500.0, 5.0);
             INSERT INTO sales VALUES ('Beta', 'Phantom', 3, 30.0);",
        )
        .unwrap();

        let joined = aggregate(&conn, &TableNames::default()).unwrap();
        let keys: Vec<_> = joined.grains.iter().map(|g| g.key.clone()).collect();
        assert_eq!(
            keys,
            vec![GrainKey::new("Acme", "Widget"), GrainKey::new("Beta", "Phantom")]
        );
        assert!(joined.grains[0].sales.is_none());
        assert!(joined.grains[1].purchases.is_none());
    }

    #[test]
    fn keys_are_trimmed_and_null_keys_counted() {
        let conn = store();
        conn.execute_batch(
            "INSERT INTO purchases VALUES ('Acme  ', ' Widget', 1, 2.0, 2.0);
             INSERT INTO purchases VALUES ('Acme', 'Widget', 1, 2.0, 2.0);
             INSERT INTO purchases VALUES (NULL, 'Widget', 1, 2.0, 2.0);
             INSERT INTO sales VALUES ('Acme', '   ', 1, 2.0);
             INSERT INTO vendor_invoice VALUES (' Acme ', 10.0);
             INSERT INTO vendor_invoice VALUES ('Acme', 5.5);
             INSERT INTO vendor_invoice VALUES (NULL, 1.0);",
        )
        .unwrap();

        let joined = aggregate(&conn, &TableNames::default()).unwrap();
        assert_eq!(joined.grains.len(), 1);
        assert_eq!(joined.grains[0].purchases.unwrap().quantity, 2.0);
        assert_eq!(joined.vendor_freight.get("Acme"), Some(&15.5));
        assert_eq!(
            joined.null_key_rows,
            vec![
                (FactKind::Purchase, 1),
                (FactKind::Sales, 1),
                (FactKind::VendorInvoice, 1)
            ]
        );
    }

    #[test]
    fn null_numerics_count_as_zero() {
        let conn = store();
        conn.execute_batch("INSERT INTO sales VALUES ('Acme', 'Widget', NULL, NULL);")
            .unwrap();

        let joined = aggregate(&conn, &TableNames::default()).unwrap();
        assert_eq!(joined.grains[0].sales, Some(SalesTotals::default()));
    }

    #[test]
    fn tabs_and_newlines_are_trimmed_from_keys() {
        let conn = store();
        conn.execute_batch(
            "INSERT INTO purchases VALUES ('Acme', 'Gadget', 50, 200.0, 4.0);
             INSERT INTO sales VALUES ('Acme' || char(9), char(10) || 'Gadget', 50, 300.0);
             INSERT INTO sales VALUES ('Beta', char(9), 1, 3.0);
             INSERT INTO vendor_invoice VALUES (char(13, 10) || 'Acme' || char(9), 4.0);",
        )
        .unwrap();

        let joined = aggregate(&conn, &TableNames::default()).unwrap();
        assert_eq!(joined.grains.len(), 1);

        let grain = &joined.grains[0];
        assert_eq!(grain.key, GrainKey::new("Acme", "Gadget"));
        assert_eq!(grain.purchases.unwrap().dollars, 200.0);
        assert_eq!(grain.sales.unwrap().dollars, 300.0);
        assert_eq!(joined.vendor_freight.get("Acme"), Some(&4.0));
        assert_eq!(joined.null_key_rows, vec![(FactKind::Sales, 1)]);
    }

    #[test]
    fn overflowing_sum_is_a_data_quality_error() {
        let conn = store();
        conn.execute_batch(
            "INSERT INTO purchases VALUES ('Acme', 'Gadget', 1, 1.5e308, 4.0);
             INSERT INTO purchases VALUES ('Acme', 'Gadget', 1, 1.5e308, 4.0);
             INSERT INTO sales VALUES ('Acme', 'Gadget', 1, 10.0);",
        )
        .unwrap();

        let err = aggregate(&conn, &TableNames::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DataQuality);
        match err {
            SummaryError::NonFiniteTotal { table, column, group } => {
                assert_eq!(table, "purchases");
                assert_eq!(column, "Dollars");
                assert_eq!(group, "Acme / Gadget");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn overflowing_freight_is_a_data_quality_error() {
        let conn = store();
        conn.execute_batch(
            "INSERT INTO vendor_invoice VALUES ('Acme', 1.5e308);
             INSERT INTO vendor_invoice VALUES ('Acme', 1.5e308);",
        )
        .unwrap();

        assert!(matches!(
            aggregate(&conn, &TableNames::default()),
            Err(SummaryError::NonFiniteTotal { .. })
        ));
    }
}
