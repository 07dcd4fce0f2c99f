//! Boundary checks on the fact tables before any aggregation runs.
//!
//! Table and column presence are configuration errors. Numeric columns must
//! hold NULL, integers, finite reals, or text that parses as a finite number;
//! anything else is a data-quality error that aborts the build.

use crate::config::TableNames;
use crate::db::{quote_ident, table_columns, table_exists};
use crate::error::{Result, SummaryError};
use crate::types::FactKind;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

/// Check that every fact table exists and carries its required columns.
pub fn validate_schema(conn: &Connection, tables: &TableNames) -> Result<()> {
    for kind in FactKind::ALL {
        let table = tables.table_for(kind);
        if !table_exists(conn, table)? {
            return Err(SummaryError::MissingTable {
                table: table.to_string(),
            });
        }
        let columns = table_columns(conn, table)?;
        for column in kind.required_columns() {
            if !columns.contains(&column.to_lowercase()) {
                return Err(SummaryError::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        debug!(%kind, table, "Schema ok");
    }
    Ok(())
}

/// Check every numeric column of every fact table for values the cleaning rules cannot repair.
pub fn validate_numerics(conn: &Connection, tables: &TableNames) -> Result<()> {
    for kind in FactKind::ALL {
        let table = tables.table_for(kind);
        for column in kind.numeric_columns() {
            validate_numeric_column(conn, table, column)?;
        }
    }
    Ok(())
}

fn validate_numeric_column(conn: &Connection, table: &str, column: &str) -> Result<()> {
    let col = quote_ident(column);
    // Only text, blobs and infinities can be wrong; integers and finite reals are fine
    let sql = format!(
        "SELECT rowid, {col} FROM {table}
         WHERE typeof({col}) IN ('text', 'blob')
            OR (typeof({col}) = 'real' AND ABS({col}) > 1.7976931348623157e308)
         ORDER BY rowid",
        col = col,
        table = quote_ident(table),
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let row_id: i64 = row.get(0)?;
        if let Err(reason) = check_numeric(row.get_ref(1)?) {
            return Err(SummaryError::DataQuality {
                table: table.to_string(),
                column: column.to_string(),
                row_id,
                reason,
            });
        }
    }
    Ok(())
}

/// Whether a stored value can take part in a numeric aggregate.
fn check_numeric(value: ValueRef<'_>) -> std::result::Result<(), String> {
    match value {
        ValueRef::Null | ValueRef::Integer(_) => Ok(()),
        ValueRef::Real(v) if v.is_finite() => Ok(()),
        ValueRef::Real(v) => Err(format!("non-finite value {}", v)),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(());
            }
            match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(()),
                Ok(_) => Err(format!("non-finite value '{}'", trimmed)),
                Err(_) => Err(format!("'{}' is not a number", trimmed)),
            }
        }
        ValueRef::Blob(_) => Err("binary value in numeric column".to_string()),
    }
}
