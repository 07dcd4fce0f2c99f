//! SQLite store access shared by the loader and the builder.

use crate::error::{Result, SummaryError};
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashSet;
use std::path::Path;

/// Open an existing store for reading. The builder never writes to the store.
pub fn open_read_only(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        return Err(SummaryError::Config(format!(
            "Store '{}' does not exist",
            path.display()
        )));
    }
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| {
        SummaryError::Config(format!("Failed to open store '{}': {}", path.display(), e))
    })
}

/// Open (creating if needed) a store for the loader.
pub fn open_read_write(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Connection::open(path).map_err(|e| {
        SummaryError::Config(format!("Failed to open store '{}': {}", path.display(), e))
    })
}

/// Quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt = conn.prepare(
        "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE",
    )?;
    let count: i64 = stmt.query_row(params![table], |row| row.get(0))?;
    Ok(count > 0)
}

/// Column names of a table, lowercased (SQLite identifiers are case-insensitive).
pub fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.into_iter().map(|n| n.to_lowercase()).collect())
}
