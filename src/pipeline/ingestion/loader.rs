//! Store Loader: one SQLite table per raw CSV file, fully replaced on every run.

use crate::db::quote_ident;
use crate::error::{Result, SummaryError};
use crate::metrics::IngestMetrics;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Storage class chosen for a column from the values in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Narrowest type that holds every non-empty value; all-empty columns are TEXT.
    pub fn infer<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
        let mut seen_any = false;
        let mut all_integer = true;
        let mut all_real = true;
        for raw in values {
            let v = raw.trim();
            if v.is_empty() {
                continue;
            }
            seen_any = true;
            if all_integer && v.parse::<i64>().is_err() {
                all_integer = false;
            }
            if all_real && !v.parse::<f64>().map(f64::is_finite).unwrap_or(false) {
                all_real = false;
            }
            if !all_integer && !all_real {
                return ColumnType::Text;
            }
        }
        match (seen_any, all_integer, all_real) {
            (false, _, _) => ColumnType::Text,
            (true, true, _) => ColumnType::Integer,
            (true, false, true) => ColumnType::Real,
            _ => ColumnType::Text,
        }
    }

    fn to_value(self, raw: &str) -> Value {
        let v = raw.trim();
        if v.is_empty() {
            return Value::Null;
        }
        match self {
            ColumnType::Integer => v.parse::<i64>().map(Value::Integer).unwrap_or(Value::Null),
            ColumnType::Real => v.parse::<f64>().map(Value::Real).unwrap_or(Value::Null),
            ColumnType::Text => Value::Text(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub source: String,
    pub table: String,
    pub rows: usize,
    pub columns: Vec<(String, ColumnType)>,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub tables: Vec<LoadedTable>,
    pub elapsed: Duration,
}

impl IngestReport {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Table name for a CSV file: its stem, with anything outside `[A-Za-z0-9_]` replaced.
pub fn table_name_for(path: &Path) -> Option<String> {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    let invalid = INVALID.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]").expect("static regex"));

    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() {
        return None;
    }
    Some(invalid.replace_all(stem, "_").into_owned())
}

fn is_csv(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
}

pub struct StoreLoader<'a> {
    conn: &'a mut Connection,
}

impl<'a> StoreLoader<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Load every CSV file in `data_dir`, in file name order.
    #[instrument(skip_all, fields(data_dir = %data_dir.display()))]
    pub fn load_dir(&mut self, data_dir: &Path) -> Result<IngestReport> {
        let start = Instant::now();

        let entries = fs::read_dir(data_dir).map_err(|e| {
            SummaryError::Config(format!(
                "Failed to read data directory '{}': {}",
                data_dir.display(),
                e
            ))
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_csv(p))
            .collect();
        files.sort();

        if files.is_empty() {
            warn!("No CSV files found");
        }

        let mut tables = Vec::with_capacity(files.len());
        for file in &files {
            info!("Ingesting {} in db", file.display());
            match self.load_file(file) {
                Ok(loaded) => tables.push(loaded),
                Err(e) => {
                    IngestMetrics::record_file_error();
                    return Err(e);
                }
            }
        }

        let elapsed = start.elapsed();
        IngestMetrics::record_duration(elapsed.as_secs_f64());
        info!(
            tables = tables.len(),
            "Ingestion complete in {:.2}s",
            elapsed.as_secs_f64()
        );

        Ok(IngestReport { tables, elapsed })
    }

    pub fn load_file(&mut self, path: &Path) -> Result<LoadedTable> {
        let table = table_name_for(path).ok_or_else(|| SummaryError::MalformedSource {
            file: path.display().to_string(),
            reason: "cannot derive a table name from the file name".to_string(),
        })?;
        let file = fs::File::open(path)?;
        self.load_reader(&table, &path.display().to_string(), file)
    }

    /// Replace `table` with the contents of a CSV stream.
    pub fn load_reader<R: Read>(&mut self, table: &str, source: &str, reader: R) -> Result<LoadedTable> {
        let malformed = |reason: String| SummaryError::MalformedSource {
            file: source.to_string(),
            reason,
        };

        let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|e| malformed(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        validate_headers(&headers).map_err(malformed)?;

        let mut records = Vec::new();
        for (line_num, result) in csv_reader.records().enumerate() {
            let record =
                result.map_err(|e| malformed(format!("line {}: {}", line_num + 2, e)))?;
            records.push(record);
        }

        let columns: Vec<(String, ColumnType)> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let ty = ColumnType::infer(records.iter().map(|r| r.get(i).unwrap_or("")));
                (name.clone(), ty)
            })
            .collect();

        let quoted_table = quote_ident(table);
        let column_defs = columns
            .iter()
            .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql()))
            .collect::<Vec<_>>()
            .join(", ");
        let column_list = columns
            .iter()
            .map(|(name, _)| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quoted_table), [])?;
        tx.execute(&format!("CREATE TABLE {} ({})", quoted_table, column_defs), [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quoted_table, column_list, placeholders
            ))?;
            for record in &records {
                let values = columns
                    .iter()
                    .enumerate()
                    .map(|(i, (_, ty))| ty.to_value(record.get(i).unwrap_or("")));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        IngestMetrics::record_table_loaded(records.len());
        info!(table, rows = records.len(), columns = columns.len(), "Loaded table");

        Ok(LoadedTable {
            source: source.to_string(),
            table: table.to_string(),
            rows: records.len(),
            columns,
        })
    }
}

fn validate_headers(headers: &[String]) -> std::result::Result<(), String> {
    if headers.is_empty() {
        return Err("no header row".to_string());
    }
    let mut seen = HashSet::new();
    for (i, h) in headers.iter().enumerate() {
        if h.is_empty() {
            return Err(format!("empty header name in column {}", i + 1));
        }
        if !seen.insert(h.to_lowercase()) {
            return Err(format!("duplicate header '{}'", h));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_narrowest_type() {
        assert_eq!(ColumnType::infer(["1", "2", ""].into_iter()), ColumnType::Integer);
        assert_eq!(ColumnType::infer(["1", "2.5"].into_iter()), ColumnType::Real);
        assert_eq!(ColumnType::infer(["1", "abc"].into_iter()), ColumnType::Text);
        assert_eq!(ColumnType::infer(["", " "].into_iter()), ColumnType::Text);
        assert_eq!(ColumnType::infer(["inf"].into_iter()), ColumnType::Text);
    }

    #[test]
    fn table_names_come_from_file_stems() {
        assert_eq!(table_name_for(Path::new("data/purchases.csv")).as_deref(), Some("purchases"));
        assert_eq!(
            table_name_for(Path::new("data/begin inventory-2016.csv")).as_deref(),
            Some("begin_inventory_2016")
        );
    }

    #[test]
    fn load_reader_replaces_table_and_maps_empty_to_null() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut loader = StoreLoader::new(&mut conn);

        let first = "VendorName,Description,Quantity\nAcme,Widget,3\nAcme,Gadget,\n";
        let loaded = loader.load_reader("purchases", "first.csv", first.as_bytes()).unwrap();
        assert_eq!(loaded.rows, 2);
        assert_eq!(loaded.columns[2], ("Quantity".to_string(), ColumnType::Integer));

        let second = "VendorName,Description,Quantity\nBeta,Widget,1.5\n";
        loader.load_reader("purchases", "second.csv", second.as_bytes()).unwrap();

        let (count, kind): (i64, String) = conn
            .query_row(
                "SELECT COUNT(*), typeof(MAX(Quantity)) FROM purchases",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(kind, "real");
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut loader = StoreLoader::new(&mut conn);

        let err = loader
            .load_reader("sales", "sales.csv", "Brand,brand\n1,2\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, SummaryError::MalformedSource { .. }));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut loader = StoreLoader::new(&mut conn);

        let err = loader
            .load_reader("sales", "sales.csv", "A,B\n1,2\n3\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }
}
