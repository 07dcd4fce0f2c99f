// Pipeline ingestion: raw CSV files into the SQLite store

pub mod loader;

pub use loader::{ColumnType, IngestReport, LoadedTable, StoreLoader};
