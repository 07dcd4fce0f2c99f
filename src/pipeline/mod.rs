// Data pipeline: ingestion into the store, summary processing, artifact export

pub mod export;
pub mod ingestion;
pub mod processing;
pub mod summary_builder;

pub use export::ExportReport;
pub use ingestion::{IngestReport, StoreLoader};
pub use summary_builder::{SummaryBuild, SummaryBuilder};

use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::pipeline::processing::IntegrityReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Result of a build run
#[derive(Debug, Serialize)]
pub struct BuildResult {
    pub store: PathBuf,
    pub output_file: PathBuf,
    pub rows: usize,
    pub sha256: String,
    pub integrity: IntegrityReport,
    pub completed_at: DateTime<Utc>,
}

pub struct Pipeline;

impl Pipeline {
    /// Load every CSV file of the data directory into the store.
    #[instrument(skip(config), fields(store = %config.store.path.display()))]
    pub fn ingest(config: &Config) -> Result<IngestReport> {
        info!("Ingesting raw data from {}", config.ingest.data_dir.display());
        let mut conn = db::open_read_write(&config.store.path)?;
        let mut loader = StoreLoader::new(&mut conn);
        let report = loader.load_dir(&config.ingest.data_dir)?;
        info!(
            tables = report.tables.len(),
            rows = report.total_rows(),
            "Ingestion complete"
        );
        Ok(report)
    }

    /// Build the summary from the store and export it.
    ///
    /// Nothing is written unless the whole build succeeds.
    #[instrument(skip(config), fields(store = %config.store.path.display()))]
    pub fn build(config: &Config) -> Result<BuildResult> {
        info!("Creating vendor summary table");
        let conn = db::open_read_only(&config.store.path)?;
        let build = SummaryBuilder::new(&conn, &config.tables).build()?;

        info!("Exporting summary to {}", config.export.path.display());
        let export = export::export_summary(&build.rows, &config.export.path)?;

        let result = BuildResult {
            store: config.store.path.clone(),
            output_file: export.path,
            rows: export.rows,
            sha256: export.sha256,
            integrity: build.report,
            completed_at: Utc::now(),
        };
        if let Ok(json) = serde_json::to_string(&result) {
            info!(result = %json, "Completed");
        }
        Ok(result)
    }

    /// Ingest then build, as one run.
    pub fn run(config: &Config) -> Result<(IngestReport, BuildResult)> {
        let ingest = Self::ingest(config)?;
        let build = Self::build(config)?;
        Ok((ingest, build))
    }
}
