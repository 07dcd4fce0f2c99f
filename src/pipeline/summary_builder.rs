use crate::config::TableNames;
use crate::error::{ErrorKind, Result};
use crate::metrics::BuildMetrics;
use crate::pipeline::processing::{aggregate, derive, schema, IntegrityReport};
use crate::types::VendorBrandSummary;
use rusqlite::Connection;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Result of one build: the summary rows and the anomalies seen along the way.
#[derive(Debug, Clone)]
pub struct SummaryBuild {
    pub rows: Vec<VendorBrandSummary>,
    pub report: IntegrityReport,
}

/// Builds the vendor/brand summary from the fact tables behind `conn`.
///
/// The connection is only read from. Every step completes before anything is
/// returned, so a failure leaves no partial summary.
pub struct SummaryBuilder<'a> {
    conn: &'a Connection,
    tables: &'a TableNames,
}

impl<'a> SummaryBuilder<'a> {
    pub fn new(conn: &'a Connection, tables: &'a TableNames) -> Self {
        Self { conn, tables }
    }

    #[instrument(skip_all, fields(
        purchases = %self.tables.purchases,
        sales = %self.tables.sales,
        vendor_invoice = %self.tables.vendor_invoice,
    ))]
    pub fn build(&self) -> Result<SummaryBuild> {
        let start = Instant::now();
        let result = self.build_inner();
        BuildMetrics::record_duration(start.elapsed().as_secs_f64());

        match &result {
            Ok(build) => {
                build.report.emit();
                info!(
                    rows = build.rows.len(),
                    warnings = build.report.warnings.len(),
                    "Summary built in {:.3}s",
                    start.elapsed().as_secs_f64()
                );
            }
            Err(e) => {
                BuildMetrics::record_failure(match e.kind() {
                    ErrorKind::Configuration => "configuration",
                    ErrorKind::DataQuality => "data_quality",
                });
                error!("Summary build failed: {}", e);
            }
        }
        result
    }

    fn build_inner(&self) -> Result<SummaryBuild> {
        info!("Validating source tables");
        schema::validate_schema(self.conn, self.tables)?;
        schema::validate_numerics(self.conn, self.tables)?;

        info!("Creating vendor summary");
        let joined = aggregate::aggregate(self.conn, self.tables)?;

        info!("Cleaning data");
        let derived = derive::derive_rows(&joined);
        let report = IntegrityReport::assess(&joined, &derived, self.tables);

        Ok(SummaryBuild {
            rows: derived.rows,
            report,
        })
    }
}
