//! Writes the summary artifact.
//!
//! The whole file is rendered in memory, then written to a temp file beside the
//! target and renamed over it. A failed run leaves the previous artifact as it was.

use crate::constants::SUMMARY_COLUMNS;
use crate::error::{Result, SummaryError};
use crate::metrics::ExportMetrics;
use crate::types::VendorBrandSummary;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: usize,
    /// Hex SHA-256 of the artifact; identical inputs give identical digests.
    pub sha256: String,
}

/// Header plus one line per row, columns in artifact order.
pub fn render_csv(rows: &[VendorBrandSummary]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(SUMMARY_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| SummaryError::Io(e.into_error()))
}

pub fn export_summary(rows: &[VendorBrandSummary], path: &Path) -> Result<ExportReport> {
    let bytes = render_csv(rows)?;
    let sha256 = hex::encode(Sha256::digest(&bytes));

    if let Err(e) = write_atomic(path, &bytes) {
        ExportMetrics::record_error();
        error!("Failed to write {}: {}", path.display(), e);
        return Err(e);
    }

    ExportMetrics::record_written(rows.len(), bytes.len());
    info!(
        path = %path.display(),
        rows = rows.len(),
        bytes = bytes.len(),
        sha256 = %sha256,
        "Summary exported"
    );

    Ok(ExportReport {
        path: path.to_path_buf(),
        rows: rows.len(),
        bytes: bytes.len(),
        sha256,
    })
}

/// Replace `path` with `bytes` in one rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let unwritable = |e: std::io::Error| {
        SummaryError::Config(format!(
            "Output path '{}' is not writable: {}",
            path.display(),
            e
        ))
    };

    fs::create_dir_all(&dir).map_err(unwritable)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".vendor_summary")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(unwritable)?;
    tmp.write_all(bytes).map_err(unwritable)?;
    tmp.as_file().sync_all().map_err(unwritable)?;
    tmp.persist(path).map_err(|e| unwritable(e.error))?;
    Ok(())
}
