//! Metrics for the summary pipeline
//!
//! Each pipeline phase defines its own metrics in a dedicated submodule. The
//! recorder is in-process only: a batch run has no scrape endpoint, so the
//! exposition text is written to a file at the end of the run when configured.

pub mod build;
pub mod export;
pub mod ingest;
pub mod registry;

pub use build::BuildMetrics;
pub use export::ExportMetrics;
pub use ingest::IngestMetrics;

use std::fs;
use std::path::Path;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and register all phase metrics.
///
/// Idempotent. A failure to install leaves metric macros as no-ops.
pub fn init_metrics() {
    INIT.call_once(|| {
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                if HANDLE.set(handle).is_err() {
                    warn!("Metrics handle already set");
                }
                registry::register_all_metrics();
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    });
}

/// Render the current metrics in Prometheus text format, if a recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// Write the rendered metrics to `path` (textfile-collector style).
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    let Some(text) = render() else {
        warn!("Metrics recorder not installed, skipping textfile");
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)?;
    info!("Wrote metrics to {}", path.display());
    Ok(())
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register all metrics for this phase
    fn register_metrics();

    /// Get the phase name for prefixing metrics
    fn phase_name() -> &'static str;

    /// Get documentation for all metrics in this phase
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Phase metric names follow `vendor_summary_{phase}_{name}[_total]`.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("vendor_summary_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("vendor_summary_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("vendor_summary_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_metric_naming() {
        assert_eq!(
            phase_metric!(counter, "build", "grains"),
            "vendor_summary_build_grains_total"
        );
        assert_eq!(
            phase_metric!(histogram, "export", "duration_seconds"),
            "vendor_summary_export_duration_seconds"
        );
    }
}
