//! Store Loader metrics: files loaded, rows written, load time.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_table_loaded(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "tables_loaded")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "ingest", "rows_written")).increment(rows as u64);
    }

    pub fn record_file_error() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "file_errors")).increment(1);
    }

    pub fn record_duration(seconds: f64) {
        ::metrics::histogram!(phase_metric!(histogram, "ingest", "duration_seconds")).record(seconds);
    }
}

impl PhaseMetrics for IngestMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "ingest", "tables_loaded"));
        let _ = counter!(phase_metric!(counter, "ingest", "rows_written"));
        let _ = counter!(phase_metric!(counter, "ingest", "file_errors"));
        let _ = histogram!(phase_metric!(histogram, "ingest", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "ingest"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "ingest", "tables_loaded"),
                metric_type: MetricType::Counter,
                help: "CSV files loaded into the store as tables",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "rows_written"),
                metric_type: MetricType::Counter,
                help: "Rows inserted into the store",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "file_errors"),
                metric_type: MetricType::Counter,
                help: "CSV files that failed to load",
            },
            MetricDoc {
                name: phase_metric!(histogram, "ingest", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of a full ingest run",
            },
        ]
    }
}
