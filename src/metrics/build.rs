//! Summary Builder metrics
//!
//! Grain counts, dropped rows and sentinel substitutions, so a drift in source
//! data quality shows up between runs without opening the artifact.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct BuildMetrics;

impl BuildMetrics {
    pub fn record_grains(total: usize, purchase_only: usize, sales_only: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "build", "grains")).set(total as f64);
        ::metrics::gauge!(phase_metric!(gauge, "build", "purchase_only_grains")).set(purchase_only as f64);
        ::metrics::gauge!(phase_metric!(gauge, "build", "sales_only_grains")).set(sales_only as f64);
    }

    pub fn record_null_key_rows(table: &str, rows: u64) {
        ::metrics::counter!(
            phase_metric!(counter, "build", "null_key_rows_dropped"),
            "table" => table.to_string()
        )
        .increment(rows);
    }

    pub fn record_sentinels(metric: &'static str, count: usize) {
        ::metrics::counter!(
            phase_metric!(counter, "build", "sentinel_substitutions"),
            "metric" => metric
        )
        .increment(count as u64);
    }

    pub fn record_failure(kind: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "build", "failures"), "kind" => kind).increment(1);
    }

    pub fn record_duration(seconds: f64) {
        ::metrics::histogram!(phase_metric!(histogram, "build", "duration_seconds")).record(seconds);
    }
}

impl PhaseMetrics for BuildMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = gauge!(phase_metric!(gauge, "build", "grains"));
        let _ = gauge!(phase_metric!(gauge, "build", "purchase_only_grains"));
        let _ = gauge!(phase_metric!(gauge, "build", "sales_only_grains"));
        let _ = counter!(phase_metric!(counter, "build", "null_key_rows_dropped"));
        let _ = counter!(phase_metric!(counter, "build", "sentinel_substitutions"));
        let _ = counter!(phase_metric!(counter, "build", "failures"));
        let _ = histogram!(phase_metric!(histogram, "build", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "build"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(gauge, "build", "grains"),
                metric_type: MetricType::Gauge,
                help: "Vendor/brand grains in the last summary",
            },
            MetricDoc {
                name: phase_metric!(gauge, "build", "purchase_only_grains"),
                metric_type: MetricType::Gauge,
                help: "Grains with purchases but no recorded sales",
            },
            MetricDoc {
                name: phase_metric!(gauge, "build", "sales_only_grains"),
                metric_type: MetricType::Gauge,
                help: "Grains with sales but no recorded purchases",
            },
            MetricDoc {
                name: phase_metric!(counter, "build", "null_key_rows_dropped"),
                metric_type: MetricType::Counter,
                help: "Fact rows dropped for a null vendor or brand",
            },
            MetricDoc {
                name: phase_metric!(counter, "build", "sentinel_substitutions"),
                metric_type: MetricType::Counter,
                help: "Ratios replaced by the sentinel value",
            },
            MetricDoc {
                name: phase_metric!(counter, "build", "failures"),
                metric_type: MetricType::Counter,
                help: "Aborted builds by error kind",
            },
            MetricDoc {
                name: phase_metric!(histogram, "build", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of a summary build",
            },
        ]
    }
}
