use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct ExportMetrics;

impl ExportMetrics {
    pub fn record_written(rows: usize, bytes: usize) {
        ::metrics::counter!(phase_metric!(counter, "export", "artifacts_written")).increment(1);
        ::metrics::gauge!(phase_metric!(gauge, "export", "rows")).set(rows as f64);
        ::metrics::gauge!(phase_metric!(gauge, "export", "bytes")).set(bytes as f64);
    }

    pub fn record_error() {
        ::metrics::counter!(phase_metric!(counter, "export", "errors")).increment(1);
    }
}

impl PhaseMetrics for ExportMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge};

        let _ = counter!(phase_metric!(counter, "export", "artifacts_written"));
        let _ = counter!(phase_metric!(counter, "export", "errors"));
        let _ = gauge!(phase_metric!(gauge, "export", "rows"));
        let _ = gauge!(phase_metric!(gauge, "export", "bytes"));
    }

    fn phase_name() -> &'static str {
        "export"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "export", "artifacts_written"),
                metric_type: MetricType::Counter,
                help: "Summary artifacts atomically written",
            },
            MetricDoc {
                name: phase_metric!(counter, "export", "errors"),
                metric_type: MetricType::Counter,
                help: "Failed artifact writes",
            },
            MetricDoc {
                name: phase_metric!(gauge, "export", "rows"),
                metric_type: MetricType::Gauge,
                help: "Rows in the last written artifact",
            },
            MetricDoc {
                name: phase_metric!(gauge, "export", "bytes"),
                metric_type: MetricType::Gauge,
                help: "Size of the last written artifact",
            },
        ]
    }
}
