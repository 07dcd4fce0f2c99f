//! Registers every phase's metrics and detects name conflicts.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::ingest::IngestMetrics>(&mut all_metrics);
    register_phase_metrics::<super::build::BuildMetrics>(&mut all_metrics);
    register_phase_metrics::<super::export::ExportMetrics>(&mut all_metrics);

    info!("Registered {} metrics across all phases", all_metrics.len());

    if std::env::var("VENDOR_SUMMARY_METRICS_DEBUG").is_ok() {
        log_metrics_summary(&all_metrics);
    }
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<String, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();

    for doc in T::metrics_documentation() {
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict: '{}' registered again by phase '{}'",
                doc.name, phase_name
            );
        } else {
            all_metrics.insert(doc.name.to_string(), doc);
        }
    }
}

fn log_metrics_summary(all_metrics: &HashMap<String, MetricDoc>) {
    let mut by_phase: HashMap<&str, Vec<&MetricDoc>> = HashMap::new();
    for doc in all_metrics.values() {
        by_phase
            .entry(extract_phase_from_metric_name(doc.name))
            .or_default()
            .push(doc);
    }

    for (phase, metrics) in by_phase {
        debug!("Phase '{}': {} metrics", phase, metrics.len());
        for metric in metrics {
            debug!("  - {} ({:?}): {}", metric.name, metric.metric_type, metric.help);
        }
    }
}

/// "vendor_summary_build_grains_total" -> "build"
fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    if let Some(stripped) = metric_name.strip_prefix("vendor_summary_") {
        if let Some(next_underscore) = stripped.find('_') {
            return &stripped[..next_underscore];
        }
    }
    "unknown"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{BuildMetrics, ExportMetrics, IngestMetrics};
    use std::collections::HashSet;

    #[test]
    fn test_extract_phase_from_metric_name() {
        assert_eq!(
            extract_phase_from_metric_name("vendor_summary_build_grains_total"),
            "build"
        );
        assert_eq!(
            extract_phase_from_metric_name("vendor_summary_export_bytes"),
            "export"
        );
        assert_eq!(extract_phase_from_metric_name("process_cpu_seconds_total"), "unknown");
    }

    #[test]
    fn metric_names_are_unique_across_phases() {
        let mut seen = HashSet::new();
        let docs = IngestMetrics::metrics_documentation()
            .into_iter()
            .chain(BuildMetrics::metrics_documentation())
            .chain(ExportMetrics::metrics_documentation());
        for doc in docs {
            assert!(seen.insert(doc.name), "duplicate metric {}", doc.name);
        }
    }
}
