use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::collector::{Collector, HistogramStats};

/// Structured snapshot of every registered metric.
///
/// Maps are `BTreeMap` so exported documents have a stable key order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Seconds since the collector was constructed.
    pub uptime_seconds: f64,
    /// Counter values by name.
    pub counters: BTreeMap<String, u64>,
    /// Gauge values by name.
    pub gauges: BTreeMap<String, f64>,
    /// Histogram summaries by name.
    pub histograms: BTreeMap<String, HistogramStats>,
    /// Timer summaries by name (values in seconds).
    pub timers: BTreeMap<String, HistogramStats>,
}

impl Collector {
    /// Produce a structured snapshot of all metrics.
    ///
    /// # Examples
    ///
    /// ```
    /// use kestrel_metrics::Collector;
    ///
    /// let collector = Collector::new();
    /// collector.inc_counter("requests_total");
    /// let snapshot = collector.export();
    /// assert_eq!(snapshot.counters["requests_total"], 1);
    /// ```
    pub fn export(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: self.uptime().as_secs_f64(),
            counters: self.counters_snapshot().into_iter().collect(),
            gauges: self.gauges_snapshot().into_iter().collect(),
            histograms: self.histograms_snapshot().into_iter().collect(),
            timers: self.timers_snapshot().into_iter().collect(),
        }
    }

    /// Render all metrics in Prometheus text exposition format, one `# TYPE`
    /// line per metric family. Histograms and timers are exposed as
    /// summaries with `quantile` labels plus `_sum`/`_count`.
    pub fn export_prometheus(&self) -> String {
        let snapshot = self.export();
        let mut out = String::new();

        let _ = writeln!(out, "# TYPE kestrel_uptime_seconds gauge");
        let _ = writeln!(out, "kestrel_uptime_seconds {}", snapshot.uptime_seconds);

        for (name, value) in &snapshot.counters {
            let name = sanitize(name);
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }

        for (name, value) in &snapshot.gauges {
            let name = sanitize(name);
            let _ = writeln!(out, "# TYPE {name} gauge");
            let _ = writeln!(out, "{name} {value}");
        }

        for (name, stats) in snapshot.histograms.iter().chain(snapshot.timers.iter()) {
            let name = sanitize(name);
            let _ = writeln!(out, "# TYPE {name} summary");
            let _ = writeln!(out, "{name}{{quantile=\"0.5\"}} {}", stats.p50);
            let _ = writeln!(out, "{name}{{quantile=\"0.9\"}} {}", stats.p90);
            let _ = writeln!(out, "{name}{{quantile=\"0.99\"}} {}", stats.p99);
            let _ = writeln!(out, "{name}_sum {}", stats.avg * stats.count as f64);
            let _ = writeln!(out, "{name}_count {}", stats.count);
        }

        out
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_includes_all_families() {
        let collector = Collector::new();
        collector.inc_counter("reviews_total");
        collector.set_gauge("queue_depth", 3.0);
        collector.observe("diff_files", 12.0);
        collector.start_timer("review_seconds").stop();

        let snapshot = collector.export();
        assert!(snapshot.uptime_seconds >= 0.0);
        assert_eq!(snapshot.counters["reviews_total"], 1);
        assert_eq!(snapshot.gauges["queue_depth"], 3.0);
        assert_eq!(snapshot.histograms["diff_files"].count, 1);
        assert_eq!(snapshot.timers["review_seconds"].count, 1);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let collector = Collector::new();
        collector.inc_counter("c");
        let json = serde_json::to_value(collector.export()).unwrap();
        assert!(json.get("uptimeSeconds").is_some());
        assert!(json.get("counters").is_some());
        assert!(json.get("histograms").is_some());
    }

    #[test]
    fn prometheus_has_type_lines() {
        let collector = Collector::new();
        collector.inc_counter("hits_total");
        collector.set_gauge("depth", 2.0);
        collector.observe("sizes", 1.0);

        let text = collector.export_prometheus();
        assert!(text.contains("# TYPE kestrel_uptime_seconds gauge"));
        assert!(text.contains("# TYPE hits_total counter"));
        assert!(text.contains("hits_total 1"));
        assert!(text.contains("# TYPE depth gauge"));
        assert!(text.contains("# TYPE sizes summary"));
        assert!(text.contains("sizes{quantile=\"0.5\"}"));
        assert!(text.contains("sizes_count 1"));
    }

    #[test]
    fn names_are_sanitized() {
        let collector = Collector::new();
        collector.inc_counter("api.requests/total");
        let text = collector.export_prometheus();
        assert!(text.contains("api_requests_total 1"));
    }
}
