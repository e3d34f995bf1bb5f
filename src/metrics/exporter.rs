use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::CacheMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;
use crate::stats::CacheStats;

/// Prometheus text exporter for loading cache snapshots.
///
/// This exporter writes in the Prometheus text exposition format so it can be
/// scraped by Prometheus or forwarded to an OpenTelemetry collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send + Sync> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send + Sync> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the exporter, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_metric(&self, kind: &str, suffix: &str, value: impl std::fmt::Display) {
        let name = self.metric_name(suffix);
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} {}", name, kind);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }

    fn write_stats(&self, stats: &CacheStats) {
        self.write_metric("counter", "hits_total", stats.hit_count);
        self.write_metric("counter", "misses_total", stats.miss_count);
        self.write_metric("counter", "load_success_total", stats.load_success_count);
        self.write_metric("counter", "load_failure_total", stats.load_failure_count);
        self.write_metric(
            "counter",
            "load_duration_seconds_total",
            stats.total_load_time.as_secs_f64(),
        );
    }
}

impl<W: Write + Send + Sync> MetricsExporter<CacheStats> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &CacheStats) {
        self.write_stats(snapshot);
    }
}

impl<W: Write + Send + Sync> MetricsExporter<CacheMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &CacheMetricsSnapshot) {
        self.write_stats(&snapshot.stats);
        self.write_metric("gauge", "cache_len", snapshot.cache_len);
        self.write_metric("gauge", "capacity", snapshot.capacity);
        self.write_metric("gauge", "loads_in_flight", snapshot.in_flight);
    }
}
