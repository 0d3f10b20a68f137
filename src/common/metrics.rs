//! Metrics collection
//!
//! Prometheus-compatible counters, gauges and latency histograms for the
//! coordinator. Everything is lock-free atomics; rendering happens on demand.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for latency measurements (in milliseconds)
const LATENCY_BUCKETS: [f64; 11] = [
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create a new histogram with default latency buckets
    pub fn new() -> Self {
        Self::with_buckets(&LATENCY_BUCKETS)
    }

    /// Create a histogram with custom bucket boundaries
    pub fn with_buckets(boundaries: &[f64]) -> Self {
        let buckets = (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            boundaries: boundaries.to_vec(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value in the histogram
    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        // Stored as microseconds for precision
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_duration(&self, duration: Duration) {
        self.observe(duration.as_secs_f64() * 1000.0);
    }

    /// Cumulative bucket counts, ending with +Inf
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.boundaries.len() + 1);

        for (i, &boundary) in self.boundaries.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((boundary, cumulative));
        }

        cumulative += self.buckets[self.boundaries.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    /// Get sum of all observed values
    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    /// Get count of observations
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, v: u64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Global metrics registry
#[derive(Debug)]
pub struct MetricsRegistry {
    pub uploads_total: Counter,
    pub uploads_failed: Counter,
    pub downloads_total: Counter,
    pub downloads_failed: Counter,
    pub chunks_pushed: Counter,
    pub chunk_push_failures: Counter,
    pub chunks_pulled: Counter,
    pub bytes_uploaded: Counter,
    pub bytes_downloaded: Counter,
    pub node_registrations: Counter,
    pub nodes_evicted: Counter,
    pub chunk_records_dropped: Counter,
    pub replication_needed: Counter,

    pub active_nodes: Gauge,
    pub files: Gauge,

    pub upload_latency: Histogram,
    pub download_latency: Histogram,

    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            uploads_total: Counter::new(),
            uploads_failed: Counter::new(),
            downloads_total: Counter::new(),
            downloads_failed: Counter::new(),
            chunks_pushed: Counter::new(),
            chunk_push_failures: Counter::new(),
            chunks_pulled: Counter::new(),
            bytes_uploaded: Counter::new(),
            bytes_downloaded: Counter::new(),
            node_registrations: Counter::new(),
            nodes_evicted: Counter::new(),
            chunk_records_dropped: Counter::new(),
            replication_needed: Counter::new(),
            active_nodes: Gauge::new(),
            files: Gauge::new(),
            upload_latency: Histogram::new(),
            download_latency: Histogram::new(),
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-compatible metrics output
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        let counters: [(&str, &str, &Counter); 13] = [
            ("uploads_total", "Uploads accepted", &self.uploads_total),
            ("uploads_failed_total", "Uploads rejected or aborted", &self.uploads_failed),
            ("downloads_total", "Downloads served", &self.downloads_total),
            ("downloads_failed_total", "Downloads that failed", &self.downloads_failed),
            ("chunks_pushed_total", "Chunks stored on a node", &self.chunks_pushed),
            ("chunk_push_failures_total", "Chunk pushes that failed and were dropped", &self.chunk_push_failures),
            ("chunks_pulled_total", "Chunks fetched from a node", &self.chunks_pulled),
            ("bytes_uploaded_total", "Bytes read from upload streams", &self.bytes_uploaded),
            ("bytes_downloaded_total", "Bytes reassembled for downloads", &self.bytes_downloaded),
            ("node_registrations_total", "Register/heartbeat calls", &self.node_registrations),
            ("nodes_evicted_total", "Nodes evicted for missing heartbeats", &self.nodes_evicted),
            ("chunk_records_dropped_total", "Chunk records removed by the sweeper", &self.chunk_records_dropped),
            ("replication_needed_total", "Re-replication signals emitted", &self.replication_needed),
        ];
        for (name, help, counter) in counters {
            write_metric(&mut out, name, help, "counter", counter.get());
        }

        write_metric(&mut out, "active_nodes", "Nodes currently registered", "gauge", self.active_nodes.get());
        write_metric(&mut out, "files", "Files with metadata", "gauge", self.files.get());
        write_metric(&mut out, "uptime_seconds", "Server uptime in seconds", "gauge", self.uptime_seconds());

        write_histogram(&mut out, "upload_duration_ms", "Upload duration in milliseconds", &self.upload_latency);
        write_histogram(&mut out, "download_duration_ms", "Download duration in milliseconds", &self.download_latency);

        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn write_metric(out: &mut String, name: &str, help: &str, kind: &str, value: u64) {
    // Writing to a String cannot fail
    let _ = writeln!(out, "# HELP minifs_{} {}", name, help);
    let _ = writeln!(out, "# TYPE minifs_{} {}", name, kind);
    let _ = writeln!(out, "minifs_{} {}", name, value);
}

fn write_histogram(out: &mut String, name: &str, help: &str, hist: &Histogram) {
    let _ = writeln!(out, "# HELP minifs_{} {}", name, help);
    let _ = writeln!(out, "# TYPE minifs_{} histogram", name);
    for (le, count) in hist.get_buckets() {
        if le.is_infinite() {
            let _ = writeln!(out, "minifs_{}_bucket{{le=\"+Inf\"}} {}", name, count);
        } else {
            let _ = writeln!(out, "minifs_{}_bucket{{le=\"{}\"}} {}", name, le, count);
        }
    }
    let _ = writeln!(out, "minifs_{}_sum {}", name, hist.sum());
    let _ = writeln!(out, "minifs_{}_count {}", name, hist.count());
}

/// Global metrics instance
pub static METRICS: once_cell::sync::Lazy<MetricsRegistry> =
    once_cell::sync::Lazy::new(MetricsRegistry::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram() {
        let hist = Histogram::new();

        hist.observe(5.0);
        hist.observe(50.0);
        hist.observe(50_000.0);

        assert_eq!(hist.count(), 3);

        let buckets = hist.get_buckets();
        assert_eq!(buckets.len(), LATENCY_BUCKETS.len() + 1);
        assert_eq!(buckets.last().unwrap().1, 3);
        // 5.0 and 50.0 both fit under the 50ms boundary
        assert_eq!(buckets[4], (50.0, 2));
    }

    #[test]
    fn test_counter() {
        let counter = Counter::new();

        assert_eq!(counter.get(), 0);
        counter.inc();
        assert_eq!(counter.get(), 1);
        counter.add(5);
        assert_eq!(counter.get(), 6);
    }

    #[test]
    fn test_gauge() {
        let gauge = Gauge::new();
        gauge.set(10);
        assert_eq!(gauge.get(), 10);
        gauge.set(3);
        assert_eq!(gauge.get(), 3);
    }

    #[test]
    fn test_prometheus_output() {
        let registry = MetricsRegistry::new();
        registry.uploads_total.inc();
        registry.chunk_push_failures.add(2);
        registry.active_nodes.set(4);
        registry.upload_latency.observe_duration(Duration::from_millis(20));

        let out = registry.to_prometheus();
        assert!(out.contains("minifs_uploads_total 1\n"));
        assert!(out.contains("minifs_chunk_push_failures_total 2\n"));
        assert!(out.contains("minifs_active_nodes 4\n"));
        assert!(out.contains("# TYPE minifs_upload_duration_ms histogram"));
        assert!(out.contains("minifs_upload_duration_ms_count 1\n"));
    }
}
