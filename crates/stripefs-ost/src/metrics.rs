//! OST metrics: per-op IOPS counters, throughput counters, and a
//! write-latency histogram, with Prometheus text exposition.
//!
//! Emission is fire-and-forget; nothing here can fail an operation.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Bucket boundaries in microseconds. Last bucket is open-ended.
const BUCKET_BOUNDARIES_US: [u64; 16] = [
    10,
    20,
    50,
    100,
    200,
    500,
    1_000,
    2_000,
    5_000,
    10_000,
    20_000,
    50_000,
    100_000,
    200_000,
    500_000,
    u64::MAX,
];

/// Fixed-bucket latency histogram backed by atomics.
#[derive(Debug)]
pub struct LatencyHistogram {
    buckets: [AtomicU64; 16],
    count: AtomicU64,
    sum_us: AtomicU64,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            count: AtomicU64::new(0),
            sum_us: AtomicU64::new(0),
        }
    }

    /// Record one latency sample.
    pub fn record(&self, latency: Duration) {
        let latency_us = latency.as_micros() as u64;
        let bucket_idx = BUCKET_BOUNDARIES_US
            .iter()
            .position(|&boundary| latency_us < boundary)
            .unwrap_or(BUCKET_BOUNDARIES_US.len() - 1);

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(latency_us, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum_us(&self) -> u64 {
        self.sum_us.load(Ordering::Relaxed)
    }

    /// Bucket upper bounds (microseconds) paired with per-bucket counts.
    pub fn bucket_counts(&self) -> Vec<(u64, u64)> {
        BUCKET_BOUNDARIES_US
            .iter()
            .zip(self.buckets.iter())
            .map(|(&boundary, count)| (boundary, count.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Cumulative OST counters since process start.
#[derive(Debug, Default)]
pub struct OstMetrics {
    write_ops: AtomicU64,
    read_ops: AtomicU64,
    delete_ops: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    write_latency: LatencyHistogram,
}

impl OstMetrics {
    /// Record one write: bytes accepted and observed latency.
    pub fn record_write(&self, bytes: u64, latency: Duration) {
        self.write_ops.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.write_latency.record(latency);
    }

    /// Record one read: bytes actually served after offset/length clamping.
    pub fn record_read(&self, bytes_served: u64) {
        self.read_ops.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes_served, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.delete_ops.fetch_add(1, Ordering::Relaxed);
    }

    /// Total I/O operations observed (writes + reads + deletes).
    pub fn iops_total(&self) -> u64 {
        self.write_ops.load(Ordering::Relaxed)
            + self.read_ops.load(Ordering::Relaxed)
            + self.delete_ops.load(Ordering::Relaxed)
    }

    /// Total bytes accepted by writes. Read bytes are tracked separately in
    /// [`read_throughput_bytes`](Self::read_throughput_bytes).
    pub fn throughput_bytes(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn read_throughput_bytes(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Export all counters in Prometheus text format.
    pub fn export_prometheus(&self, ost_id: &str) -> String {
        let mut output = String::with_capacity(4 * 1024);

        let ops = [
            ("write", self.write_ops.load(Ordering::Relaxed)),
            ("read", self.read_ops.load(Ordering::Relaxed)),
            ("delete", self.delete_ops.load(Ordering::Relaxed)),
        ];

        let _ = writeln!(
            output,
            "# HELP stripefs_iops_total Total I/O operations observed"
        );
        let _ = writeln!(output, "# TYPE stripefs_iops_total counter");
        for (op, count) in ops {
            let _ = writeln!(
                output,
                "stripefs_iops_total{{ost_id=\"{ost_id}\",op=\"{op}\"}} {count}"
            );
        }

        let _ = writeln!(
            output,
            "# HELP stripefs_read_throughput_bytes Total bytes served by reads"
        );
        let _ = writeln!(output, "# TYPE stripefs_read_throughput_bytes counter");
        let _ = writeln!(
            output,
            "stripefs_read_throughput_bytes{{ost_id=\"{ost_id}\"}} {}",
            self.bytes_read.load(Ordering::Relaxed)
        );

        let _ = writeln!(
            output,
            "# HELP stripefs_write_throughput_bytes Total bytes accepted by writes"
        );
        let _ = writeln!(output, "# TYPE stripefs_write_throughput_bytes counter");
        let _ = writeln!(
            output,
            "stripefs_write_throughput_bytes{{ost_id=\"{ost_id}\"}} {}",
            self.bytes_written.load(Ordering::Relaxed)
        );

        let _ = writeln!(
            output,
            "# HELP stripefs_write_latency_seconds Write latency per block"
        );
        let _ = writeln!(output, "# TYPE stripefs_write_latency_seconds histogram");
        let mut cumulative = 0u64;
        for (boundary_us, count) in self.write_latency.bucket_counts() {
            cumulative += count;
            if boundary_us == u64::MAX {
                continue;
            }
            let boundary_secs = boundary_us as f64 / 1_000_000.0;
            let _ = writeln!(
                output,
                "stripefs_write_latency_seconds_bucket{{ost_id=\"{ost_id}\",le=\"{boundary_secs}\"}} {cumulative}"
            );
        }
        let _ = writeln!(
            output,
            "stripefs_write_latency_seconds_bucket{{ost_id=\"{ost_id}\",le=\"+Inf\"}} {}",
            self.write_latency.count()
        );
        let _ = writeln!(
            output,
            "stripefs_write_latency_seconds_sum{{ost_id=\"{ost_id}\"}} {}",
            self.write_latency.sum_us() as f64 / 1_000_000.0
        );
        let _ = writeln!(
            output,
            "stripefs_write_latency_seconds_count{{ost_id=\"{ost_id}\"}} {}",
            self.write_latency.count()
        );

        output
    }
}
