//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::types::SensorKind;
use crate::services::alerts::Alert;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps counters to get a consistent snapshot.
pub struct Metrics {
    /// Position reports accepted (monotonic)
    position_reports_total: AtomicU64,
    /// Noise readings accepted (monotonic)
    noise_reports_total: AtomicU64,
    /// Smoke readings accepted (monotonic)
    smoke_reports_total: AtomicU64,
    /// Prisoners registered (monotonic)
    registrations_total: AtomicU64,
    /// Full resets (monotonic)
    resets_total: AtomicU64,
    /// Requests rejected as invalid or not found (monotonic)
    rejected_total: AtomicU64,
    curfew_alerts_total: AtomicU64,
    capacity_alerts_total: AtomicU64,
    noise_alerts_total: AtomicU64,
    smoke_alerts_total: AtomicU64,
    /// Edge-triggered alerts held back because they were already firing
    alerts_suppressed_total: AtomicU64,
    /// Consolidated position broadcasts (monotonic)
    sweeps_total: AtomicU64,
    /// Egress messages dropped because the channel was full or closed
    publish_failures_total: AtomicU64,
    /// Operations since last report (reset on report)
    ops_since_report: AtomicU64,
    /// Sum of operation latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max operation latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Operation latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            position_reports_total: AtomicU64::new(0),
            noise_reports_total: AtomicU64::new(0),
            smoke_reports_total: AtomicU64::new(0),
            registrations_total: AtomicU64::new(0),
            resets_total: AtomicU64::new(0),
            rejected_total: AtomicU64::new(0),
            curfew_alerts_total: AtomicU64::new(0),
            capacity_alerts_total: AtomicU64::new(0),
            noise_alerts_total: AtomicU64::new(0),
            smoke_alerts_total: AtomicU64::new(0),
            alerts_suppressed_total: AtomicU64::new(0),
            sweeps_total: AtomicU64::new(0),
            publish_failures_total: AtomicU64::new(0),
            ops_since_report: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_position_report(&self) {
        self.position_reports_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sensor_report(&self, kind: SensorKind) {
        match kind {
            SensorKind::Noise => self.noise_reports_total.fetch_add(1, Ordering::Relaxed),
            SensorKind::Smoke => self.smoke_reports_total.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[inline]
    pub fn record_registration(&self) {
        self.registrations_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reset(&self) {
        self.resets_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that failed validation
    #[inline]
    pub fn record_rejected(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an alert that was published
    #[inline]
    pub fn record_alert(&self, alert: &Alert) {
        let counter = match alert {
            Alert::Curfew { .. } => &self.curfew_alerts_total,
            Alert::Capacity { .. } => &self.capacity_alerts_total,
            Alert::Sensor { kind: SensorKind::Noise, .. } => &self.noise_alerts_total,
            Alert::Sensor { kind: SensorKind::Smoke, .. } => &self.smoke_alerts_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alert_suppressed(&self) {
        self.alerts_suppressed_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sweep(&self) {
        self.sweeps_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_publish_failure(&self) {
        self.publish_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an operation was processed with given latency (lock-free)
    #[inline]
    pub fn record_latency(&self, latency_us: u64) {
        self.ops_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        let bucket = bucket_index(latency_us);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);

        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn position_reports_total(&self) -> u64 {
        self.position_reports_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn alerts_suppressed_total(&self) -> u64 {
        self.alerts_suppressed_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn publish_failures_total(&self) -> u64 {
        self.publish_failures_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sweeps_total(&self) -> u64 {
        self.sweeps_total.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self, prisoners: usize, occupied: u32) -> MetricsSummary {
        let ops_count = self.ops_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let ops_per_sec = if elapsed.as_secs_f64() > 0.0 {
            ops_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let avg_latency = if ops_count > 0 { latency_sum / ops_count } else { 0 };

        MetricsSummary {
            position_reports_total: self.position_reports_total.load(Ordering::Relaxed),
            noise_reports_total: self.noise_reports_total.load(Ordering::Relaxed),
            smoke_reports_total: self.smoke_reports_total.load(Ordering::Relaxed),
            registrations_total: self.registrations_total.load(Ordering::Relaxed),
            resets_total: self.resets_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            curfew_alerts_total: self.curfew_alerts_total.load(Ordering::Relaxed),
            capacity_alerts_total: self.capacity_alerts_total.load(Ordering::Relaxed),
            noise_alerts_total: self.noise_alerts_total.load(Ordering::Relaxed),
            smoke_alerts_total: self.smoke_alerts_total.load(Ordering::Relaxed),
            alerts_suppressed_total: self.alerts_suppressed_total.load(Ordering::Relaxed),
            sweeps_total: self.sweeps_total.load(Ordering::Relaxed),
            publish_failures_total: self.publish_failures_total.load(Ordering::Relaxed),
            ops_per_sec,
            avg_latency_us: avg_latency,
            max_latency_us: max_latency,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            lat_buckets,
            prisoners,
            occupied,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for Prometheus formatting)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug)]
pub struct MetricsSummary {
    pub position_reports_total: u64,
    pub noise_reports_total: u64,
    pub smoke_reports_total: u64,
    pub registrations_total: u64,
    pub resets_total: u64,
    pub rejected_total: u64,
    pub curfew_alerts_total: u64,
    pub capacity_alerts_total: u64,
    pub noise_alerts_total: u64,
    pub smoke_alerts_total: u64,
    pub alerts_suppressed_total: u64,
    pub sweeps_total: u64,
    pub publish_failures_total: u64,
    pub ops_per_sec: f64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    /// Operation latency histogram buckets
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p99_us: u64,
    /// Registered prisoners at report time
    pub prisoners: usize,
    /// Prisoners inside some zone at report time
    pub occupied: u32,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            positions = %self.position_reports_total,
            ops_per_sec = format!("{:.1}", self.ops_per_sec),
            avg_latency_us = %self.avg_latency_us,
            max_latency_us = %self.max_latency_us,
            p99_us = %self.lat_p99_us,
            prisoners = %self.prisoners,
            occupied = %self.occupied,
            curfew_alerts = %self.curfew_alerts_total,
            capacity_alerts = %self.capacity_alerts_total,
            suppressed = %self.alerts_suppressed_total,
            publish_failures = %self.publish_failures_total,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ZoneId;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.position_reports_total(), 0);
        assert_eq!(metrics.publish_failures_total(), 0);
    }

    #[test]
    fn test_record_latency_and_report() {
        let metrics = Metrics::new();

        metrics.record_latency(100);
        metrics.record_latency(200);
        metrics.record_latency(300);
        metrics.record_position_report();

        let summary = metrics.report(3, 2);

        assert_eq!(summary.position_reports_total, 1);
        assert_eq!(summary.avg_latency_us, 200); // (100+200+300)/3
        assert_eq!(summary.max_latency_us, 300);
        assert_eq!(summary.prisoners, 3);
        assert_eq!(summary.occupied, 2);

        // Periodic counters should be reset
        assert_eq!(metrics.ops_since_report.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.latency_sum_us.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.latency_max_us.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_report_empty() {
        let metrics = Metrics::new();
        let summary = metrics.report(0, 0);

        assert_eq!(summary.avg_latency_us, 0);
        assert_eq!(summary.lat_p99_us, 0);
    }

    #[test]
    fn test_alerts_counted_per_category() {
        let metrics = Metrics::new();
        let zone = ZoneId::from("A");

        metrics.record_alert(&Alert::Capacity { zone_id: zone.clone(), zone_name: "Comedor".into(), occupancy: 21, capacity: 20 });
        metrics.record_alert(&Alert::Sensor { kind: SensorKind::Smoke, zone_id: zone.clone(), level: 2.0, threshold: 1.0 });
        metrics.record_alert(&Alert::Sensor { kind: SensorKind::Smoke, zone_id: zone, level: 3.0, threshold: 1.0 });
        metrics.record_alert_suppressed();

        let summary = metrics.report(0, 0);
        assert_eq!(summary.capacity_alerts_total, 1);
        assert_eq!(summary.smoke_alerts_total, 2);
        assert_eq!(summary.noise_alerts_total, 0);
        assert_eq!(summary.alerts_suppressed_total, 1);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    m.record_position_report();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.position_reports_total(), 10_000);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(51200), 9);
        assert_eq!(bucket_index(51201), 10); // overflow
    }

    #[test]
    fn test_percentile_computation() {
        let metrics = Metrics::new();

        for _ in 0..100 {
            metrics.record_latency(150);
        }

        let summary = metrics.report(0, 0);

        // All percentiles land in the ≤200 bucket
        assert_eq!(summary.lat_p50_us, 200);
        assert_eq!(summary.lat_p99_us, 200);
        assert_eq!(summary.lat_buckets[1], 100);
    }
}
