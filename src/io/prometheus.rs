//! Prometheus text exposition
//!
//! Renders monitor metrics and the live occupancy snapshot in Prometheus
//! text format. Served at `/metrics` by the HTTP API.

use crate::infra::metrics::{MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use crate::services::ledger::OccupancySnapshot;
use std::fmt::Write;

/// Content type for the text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with site label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    site: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    site: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    avg: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let sum = avg * count;
    let _ = writeln!(output, "{name}_sum{{site=\"{site}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{site=\"{site}\"}} {count}");
}

/// Format metrics in Prometheus text exposition format
pub fn format_prometheus_metrics(summary: &MetricsSummary, occupancy: &OccupancySnapshot, site_id: &str) -> String {
    let mut output = String::with_capacity(4096);

    write_report_metrics(&mut output, site_id, summary);
    write_alert_metrics(&mut output, site_id, summary);
    write_latency_metrics(&mut output, site_id, summary);
    write_occupancy(&mut output, site_id, summary, occupancy);

    output
}

fn write_report_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    let counters = [
        ("jail_position_reports_total", "Position reports accepted", summary.position_reports_total),
        ("jail_noise_reports_total", "Noise readings accepted", summary.noise_reports_total),
        ("jail_smoke_reports_total", "Smoke readings accepted", summary.smoke_reports_total),
        ("jail_registrations_total", "Prisoners registered", summary.registrations_total),
        ("jail_resets_total", "Full state resets", summary.resets_total),
        ("jail_rejected_requests_total", "Requests rejected by validation", summary.rejected_total),
        ("jail_sweeps_total", "Consolidated position broadcasts", summary.sweeps_total),
        ("jail_publish_failures_total", "Egress messages dropped", summary.publish_failures_total),
    ];
    for (name, help, val) in counters {
        write_metric(output, name, help, MetricType::Counter, site, val);
    }
}

fn write_alert_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    let _ = writeln!(output, "# HELP jail_alerts_total Alerts published by category");
    let _ = writeln!(output, "# TYPE jail_alerts_total counter");
    for (category, val) in [
        ("curfew", summary.curfew_alerts_total),
        ("capacity", summary.capacity_alerts_total),
        ("noise", summary.noise_alerts_total),
        ("smoke", summary.smoke_alerts_total),
    ] {
        let _ = writeln!(output, "jail_alerts_total{{site=\"{site}\",category=\"{category}\"}} {val}");
    }

    write_metric(
        output,
        "jail_alerts_suppressed_total",
        "Repeat alerts suppressed while already firing",
        MetricType::Counter,
        site,
        summary.alerts_suppressed_total,
    );
}

fn write_latency_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_histogram(
        output,
        "jail_operation_latency_us",
        "Report processing latency in microseconds",
        site,
        &summary.lat_buckets,
        &METRICS_BUCKET_BOUNDS,
        summary.avg_latency_us,
    );
    write_metric(
        output,
        "jail_operation_latency_max_us",
        "Maximum report processing latency since last scrape",
        MetricType::Gauge,
        site,
        summary.max_latency_us,
    );
}

fn write_occupancy(output: &mut String, site: &str, summary: &MetricsSummary, occupancy: &OccupancySnapshot) {
    write_metric(
        output,
        "jail_prisoners",
        "Registered prisoners",
        MetricType::Gauge,
        site,
        summary.prisoners as u64,
    );

    let _ = writeln!(output, "# HELP jail_zone_occupancy Prisoners currently resolved into each zone");
    let _ = writeln!(output, "# TYPE jail_zone_occupancy gauge");
    for (zone, count) in occupancy.iter() {
        let _ = writeln!(output, "jail_zone_occupancy{{site=\"{site}\",zone=\"{zone}\"}} {count}");
    }
}
