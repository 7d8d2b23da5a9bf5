//! Prometheus text format export
//!
//! Renders a [`MetricRegistry`] snapshot in the text exposition format used
//! by the scrape endpoint and the push client.

use super::registry::MetricRegistry;
use super::types::HistogramData;
use std::fmt::{Display, Write};

/// Content type of the text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Export every metric with at least one series.
///
/// Output is deterministic: counters, then gauges, then histograms, each in
/// name order with series sorted by label set.
///
/// ```text
/// # HELP http_requests_total Total number of HTTP requests
/// # TYPE http_requests_total counter
/// http_requests_total{method="GET",path="/users/{id}",status="200"} 42
///
/// # HELP http_request_duration_seconds HTTP request duration in seconds
/// # TYPE http_request_duration_seconds histogram
/// http_request_duration_seconds_bucket{method="GET",path="/users/{id}",le="0.1"} 40
/// http_request_duration_seconds_bucket{method="GET",path="/users/{id}",le="+Inf"} 42
/// http_request_duration_seconds_sum{method="GET",path="/users/{id}"} 1.234
/// http_request_duration_seconds_count{method="GET",path="/users/{id}"} 42
/// ```
pub fn export_prometheus(registry: &MetricRegistry) -> String {
    let mut output = String::with_capacity(4096);

    for (def, counter) in registry.counters() {
        let values = counter.get_all();
        if !values.is_empty() {
            write_header(&mut output, &def.name, &def.help, "counter");
            for (labels, value) in values {
                write_sample(&mut output, &def.name, &labels, value);
            }
            output.push('\n');
        }
    }

    for (def, gauge) in registry.gauges() {
        let values = gauge.get_all();
        if !values.is_empty() {
            write_header(&mut output, &def.name, &def.help, "gauge");
            for (labels, value) in values {
                write_sample(&mut output, &def.name, &labels, value);
            }
            output.push('\n');
        }
    }

    for (def, histogram) in registry.histograms() {
        let data = histogram.get_all();
        if !data.is_empty() {
            write_header(&mut output, &def.name, &def.help, "histogram");
            for series in &data {
                write_histogram_series(&mut output, &def.name, series);
            }
            output.push('\n');
        }
    }

    output
}

fn write_header(output: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(output, "# HELP {name} {}", escape_help(help));
    let _ = writeln!(output, "# TYPE {name} {kind}");
}

fn write_sample(output: &mut String, name: &str, labels: &str, value: impl Display) {
    if labels.is_empty() {
        let _ = writeln!(output, "{name} {value}");
    } else {
        let _ = writeln!(output, "{name}{{{labels}}} {value}");
    }
}

fn write_histogram_series(output: &mut String, name: &str, series: &HistogramData) {
    let bucket_name = format!("{name}_bucket");
    for (&bound, &count) in series.buckets.iter().zip(&series.counts) {
        write_sample(output, &bucket_name, &series.labels_with_le(&format_le(bound)), count);
    }
    write_sample(output, &bucket_name, &series.labels_with_le("+Inf"), series.count);
    write_sample(output, &format!("{name}_sum"), &series.labels, series.sum);
    write_sample(output, &format!("{name}_count"), &series.labels, series.count);
}

/// Format a bucket boundary.
fn format_le(value: f64) -> String {
    if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == value.floor() && value.abs() < 1e10 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Extension trait adding text export to the registry.
pub trait PrometheusExport {
    fn export_prometheus(&self) -> String;
}

impl PrometheusExport for MetricRegistry {
    fn export_prometheus(&self) -> String {
        export_prometheus(self)
    }
}
