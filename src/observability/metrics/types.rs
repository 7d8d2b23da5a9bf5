//! Metric primitives: Counter, Gauge, Histogram
//!
//! Every primitive keeps one series per label set. Label sets are
//! pre-formatted Prometheus label bodies (`method="GET",path="/users/{id}"`);
//! build them with [`LabelSet`] so values are escaped.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Builder for a formatted, escaped label set.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    body: String,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `name="value"` pair. Backslashes, quotes and newlines in the
    /// value are escaped as the exposition format requires.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        if !self.body.is_empty() {
            self.body.push(',');
        }
        self.body.push_str(name);
        self.body.push_str("=\"");
        escape_label_value(&mut self.body, value);
        self.body.push('"');
        self
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }

    pub fn into_string(self) -> String {
        self.body
    }
}

fn escape_label_value(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}

/// Look up a series, creating it on first use.
///
/// The read lock covers the common case; the write lock is only taken the
/// first time a label set is seen.
fn with_series<T, R>(
    series: &RwLock<HashMap<String, T>>,
    labels: &str,
    init: impl FnOnce() -> T,
    f: impl Fn(&T) -> R,
) -> R {
    if let Some(value) = series.read().get(labels) {
        return f(value);
    }
    let mut series = series.write();
    let value = series.entry(labels.to_string()).or_insert_with(init);
    f(value)
}

/// Monotonically increasing counter (total requests, errors).
#[derive(Debug, Default)]
pub struct LabeledCounter {
    series: RwLock<HashMap<String, AtomicU64>>,
}

impl LabeledCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, labels: &str) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &str, value: u64) {
        with_series(&self.series, labels, || AtomicU64::new(0), |c| {
            c.fetch_add(value, Ordering::Relaxed);
        });
    }

    /// Current value, 0 for an unseen label set.
    pub fn get(&self, labels: &str) -> u64 {
        self.series
            .read()
            .get(labels)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// All series, sorted by label set.
    pub fn get_all(&self) -> Vec<(String, u64)> {
        let mut all: Vec<_> = self
            .series
            .read()
            .iter()
            .map(|(labels, c)| (labels.clone(), c.load(Ordering::Relaxed)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn series_count(&self) -> usize {
        self.series.read().len()
    }
}

/// Value that can go up and down (in-flight requests, queue depth).
#[derive(Debug, Default)]
pub struct Gauge {
    series: RwLock<HashMap<String, AtomicI64>>,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, labels: &str, value: i64) {
        with_series(&self.series, labels, || AtomicI64::new(0), |g| {
            g.store(value, Ordering::Relaxed);
        });
    }

    pub fn inc(&self, labels: &str) {
        self.add(labels, 1);
    }

    pub fn dec(&self, labels: &str) {
        self.add(labels, -1);
    }

    pub fn add(&self, labels: &str, value: i64) {
        with_series(&self.series, labels, || AtomicI64::new(0), |g| {
            g.fetch_add(value, Ordering::Relaxed);
        });
    }

    pub fn get(&self, labels: &str) -> i64 {
        self.series
            .read()
            .get(labels)
            .map_or(0, |g| g.load(Ordering::Relaxed))
    }

    /// All series, sorted by label set.
    pub fn get_all(&self) -> Vec<(String, i64)> {
        let mut all: Vec<_> = self
            .series
            .read()
            .iter()
            .map(|(labels, g)| (labels.clone(), g.load(Ordering::Relaxed)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

#[derive(Debug)]
struct HistogramSeries {
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

/// Distribution of observed values over fixed buckets.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<f64>,
    series: RwLock<HashMap<String, Mutex<HistogramSeries>>>,
}

impl Histogram {
    /// Create a histogram. Bucket boundaries are sorted ascending and NaNs
    /// dropped; `+Inf` is implicit.
    pub fn new(buckets: &[f64]) -> Self {
        let mut buckets: Vec<f64> = buckets.iter().copied().filter(|b| !b.is_nan()).collect();
        buckets.sort_by(f64::total_cmp);
        buckets.dedup();
        Self {
            buckets,
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Record one observation. Bucket counts are cumulative.
    pub fn observe(&self, labels: &str, value: f64) {
        let init = || {
            Mutex::new(HistogramSeries {
                counts: vec![0; self.buckets.len()],
                sum: 0.0,
                count: 0,
            })
        };
        with_series(&self.series, labels, init, |series| {
            let mut series = series.lock();
            for (count, &bound) in series.counts.iter_mut().zip(&self.buckets) {
                if value <= bound {
                    *count += 1;
                }
            }
            series.sum += value;
            series.count += 1;
        });
    }

    /// Snapshot of every series, sorted by label set.
    pub fn get_all(&self) -> Vec<HistogramData> {
        let mut all: Vec<_> = self
            .series
            .read()
            .iter()
            .map(|(labels, series)| {
                let series = series.lock();
                HistogramData {
                    labels: labels.clone(),
                    buckets: self.buckets.clone(),
                    counts: series.counts.clone(),
                    sum: series.sum,
                    count: series.count,
                }
            })
            .collect();
        all.sort_by(|a, b| a.labels.cmp(&b.labels));
        all
    }
}

/// Histogram snapshot for a single label set.
#[derive(Debug, Clone)]
pub struct HistogramData {
    /// Label set (e.g., `method="GET",path="/api"`)
    pub labels: String,
    /// Bucket upper bounds
    pub buckets: Vec<f64>,
    /// Cumulative count per bucket
    pub counts: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

impl HistogramData {
    /// Render the label set with an extra `le` label appended.
    pub fn labels_with_le(&self, le: &str) -> String {
        let mut out = String::with_capacity(self.labels.len() + le.len() + 6);
        if !self.labels.is_empty() {
            out.push_str(&self.labels);
            out.push(',');
        }
        let _ = write!(out, "le=\"{le}\"");
        out
    }
}

/// Buckets for HTTP request durations, in seconds.
pub const HTTP_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Buckets for job/task durations, in seconds.
pub const JOB_DURATION_BUCKETS: &[f64] = &[
    1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
];

/// Buckets for database query durations, in seconds.
pub const DB_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_set() {
        let labels = LabelSet::new().with("method", "GET").with("path", "/users/{id}");
        assert_eq!(labels.as_str(), "method=\"GET\",path=\"/users/{id}\"");
        assert_eq!(LabelSet::new().as_str(), "");
    }

    #[test]
    fn test_label_set_escapes_values() {
        let labels = LabelSet::new().with("path", "/a\"b\\c\nd");
        assert_eq!(labels.into_string(), "path=\"/a\\\"b\\\\c\\nd\"");
    }

    #[test]
    fn test_counter_basic() {
        let counter = LabeledCounter::new();
        counter.inc("method=\"GET\"");
        counter.inc("method=\"GET\"");
        counter.add("method=\"POST\"", 3);

        assert_eq!(counter.get("method=\"GET\""), 2);
        assert_eq!(counter.get("method=\"POST\""), 3);
        assert_eq!(counter.get("method=\"PUT\""), 0);
        assert_eq!(counter.series_count(), 2);
    }

    #[test]
    fn test_counter_get_all_is_sorted() {
        let counter = LabeledCounter::new();
        counter.inc("b=\"1\"");
        counter.inc("a=\"1\"");
        let all = counter.get_all();
        assert_eq!(all[0].0, "a=\"1\"");
        assert_eq!(all[1].0, "b=\"1\"");
    }

    #[test]
    fn test_counter_concurrent_increments() {
        let counter = std::sync::Arc::new(LabeledCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.inc("path=\"/users/{id}\"");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.get("path=\"/users/{id}\""), 8000);
    }

    #[test]
    fn test_gauge_basic() {
        let gauge = Gauge::new();
        gauge.set("", 10);
        gauge.inc("");
        assert_eq!(gauge.get(""), 11);
        gauge.dec("");
        gauge.dec("");
        assert_eq!(gauge.get(""), 9);
        gauge.add("pool=\"db\"", -2);
        assert_eq!(gauge.get("pool=\"db\""), -2);
    }

    #[test]
    fn test_histogram_cumulative_buckets() {
        let hist = Histogram::new(&[0.1, 0.5, 1.0]);
        hist.observe("", 0.05);
        hist.observe("", 0.3);
        hist.observe("", 0.8);
        hist.observe("", 7.0);

        let data = hist.get_all();
        assert_eq!(data.len(), 1);
        let d = &data[0];
        assert_eq!(d.count, 4);
        assert!((d.sum - 8.15).abs() < 1e-9);
        assert_eq!(d.counts, vec![1, 2, 3]);
    }

    #[test]
    fn test_histogram_sorts_buckets() {
        let hist = Histogram::new(&[1.0, 0.1, f64::NAN, 0.5, 0.5]);
        assert_eq!(hist.buckets(), &[0.1, 0.5, 1.0]);
    }

    #[test]
    fn test_histogram_labels_with_le() {
        let hist = Histogram::new(&[1.0]);
        hist.observe("method=\"GET\"", 0.5);
        hist.observe("", 0.5);
        let data = hist.get_all();
        assert_eq!(data[0].labels_with_le("1"), "le=\"1\"");
        assert_eq!(data[1].labels_with_le("+Inf"), "method=\"GET\",le=\"+Inf\"");
    }
}
