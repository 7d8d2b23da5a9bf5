//! MetricRegistry - explicit, injectable metrics storage
//!
//! The registry is built once at startup and shared as `Arc<MetricRegistry>`
//! between the request middleware, the scrape endpoint and the push client.
//! There is no process-wide recorder.

use super::route::RouteLabelResolver;
use super::types::{Gauge, Histogram, LabelSet, LabeledCounter, HTTP_DURATION_BUCKETS};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the HTTP request counter.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
/// Name of the HTTP request duration histogram.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
/// Name of the in-flight HTTP request gauge.
pub const HTTP_REQUESTS_ACTIVE: &str = "http_requests_active";

/// Metric definition with metadata.
#[derive(Debug, Clone)]
pub struct MetricDef {
    /// Metric name (e.g., `http_requests_total`)
    pub name: String,
    /// Help text
    pub help: String,
    /// Label names
    pub labels: Vec<String>,
}

impl MetricDef {
    fn new(name: &str, labels: &[&str], help: &str) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Registry of application metrics.
///
/// # Example
///
/// ```ignore
/// use routemark::observability::metrics::MetricRegistry;
///
/// let metrics = MetricRegistry::builder()
///     .app_name("orders")
///     .counter("orders_created_total", &["channel"], "Orders created")
///     .with_http_metrics()
///     .build();
///
/// metrics.counter("orders_created_total").unwrap().inc("channel=\"web\"");
/// ```
#[derive(Debug)]
pub struct MetricRegistry {
    app_name: String,
    counters: BTreeMap<String, (MetricDef, LabeledCounter)>,
    histograms: BTreeMap<String, (MetricDef, Histogram)>,
    gauges: BTreeMap<String, (MetricDef, Gauge)>,
}

impl MetricRegistry {
    pub fn builder() -> MetricRegistryBuilder {
        MetricRegistryBuilder::default()
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn counter(&self, name: &str) -> Option<&LabeledCounter> {
        self.counters.get(name).map(|(_, c)| c)
    }

    pub fn histogram(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(name).map(|(_, h)| h)
    }

    pub fn gauge(&self, name: &str) -> Option<&Gauge> {
        self.gauges.get(name).map(|(_, g)| g)
    }

    /// Counters in name order.
    pub fn counters(&self) -> impl Iterator<Item = (&MetricDef, &LabeledCounter)> {
        self.counters.values().map(|(def, c)| (def, c))
    }

    /// Histograms in name order.
    pub fn histograms(&self) -> impl Iterator<Item = (&MetricDef, &Histogram)> {
        self.histograms.values().map(|(def, h)| (def, h))
    }

    /// Gauges in name order.
    pub fn gauges(&self) -> impl Iterator<Item = (&MetricDef, &Gauge)> {
        self.gauges.values().map(|(def, g)| (def, g))
    }

    pub fn has_counter(&self, name: &str) -> bool {
        self.counters.contains_key(name)
    }

    pub fn has_histogram(&self, name: &str) -> bool {
        self.histograms.contains_key(name)
    }

    pub fn has_gauge(&self, name: &str) -> bool {
        self.gauges.contains_key(name)
    }
}

/// Builder for MetricRegistry.
///
/// Registering the same name twice keeps the last definition.
#[derive(Default)]
pub struct MetricRegistryBuilder {
    app_name: Option<String>,
    counters: Vec<MetricDef>,
    histograms: Vec<(MetricDef, Vec<f64>)>,
    gauges: Vec<MetricDef>,
    include_http_metrics: bool,
}

impl MetricRegistryBuilder {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Add a counter.
    ///
    /// * `name` - Metric name (e.g., `jobs_total`)
    /// * `labels` - Label names (e.g., `["status"]`)
    /// * `help` - Description
    pub fn counter(mut self, name: &str, labels: &[&str], help: &str) -> Self {
        self.counters.push(MetricDef::new(name, labels, help));
        self
    }

    /// Add a histogram with the given bucket upper bounds.
    pub fn histogram(mut self, name: &str, labels: &[&str], buckets: &[f64], help: &str) -> Self {
        self.histograms
            .push((MetricDef::new(name, labels, help), buckets.to_vec()));
        self
    }

    pub fn gauge(mut self, name: &str, labels: &[&str], help: &str) -> Self {
        self.gauges.push(MetricDef::new(name, labels, help));
        self
    }

    /// Include the standard HTTP metrics:
    /// - `http_requests_total{method, path, status}` - Counter
    /// - `http_request_duration_seconds{method, path}` - Histogram
    /// - `http_requests_active` - Gauge
    pub fn with_http_metrics(mut self) -> Self {
        self.include_http_metrics = true;
        self
    }

    pub fn build(mut self) -> MetricRegistry {
        if self.include_http_metrics {
            self.counters.push(MetricDef::new(
                HTTP_REQUESTS_TOTAL,
                &["method", "path", "status"],
                "Total number of HTTP requests",
            ));
            self.histograms.push((
                MetricDef::new(
                    HTTP_REQUEST_DURATION_SECONDS,
                    &["method", "path"],
                    "HTTP request duration in seconds",
                ),
                HTTP_DURATION_BUCKETS.to_vec(),
            ));
            self.gauges.push(MetricDef::new(
                HTTP_REQUESTS_ACTIVE,
                &[],
                "Number of currently active HTTP requests",
            ));
        }

        MetricRegistry {
            app_name: self.app_name.unwrap_or_else(|| "app".to_string()),
            counters: self
                .counters
                .into_iter()
                .map(|def| (def.name.clone(), (def, LabeledCounter::new())))
                .collect(),
            histograms: self
                .histograms
                .into_iter()
                .map(|(def, buckets)| (def.name.clone(), (def, Histogram::new(&buckets))))
                .collect(),
            gauges: self
                .gauges
                .into_iter()
                .map(|def| (def.name.clone(), (def, Gauge::new())))
                .collect(),
        }
    }
}

/// Handle to a registry for the request path.
///
/// Cheap to clone; carries the label resolver the middleware uses so the
/// registry and the labeling policy travel together.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    registry: Arc<MetricRegistry>,
    resolver: RouteLabelResolver,
}

impl MetricsHandle {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self {
            registry,
            resolver: RouteLabelResolver::default(),
        }
    }

    /// Use a custom label resolver (e.g. one with a base path).
    pub fn with_resolver(mut self, resolver: RouteLabelResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &RouteLabelResolver {
        &self.resolver
    }

    /// Record a finished HTTP request.
    ///
    /// Updates `http_requests_total` and `http_request_duration_seconds`.
    /// `path` should already be a resolved route label.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let hist_labels = LabelSet::new().with("method", method).with("path", path);
        let counter_labels = hist_labels.clone().with("status", &status.to_string());

        if let Some(counter) = self.registry.counter(HTTP_REQUESTS_TOTAL) {
            counter.inc(counter_labels.as_str());
        }
        if let Some(hist) = self.registry.histogram(HTTP_REQUEST_DURATION_SECONDS) {
            hist.observe(hist_labels.as_str(), duration_secs);
        }
    }

    pub fn inc_active_requests(&self) {
        if let Some(gauge) = self.registry.gauge(HTTP_REQUESTS_ACTIVE) {
            gauge.inc("");
        }
    }

    pub fn dec_active_requests(&self) {
        if let Some(gauge) = self.registry.gauge(HTTP_REQUESTS_ACTIVE) {
            gauge.dec("");
        }
    }

    /// Count a request as active until the returned guard is dropped.
    ///
    /// The gauge is decremented even when the request future is cancelled.
    pub fn track_active_request(&self) -> ActiveRequestGuard {
        self.inc_active_requests();
        ActiveRequestGuard {
            handle: self.clone(),
        }
    }
}

/// Keeps `http_requests_active` incremented while held.
#[must_use = "the request stops counting as active as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ActiveRequestGuard {
    handle: MetricsHandle,
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        self.handle.dec_active_requests();
    }
}

impl From<Arc<MetricRegistry>> for MetricsHandle {
    fn from(registry: Arc<MetricRegistry>) -> Self {
        Self::new(registry)
    }
}

/// Create a registry with the HTTP metrics plus application metrics.
///
/// ```ignore
/// let metrics = create_metrics("orders", |b| {
///     b.counter("orders_created_total", &["channel"], "Orders created")
/// });
/// ```
pub fn create_metrics<F>(app_name: &str, customize: F) -> Arc<MetricRegistry>
where
    F: FnOnce(MetricRegistryBuilder) -> MetricRegistryBuilder,
{
    let builder = MetricRegistry::builder()
        .app_name(app_name)
        .with_http_metrics();

    Arc::new(customize(builder).build())
}
