//! Application Metrics Infrastructure
//!
//! Bounded-cardinality HTTP metrics for Axum applications:
//! - Route labels recovered from routing metadata, not raw paths
//! - Counters, histograms and gauges in an explicitly shared registry
//! - Prometheus text export and a `/metrics` scrape endpoint
//! - Optional push to a Pushgateway-compatible aggregator
//!
//! # Quick Start
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use routemark::observability::metrics::{create_metrics, ObservableRouter};
//!
//! let metrics = create_metrics("orders", |b| {
//!     b.counter("orders_created_total", &["channel"], "Orders created")
//! });
//!
//! let app = Router::new()
//!     .route("/users/{id}", get(handler))
//!     .with_observability(metrics.clone());
//! ```
//!
//! # Standard HTTP Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `http_requests_total` | Counter | method, path, status |
//! | `http_request_duration_seconds` | Histogram | method, path |
//! | `http_requests_active` | Gauge | - |
//!
//! # Route Labels
//!
//! `path` is the matched route template with any literal mount prefix
//! restored: `/api/v2/users/482` routed through `users/{id}` is labeled
//! `/api/v2/users/{id}`. Requests that never matched a template fall back to
//! their lower-cased raw path.

mod middleware;
mod prometheus;
#[cfg(feature = "push")]
mod push;
mod registry;
mod route;
mod router;
mod types;

// Route labels
pub use route::{
    resolve_route_label, DispatchContext, RouteLabelResolver, RouteMatcher, RouteTrail,
    TemplateMatcher,
};

// Core types
pub use registry::{
    create_metrics, ActiveRequestGuard, MetricDef, MetricRegistry, MetricRegistryBuilder, MetricsHandle,
    HTTP_REQUESTS_ACTIVE, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS,
};
pub use types::{Gauge, Histogram, HistogramData, LabelSet, LabeledCounter};

// Bucket constants
pub use types::{DB_DURATION_BUCKETS, HTTP_DURATION_BUCKETS, JOB_DURATION_BUCKETS};

// Prometheus export
pub use prometheus::{export_prometheus, PrometheusExport, PROMETHEUS_CONTENT_TYPE};

// Middleware and router
pub use middleware::{http_metrics_middleware, metrics_handler, record_opaque, record_template};
pub use router::ObservableRouter;

#[cfg(feature = "push")]
pub use push::{PushError, PushGateway};
