//! ObservableRouter trait for Axum integration
//!
//! Extension trait that mounts the metrics middleware and scrape endpoint on
//! any Axum router, and lets routers mark the dispatch layers they add.

use super::middleware::{http_metrics_middleware, metrics_handler, record_opaque, record_template};
use super::registry::{MetricRegistry, MetricsHandle};
use super::route::RouteLabelResolver;
use crate::config::MetricsConfig;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Extension trait for adding observability to an Axum Router.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get};
/// use routemark::observability::metrics::{create_metrics, ObservableRouter};
///
/// let metrics = create_metrics("orders", |b| b);
///
/// let users = Router::new()
///     .route("/users/{id}", get(user))
///     .with_opaque_dispatch();
///
/// let app = Router::new()
///     .nest("/api/v2", users)
///     .with_observability(metrics);
/// ```
pub trait ObservableRouter {
    /// Add the metrics middleware and a `/metrics` endpoint.
    ///
    /// Call this last: the middleware only measures routes that exist when
    /// it is added. The registry should be built with `with_http_metrics()`.
    fn with_observability(self, metrics: Arc<MetricRegistry>) -> Self;

    /// Same as `with_observability` with a custom endpoint path.
    fn with_observability_at(self, metrics: Arc<MetricRegistry>, metrics_path: &str) -> Self;

    /// Apply a [`MetricsConfig`]: endpoint path, label base path, and
    /// request tracing.
    fn with_metrics_config(self, metrics: Arc<MetricRegistry>, config: &MetricsConfig) -> Self;

    /// Record `template` on the route trail of every request this router
    /// dispatches.
    ///
    /// For routers whose real template is invisible to axum (fallback-based
    /// dispatchers, nested services). A relative template (`orders/{id}`) is
    /// placed after the mount prefix taken from the URI; a rooted one
    /// (`/shop/{region}`) names that prefix, so record it outside the
    /// relative one when the mount path has parameters.
    fn with_route_template(self, template: &str) -> Self;

    /// Mark this router as an opaque dispatch layer.
    fn with_opaque_dispatch(self) -> Self;
}

impl<S> ObservableRouter for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_observability(self, metrics: Arc<MetricRegistry>) -> Self {
        self.with_observability_at(metrics, "/metrics")
    }

    fn with_observability_at(self, metrics: Arc<MetricRegistry>, metrics_path: &str) -> Self {
        let handle = MetricsHandle::from(metrics.clone());
        instrument(self, metrics, handle, metrics_path)
    }

    fn with_metrics_config(self, metrics: Arc<MetricRegistry>, config: &MetricsConfig) -> Self {
        let mut resolver = RouteLabelResolver::new();
        if let Some(base_path) = &config.base_path {
            resolver = resolver.with_base_path(base_path.as_str());
        }
        let handle = MetricsHandle::from(metrics.clone()).with_resolver(resolver);

        let router = instrument(self, metrics, handle, &config.metrics_path);
        if config.request_tracing {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    fn with_route_template(self, template: &str) -> Self {
        let template: Arc<str> = Arc::from(template);
        self.layer(middleware::from_fn(move |req, next| {
            record_template(template.clone(), req, next)
        }))
    }

    fn with_opaque_dispatch(self) -> Self {
        self.layer(middleware::from_fn(record_opaque))
    }
}

fn instrument<S>(
    router: Router<S>,
    metrics: Arc<MetricRegistry>,
    handle: MetricsHandle,
    metrics_path: &str,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .route(metrics_path, get(move || metrics_handler(metrics.clone())))
        .layer(middleware::from_fn(move |req, next| {
            http_metrics_middleware(handle.clone(), req, next)
        }))
}
