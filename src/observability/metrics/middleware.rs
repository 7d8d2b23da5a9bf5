//! HTTP metrics middleware for Axum
//!
//! Records, for every request:
//! - `http_requests_total{method, path, status}` - Counter
//! - `http_request_duration_seconds{method, path}` - Histogram
//! - `http_requests_active` - Gauge
//!
//! The `path` label is a resolved route label (see [`super::route`]), never
//! the raw request path when a template is known.

use super::prometheus::{PrometheusExport, PROMETHEUS_CONTENT_TYPE};
use super::registry::{MetricRegistry, MetricsHandle};
use super::route::{DispatchContext, RouteMatcher, RouteTrail};
use axum::{
    extract::{MatchedPath, Request},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Middleware that times a request and records it under its route label.
///
/// Must wrap the routes it measures (`Router::layer`), so that axum's
/// [`MatchedPath`] is already set when it runs. It installs a fresh
/// [`RouteTrail`] before dispatch; layers added with
/// [`record_template`] / [`record_opaque`] further in append to it.
///
/// ```ignore
/// let handle = MetricsHandle::from(metrics.clone());
/// let app = Router::new()
///     .route("/users/{id}", get(handler))
///     .layer(middleware::from_fn(move |req, next| {
///         http_metrics_middleware(handle.clone(), req, next)
///     }));
/// ```
pub async fn http_metrics_middleware(
    metrics: MetricsHandle,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let uri = request.uri().clone();
    let matched_path = request.extensions().get::<MatchedPath>().cloned();

    let trail = RouteTrail::new();
    request.extensions_mut().insert(trail.clone());

    let active = metrics.track_active_request();
    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();
    drop(active);

    let context = DispatchContext::from_request_parts(matched_path.as_ref(), Some(&trail));
    let label = metrics.resolver().resolve(Some(&context), &uri);
    let status = response.status().as_u16();

    trace!(
        method = %method,
        path = %uri.path(),
        label = %label,
        status,
        matchers = context.matchers().len(),
        "Recorded request metrics"
    );

    metrics.record_http_request(&method, &label, status, duration.as_secs_f64());

    response
}

/// Append a template matcher to the request's route trail.
///
/// Use for dispatch layers whose template is not visible to axum, e.g. a
/// nested service that does its own routing:
///
/// ```ignore
/// let template: Arc<str> = Arc::from("users/{id}");
/// let users = Router::new()
///     .fallback_service(user_dispatcher)
///     .layer(middleware::from_fn(move |req, next| {
///         record_template(template.clone(), req, next)
///     }));
/// ```
///
/// [`ObservableRouter::with_route_template`](super::ObservableRouter::with_route_template)
/// does the same.
pub async fn record_template(template: Arc<str>, request: Request, next: Next) -> Response {
    if let Some(trail) = request.extensions().get::<RouteTrail>() {
        trail.push(RouteMatcher::template(template.as_ref()));
    }
    next.run(request).await
}

/// Append an opaque matcher to the request's route trail.
///
/// Marks a secondary dispatch layer that participates in routing but carries
/// no template; it never shadows a template recorded before it.
pub async fn record_opaque(request: Request, next: Next) -> Response {
    if let Some(trail) = request.extensions().get::<RouteTrail>() {
        trail.push(RouteMatcher::Opaque);
    }
    next.run(request).await
}

/// Handler for the scrape endpoint.
pub async fn metrics_handler(metrics: Arc<MetricRegistry>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        metrics.export_prometheus(),
    )
}
