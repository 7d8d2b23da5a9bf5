//! Routemark demo server
//!
//! Serves a few nested routes with HTTP metrics enabled.
//!
//! # Usage
//!
//! ```bash
//! LISTEN_ADDR=127.0.0.1:3000 LOG_FORMAT=compact routemark_demo
//!
//! curl localhost:3000/api/v2/users/482
//! curl localhost:3000/shop/eu/orders/77
//! curl localhost:3000/metrics
//! ```
//!
//! Set `PUSHGATEWAY_URL` to also push metrics periodically.

use axum::{extract::Path, routing::get, Json, Router};
use routemark::observability::metrics::{create_metrics, MetricRegistry, ObservableRouter};
use routemark::observability::{init, ObservabilityConfig};
use routemark::MetricsConfig;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Serialize)]
struct User {
    id: u64,
    name: String,
}

async fn user(Path(id): Path<u64>) -> Json<User> {
    Json(User {
        id,
        name: format!("user-{id}"),
    })
}

async fn order_dispatch() -> &'static str {
    "order"
}

async fn health() -> &'static str {
    "OK"
}

fn app(config: &MetricsConfig) -> (Router, Arc<MetricRegistry>) {
    let metrics = create_metrics(&config.app_name, |b| b);

    let users = Router::new()
        .route("/users/{id}", get(user))
        .with_opaque_dispatch();

    // Orders are dispatched by a catch-all handler, so both templates are
    // recorded explicitly: axum hands outer middleware no matched path for
    // requests routed into a nested service.
    let orders = Router::new()
        .fallback(order_dispatch)
        .with_route_template("orders/{id}")
        .with_route_template("/shop/{region}");

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v2", users)
        .nest_service("/shop/{region}", orders)
        .with_metrics_config(metrics.clone(), config);

    (router, metrics)
}

#[cfg(feature = "push")]
fn spawn_pusher(
    config: &MetricsConfig,
    metrics: Arc<MetricRegistry>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Option<JoinHandle<()>>> {
    use routemark::observability::metrics::PushGateway;

    let Some(push) = &config.push else {
        return Ok(None);
    };
    let gateway = PushGateway::new(push)?;
    Ok(Some(gateway.spawn_periodic(metrics, shutdown)))
}

#[cfg(not(feature = "push"))]
fn spawn_pusher(
    config: &MetricsConfig,
    _metrics: Arc<MetricRegistry>,
    _shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Option<JoinHandle<()>>> {
    if config.push_enabled() {
        tracing::warn!("PUSHGATEWAY_URL set but the push feature is not enabled");
    }
    Ok(None)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init(ObservabilityConfig::from_env())?;

    let config = MetricsConfig::from_env();
    let (router, metrics) = app(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pusher = spawn_pusher(&config, metrics, shutdown_rx)?;

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        address = %addr,
        metrics_path = %config.metrics_path,
        push = config.push_enabled(),
        "Routemark demo listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(pusher) = pusher {
        pusher.await?;
    }

    Ok(())
}
