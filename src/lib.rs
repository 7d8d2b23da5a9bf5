//! # Routemark
//!
//! Bounded-cardinality HTTP metrics for Axum applications.
//!
//! Request metrics are labeled by route template (`/api/v2/users/{id}`)
//! instead of raw path (`/api/v2/users/482`), so the number of series stays
//! proportional to the number of routes, not the number of URLs ever seen.
//!
//! ## Features
//!
//! - **Route labels**: templates recovered from axum's matched path and from
//!   dispatch layers that record themselves, with mount prefixes restored
//! - **Metric registry**: counters, gauges, histograms, shared by `Arc`
//! - **Scrape endpoint**: Prometheus text format at `/metrics`
//! - **Push client** (`push` feature): periodic or on-demand push to a
//!   Pushgateway-compatible aggregator
//! - **Structured logging**: `tracing` with pretty, JSON or compact output
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use routemark::MetricsConfig;
//! use routemark::observability::{init, ObservabilityConfig};
//! use routemark::observability::metrics::{create_metrics, ObservableRouter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init(ObservabilityConfig::from_env())?;
//!
//!     let config = MetricsConfig::from_env();
//!     let metrics = create_metrics(&config.app_name, |b| b);
//!
//!     let app = Router::new()
//!         .route("/users/{id}", get(|| async { "user" }))
//!         .with_metrics_config(metrics, &config);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

mod config;
pub mod observability;
mod parse;

// Re-exports
pub use config::{MetricsConfig, MetricsConfigBuilder, PushConfig};
pub use observability::ObservabilityConfigBuilder;
pub use parse::parse_duration;
