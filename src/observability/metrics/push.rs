//! Push gateway client
//!
//! Sends the registry snapshot to a Prometheus Pushgateway-compatible
//! aggregator, either on demand ([`PushGateway::push`]) or on a fixed
//! interval ([`PushGateway::spawn_periodic`]).
//!
//! Failures are never retried within a push. On-demand pushes return the
//! error to the caller; the periodic task logs it and tries again on the
//! next tick.

use super::prometheus::{PrometheusExport, PROMETHEUS_CONTENT_TYPE};
use super::registry::MetricRegistry;
use crate::config::PushConfig;
use reqwest::{header, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors raised while pushing metrics.
#[derive(Error, Debug)]
pub enum PushError {
    /// The push request could not be sent or its response not read
    #[error("Metrics push transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The aggregator answered with a non-success status
    #[error("Metrics push rejected with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The configured endpoint is not an absolute http(s) URL
    #[error("Invalid push gateway endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Client for a push gateway.
#[derive(Debug, Clone)]
pub struct PushGateway {
    client: Client,
    url: String,
    interval: Duration,
}

impl PushGateway {
    /// Build a client from configuration.
    ///
    /// The target URL is `{endpoint}/metrics/job/{job}` with
    /// `/instance/{instance}` appended when an instance is set.
    pub fn new(config: &PushConfig) -> Result<Self, PushError> {
        let endpoint = config.endpoint.trim_end_matches('/');
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(PushError::InvalidEndpoint(config.endpoint.clone()));
        }
        if config.job.is_empty() || config.job.contains('/') {
            return Err(PushError::InvalidEndpoint(format!(
                "{} (job name {:?})",
                config.endpoint, config.job
            )));
        }

        let mut url = format!("{endpoint}/metrics/job/{}", config.job);
        if let Some(instance) = config.instance.as_deref().filter(|i| !i.is_empty()) {
            url.push_str("/instance/");
            url.push_str(instance);
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            url,
            interval: config.interval,
        })
    }

    /// Full URL pushes are sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Push the current snapshot once, replacing the job's previous one.
    pub async fn push(&self, registry: &MetricRegistry) -> Result<(), PushError> {
        let body = registry.export_prometheus();
        let response = self
            .client
            .put(&self.url)
            .header(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Status { status, body });
        }

        debug!(url = %self.url, "Pushed metrics");
        Ok(())
    }

    /// Push on every interval tick until `shutdown` flips to `true` or is
    /// dropped. A final push is attempted on shutdown.
    pub fn spawn_periodic(
        self,
        registry: Arc<MetricRegistry>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first push
            // carries at least one interval of data.
            ticker.tick().await;

            info!(url = %self.url, interval = ?self.interval, "Metrics pusher started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.push(&registry).await {
                            warn!(error = %e, url = %self.url, "Metrics push failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            if let Err(e) = self.push(&registry).await {
                warn!(error = %e, url = %self.url, "Final metrics push failed");
            }
            info!("Metrics pusher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::registry::MetricsHandle;
    use axum::{extract::State, routing::put, Router};
    use parking_lot::Mutex;

    fn config(endpoint: &str) -> PushConfig {
        PushConfig {
            endpoint: endpoint.to_string(),
            job: "orders".to_string(),
            instance: None,
            interval: Duration::from_millis(50),
            timeout: Duration::from_secs(2),
        }
    }

    fn registry() -> Arc<MetricRegistry> {
        let registry = Arc::new(MetricRegistry::builder().with_http_metrics().build());
        MetricsHandle::from(registry.clone()).record_http_request("GET", "/users/{id}", 200, 0.1);
        registry
    }

    async fn spawn_gateway(status: StatusCode) -> (String, Arc<Mutex<Vec<String>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/metrics/job/orders",
                put(move |State(received): State<Arc<Mutex<Vec<String>>>>, body: String| async move {
                    received.lock().push(body);
                    status
                }),
            )
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), received)
    }

    #[test]
    fn test_url_building() {
        let gateway = PushGateway::new(&config("http://push:9091/")).unwrap();
        assert_eq!(gateway.url(), "http://push:9091/metrics/job/orders");

        let mut cfg = config("https://push:9091");
        cfg.instance = Some("pod-1".to_string());
        let gateway = PushGateway::new(&cfg).unwrap();
        assert_eq!(gateway.url(), "https://push:9091/metrics/job/orders/instance/pod-1");
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = PushGateway::new(&config("push:9091")).unwrap_err();
        assert!(matches!(err, PushError::InvalidEndpoint(_)));

        let mut cfg = config("http://push:9091");
        cfg.job = "a/b".to_string();
        assert!(matches!(
            PushGateway::new(&cfg),
            Err(PushError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_push_sends_exposition() {
        let (endpoint, received) = spawn_gateway(StatusCode::OK).await;
        let gateway = PushGateway::new(&config(&endpoint)).unwrap();

        gateway.push(&registry()).await.unwrap();

        let bodies = received.lock();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("path=\"/users/{id}\""));
    }

    #[tokio::test]
    async fn test_push_rejected_status() {
        let (endpoint, _) = spawn_gateway(StatusCode::BAD_REQUEST).await;
        let gateway = PushGateway::new(&config(&endpoint)).unwrap();

        let err = gateway.push(&registry()).await.unwrap_err();
        match err {
            PushError::Status { status, .. } => assert_eq!(status, StatusCode::BAD_REQUEST),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_push_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gateway = PushGateway::new(&config(&format!("http://{addr}"))).unwrap();
        let err = gateway.push(&registry()).await.unwrap_err();
        assert!(matches!(err, PushError::Transport(_)));
        assert!(err.to_string().starts_with("Metrics push transport failed"));
    }

    #[tokio::test]
    async fn test_periodic_push_stops_on_shutdown() {
        let (endpoint, received) = spawn_gateway(StatusCode::OK).await;
        let gateway = PushGateway::new(&config(&endpoint)).unwrap();
        let (tx, rx) = watch::channel(false);

        let task = gateway.spawn_periodic(registry(), rx);
        tokio::time::sleep(Duration::from_millis(180)).await;
        tx.send(true).unwrap();
        task.await.unwrap();

        // At least one tick plus the final push.
        assert!(received.lock().len() >= 2);
    }
}
