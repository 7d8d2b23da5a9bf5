//! Metrics configuration
//!
//! Builder-pattern configuration for the scrape endpoint, route labeling and
//! the optional push client.

use crate::parse::parse_duration;
use std::time::Duration;

/// Push gateway settings.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Aggregator base URL (e.g., `http://pushgateway:9091`)
    pub endpoint: String,
    /// Job name the snapshot is grouped under
    pub job: String,
    /// Optional instance grouping label
    pub instance: Option<String>,
    /// Interval between periodic pushes
    pub interval: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl PushConfig {
    pub fn new(endpoint: impl Into<String>, job: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            job: job.into(),
            instance: None,
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration for HTTP metrics.
///
/// # Example
///
/// ```ignore
/// use routemark::MetricsConfig;
///
/// // Load from environment variables
/// let config = MetricsConfig::from_env();
///
/// // Or build programmatically
/// let config = MetricsConfig::builder()
///     .app_name("orders")
///     .metrics_path("/internal/metrics")
///     .base_path("/orders-svc")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Application name
    pub app_name: String,

    /// Path of the scrape endpoint
    pub metrics_path: String,

    /// Mount point of the whole service, removed from route labels.
    /// `None` keeps every literal prefix segment in the label.
    pub base_path: Option<String>,

    /// Wrap the router in a request tracing layer
    pub request_tracing: bool,

    /// Push gateway, if metrics should also be pushed
    pub push: Option<PushConfig>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            app_name: "app".to_string(),
            metrics_path: "/metrics".to_string(),
            base_path: None,
            request_tracing: true,
            push: None,
        }
    }
}

impl MetricsConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `METRICS_APP_NAME`: application name (default: "app")
    /// - `METRICS_PATH`: scrape endpoint path (default: "/metrics")
    /// - `METRICS_BASE_PATH`: service mount point excluded from labels (default: unset)
    /// - `METRICS_REQUEST_TRACING`: "true"/"false" (default: "true")
    /// - `PUSHGATEWAY_URL`: push target; unset disables pushing
    /// - `PUSHGATEWAY_JOB`: job name (default: app name)
    /// - `PUSHGATEWAY_INSTANCE`: instance label (default: unset)
    /// - `PUSHGATEWAY_INTERVAL`: e.g., "15s", "1m" (default: "15s")
    /// - `PUSHGATEWAY_TIMEOUT`: e.g., "10s" (default: "10s")
    pub fn from_env() -> Self {
        let app_name = non_empty_var("METRICS_APP_NAME").unwrap_or_else(|| "app".to_string());

        let metrics_path = non_empty_var("METRICS_PATH")
            .map(|p| if p.starts_with('/') { p } else { format!("/{p}") })
            .unwrap_or_else(|| "/metrics".to_string());

        let base_path = non_empty_var("METRICS_BASE_PATH");

        let request_tracing = std::env::var("METRICS_REQUEST_TRACING")
            .map(|s| s.to_lowercase() != "false" && s != "0")
            .unwrap_or(true);

        let push = non_empty_var("PUSHGATEWAY_URL").map(|endpoint| {
            let job = non_empty_var("PUSHGATEWAY_JOB").unwrap_or_else(|| app_name.clone());
            PushConfig {
                endpoint,
                job,
                instance: non_empty_var("PUSHGATEWAY_INSTANCE"),
                interval: std::env::var("PUSHGATEWAY_INTERVAL")
                    .map(|s| parse_duration(&s))
                    .unwrap_or(Duration::from_secs(15)),
                timeout: std::env::var("PUSHGATEWAY_TIMEOUT")
                    .map(|s| parse_duration(&s))
                    .unwrap_or(Duration::from_secs(10)),
            }
        });

        Self {
            app_name,
            metrics_path,
            base_path,
            request_tracing,
            push,
        }
    }

    pub fn builder() -> MetricsConfigBuilder {
        MetricsConfigBuilder::default()
    }

    pub fn push_enabled(&self) -> bool {
        self.push.is_some()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Builder for MetricsConfig
#[derive(Debug, Clone, Default)]
pub struct MetricsConfigBuilder {
    config: MetricsConfig,
}

impl MetricsConfigBuilder {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app_name = name.into();
        self
    }

    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.config.metrics_path = path.into();
        self
    }

    /// Set the service mount point removed from route labels.
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.config.base_path = Some(path.into());
        self
    }

    pub fn request_tracing(mut self, enabled: bool) -> Self {
        self.config.request_tracing = enabled;
        self
    }

    pub fn push(mut self, push: PushConfig) -> Self {
        self.config.push = Some(push);
        self
    }

    pub fn build(self) -> MetricsConfig {
        self.config
    }
}
