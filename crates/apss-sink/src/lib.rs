//! External Sink Client: a fire-and-forget HTTP client to the out-of-cluster
//! security-analytics service. Every operation here is a plain `async fn`;
//! callers that must never block on it (the Aggregator's event/alert
//! processors) are responsible for invoking it inside `tokio::spawn` and
//! logging the result, which is how "failures must never block the caller"
//! is actually enforced at the call site.

use std::time::Duration;

use apss_core::{Alert, SecurityEvent};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

const USER_AGENT: &str = "apss-sink/0.1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("external sink is not configured")]
    NotConfigured,
    #[error("request to external sink failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("external sink returned non-2xx status {0}")]
    Status(u16),
}

#[derive(Clone, Debug)]
pub struct SinkConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl SinkConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }
}

#[derive(Serialize)]
struct BatchEventsBody<'a> {
    events: &'a [SecurityEvent],
}

/// Stateless HTTP client; holds one pooled `reqwest::Client` built once at
/// construction and cloned cheaply per call, matching the Collector's own
/// shared-client convention.
#[derive(Clone)]
pub struct SinkClient {
    config: SinkConfig,
    http: reqwest::Client,
}

impl SinkClient {
    pub fn new(config: SinkConfig) -> Self {
        let timeout = if config.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            config.timeout
        };
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, http }
    }

    fn require_configured(&self) -> Result<(), SinkError> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(SinkError::NotConfigured)
        }
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), SinkError> {
        self.require_configured()?;
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT)
            .json(body)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Status(response.status().as_u16()))
        }
    }

    pub async fn send_alert(&self, alert: &Alert) -> Result<(), SinkError> {
        self.post_json("/api/v1/alerts", alert).await
    }

    pub async fn send_event(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        self.post_json("/api/v1/events", event).await
    }

    pub async fn send_batch_events(&self, events: &[SecurityEvent]) -> Result<(), SinkError> {
        self.post_json("/api/v1/events/batch", &BatchEventsBody { events }).await
    }

    pub async fn health_check(&self) -> Result<(), SinkError> {
        self.require_configured()?;
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), "/health");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.api_key)
            .header("User-Agent", USER_AGENT)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Status(response.status().as_u16()))
        }
    }
}

/// Convenience constructor mirroring the `json!` style the corpus uses for
/// small ad hoc payloads, kept for symmetry with `BatchEventsBody` should a
/// caller need a raw probe body.
pub fn empty_batch_body() -> serde_json::Value {
    json!({ "events": [] })
}
