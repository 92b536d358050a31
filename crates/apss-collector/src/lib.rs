//! Relays events produced by the in-pod monitors to the Aggregator over
//! HTTP. Runs as a single consumer task pulling off the shared bounded
//! channel the monitors write into; never blocks a monitor, and never
//! retries a failed delivery (events are expendable telemetry, not a
//! durable log).

use std::time::Duration;

use apss_core::{id::next_event_id, SecurityEvent, Severity};
use thiserror::Error;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const POST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("transport error posting to aggregator: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("aggregator rejected event with status {0}")]
    Status(u16),
}

pub struct Collector {
    client: reqwest::Client,
    events_url: String,
}

impl Collector {
    pub fn new(client: reqwest::Client, events_url: String) -> Self {
        Self { client, events_url }
    }

    pub async fn run(self, mut receiver: Receiver<SecurityEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                event = receiver.recv() => {
                    match event {
                        Some(event) => self.forward(event).await,
                        None => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    }

    async fn forward(&self, mut event: SecurityEvent) {
        if event.id.is_empty() {
            event.id = next_event_id(&event.agent_id);
        }
        log_at_severity(&event);

        match self.post(&event).await {
            Ok(()) => {
                metrics::counter!("apss_collector_events_sent_total").increment(1);
            }
            Err(err) => {
                metrics::counter!("apss_collector_events_dropped_total").increment(1);
                debug!(event_id = %event.id, %err, "collector: failed to relay event, dropping");
            }
        }
    }

    async fn post(&self, event: &SecurityEvent) -> Result<(), CollectorError> {
        let response = self
            .client
            .post(&self.events_url)
            .json(event)
            .timeout(POST_TIMEOUT)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::ACCEPTED {
            Ok(())
        } else {
            Err(CollectorError::Status(response.status().as_u16()))
        }
    }
}

fn log_at_severity(event: &SecurityEvent) {
    match event.severity {
        Severity::Critical => error!(event_id = %event.id, event_type = ?event.event_type, "critical security event"),
        Severity::High | Severity::Medium => {
            warn!(event_id = %event.id, event_type = ?event.event_type, "security event")
        }
        Severity::Low => info!(event_id = %event.id, event_type = ?event.event_type, "security event"),
        Severity::Info => debug!(event_id = %event.id, event_type = ?event.event_type, "security event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apss_core::{AgentIdentity, EventType};
    use std::collections::HashMap;

    fn sample_event() -> SecurityEvent {
        SecurityEvent {
            id: String::new(),
            agent_id: "a1".to_string(),
            pod_name: "p".to_string(),
            pod_namespace: "ns".to_string(),
            event_type: EventType::ProcessStart,
            severity: Severity::High,
            timestamp: chrono::Utc::now(),
            process: None,
            network: None,
            file: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn run_stops_when_channel_closes() {
        let client = reqwest::Client::new();
        let collector = Collector::new(client, "http://127.0.0.1:0/api/v1/events".to_string());
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(tx);
        let cancel = CancellationToken::new();
        collector.run(rx, cancel).await;
    }

    #[test]
    fn blank_event_id_is_assigned_before_forwarding() {
        let mut event = sample_event();
        assert!(event.id.is_empty());
        event.id = next_event_id(&event.agent_id);
        assert!(event.id.starts_with("a1-"));
    }

    #[test]
    fn identity_fields_are_not_mutated_by_collector() {
        let event = sample_event();
        let identity = AgentIdentity {
            agent_id: event.agent_id.clone(),
            pod_name: event.pod_name.clone(),
            pod_namespace: event.pod_namespace.clone(),
        };
        assert_eq!(identity.agent_id, "a1");
    }
}
