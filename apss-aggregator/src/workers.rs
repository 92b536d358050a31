use std::sync::Arc;
use std::time::Duration;

use apss_core::{Alert, SecurityEvent};
use apss_detection::DetectionEngine;
use apss_sink::SinkClient;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::state::AppState;

/// Single consumer of the event queue: counts the event, runs it through
/// the detection engine, and offers any resulting alerts to the alert
/// queue. A full alert queue drops the alert and logs; it never blocks or
/// backs up into the event queue.
pub async fn run_event_processor(
    mut events: Receiver<SecurityEvent>,
    alert_tx: Sender<Alert>,
    cancel: CancellationToken,
) {
    let engine = DetectionEngine::new();
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => {
                        metrics::counter!(
                            "events_received_total",
                            "type" => format!("{:?}", event.event_type),
                            "severity" => event.severity.as_str(),
                            "namespace" => event.pod_namespace.clone(),
                        ).increment(1);

                        for alert in engine.evaluate(&event) {
                            if alert_tx.try_send(alert).is_err() {
                                warn!("aggregator: alert queue full, dropping alert");
                            }
                        }
                    }
                    None => break,
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

/// Single consumer of the alert queue: appends to the retention ring,
/// counts it, logs it, and relays it to the external sink in a detached
/// task so a slow or unconfigured sink never delays the next alert.
pub async fn run_alert_processor(
    mut alerts: Receiver<Alert>,
    state: Arc<AppState>,
    sink: SinkClient,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            alert = alerts.recv() => {
                match alert {
                    Some(alert) => {
                        metrics::counter!(
                            "alerts_generated_total",
                            "rule" => alert.rule_id.clone(),
                            "severity" => alert.severity.as_str(),
                        ).increment(1);
                        warn!(rule_id = %alert.rule_id, severity = %alert.severity.as_str(), pod = %alert.pod_name, "alert raised");

                        state.record_alert(alert.clone());

                        if alert.severity.is_relay_eligible() {
                            let sink = sink.clone();
                            tokio::spawn(async move {
                                if let Err(err) = sink.send_alert(&alert).await {
                                    debug!(%err, "aggregator: failed to relay alert to external sink");
                                }
                            });
                        }
                    }
                    None => break,
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

pub async fn run_liveness_sweep(
    state: Arc<AppState>,
    sweep_interval: Duration,
    stale_threshold: chrono::Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(sweep_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.evict_stale_agents(stale_threshold);
                metrics::gauge!("active_agents").set(state.agent_snapshot().len() as f64);
            }
            _ = cancel.cancelled() => break,
        }
    }
}
