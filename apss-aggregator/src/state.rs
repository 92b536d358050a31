use std::collections::VecDeque;
use std::sync::Mutex;

use apss_core::{AgentInfo, Alert, SecurityEvent};
use chrono::Utc;
use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::mpsc::Sender;

/// Shared state reachable from every HTTP handler and background worker.
/// `agents` is a `DashMap` (a widely used concurrency-map crate) because the
/// ingress handler and the liveness sweep touch it from different tasks
/// without a single writer; `alerts` is a plain mutex-guarded ring since
/// retention eviction must see the whole queue at once.
pub struct AppState {
    pub agents: DashMap<String, AgentInfo>,
    alerts: Mutex<VecDeque<Alert>>,
    alert_retention_count: usize,
    pub event_tx: Sender<SecurityEvent>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(event_tx: Sender<SecurityEvent>, alert_retention_count: usize, metrics_handle: PrometheusHandle) -> Self {
        Self {
            agents: DashMap::new(),
            alerts: Mutex::new(VecDeque::new()),
            alert_retention_count,
            event_tx,
            metrics_handle,
        }
    }

    /// Upserts liveness for the event's agent. Called unconditionally
    /// before the event is offered to the bounded queue, so a full queue
    /// never prevents an agent from being recognized as alive.
    pub fn touch_agent(&self, agent_id: &str, pod_name: &str, pod_namespace: &str) {
        let now = Utc::now();
        self.agents
            .entry(agent_id.to_string())
            .and_modify(|info| info.touch(now))
            .or_insert_with(|| {
                let mut info = AgentInfo::new(agent_id.to_string(), pod_name.to_string(), pod_namespace.to_string(), now);
                info.touch(now);
                info
            });
    }

    pub fn evict_stale_agents(&self, threshold: chrono::Duration) {
        let now = Utc::now();
        self.agents.retain(|_, info| !info.is_stale(now, threshold));
    }

    pub fn record_alert(&self, alert: Alert) {
        let mut alerts = self.alerts.lock().expect("alerts mutex poisoned");
        alerts.push_back(alert);
        while alerts.len() > self.alert_retention_count {
            alerts.pop_front();
        }
    }

    /// Up to `limit` most recent alerts, oldest-first: the deque is already
    /// insertion-ordered, so this is just its tail.
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        let alerts = self.alerts.lock().expect("alerts mutex poisoned");
        let skip = alerts.len().saturating_sub(limit);
        alerts.iter().skip(skip).cloned().collect()
    }

    pub fn agent_snapshot(&self) -> Vec<AgentInfo> {
        self.agents.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    fn state() -> AppState {
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        let handle = PrometheusBuilder::new().install_recorder().unwrap();
        AppState::new(tx, 3, handle)
    }

    #[test]
    fn alert_ring_evicts_oldest_beyond_retention() {
        let state = state();
        for i in 0..5 {
            state.record_alert(sample_alert(i));
        }
        let recent = state.recent_alerts(100);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].id, "alert-2");
        assert_eq!(recent[2].id, "alert-4");
    }

    #[test]
    fn touch_agent_creates_then_updates() {
        let state = state();
        state.touch_agent("a1", "p", "ns");
        state.touch_agent("a1", "p", "ns");
        let agent = state.agents.get("a1").unwrap();
        assert_eq!(agent.event_count, 2);
    }

    fn sample_alert(i: usize) -> Alert {
        Alert {
            id: format!("alert-{i}"),
            timestamp: Utc::now(),
            severity: apss_core::Severity::High,
            rule_id: "APSS-001".into(),
            rule_name: "test".into(),
            description: "d".into(),
            event_ids: vec![],
            pod_name: "p".into(),
            pod_namespace: "ns".into(),
            mitre_tactic: None,
            mitre_id: None,
            recommended_actions: vec![],
        }
    }
}
