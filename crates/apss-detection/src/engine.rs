use apss_core::{Alert, SecurityEvent};
use chrono::Utc;
use uuid::Uuid;

use crate::rule::Rule;
use crate::rules::built_in_rules;

/// Stateless, synchronous rule evaluator. `evaluate` never blocks and never
/// touches shared state, matching "pure function from one event to
/// zero-or-more alerts" in the component design.
pub struct DetectionEngine {
    rules: Vec<Rule>,
}

impl Default for DetectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionEngine {
    pub fn new() -> Self {
        Self {
            rules: built_in_rules(),
        }
    }

    /// Evaluates every rule against `event`, in rule-list order, emitting
    /// one alert per match. Multiple matches on a single event surface as
    /// multiple alerts in that same order.
    pub fn evaluate(&self, event: &SecurityEvent) -> Vec<Alert> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(event))
            .map(|rule| self.alert_for(rule, event))
            .collect()
    }

    fn alert_for(&self, rule: &Rule, event: &SecurityEvent) -> Alert {
        Alert {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            severity: rule.severity,
            rule_id: rule.id.to_string(),
            rule_name: rule.name.to_string(),
            description: format!("{} matched event {}", rule.name, event.id),
            event_ids: vec![event.id.clone()],
            pod_name: event.pod_name.clone(),
            pod_namespace: event.pod_namespace.clone(),
            mitre_tactic: rule.mitre_tactic.map(str::to_string),
            mitre_id: rule.mitre_id.map(str::to_string),
            recommended_actions: rule.recommended_actions.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Test-only accessor used to assert rule-list ordering directly,
    /// since the five built-in predicates' port sets do not overlap and so
    /// no single synthetic event can exercise a genuine two-rule match.
    #[cfg(any(test, feature = "test-util"))]
    pub fn rule_ids_in_order(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apss_core::{EventType, FileOperation, FilePayload, NetProtocol, NetworkPayload, ProcessPayload, Severity};
    use std::collections::HashMap;

    fn base_event(event_type: EventType) -> SecurityEvent {
        SecurityEvent {
            id: "e1".into(),
            agent_id: "a1".into(),
            pod_name: "p".into(),
            pod_namespace: "ns".into(),
            event_type,
            severity: Severity::Info,
            timestamp: Utc::now(),
            process: None,
            network: None,
            file: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn cryptominer_process_yields_one_apss_002_alert() {
        let mut event = base_event(EventType::ProcessStart);
        event.severity = Severity::Critical;
        event.process = Some(ProcessPayload {
            pid: 1,
            ppid: 0,
            name: "xmrig".into(),
            executable: "/usr/bin/xmrig".into(),
            command_line: vec!["xmrig".into()],
            uid: 0,
            start_time: Utc::now(),
            suspicious_indicators: vec!["possible_cryptominer".into()],
        });

        let alerts = DetectionEngine::new().evaluate(&event);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule_id, "APSS-002");
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn reverse_shell_network_yields_exactly_one_alert() {
        let mut event = base_event(EventType::NetworkConnect);
        event.network = Some(NetworkPayload {
            protocol: NetProtocol::Tcp,
            local_ip: "10.0.0.1".into(),
            local_port: 1234,
            remote_ip: "1.2.3.4".into(),
            remote_port: 4444,
            state: "ESTABLISHED".into(),
            is_external: true,
            is_suspicious_port: true,
        });

        let alerts = DetectionEngine::new().evaluate(&event);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule_id, "APSS-001");
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn file_modify_on_passwd_matches_tmp_foo_does_not() {
        let mut passwd = base_event(EventType::FileModify);
        passwd.file = Some(FilePayload {
            path: "/etc/passwd".into(),
            operation: FileOperation::Modify,
            prior_hash: Some("a".into()),
            current_hash: Some("b".into()),
            size: 1,
            permissions: "644".into(),
        });
        let alerts = DetectionEngine::new().evaluate(&passwd);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule_id, "APSS-003");
        assert_eq!(alerts[0].severity, Severity::High);

        let mut tmp = base_event(EventType::FileModify);
        tmp.file = Some(FilePayload {
            path: "/tmp/foo".into(),
            operation: FileOperation::Modify,
            prior_hash: None,
            current_hash: None,
            size: 1,
            permissions: "644".into(),
        });
        assert!(DetectionEngine::new().evaluate(&tmp).is_empty());
    }

    #[test]
    fn no_payload_matches_nothing() {
        let event = base_event(EventType::ProcessStart);
        assert!(DetectionEngine::new().evaluate(&event).is_empty());
    }
}
