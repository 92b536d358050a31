use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::severity::Severity;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ProcessStart,
    ProcessExit,
    NetworkConnect,
    NetworkListen,
    FileCreate,
    FileModify,
    FileDelete,
    FileAccess,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessPayload {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    pub executable: String,
    pub command_line: Vec<String>,
    pub uid: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub suspicious_indicators: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetProtocol {
    Tcp,
    Udp,
    Tcp6,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkPayload {
    pub protocol: NetProtocol,
    pub local_ip: String,
    pub local_port: u16,
    pub remote_ip: String,
    pub remote_port: u16,
    pub state: String,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default)]
    pub is_suspicious_port: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    Modify,
    Delete,
    Rename,
    Chmod,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilePayload {
    pub path: String,
    pub operation: FileOperation,
    #[serde(default)]
    pub prior_hash: Option<String>,
    #[serde(default)]
    pub current_hash: Option<String>,
    pub size: u64,
    pub permissions: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    #[serde(default)]
    pub id: String,
    pub agent_id: String,
    pub pod_name: String,
    pub pod_namespace: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FilePayload>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SecurityEvent {
    /// Exactly one of process/network/file must be set; callers that build
    /// events by hand (monitors, tests) should assert this before emission.
    pub fn has_exactly_one_payload(&self) -> bool {
        [
            self.process.is_some(),
            self.network.is_some(),
            self.file.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
            == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> SecurityEvent {
        SecurityEvent {
            id: "a1-123".to_string(),
            agent_id: "a1".to_string(),
            pod_name: "p".to_string(),
            pod_namespace: "ns".to_string(),
            event_type: EventType::ProcessStart,
            severity: Severity::Critical,
            timestamp: Utc::now(),
            process: Some(ProcessPayload {
                pid: 42,
                ppid: 1,
                name: "xmrig".to_string(),
                executable: "/usr/bin/xmrig".to_string(),
                command_line: vec!["xmrig".to_string()],
                uid: 0,
                start_time: Utc::now(),
                suspicious_indicators: vec!["possible_cryptominer".to_string()],
            }),
            network: None,
            file: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn json_round_trip_is_identity() {
        let event = sample_event();
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: SecurityEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn exactly_one_payload_invariant() {
        assert!(sample_event().has_exactly_one_payload());
        let mut both = sample_event();
        both.network = Some(NetworkPayload {
            protocol: NetProtocol::Tcp,
            local_ip: "10.0.0.1".to_string(),
            local_port: 1,
            remote_ip: "10.0.0.2".to_string(),
            remote_port: 2,
            state: "ESTABLISHED".to_string(),
            is_external: false,
            is_suspicious_port: false,
        });
        assert!(!both.has_exactly_one_payload());
    }
}
