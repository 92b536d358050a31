use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::severity::Severity;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub rule_id: String,
    pub rule_name: String,
    pub description: String,
    pub event_ids: Vec<String>,
    pub pod_name: String,
    pub pod_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitre_tactic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitre_id: Option<String>,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_is_identity() {
        let alert = Alert {
            id: "al-1".to_string(),
            timestamp: Utc::now(),
            severity: Severity::High,
            rule_id: "APSS-003".to_string(),
            rule_name: "Sensitive File Modified".to_string(),
            description: "desc".to_string(),
            event_ids: vec!["e1".to_string()],
            pod_name: "p".to_string(),
            pod_namespace: "ns".to_string(),
            mitre_tactic: Some("Persistence".to_string()),
            mitre_id: Some("T1546".to_string()),
            recommended_actions: vec!["investigate".to_string()],
        };
        let encoded = serde_json::to_string(&alert).unwrap();
        let decoded: Alert = serde_json::from_str(&encoded).unwrap();
        assert_eq!(alert, decoded);
    }
}
