use apss_core::Severity;

use crate::rule::Rule;

const REVERSE_SHELL_PORTS: [u16; 4] = [4444, 5555, 6666, 1337];
const DATABASE_PORTS: [u16; 5] = [3306, 5432, 27017, 6379, 9200];

fn is_reverse_shell(event: &apss_core::SecurityEvent) -> bool {
    match &event.network {
        Some(net) => net.is_external && REVERSE_SHELL_PORTS.contains(&net.remote_port),
        None => false,
    }
}

fn is_cryptominer(event: &apss_core::SecurityEvent) -> bool {
    match &event.process {
        Some(proc) => proc
            .suspicious_indicators
            .iter()
            .any(|tag| tag == "possible_cryptominer"),
        None => false,
    }
}

fn is_sensitive_file_modified(event: &apss_core::SecurityEvent) -> bool {
    match &event.file {
        Some(file) => {
            file.operation == apss_core::FileOperation::Modify
                && matches!(
                    file.path.as_str(),
                    "/etc/passwd" | "/etc/shadow" | "/etc/sudoers"
                )
        }
        None => false,
    }
}

fn is_shell_spawn(event: &apss_core::SecurityEvent) -> bool {
    match &event.process {
        Some(proc) => proc
            .suspicious_indicators
            .iter()
            .any(|tag| tag == "shell_spawn"),
        None => false,
    }
}

fn is_external_database_connection(event: &apss_core::SecurityEvent) -> bool {
    match &event.network {
        Some(net) => net.is_external && DATABASE_PORTS.contains(&net.remote_port),
        None => false,
    }
}

/// The five built-in rules, in the order in which alerts for a
/// multiply-matching event must be emitted. Rule ids and recommended
/// actions are part of the external API contract and must not be edited
/// casually once published.
pub fn built_in_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "APSS-001",
            name: "Potential Reverse Shell",
            severity: Severity::Critical,
            mitre_tactic: Some("Command and Control"),
            mitre_id: Some("T1059.004"),
            recommended_actions: &[
                "Isolate the pod from the network immediately",
                "Capture a process tree snapshot before termination",
                "Review the remote endpoint for known C2 infrastructure",
            ],
            predicate: is_reverse_shell,
        },
        Rule {
            id: "APSS-002",
            name: "Cryptominer Detected",
            severity: Severity::Critical,
            mitre_tactic: Some("Impact"),
            mitre_id: Some("T1496"),
            recommended_actions: &[
                "Terminate the offending process",
                "Inspect the container image for supply-chain compromise",
                "Rotate any credentials reachable from this workload",
            ],
            predicate: is_cryptominer,
        },
        Rule {
            id: "APSS-003",
            name: "Sensitive File Modified",
            severity: Severity::High,
            mitre_tactic: Some("Persistence"),
            mitre_id: Some("T1546"),
            recommended_actions: &[
                "Diff the modified file against its last known-good baseline",
                "Audit recent shell sessions inside the pod",
            ],
            predicate: is_sensitive_file_modified,
        },
        Rule {
            id: "APSS-004",
            name: "Shell Spawned in Container",
            severity: Severity::Medium,
            mitre_tactic: Some("Execution"),
            mitre_id: Some("T1059"),
            recommended_actions: &[
                "Confirm whether an interactive shell is an expected operational action",
                "Review the parent process that spawned the shell",
            ],
            predicate: is_shell_spawn,
        },
        Rule {
            id: "APSS-005",
            name: "External Database Connection",
            severity: Severity::Medium,
            mitre_tactic: Some("Exfiltration"),
            mitre_id: Some("T1048"),
            recommended_actions: &[
                "Verify the destination database is an approved external dependency",
                "Check for unexpected outbound data volume on this connection",
            ],
            predicate: is_external_database_connection,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use apss_core::{EventType, FileOperation, FilePayload, NetProtocol, NetworkPayload, ProcessPayload, SecurityEvent};
    use chrono::Utc;
    use std::collections::HashMap;

    fn base_event() -> SecurityEvent {
        SecurityEvent {
            id: String::new(),
            agent_id: "a1".into(),
            pod_name: "p".into(),
            pod_namespace: "ns".into(),
            event_type: EventType::ProcessStart,
            severity: Severity::Info,
            timestamp: Utc::now(),
            process: None,
            network: None,
            file: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn reverse_shell_rule_matches_external_known_port() {
        let mut event = base_event();
        event.network = Some(NetworkPayload {
            protocol: NetProtocol::Tcp,
            local_ip: "10.0.0.1".into(),
            local_port: 55000,
            remote_ip: "1.2.3.4".into(),
            remote_port: 4444,
            state: "ESTABLISHED".into(),
            is_external: true,
            is_suspicious_port: true,
        });
        assert!(is_reverse_shell(&event));
    }

    #[test]
    fn reverse_shell_rule_does_not_match_internal_traffic() {
        let mut event = base_event();
        event.network = Some(NetworkPayload {
            protocol: NetProtocol::Tcp,
            local_ip: "10.0.0.1".into(),
            local_port: 55000,
            remote_ip: "10.0.0.5".into(),
            remote_port: 4444,
            state: "ESTABLISHED".into(),
            is_external: false,
            is_suspicious_port: true,
        });
        assert!(!is_reverse_shell(&event));
    }

    #[test]
    fn sensitive_file_rule_requires_modify_and_known_path() {
        let mut modified_passwd = base_event();
        modified_passwd.file = Some(FilePayload {
            path: "/etc/passwd".into(),
            operation: FileOperation::Modify,
            prior_hash: Some("a".into()),
            current_hash: Some("b".into()),
            size: 10,
            permissions: "644".into(),
        });
        assert!(is_sensitive_file_modified(&modified_passwd));

        let mut modified_tmp = base_event();
        modified_tmp.file = Some(FilePayload {
            path: "/tmp/foo".into(),
            operation: FileOperation::Modify,
            prior_hash: None,
            current_hash: None,
            size: 0,
            permissions: "644".into(),
        });
        assert!(!is_sensitive_file_modified(&modified_tmp));
    }

    #[test]
    fn built_in_rule_ids_are_in_declared_order() {
        let ids: Vec<&str> = built_in_rules().iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec!["APSS-001", "APSS-002", "APSS-003", "APSS-004", "APSS-005"]
        );
    }
}
