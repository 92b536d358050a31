use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use apss_core::{AgentIdentity, EventType, NetProtocol, NetworkPayload, SecurityEvent, Severity};
use chrono::Utc;
use tokio::sync::mpsc::Sender;
use tracing::debug;

use crate::net_addr::{is_external, parse_hex_ipv4, parse_hex_ipv6, parse_hex_port, state_from_code};

const SUSPICIOUS_PORTS: [u16; 8] = [4444, 5555, 6666, 1337, 1234, 31337, 9001, 9999];

#[derive(Default)]
pub struct NetworkDropCounters {
    pub dropped: std::sync::atomic::AtomicU64,
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct ConnKey {
    protocol: NetProtocol,
    local: (IpAddr, u16),
    remote: (IpAddr, u16),
}

pub struct NetworkMonitor {
    known: HashSet<ConnKey>,
}

impl NetworkMonitor {
    pub fn new() -> Self {
        Self {
            known: HashSet::new(),
        }
    }

    pub async fn run(
        mut self,
        identity: AgentIdentity,
        interval: Duration,
        sender: Sender<SecurityEvent>,
        drops: std::sync::Arc<NetworkDropCounters>,
        cancel: tokio_util::sync::CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.scan(&identity, &sender, &drops).await;
                }
                _ = cancel.cancelled() => break,
            }
        }
    }

    /// Diffs the current `/proc/net/{tcp,tcp6,udp}` snapshot against the
    /// prior one and emits one event per newly observed row. Rows that
    /// disappear are simply forgotten; unlike processes there is no
    /// `network_close` event type in the wire model.
    pub async fn scan(
        &mut self,
        identity: &AgentIdentity,
        sender: &Sender<SecurityEvent>,
        drops: &NetworkDropCounters,
    ) {
        let mut current = HashSet::new();
        let mut rows = Vec::new();

        for (path, protocol) in [
            ("/proc/net/tcp", NetProtocol::Tcp),
            ("/proc/net/tcp6", NetProtocol::Tcp6),
            ("/proc/net/udp", NetProtocol::Udp),
        ] {
            rows.extend(read_table(path, protocol));
        }

        for row in &rows {
            current.insert(row.key.clone());
        }

        for row in rows {
            if self.known.contains(&row.key) {
                continue;
            }
            if row.remote.0.is_unspecified() && row.remote.1 == 0 {
                continue;
            }
            let event = build_event(identity, &row);
            if sender.try_send(event).is_err() {
                drops
                    .dropped
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                debug!("network monitor: collector buffer full, dropping event");
            }
        }

        self.known = current;
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

struct ConnRow {
    key: ConnKey,
    protocol: NetProtocol,
    local: (IpAddr, u16),
    remote: (IpAddr, u16),
    state: String,
}

fn read_table(path: &str, protocol: NetProtocol) -> Vec<ConnRow> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(path, %err, "network monitor: failed to read table");
            return Vec::new();
        }
    };
    raw.lines().skip(1).filter_map(|line| parse_row(line, protocol)).collect()
}

fn parse_row(line: &str, protocol: NetProtocol) -> Option<ConnRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let local_raw = fields.get(1)?;
    let remote_raw = fields.get(2)?;
    let state_raw = fields.get(3)?;

    let (local_hex, local_port_hex) = local_raw.split_once(':')?;
    let (remote_hex, remote_port_hex) = remote_raw.split_once(':')?;

    let (local_ip, remote_ip) = match protocol {
        NetProtocol::Tcp6 => (
            IpAddr::V6(parse_hex_ipv6(local_hex)?),
            IpAddr::V6(parse_hex_ipv6(remote_hex)?),
        ),
        NetProtocol::Tcp | NetProtocol::Udp => (
            IpAddr::V4(parse_hex_ipv4(local_hex)?),
            IpAddr::V4(parse_hex_ipv4(remote_hex)?),
        ),
    };

    let local_port = parse_hex_port(local_port_hex)?;
    let remote_port = parse_hex_port(remote_port_hex)?;
    let state = state_from_code(state_raw).to_string();

    Some(ConnRow {
        key: ConnKey {
            protocol,
            local: (local_ip, local_port),
            remote: (remote_ip, remote_port),
        },
        protocol,
        local: (local_ip, local_port),
        remote: (remote_ip, remote_port),
        state,
    })
}

fn build_event(identity: &AgentIdentity, row: &ConnRow) -> SecurityEvent {
    let external = is_external(row.remote.0);
    let suspicious_port =
        SUSPICIOUS_PORTS.contains(&row.remote.1) || SUSPICIOUS_PORTS.contains(&row.local.1);
    let established = row.state == "ESTABLISHED";

    let severity = if established && external && suspicious_port {
        Severity::Critical
    } else if suspicious_port {
        Severity::High
    } else if established && external {
        Severity::Low
    } else {
        Severity::Info
    };

    let event_type = if row.state == "LISTEN" {
        EventType::NetworkListen
    } else {
        EventType::NetworkConnect
    };

    SecurityEvent {
        id: String::new(),
        agent_id: identity.agent_id.clone(),
        pod_name: identity.pod_name.clone(),
        pod_namespace: identity.pod_namespace.clone(),
        event_type,
        severity,
        timestamp: Utc::now(),
        process: None,
        network: Some(NetworkPayload {
            protocol: row.protocol,
            local_ip: row.local.0.to_string(),
            local_port: row.local.1,
            remote_ip: row.remote.0.to_string(),
            remote_port: row.remote.1,
            state: row.state.clone(),
            is_external: external,
            is_suspicious_port: suspicious_port,
        }),
        file: None,
        metadata: std::collections::HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_established_row_from_tcp_table() {
        let line = "   0: 0100007F:1F90 08080808:01BB 01 00000000:00000000 00:00000000 00000000     0        0 12345 1 0000000000000000 100 0 0 10 0";
        let row = parse_row(line, NetProtocol::Tcp).unwrap();
        assert_eq!(row.local.0.to_string(), "127.0.0.1");
        assert_eq!(row.local.1, 8080);
        assert_eq!(row.remote.1, 443);
        assert_eq!(row.state, "ESTABLISHED");
    }

    #[test]
    fn listen_row_with_unspecified_remote_is_skipped_by_scan() {
        let line = "   1: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 12346 1 0000000000000000 100 0 0 10 0";
        let row = parse_row(line, NetProtocol::Tcp).unwrap();
        assert!(row.remote.0.is_unspecified());
        assert_eq!(row.remote.1, 0);
    }

    #[test]
    fn external_established_suspicious_port_is_critical() {
        let row = ConnRow {
            key: ConnKey {
                protocol: NetProtocol::Tcp,
                local: ("10.0.0.5".parse().unwrap(), 55000),
                remote: ("8.8.8.8".parse().unwrap(), 4444),
            },
            protocol: NetProtocol::Tcp,
            local: ("10.0.0.5".parse().unwrap(), 55000),
            remote: ("8.8.8.8".parse().unwrap(), 4444),
            state: "ESTABLISHED".to_string(),
        };
        let identity = AgentIdentity {
            agent_id: "a".to_string(),
            pod_name: "p".to_string(),
            pod_namespace: "ns".to_string(),
        };
        let event = build_event(&identity, &row);
        assert_eq!(event.severity, Severity::Critical);
    }
}
