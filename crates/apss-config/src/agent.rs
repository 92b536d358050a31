use std::time::Duration;

use apss_sink::SinkConfig;

use crate::env::{duration_or, var_opt, var_or, EnvError};

// Shared by aggregator.rs: both the agent's Collector config (no sink of its
// own) and the Aggregator read SWEET_SECURITY_* from the same env vars, but
// only the Aggregator relays events externally, so only its config keeps
// the resulting `SinkConfig`.

pub const DEFAULT_CONTROLLER_ENDPOINT: &str = "apss-controller.apss-system.svc.cluster.local:8080";
pub const DEFAULT_PROC_SCAN_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_NET_SCAN_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_FILE_SCAN_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_COLLECTOR_BUFFER_SIZE: usize = 10_000;

/// Configuration for the in-pod agent process (monitors + Collector).
///
/// `file_scan_interval` is read and stored but intentionally unused: the
/// File Integrity Monitor is notification-driven, not interval-driven (spec
/// open question #3). It is kept on the struct so the env var remains
/// recognized rather than rejected.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub pod_name: String,
    pub pod_namespace: String,
    pub node_name: String,
    pub agent_id: String,
    pub controller_endpoint: String,
    pub proc_scan_interval: Duration,
    pub net_scan_interval: Duration,
    pub file_scan_interval: Duration,
    pub collector_buffer_size: usize,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, EnvError> {
        let pod_name = var_or("POD_NAME", "");
        let pod_namespace = var_or("POD_NAMESPACE", "");
        let node_name = var_or("NODE_NAME", "");
        let agent_id = var_opt("AGENT_ID").unwrap_or_else(|| format!("{pod_name}-{pod_namespace}"));

        Ok(Self {
            pod_name,
            pod_namespace,
            node_name,
            agent_id,
            controller_endpoint: var_or("CONTROLLER_ENDPOINT", DEFAULT_CONTROLLER_ENDPOINT),
            proc_scan_interval: duration_or("PROC_SCAN_INTERVAL", DEFAULT_PROC_SCAN_INTERVAL)?,
            net_scan_interval: duration_or("NET_SCAN_INTERVAL", DEFAULT_NET_SCAN_INTERVAL)?,
            file_scan_interval: duration_or("FILE_SCAN_INTERVAL", DEFAULT_FILE_SCAN_INTERVAL)?,
            collector_buffer_size: DEFAULT_COLLECTOR_BUFFER_SIZE,
        })
    }

    pub fn controller_events_url(&self) -> String {
        format!("http://{}/api/v1/events", self.controller_endpoint)
    }
}

pub(crate) fn sink_config_from_env() -> Result<SinkConfig, EnvError> {
    Ok(SinkConfig {
        base_url: var_or("SWEET_SECURITY_ENDPOINT", ""),
        api_key: var_or("SWEET_SECURITY_API_KEY", ""),
        timeout: duration_or("SWEET_SECURITY_TIMEOUT", Duration::from_secs(30))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_defaults_to_pod_name_and_namespace() {
        std::env::remove_var("AGENT_ID");
        std::env::set_var("POD_NAME", "web-0");
        std::env::set_var("POD_NAMESPACE", "app");
        let cfg = AgentConfig::from_env().unwrap();
        assert_eq!(cfg.agent_id, "web-0-app");
        std::env::remove_var("POD_NAME");
        std::env::remove_var("POD_NAMESPACE");
    }
}
