use std::time::Duration;

use apss_sink::SinkConfig;

use crate::agent::sink_config_from_env;
use crate::env::{duration_or, var_or, EnvError};

pub const DEFAULT_HTTP_ADDR: &str = ":8080";
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100_000;
pub const DEFAULT_ALERT_BUFFER_SIZE: usize = 10_000;
pub const DEFAULT_ALERT_RETENTION_COUNT: usize = 10_000;
pub const DEFAULT_AGENT_STALE_THRESHOLD: Duration = Duration::from_secs(120);
pub const LIVENESS_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    pub http_addr: String,
    pub shutdown_timeout: Duration,
    pub event_buffer_size: usize,
    pub alert_buffer_size: usize,
    pub alert_retention_count: usize,
    pub agent_stale_threshold: Duration,
    pub sink: SinkConfig,
}

impl AggregatorConfig {
    pub fn from_env() -> Result<Self, EnvError> {
        Ok(Self {
            http_addr: var_or("HTTP_ADDR", DEFAULT_HTTP_ADDR),
            shutdown_timeout: duration_or("SHUTDOWN_TIMEOUT", DEFAULT_SHUTDOWN_TIMEOUT)?,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            alert_buffer_size: DEFAULT_ALERT_BUFFER_SIZE,
            alert_retention_count: DEFAULT_ALERT_RETENTION_COUNT,
            agent_stale_threshold: DEFAULT_AGENT_STALE_THRESHOLD,
            sink: sink_config_from_env()?,
        })
    }
}
