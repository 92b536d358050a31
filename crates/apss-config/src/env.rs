use std::env;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("environment variable {0} has an invalid duration: {1}")]
    InvalidDuration(&'static str, String),
    #[error("environment variable {0} has an invalid socket address: {1}")]
    InvalidAddr(&'static str, String),
}

pub fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

pub fn var_opt(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Parses durations the way the `humantime` crate does
/// ("5s", "10s", "2m", "30s"), matching the informal "durations" in the
/// spec'd environment variable table.
pub fn duration_or(name: &'static str, default: Duration) -> Result<Duration, EnvError> {
    match env::var(name) {
        Ok(raw) => humantime::parse_duration(&raw)
            .map_err(|_| EnvError::InvalidDuration(name, raw)),
        Err(_) => Ok(default),
    }
}

pub fn list_or(name: &'static str, default: &[&str]) -> Vec<String> {
    match env::var(name) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}
