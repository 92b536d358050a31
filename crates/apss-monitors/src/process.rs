use std::collections::{HashMap, HashSet};
use std::os::unix::fs::MetadataExt;
use std::time::Duration;

use apss_core::{AgentIdentity, EventType, ProcessPayload, SecurityEvent, Severity};
use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc::Sender;
use tracing::debug;

use crate::indicators::IndicatorClassifier;

#[derive(Default)]
pub struct ProcessDropCounters {
    pub start_dropped: std::sync::atomic::AtomicU64,
}

pub struct ProcessMonitor {
    classifier: IndicatorClassifier,
    known_pids: HashSet<i32>,
}

impl ProcessMonitor {
    pub fn new(suspicious_patterns: &[String]) -> Self {
        Self {
            classifier: IndicatorClassifier::new(suspicious_patterns),
            known_pids: HashSet::new(),
        }
    }

    pub async fn run(
        mut self,
        identity: AgentIdentity,
        interval: Duration,
        sender: Sender<SecurityEvent>,
        drops: std::sync::Arc<ProcessDropCounters>,
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

    /// Enumerates `/proc`, diffs against the prior snapshot, and emits
    /// `process_start`/`process_exit` events. New-process sends that hit a
    /// full Collector buffer increment `drops` and continue; exit-event
    /// drops are silent per spec.
    pub async fn scan(
        &mut self,
        identity: &AgentIdentity,
        sender: &Sender<SecurityEvent>,
        drops: &ProcessDropCounters,
    ) {
        let current = enumerate_pids();

        let new_pids: Vec<i32> = current.difference(&self.known_pids).copied().collect();
        let exited_pids: Vec<i32> = self.known_pids.difference(&current).copied().collect();

        for pid in new_pids {
            match self.build_start_event(identity, pid) {
                Some(event) => {
                    if sender.try_send(event).is_err() {
                        drops
                            .start_dropped
                            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        debug!(pid, "process monitor: collector buffer full, dropping start event");
                    }
                }
                None => debug!(pid, "process monitor: pid vanished before it could be read"),
            }
        }

        for pid in exited_pids {
            let event = self.build_exit_event(identity, pid);
            let _ = sender.try_send(event);
        }

        self.known_pids = current;
    }

    fn build_start_event(&self, identity: &AgentIdentity, pid: i32) -> Option<SecurityEvent> {
        let proc = procfs::process::Process::new(pid).ok()?;
        let stat = proc.stat().ok()?;
        let cmdline = proc.cmdline().unwrap_or_default();
        let exe = proc
            .exe()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let uid = std::fs::metadata(format!("/proc/{pid}"))
            .map(|m| m.uid())
            .unwrap_or(0);

        let name = if stat.comm.is_empty() {
            cmdline.first().cloned().unwrap_or_default()
        } else {
            stat.comm.clone()
        };

        let (indicators, severity) = self.classifier.classify(&name, &cmdline);
        let start_time = process_start_time(stat.starttime);

        let mut metadata = HashMap::new();
        metadata.insert("cmdline_hash".to_string(), short_hash(&cmdline.join(" ")));

        Some(SecurityEvent {
            id: String::new(),
            agent_id: identity.agent_id.clone(),
            pod_name: identity.pod_name.clone(),
            pod_namespace: identity.pod_namespace.clone(),
            event_type: EventType::ProcessStart,
            severity,
            timestamp: Utc::now(),
            process: Some(ProcessPayload {
                pid: pid as u32,
                ppid: stat.ppid as u32,
                name,
                executable: exe,
                command_line: cmdline,
                uid,
                start_time,
                suspicious_indicators: indicators,
            }),
            network: None,
            file: None,
            metadata,
        })
    }

    fn build_exit_event(&self, identity: &AgentIdentity, pid: i32) -> SecurityEvent {
        SecurityEvent {
            id: String::new(),
            agent_id: identity.agent_id.clone(),
            pod_name: identity.pod_name.clone(),
            pod_namespace: identity.pod_namespace.clone(),
            event_type: EventType::ProcessExit,
            severity: Severity::Info,
            timestamp: Utc::now(),
            process: Some(ProcessPayload {
                pid: pid as u32,
                ppid: 0,
                name: String::new(),
                executable: String::new(),
                command_line: Vec::new(),
                uid: 0,
                start_time: Utc::now(),
                suspicious_indicators: Vec::new(),
            }),
            network: None,
            file: None,
            metadata: HashMap::new(),
        }
    }
}

fn enumerate_pids() -> HashSet<i32> {
    match procfs::process::all_processes() {
        Ok(iter) => iter
            .filter_map(|p| p.ok())
            .map(|p| p.pid())
            .collect(),
        Err(err) => {
            debug!(%err, "process monitor: failed to enumerate /proc");
            HashSet::new()
        }
    }
}

fn process_start_time(starttime_ticks: u64) -> DateTime<Utc> {
    let boot = procfs::boot_time_secs().unwrap_or(0);
    let ticks_per_sec = procfs::ticks_per_second().max(1) as u64;
    let epoch_secs = boot.saturating_add(starttime_ticks / ticks_per_sec);
    Utc.timestamp_opt(epoch_secs as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Direct implementation of the `stat` line's `comm` extraction, kept as a
/// standalone, unit-tested function: the field is wrapped in parentheses
/// and may itself contain spaces or a literal `)`, so splitting must locate
/// the *last* `)` before tokenizing the remaining whitespace-separated
/// fields. `procfs::process::Stat` already does this internally for
/// production parsing; this mirrors that algorithm for direct testing.
pub fn split_stat_line(raw: &str) -> Option<(i32, String, Vec<&str>)> {
    let open = raw.find('(')?;
    let close = raw.rfind(')')?;
    if close < open {
        return None;
    }
    let pid = raw[..open].trim().parse().ok()?;
    let comm = raw[open + 1..close].to_string();
    let rest: Vec<&str> = raw[close + 1..].split_whitespace().collect();
    Some((pid, comm, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_line_tokenizes_comm_with_spaces_and_parens() {
        let raw = "123 (my cool (proc)) S 1 123 123 0 -1 4194560 100 0 0 0 5 3 0 0 20 0 1";
        let (pid, comm, rest) = split_stat_line(raw).unwrap();
        assert_eq!(pid, 123);
        assert_eq!(comm, "my cool (proc)");
        assert_eq!(rest.first(), Some(&"S"));
    }

    #[test]
    fn short_hash_is_deterministic() {
        assert_eq!(short_hash("abc"), short_hash("abc"));
        assert_ne!(short_hash("abc"), short_hash("abd"));
    }
}
