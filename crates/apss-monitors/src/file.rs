use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use apss_core::{AgentIdentity, EventType, FileOperation, FilePayload, SecurityEvent, Severity};
use chrono::Utc;
use notify::{EventKind, ModifyKind, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MAX_HASH_SIZE: u64 = 10 * 1024 * 1024;
const CRITICAL_PATHS: [&str; 5] = [
    "/etc/passwd",
    "/etc/shadow",
    "/etc/sudoers",
    "/etc/ssh/sshd_config",
    "/root/.ssh/authorized_keys",
];
const HIGH_PATHS: [&str; 7] = [
    "/etc/crontab",
    "/var/spool/cron",
    "/etc/cron.d",
    "/etc/profile",
    "/etc/bashrc",
    "/root/.bashrc",
    "/root/.profile",
];
const SCRIPT_EXTENSIONS: [&str; 6] = ["sh", "py", "pl", "rb", "elf", "so"];

#[derive(Default)]
pub struct FileDropCounters {
    pub dropped: std::sync::atomic::AtomicU64,
}

struct BaselineEntry {
    hash: Option<String>,
}

pub struct FileMonitor {
    watched_dirs: Vec<PathBuf>,
    baseline: HashMap<PathBuf, BaselineEntry>,
}

impl FileMonitor {
    /// Walks each watch path recursively and hashes every regular file no
    /// larger than 10 MiB to seed the baseline used for prior/current hash
    /// diffing once the watcher starts delivering events.
    pub fn new(watch_paths: &[String]) -> Self {
        let mut baseline = HashMap::new();
        let mut watched_dirs = Vec::new();
        for raw in watch_paths {
            let root = PathBuf::from(raw);
            walk(&root, &mut baseline);
            watched_dirs.push(root);
        }
        Self {
            watched_dirs,
            baseline,
        }
    }

    pub async fn run(
        mut self,
        identity: AgentIdentity,
        sender: Sender<SecurityEvent>,
        drops: Arc<FileDropCounters>,
        cancel: CancellationToken,
    ) {
        let (raw_tx, raw_rx) = std::sync::mpsc::channel::<notify::Result<notify::Event>>();
        let mut watcher = match notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        }) {
            Ok(watcher) => watcher,
            Err(err) => {
                warn!(%err, "file monitor: failed to create watcher");
                return;
            }
        };

        for dir in &self.watched_dirs {
            if let Err(err) = watcher.watch(dir, RecursiveMode::Recursive) {
                warn!(path = %dir.display(), %err, "file monitor: failed to watch path");
            }
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let forward = tokio::task::spawn_blocking(move || {
            while let Ok(res) = raw_rx.recv() {
                if tx.send(res).is_err() {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                Some(res) = rx.recv() => {
                    match res {
                        Ok(event) => self.handle_event(&identity, &sender, &drops, event, &mut watcher).await,
                        Err(err) => debug!(%err, "file monitor: watcher error"),
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        forward.abort();
    }

    async fn handle_event(
        &mut self,
        identity: &AgentIdentity,
        sender: &Sender<SecurityEvent>,
        drops: &FileDropCounters,
        event: notify::Event,
        watcher: &mut notify::RecommendedWatcher,
    ) {
        let Some(operation) = operation_for(&event.kind) else {
            return;
        };

        for path in event.paths {
            let prior_hash = self.baseline.get(&path).and_then(|e| e.hash.clone());

            if operation == FileOperation::Delete {
                self.baseline.remove(&path);
            } else {
                let current_hash = hash_if_small_enough(&path);
                if operation == FileOperation::Create && path.is_dir() {
                    if let Err(err) = watcher.watch(&path, RecursiveMode::Recursive) {
                        warn!(path = %path.display(), %err, "file monitor: failed to watch new directory");
                    }
                }
                self.baseline.insert(
                    path.clone(),
                    BaselineEntry {
                        hash: current_hash.clone(),
                    },
                );
            }

            let event_type = match operation {
                FileOperation::Create => EventType::FileCreate,
                FileOperation::Delete => EventType::FileDelete,
                _ => EventType::FileModify,
            };
            let severity = classify_severity(&path, operation);
            let (size, permissions) = stat_metadata(&path);

            let security_event = SecurityEvent {
                id: String::new(),
                agent_id: identity.agent_id.clone(),
                pod_name: identity.pod_name.clone(),
                pod_namespace: identity.pod_namespace.clone(),
                event_type,
                severity,
                timestamp: Utc::now(),
                process: None,
                network: None,
                file: Some(FilePayload {
                    path: path.to_string_lossy().to_string(),
                    operation,
                    prior_hash,
                    current_hash: hash_if_small_enough(&path),
                    size,
                    permissions,
                }),
                metadata: HashMap::new(),
            };

            if sender.try_send(security_event).is_err() {
                drops.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                debug!(path = %path.display(), "file monitor: collector buffer full, dropping event");
            }
        }
    }
}

fn operation_for(kind: &EventKind) -> Option<FileOperation> {
    match kind {
        EventKind::Create(_) => Some(FileOperation::Create),
        EventKind::Remove(_) => Some(FileOperation::Delete),
        EventKind::Modify(ModifyKind::Name(_)) => Some(FileOperation::Rename),
        EventKind::Modify(ModifyKind::Metadata(_)) => Some(FileOperation::Chmod),
        EventKind::Modify(_) => Some(FileOperation::Modify),
        _ => None,
    }
}

/// Path-class severity table. Equality for the single-file critical set,
/// equality-or-descendant for the high set, extension-on-create for the
/// medium script set, delete always escalates to at least high.
fn classify_severity(path: &Path, operation: FileOperation) -> Severity {
    let path_str = path.to_string_lossy();

    if CRITICAL_PATHS.iter().any(|p| path_str == *p) {
        return Severity::Critical;
    }
    if HIGH_PATHS
        .iter()
        .any(|p| path_str == *p || path_str.starts_with(&format!("{p}/")))
    {
        return Severity::High;
    }
    if operation == FileOperation::Delete {
        return Severity::High;
    }
    if operation == FileOperation::Create {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if SCRIPT_EXTENSIONS.contains(&ext) {
                return Severity::Medium;
            }
        }
    }
    Severity::Medium
}

fn hash_if_small_enough(path: &Path) -> Option<String> {
    let meta = fs::metadata(path).ok()?;
    if !meta.is_file() || meta.len() > MAX_HASH_SIZE {
        return None;
    }
    let bytes = fs::read(path).ok()?;
    Some(format!("{:x}", Sha256::digest(&bytes)))
}

fn stat_metadata(path: &Path) -> (u64, String) {
    match fs::metadata(path) {
        Ok(meta) => (meta.len(), format!("{:o}", meta.permissions().mode() & 0o7777)),
        Err(_) => (0, String::new()),
    }
}

fn walk(dir: &Path, baseline: &mut HashMap<PathBuf, BaselineEntry>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => walk(&path, baseline),
            Ok(ft) if ft.is_file() => {
                let hash = hash_if_small_enough(&path);
                baseline.insert(path, BaselineEntry { hash });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_path_is_critical_regardless_of_operation() {
        assert_eq!(
            classify_severity(Path::new("/etc/shadow"), FileOperation::Modify),
            Severity::Critical
        );
    }

    #[test]
    fn high_path_matches_descendant() {
        assert_eq!(
            classify_severity(Path::new("/etc/cron.d/custom"), FileOperation::Modify),
            Severity::High
        );
    }

    #[test]
    fn delete_outside_known_paths_is_high() {
        assert_eq!(
            classify_severity(Path::new("/tmp/foo.txt"), FileOperation::Delete),
            Severity::High
        );
    }

    #[test]
    fn script_creation_is_medium() {
        assert_eq!(
            classify_severity(Path::new("/tmp/run.sh"), FileOperation::Create),
            Severity::Medium
        );
    }

    #[test]
    fn baseline_walk_hashes_small_files() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        fs::write(&file_path, b"hello").unwrap();
        let mut baseline = HashMap::new();
        walk(dir.path(), &mut baseline);
        assert!(baseline.get(&file_path).unwrap().hash.is_some());
    }
}
