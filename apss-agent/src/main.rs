use std::sync::Arc;
use std::time::Duration;

use apss_collector::Collector;
use apss_config::AgentConfig;
use apss_core::{AgentIdentity, SecurityEvent};
use apss_monitors::{FileDropCounters, FileMonitor, NetworkDropCounters, NetworkMonitor, ProcessDropCounters, ProcessMonitor};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Directories the File Integrity Monitor baselines and watches by default.
/// Covers every path named in the severity table (`/etc`, `/root`) plus the
/// cron spool, which lives outside `/etc`.
const DEFAULT_WATCH_PATHS: [&str; 3] = ["/etc", "/root", "/var/spool/cron"];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    if let Err(err) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        error!(%err, "failed to install metrics recorder");
    }

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid agent configuration");
            std::process::exit(1);
        }
    };

    let identity = AgentIdentity {
        agent_id: config.agent_id.clone(),
        pod_name: config.pod_name.clone(),
        pod_namespace: config.pod_namespace.clone(),
    };
    info!(agent_id = %identity.agent_id, "apss-agent starting");

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let (tx, rx) = tokio::sync::mpsc::channel::<SecurityEvent>(config.collector_buffer_size);

    let process_drops = Arc::new(ProcessDropCounters::default());
    let process_task = tokio::spawn(ProcessMonitor::new(&[]).run(
        identity.clone(),
        config.proc_scan_interval,
        tx.clone(),
        process_drops,
        cancel.clone(),
    ));

    let network_drops = Arc::new(NetworkDropCounters::default());
    let network_task = tokio::spawn(NetworkMonitor::new().run(
        identity.clone(),
        config.net_scan_interval,
        tx.clone(),
        network_drops,
        cancel.clone(),
    ));

    let file_drops = Arc::new(FileDropCounters::default());
    let watch_paths: Vec<String> = DEFAULT_WATCH_PATHS.iter().map(|s| s.to_string()).collect();
    let file_task = tokio::spawn(
        FileMonitor::new(&watch_paths).run(identity.clone(), tx.clone(), file_drops, cancel.clone()),
    );

    drop(tx);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("reqwest client with rustls-tls must build");
    let collector = Collector::new(client, config.controller_events_url());
    collector.run(rx, cancel.clone()).await;

    let _ = tokio::join!(process_task, network_task, file_task);
    info!("apss-agent stopped");
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("apss-agent: shutdown signal received");
            cancel.cancel();
        }
    });
}
