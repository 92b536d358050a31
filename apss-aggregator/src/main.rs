mod http;
mod state;
mod workers;

use std::sync::Arc;
use std::time::Duration;

use apss_config::AggregatorConfig;
use apss_sink::SinkClient;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = match AggregatorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid aggregator configuration");
            std::process::exit(1);
        }
    };

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus recorder installs exactly once");

    let (event_tx, event_rx) = tokio::sync::mpsc::channel(config.event_buffer_size);
    let (alert_tx, alert_rx) = tokio::sync::mpsc::channel(config.alert_buffer_size);

    let app_state = Arc::new(AppState::new(event_tx, config.alert_retention_count, metrics_handle));
    let sink = SinkClient::new(config.sink.clone());

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let event_task = tokio::spawn(workers::run_event_processor(event_rx, alert_tx, cancel.clone()));
    let alert_task = tokio::spawn(workers::run_alert_processor(alert_rx, app_state.clone(), sink, cancel.clone()));
    let liveness_task = tokio::spawn(workers::run_liveness_sweep(
        app_state.clone(),
        apss_config::aggregator::LIVENESS_SWEEP_INTERVAL,
        chrono::Duration::from_std(config.agent_stale_threshold).unwrap_or(chrono::Duration::seconds(120)),
        cancel.clone(),
    ));

    let bind_addr = normalize_addr(&config.http_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {bind_addr}: {err}"));
    info!(addr = %bind_addr, "apss-aggregator listening");

    let router = http::router(app_state);
    let shutdown_timeout = config.shutdown_timeout;
    let server_cancel = cancel.clone();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        server_cancel.cancelled().await;
    });

    if let Err(err) = server.await {
        error!(%err, "apss-aggregator server error");
    }

    let _ = tokio::time::timeout(shutdown_timeout, async {
        let _ = tokio::join!(event_task, alert_task, liveness_task);
    })
    .await;

    info!("apss-aggregator stopped");
}

fn normalize_addr(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("apss-aggregator: shutdown signal received");
            cancel.cancel();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_port_to_wildcard_bind() {
        assert_eq!(normalize_addr(":8080"), "0.0.0.0:8080");
        assert_eq!(normalize_addr("127.0.0.1:9090"), "127.0.0.1:9090");
    }
}
