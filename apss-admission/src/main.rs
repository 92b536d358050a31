use std::sync::Arc;

use apss_admission::server;
use apss_config::AdmissionConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = match AdmissionConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid admission configuration");
            std::process::exit(1);
        }
    };

    if config.tls_cert_file.is_empty() || config.tls_key_file.is_empty() {
        error!("TLS_CERT_FILE and TLS_KEY_FILE must both be set; the kube API server requires TLS for admission webhooks");
        std::process::exit(1);
    }

    let bind_addr = normalize_addr(&config.http_addr);
    let cert_file = config.tls_cert_file.clone();
    let key_file = config.tls_key_file.clone();
    let router = server::router(Arc::new(config));

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    info!(addr = %bind_addr, "apss-admission listening");
    if let Err(err) = server::serve_tls(&bind_addr, &cert_file, &key_file, router, cancel).await {
        error!(%err, "apss-admission server error");
        std::process::exit(1);
    }

    info!("apss-admission stopped");
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
            info!("apss-admission: shutdown signal received");
            cancel.cancel();
        }
    });
}
