use std::pin::Pin;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use openssl::ssl::{Ssl, SslAcceptor, SslFiletype, SslMethod};
use tokio::net::{TcpListener, TcpStream};
use tokio_openssl::SslStream;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use apss_config::AdmissionConfig;

use crate::handler;

pub fn router(config: Arc<AdmissionConfig>) -> Router {
    Router::new()
        .route("/health", get(handler::health))
        .route("/mutate", post(handler::mutate))
        .with_state(config)
}

fn build_acceptor(cert_file: &str, key_file: &str) -> Result<SslAcceptor, openssl::error::ErrorStack> {
    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())?;
    builder.set_private_key_file(key_file, SslFiletype::PEM)?;
    builder.set_certificate_chain_file(cert_file)?;
    builder.check_private_key()?;
    Ok(builder.build())
}

/// Accepts TLS connections directly over openssl (the project's own
/// `tokio-openssl` dependency) and serves each one through hyper's http1
/// connector, since axum's `serve` helper only speaks plain TCP.
pub async fn serve_tls(
    addr: &str,
    cert_file: &str,
    key_file: &str,
    router: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let acceptor = build_acceptor(cert_file, key_file)
        .map_err(|err| std::io::Error::other(format!("failed to build TLS acceptor: {err}")))?;

    let listener = TcpListener::bind(addr).await?;
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(%err, "admission: accept failed");
                        continue;
                    }
                };
                let acceptor = acceptor.clone();
                let router = router.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, acceptor, router).await {
                        warn!(%peer, %err, "admission: connection error");
                    }
                });
            }
            _ = cancel.cancelled() => break,
        }
    }
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    acceptor: SslAcceptor,
    router: Router,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ssl = Ssl::new(acceptor.context())?;
    let mut tls_stream = SslStream::new(ssl, stream)?;
    Pin::new(&mut tls_stream).accept().await?;

    let io = TokioIo::new(tls_stream);
    hyper::server::conn::http1::Builder::new()
        .serve_connection(io, TowerToHyperService::new(router))
        .await?;
    Ok(())
}
