//! Admission webhook listener

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use flavor_lib::webhook::{webhook_router, WebhookState};
use tracing::{info, warn};

use crate::config::WebhookConfig;

/// Serve `POST /mutate/pods`, over HTTPS when a certificate is configured
///
/// The API server only calls webhooks over TLS; plain HTTP is for running
/// behind a TLS-terminating proxy or locally.
pub async fn serve(config: WebhookConfig, state: Arc<WebhookState>) -> Result<()> {
    let app = webhook_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));

    match config.tls_files() {
        Some((cert, key)) => {
            let tls_config = RustlsConfig::from_pem_file(cert, key)
                .await
                .with_context(|| {
                    format!(
                        "failed to load TLS certificate '{}' and key '{}'",
                        cert.display(),
                        key.display()
                    )
                })?;

            info!(addr = %addr, cert = %cert.display(), "Starting webhook server with TLS");
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("webhook server failed")?;
        }
        None => {
            warn!(addr = %addr, "No TLS certificate configured, serving webhook over plain HTTP");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .await
                .context("webhook server failed")?;
        }
    }

    Ok(())
}
