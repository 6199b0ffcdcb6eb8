//! Flavor Webhook - resource flavor admission for pods
//!
//! Runs as a Deployment registered through a MutatingWebhookConfiguration.
//! Pods whose container requests do not match a catalog flavor are rejected;
//! partial requests are completed from the matching flavor.

use anyhow::{Context, Result};
use flavor_lib::{
    admission::FlavorGate,
    health::{components, HealthRegistry},
    observability::{GateMetrics, StructuredLogger},
    webhook::WebhookState,
};
use flavor_webhook::{api, config::WebhookConfig, server};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const WEBHOOK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting flavor-webhook");

    let config = WebhookConfig::load().context("invalid webhook configuration")?;
    info!(
        instance = %config.instance_name,
        webhook_port = config.webhook_port,
        api_port = config.api_port,
        "Webhook configured"
    );

    // A missing or broken catalog stops the process before it serves anything
    let gate = FlavorGate::from_admission_config_file(config.admission_config_file.as_deref())
        .context("failed to load flavor catalog")?;
    let catalog = gate.catalog();

    let health_registry = HealthRegistry::new();
    health_registry.register(components::WEBHOOK).await;
    health_registry.record_catalog(catalog.len()).await;

    let metrics = GateMetrics::new();
    metrics.set_catalog_flavors(catalog.len());

    let logger = StructuredLogger::new(&config.instance_name);
    let source = config
        .admission_config_file
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    logger.log_catalog_loaded(&source, &catalog.names().collect::<Vec<_>>());
    logger.log_startup(WEBHOOK_VERSION, catalog.len());

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));
    let webhook_state = Arc::new(WebhookState::new(gate, metrics, logger.clone()));

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));
    let webhook_handle = tokio::spawn(server::serve(config, webhook_state));

    health_registry.set_ready(true).await;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = webhook_handle => {
            health_registry
                .set_unhealthy(components::WEBHOOK, "webhook server stopped")
                .await;
            logger.log_shutdown("webhook server stopped");
            result.context("webhook server task panicked")??;
        }
        result = api_handle => {
            logger.log_shutdown("health server stopped");
            if let Err(e) = result.context("health server task panicked")? {
                error!(error = %e, "Health server failed");
                return Err(e);
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
