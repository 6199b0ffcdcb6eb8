//! Webhook health

use anyhow::Result;
use flavor_lib::health::{ComponentStatus, HealthResponse, ReadinessResponse};
use serde_json::json;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

/// Wire spelling of a status, e.g. `degraded`
fn status_label(status: ComponentStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", status).to_lowercase())
}

fn rows(health: &HealthResponse) -> Vec<ComponentRow> {
    let mut names: Vec<&String> = health.components.keys().collect();
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let component = &health.components[name];
            ComponentRow {
                name: name.clone(),
                status: color_status(&status_label(component.status)),
                message: component.message.clone().unwrap_or_else(|| "-".to_string()),
                last_check: chrono::DateTime::from_timestamp(component.last_check_timestamp, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect()
}

/// Show `/healthz` and `/readyz`; returns whether the webhook is ready
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<bool> {
    let health: HealthResponse = client.get("healthz", &[503]).await?;
    let readiness: ReadinessResponse = client.get("readyz", &[503]).await?;

    match format {
        OutputFormat::Json => print_json(&json!({"health": health, "readiness": readiness}))?,
        OutputFormat::Table => {
            print_table(rows(&health), "No components registered");
            println!("\nOverall: {}", color_status(&status_label(health.status)));
            if let Some(flavors) = health.catalog_flavors {
                println!("Catalog: {flavors} flavor(s)");
            }
            match &readiness.reason {
                Some(reason) => println!("Ready:   {} ({})", color_status("not ready"), reason),
                None => println!("Ready:   {}", color_status("ready")),
            }
        }
    }

    Ok(readiness.ready)
}
