//! Saved defaults

use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;
use crate::output::{print_info, print_json, print_success, print_warning, OutputFormat};

pub fn show_config(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(config)?,
        OutputFormat::Table => {
            let show = |value: Option<String>| value.unwrap_or_else(|| "(not set)".to_string());
            println!(
                "catalog:     {}",
                show(config.catalog.as_ref().map(|p| p.display().to_string()))
            );
            println!("webhook_url: {}", show(config.webhook_url.clone()));
            println!("api_url:     {}", show(config.api_url.clone()));
        }
    }
    Ok(())
}

/// Merge the given values into `config`; returns whether anything changed
pub fn apply(
    config: &mut Config,
    catalog: Option<PathBuf>,
    webhook_url: Option<String>,
    api_url: Option<String>,
) -> bool {
    let before = config.clone();
    if catalog.is_some() {
        config.catalog = catalog;
    }
    if webhook_url.is_some() {
        config.webhook_url = webhook_url;
    }
    if api_url.is_some() {
        config.api_url = api_url;
    }
    *config != before
}

pub fn set_config(
    mut config: Config,
    catalog: Option<PathBuf>,
    webhook_url: Option<String>,
    api_url: Option<String>,
) -> Result<()> {
    if !apply(&mut config, catalog, webhook_url, api_url) {
        print_warning("Nothing to change; pass --catalog, --webhook-url or --api-url");
        return Ok(());
    }

    let path = config.save()?;
    print_success(&format!("Saved {}", path.display()));
    print_info("Flags and environment variables still take precedence");
    Ok(())
}
