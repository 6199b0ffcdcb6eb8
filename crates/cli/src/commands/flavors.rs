//! Catalog listing

use anyhow::Result;
use flavor_lib::catalog::FlavorCatalog;
use tabled::Tabled;

use super::CatalogSource;
use crate::output::{format_resources, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct FlavorRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Flavor")]
    name: String,
    #[tabled(rename = "Requests")]
    resources: String,
}

fn rows(catalog: &FlavorCatalog) -> Vec<FlavorRow> {
    catalog
        .iter()
        .enumerate()
        .map(|(i, flavor)| FlavorRow {
            rank: i + 1,
            name: flavor.name.clone(),
            resources: format_resources(&flavor.resources),
        })
        .collect()
}

/// List flavors in the order they are tried
pub fn list_flavors(source: &CatalogSource, format: OutputFormat) -> Result<()> {
    let catalog = source.load()?;

    match format {
        OutputFormat::Json => print_json(&catalog)?,
        OutputFormat::Table => {
            let total = catalog.len();
            print_table(rows(&catalog), "Catalog has no flavors; every pod will be rejected");
            if total > 0 {
                println!("\nTotal: {} flavors", total);
            }
        }
    }

    Ok(())
}
