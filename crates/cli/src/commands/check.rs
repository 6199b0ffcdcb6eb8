//! Local admission check

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use flavor_lib::admission::{AdmitOutcome, Attributes, FlavorGate, Operation};
use flavor_lib::error::AdmissionError;
use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;
use tabled::Tabled;

use super::{read_pod, CatalogSource};
use crate::output::{
    format_list, print_error, print_info, print_json, print_success, print_table, OutputFormat,
};

#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Flavor")]
    flavor: String,
    #[tabled(rename = "Backfilled")]
    backfilled: String,
}

#[derive(Debug, Serialize)]
struct ContainerReport {
    name: String,
    flavor: String,
    backfilled: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    allowed: bool,
    operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    containers: Vec<ContainerReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pod: Option<Pod>,
}

impl CheckReport {
    fn new(operation: Operation, result: Result<AdmitOutcome, AdmissionError>) -> Self {
        let mut report = Self {
            allowed: true,
            operation: operation.as_str(),
            reason: None,
            message: None,
            containers: Vec::new(),
            pod: None,
        };

        match result {
            Ok(AdmitOutcome::Admitted { containers }) => {
                report.containers = containers
                    .into_iter()
                    .map(|c| ContainerReport {
                        name: c.container,
                        flavor: c.flavor,
                        backfilled: c.backfilled,
                    })
                    .collect();
            }
            Ok(AdmitOutcome::Skipped(reason)) => report.reason = Some(reason.as_str()),
            Err(violation) => {
                report.allowed = false;
                report.reason = Some(violation.reason());
                report.message = Some(violation.to_string());
            }
        }

        report
    }
}

/// Run the gate over a pod manifest; returns whether it was admitted
pub fn check_pod(
    source: &CatalogSource,
    pod_path: &Path,
    operation: Operation,
    show_pod: bool,
    format: OutputFormat,
) -> Result<bool> {
    let gate = FlavorGate::new(Arc::new(source.load()?));
    let mut pod = read_pod(pod_path)?;

    let result = gate.admit(&mut Attributes::for_pod(operation, &mut pod));
    let mut report = CheckReport::new(operation, result);
    if show_pod && report.allowed {
        report.pod = Some(pod);
    }

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report)?,
    }

    Ok(report.allowed)
}

fn print_report(report: &CheckReport) -> Result<()> {
    if !report.allowed {
        print_error(report.message.as_deref().unwrap_or("Pod rejected"));
        return Ok(());
    }
    if let Some(reason) = report.reason {
        print_info(&format!("Pod not evaluated ({reason})"));
        return Ok(());
    }

    let rows: Vec<ContainerRow> = report
        .containers
        .iter()
        .map(|c| ContainerRow {
            container: c.name.clone(),
            flavor: c.flavor.clone(),
            backfilled: format_list(&c.backfilled),
        })
        .collect();
    print_table(rows, "No containers");

    let backfilled: usize = report.containers.iter().map(|c| c.backfilled.len()).sum();
    print_success(&format!(
        "Pod admitted on {} ({} request(s) backfilled)",
        report.operation, backfilled
    ));

    if let Some(pod) = &report.pod {
        println!();
        print_json(pod)?;
    }
    Ok(())
}
