//! Send a pod to a running webhook

use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::Engine;
use chrono::Utc;
use flavor_lib::admission::Operation;
use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;
use serde_json::{json, Value};

use super::read_pod;
use crate::client::ApiClient;
use crate::output::{color_status, print_error, print_info, print_json, print_success, OutputFormat};

/// The parts of an AdmissionReview reply worth showing
#[derive(Debug, Serialize)]
pub struct ReviewSummary {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Vec<Value>>,
}

impl ReviewSummary {
    pub fn from_reply(reply: &Value) -> Result<Self> {
        let response = reply
            .get("response")
            .context("Webhook reply has no response")?;

        let allowed = response["allowed"]
            .as_bool()
            .context("Webhook response has no 'allowed' field")?;
        let message = response["status"]["message"]
            .as_str()
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        Ok(Self {
            uid: response["uid"].as_str().unwrap_or_default().to_string(),
            allowed,
            message,
            patch: decode_patch(&response["patch"])?,
        })
    }
}

/// Decode the response patch: base64 JSON, or raw bytes as some encoders emit
pub fn decode_patch(patch: &Value) -> Result<Option<Vec<Value>>> {
    let bytes = match patch {
        Value::Null => return Ok(None),
        Value::String(encoded) => base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .context("Patch is not valid base64")?,
        Value::Array(raw) => raw
            .iter()
            .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .context("Patch byte array holds non-byte values")?,
        other => bail!("Unexpected patch encoding: {other}"),
    };

    let ops = serde_json::from_slice(&bytes).context("Patch is not a JSON patch")?;
    Ok(Some(ops))
}

/// Wrap `pod` in an AdmissionReview for the `pods` collection
pub fn build_review(pod: &Pod, operation: Operation) -> Result<Value> {
    let uid = format!("flavorctl-{}", Utc::now().format("%Y%m%dT%H%M%S%.6f"));
    let object = serde_json::to_value(pod).context("Failed to encode pod")?;
    let old_object = match operation {
        Operation::Update => object.clone(),
        _ => Value::Null,
    };

    Ok(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": uid,
            "kind": {"group": "", "version": "v1", "kind": "Pod"},
            "resource": {"group": "", "version": "v1", "resource": "pods"},
            "requestKind": {"group": "", "version": "v1", "kind": "Pod"},
            "requestResource": {"group": "", "version": "v1", "resource": "pods"},
            "name": pod.metadata.name.clone().unwrap_or_default(),
            "namespace": pod.metadata.namespace.as_deref().unwrap_or("default"),
            "operation": operation.as_str(),
            "userInfo": {"username": "flavorctl"},
            "object": object,
            "oldObject": old_object,
            "dryRun": true
        }
    }))
}

/// POST the pod to `/mutate/pods`; returns whether it was allowed
pub async fn send_review(
    client: &ApiClient,
    pod_path: &Path,
    operation: Operation,
    verbose: bool,
    format: OutputFormat,
) -> Result<bool> {
    let pod = read_pod(pod_path)?;
    let review = build_review(&pod, operation)?;
    if verbose {
        print_info(&format!("Sending {} review to {}", operation, client.base_url()));
    }

    let reply: Value = client.post("mutate/pods", &review).await?;
    let summary = ReviewSummary::from_reply(&reply)?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            let verdict = if summary.allowed { "allowed" } else { "denied" };
            println!("Review {}: {}", summary.uid, color_status(verdict));
            match (&summary.message, summary.allowed) {
                (Some(message), false) => print_error(message),
                (Some(message), true) => print_info(message),
                (None, _) => {}
            }
            match &summary.patch {
                Some(ops) => {
                    print_success(&format!("Webhook patched {} request(s):", ops.len()));
                    print_json(ops)?;
                }
                None if summary.allowed => print_success("Pod admitted unchanged"),
                None => {}
            }
        }
    }

    Ok(summary.allowed)
}
