//! Pod mutation handler
//!
//! Translates an `AdmissionRequest` into gate attributes, runs the gate over a
//! typed copy of the pod, and turns the outcome into an `AdmissionResponse`.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, Json};
use json_patch::Patch;
use k8s_openapi::api::core::v1::Pod;
use kube::core::{
    admission::{
        AdmissionRequest, AdmissionResponse, AdmissionReview, Operation as ReviewOperation,
    },
    DynamicObject,
};
use tracing::error;

use super::WebhookState;
use crate::admission::{
    AdmitOutcome, Attributes, FlavorGate, GroupKind, GroupResource, Operation, SkipReason,
};
use crate::error::AdmissionError;
use crate::observability::decisions;

/// What the gate made of one review
#[derive(Debug)]
pub enum Verdict {
    /// Outside the gate's scope; allowed unchanged
    Skipped(SkipReason),
    /// Every container matched; `patch` is empty when nothing was backfilled
    Admitted { outcome: AdmitOutcome, patch: Patch },
    /// A container broke the flavor policy
    Rejected(AdmissionError),
    /// The pod could not be decoded or re-encoded
    Invalid(String),
}

impl Verdict {
    /// Metric label for this verdict
    pub fn decision(&self) -> &'static str {
        match self {
            Verdict::Skipped(_) => decisions::SKIPPED,
            Verdict::Admitted { .. } => decisions::ADMITTED,
            Verdict::Rejected(_) => decisions::REJECTED,
            Verdict::Invalid(_) => decisions::INVALID,
        }
    }
}

/// Handle a mutating admission review for pods
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            state.metrics.inc_decision(decisions::INVALID);
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let started = Instant::now();
    let verdict = evaluate(&state.gate, &request);
    state.metrics.observe_latency(started.elapsed().as_secs_f64());
    record(&state, &request, &verdict);

    Json(respond(&request, verdict).into_review())
}

/// Evaluate a review and build the response in one step
pub fn review(gate: &FlavorGate, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    respond(request, evaluate(gate, request))
}

/// Run the gate over the pod carried by `request`
///
/// The object is only decoded when the request's kind is a core `Pod`; for
/// anything else the gate sees no object and skips on its own rules.
pub fn evaluate(gate: &FlavorGate, request: &AdmissionRequest<DynamicObject>) -> Verdict {
    let kind = GroupKind::new(&request.kind.group, &request.kind.kind);

    let mut pod = match request.object.as_ref() {
        Some(object) if kind == GroupKind::pod() => match decode_pod(object) {
            Ok(pod) => Some(pod),
            Err(e) => return Verdict::Invalid(format!("could not decode pod: {e}")),
        },
        _ => None,
    };
    let original = pod.clone();

    let mut attrs = Attributes {
        operation: operation_of(&request.operation),
        kind,
        resource: GroupResource::new(&request.resource.group, &request.resource.resource),
        subresource: request.sub_resource.clone(),
        namespace: request.namespace.clone(),
        name: Some(request.name.clone()).filter(|name| !name.is_empty()),
        object: pod.as_mut(),
    };

    let outcome = match gate.admit(&mut attrs) {
        Ok(AdmitOutcome::Skipped(reason)) => return Verdict::Skipped(reason),
        Ok(outcome) => outcome,
        Err(violation) => return Verdict::Rejected(violation),
    };

    let patch = match (original, pod) {
        (Some(before), Some(after)) if outcome.is_mutated() => {
            match backfill_patch(&before, &after) {
                Ok(patch) => patch,
                Err(e) => return Verdict::Invalid(format!("could not encode pod: {e}")),
            }
        }
        _ => Patch(Vec::new()),
    };

    Verdict::Admitted { outcome, patch }
}

/// Turn a verdict into the response sent back to the API server
pub fn respond(request: &AdmissionRequest<DynamicObject>, verdict: Verdict) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    match verdict {
        Verdict::Skipped(_) => response,
        Verdict::Admitted { patch, .. } if patch.0.is_empty() => response,
        Verdict::Admitted { patch, .. } => match response.with_patch(patch) {
            Ok(response) => response,
            Err(e) => {
                error!(uid = %request.uid, error = %e, "Failed to serialize patch");
                AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"))
            }
        },
        Verdict::Rejected(violation) => response.deny(violation.to_string()),
        Verdict::Invalid(message) => response.deny(message),
    }
}

fn record(state: &WebhookState, request: &AdmissionRequest<DynamicObject>, verdict: &Verdict) {
    let object = object_ref(request);
    let operation = operation_of(&request.operation);
    state.metrics.inc_decision(verdict.decision());

    match verdict {
        Verdict::Skipped(reason) => {
            state
                .logger
                .log_skipped(&request.uid, &object, reason.as_str())
        }
        Verdict::Admitted { outcome, .. } => {
            let flavors = match outcome {
                AdmitOutcome::Admitted { containers } => {
                    containers.iter().map(|c| c.flavor.clone()).collect()
                }
                AdmitOutcome::Skipped(_) => Vec::new(),
            };
            state.metrics.add_backfilled(outcome.backfilled_count());
            state.logger.log_admitted(
                &request.uid,
                &object,
                operation.as_str(),
                &flavors,
                outcome.backfilled_count(),
            );
        }
        Verdict::Rejected(violation) => state.logger.log_rejected(
            &request.uid,
            &object,
            operation.as_str(),
            violation.reason(),
            &violation.to_string(),
        ),
        Verdict::Invalid(message) => state.logger.log_rejected(
            &request.uid,
            &object,
            operation.as_str(),
            decisions::INVALID,
            message,
        ),
    }
}

fn operation_of(operation: &ReviewOperation) -> Operation {
    match operation {
        ReviewOperation::Create => Operation::Create,
        ReviewOperation::Update => Operation::Update,
        ReviewOperation::Delete => Operation::Delete,
        ReviewOperation::Connect => Operation::Connect,
    }
}

fn decode_pod(object: &DynamicObject) -> Result<Pod, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(object)?)
}

/// JSON patch taking `before` to `after`
fn backfill_patch(before: &Pod, after: &Pod) -> Result<Patch, serde_json::Error> {
    Ok(json_patch::diff(
        &serde_json::to_value(before)?,
        &serde_json::to_value(after)?,
    ))
}

fn object_ref(request: &AdmissionRequest<DynamicObject>) -> String {
    let name = if request.name.is_empty() {
        "<generated>"
    } else {
        request.name.as_str()
    };
    match request.namespace.as_deref() {
        Some(namespace) => format!("{namespace}/{name}"),
        None => name.to_string(),
    }
}
