//! Mutating admission webhook in front of the flavor gate
//!
//! The API server posts `AdmissionReview` documents for pod create and update
//! requests. Admitted pods that needed backfilling get a JSON patch adding the
//! missing requests; rejected pods are denied with the gate's message.

pub mod pods;

use std::sync::Arc;

use axum::{routing::post, Router};

use crate::admission::FlavorGate;
use crate::observability::{GateMetrics, StructuredLogger};

pub use pods::{evaluate, mutate_handler, respond, review, Verdict};

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    pub gate: FlavorGate,
    pub metrics: GateMetrics,
    pub logger: StructuredLogger,
}

impl WebhookState {
    pub fn new(gate: FlavorGate, metrics: GateMetrics, logger: StructuredLogger) -> Self {
        Self {
            gate,
            metrics,
            logger,
        }
    }
}

/// Router with the mutation endpoint
///
/// - POST /mutate/pods
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate/pods", post(pods::mutate_handler))
        .with_state(state)
}
