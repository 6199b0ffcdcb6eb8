//! Resource flavor admission
//!
//! Pods may only request resource bundles drawn from a fixed catalog of
//! flavors. This crate provides:
//! - Exact parsing and comparison of resource quantities
//! - The flavor catalog and its loading from admission config
//! - Matching and backfill of container requests
//! - The admission gate and the mutating webhook built on it
//! - Health checks and observability

pub mod admission;
pub mod catalog;
pub mod error;
pub mod health;
pub mod matcher;
pub mod observability;
pub mod quantity;
pub mod webhook;

pub use admission::{AdmitOutcome, Attributes, FlavorGate, Operation, SkipReason};
pub use catalog::{Flavor, FlavorCatalog, ResourceBundle, FLAVOR_CONFIG_KEY};
pub use error::{AdmissionError, ConfigError, QuantityError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use observability::{GateMetrics, StructuredLogger};
pub use quantity::Quantity;
pub use webhook::{webhook_router, WebhookState};
