//! Pod admission against the flavor catalog
//!
//! The gate is invoked once per admission request. It ignores everything that
//! is not a create/update of a pod, then requires every container's resource
//! requests to match a flavor, backfilling partial requests in place.

mod attributes;
mod gate;

#[cfg(test)]
mod tests;

pub use attributes::{Attributes, GroupKind, GroupResource, Handler, Operation};
pub use gate::{AdmitOutcome, ContainerAdmission, FlavorGate, SkipReason};
