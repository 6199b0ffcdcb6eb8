//! The flavor admission gate

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{Container, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as WireQuantity;
use tracing::debug;

use super::attributes::{Attributes, GroupKind, GroupResource, Handler, Operation};
use crate::catalog::{FlavorCatalog, ResourceBundle};
use crate::error::{AdmissionError, ConfigError};
use crate::matcher::{admit_container, ContainerVerdict};
use crate::quantity::Quantity;

/// Why a request passed through without evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OperationNotHandled,
    NotAPod,
    Subresource,
    NotPodsResource,
    NoObject,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::OperationNotHandled => "operation_not_handled",
            SkipReason::NotAPod => "not_a_pod",
            SkipReason::Subresource => "subresource",
            SkipReason::NotPodsResource => "not_pods_resource",
            SkipReason::NoObject => "no_object",
        }
    }
}

/// How one container was admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerAdmission {
    pub container: String,
    pub flavor: String,
    /// Resources copied from the flavor into the container's requests
    pub backfilled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// The request is outside the gate's scope and was left untouched
    Skipped(SkipReason),
    /// Every container matched a flavor
    Admitted { containers: Vec<ContainerAdmission> },
}

impl AdmitOutcome {
    /// Number of resource entries written into the pod
    pub fn backfilled_count(&self) -> usize {
        match self {
            AdmitOutcome::Skipped(_) => 0,
            AdmitOutcome::Admitted { containers } => {
                containers.iter().map(|c| c.backfilled.len()).sum()
            }
        }
    }

    pub fn is_mutated(&self) -> bool {
        self.backfilled_count() > 0
    }
}

/// Admission plugin that pins container requests to catalog flavors
///
/// Cheap to clone; the catalog is shared read-only, so one gate can serve
/// concurrent requests without locking.
#[derive(Debug, Clone)]
pub struct FlavorGate {
    handler: Handler,
    catalog: Arc<FlavorCatalog>,
}

impl FlavorGate {
    pub fn new(catalog: Arc<FlavorCatalog>) -> Self {
        Self {
            handler: Handler::new(&[Operation::Create, Operation::Update]),
            catalog,
        }
    }

    /// Build the gate from the API server's admission control config file
    pub fn from_admission_config_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let catalog = FlavorCatalog::from_admission_config_file(path)?;
        Ok(Self::new(Arc::new(catalog)))
    }

    pub fn catalog(&self) -> &FlavorCatalog {
        &self.catalog
    }

    pub fn handles(&self, operation: Operation) -> bool {
        self.handler.handles(operation)
    }

    /// Capability check deciding whether a request is evaluated at all
    pub fn applies_to(&self, attrs: &Attributes<'_>) -> Result<(), SkipReason> {
        if !self.handles(attrs.operation) {
            return Err(SkipReason::OperationNotHandled);
        }
        if attrs.kind != GroupKind::pod() {
            return Err(SkipReason::NotAPod);
        }
        if attrs.subresource.as_deref().is_some_and(|s| !s.is_empty()) {
            return Err(SkipReason::Subresource);
        }
        if attrs.resource != GroupResource::pods() {
            return Err(SkipReason::NotPodsResource);
        }
        if attrs.object.is_none() {
            return Err(SkipReason::NoObject);
        }
        Ok(())
    }

    /// Admit one request, backfilling the pod in place on success
    pub fn admit(&self, attrs: &mut Attributes<'_>) -> Result<AdmitOutcome, AdmissionError> {
        if let Err(reason) = self.applies_to(attrs) {
            debug!(
                object = %attrs.object_ref(),
                reason = reason.as_str(),
                "Skipping flavor admission"
            );
            return Ok(AdmitOutcome::Skipped(reason));
        }

        match attrs.object.as_deref_mut() {
            Some(pod) => self.admit_pod(pod),
            None => Ok(AdmitOutcome::Skipped(SkipReason::NoObject)),
        }
    }

    /// Require every container to match a flavor, then apply all backfills
    ///
    /// All containers are evaluated and the first violation is returned. The
    /// pod is written only when every container matched.
    pub fn admit_pod(&self, pod: &mut Pod) -> Result<AdmitOutcome, AdmissionError> {
        let containers = pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.as_slice())
            .unwrap_or_default();
        if containers.is_empty() {
            return Err(AdmissionError::NoContainers);
        }

        let mut first_violation = None;
        let mut admitted = Vec::with_capacity(containers.len());
        for container in containers {
            match self.evaluate_container(container) {
                Ok(result) => admitted.push(result),
                Err(violation) => {
                    debug!(
                        container = %container.name,
                        reason = violation.reason(),
                        "Container rejected"
                    );
                    first_violation.get_or_insert(violation);
                }
            }
        }
        if let Some(violation) = first_violation {
            return Err(violation);
        }

        if let Some(spec) = pod.spec.as_mut() {
            for (container, (_, fills)) in spec.containers.iter_mut().zip(&admitted) {
                if fills.is_empty() {
                    continue;
                }
                let requests = container
                    .resources
                    .get_or_insert_with(Default::default)
                    .requests
                    .get_or_insert_with(BTreeMap::new);
                for (name, quantity) in fills {
                    requests.insert(name.clone(), WireQuantity::from(quantity));
                }
            }
        }

        Ok(AdmitOutcome::Admitted {
            containers: admitted.into_iter().map(|(admission, _)| admission).collect(),
        })
    }

    /// Match one container, returning the entries its requests would gain
    fn evaluate_container(
        &self,
        container: &Container,
    ) -> Result<(ContainerAdmission, Vec<(String, Quantity)>), AdmissionError> {
        let declared = container
            .resources
            .as_ref()
            .and_then(|resources| resources.requests.as_ref());

        let mut request = ResourceBundle::new();
        for (name, quantity) in declared.into_iter().flatten() {
            let quantity =
                Quantity::try_from(quantity).map_err(|source| AdmissionError::InvalidQuantity {
                    container: container.name.clone(),
                    resource: name.clone(),
                    source,
                })?;
            request.insert(name.clone(), quantity);
        }

        match admit_container(&self.catalog, &mut request) {
            ContainerVerdict::Empty => Err(AdmissionError::EmptyRequest {
                container: container.name.clone(),
            }),
            ContainerVerdict::NoMatch => Err(AdmissionError::NoMatchingFlavor {
                container: container.name.clone(),
            }),
            ContainerVerdict::Matched { flavor, backfilled } => {
                let fills = backfilled
                    .iter()
                    .filter_map(|name| request.get(name).map(|q| (name.clone(), q.clone())))
                    .collect();
                Ok((
                    ContainerAdmission {
                        container: container.name.clone(),
                        flavor: flavor.name.clone(),
                        backfilled,
                    },
                    fills,
                ))
            }
        }
    }
}
