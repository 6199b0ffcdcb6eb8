//! Pod-level admission tests
//!
//! These build pods with k8s-openapi types and run them through the gate the
//! way the webhook does.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as WireQuantity;

use super::*;
use crate::catalog::FlavorCatalog;
use crate::error::AdmissionError;

const CATALOG: &str = r#"{
    "flavors": {
        "small": {"cpu": "250m", "memory": "1Gi"},
        "nano": {"cpu": "125m", "memory": "128Mi"}
    }
}"#;

fn gate() -> FlavorGate {
    FlavorGate::new(Arc::new(FlavorCatalog::from_json_str(CATALOG).unwrap()))
}

fn container(name: &str, requests: &[(&str, &str)]) -> Container {
    let resources = if requests.is_empty() {
        None
    } else {
        Some(ResourceRequirements {
            requests: Some(
                requests
                    .iter()
                    .map(|(k, v)| (k.to_string(), WireQuantity(v.to_string())))
                    .collect(),
            ),
            ..Default::default()
        })
    };
    Container {
        name: name.to_string(),
        image: Some("registry.local/app:1".to_string()),
        resources,
        ..Default::default()
    }
}

fn pod(containers: Vec<Container>) -> Pod {
    let mut pod = Pod {
        spec: Some(PodSpec {
            containers,
            ..Default::default()
        }),
        ..Default::default()
    };
    pod.metadata.namespace = Some("default".to_string());
    pod.metadata.name = Some("web".to_string());
    pod
}

fn requests_of(pod: &Pod, index: usize) -> BTreeMap<String, String> {
    pod.spec.as_ref().unwrap().containers[index]
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref())
        .map(|reqs| reqs.iter().map(|(k, v)| (k.clone(), v.0.clone())).collect())
        .unwrap_or_default()
}

fn expected(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn story_partial_request_is_completed_from_flavor() {
    let gate = gate();
    let mut pod = pod(vec![container("app", &[("memory", "1Gi")])]);

    let outcome = gate
        .admit(&mut Attributes::for_pod(Operation::Create, &mut pod))
        .unwrap();

    assert_eq!(
        outcome,
        AdmitOutcome::Admitted {
            containers: vec![ContainerAdmission {
                container: "app".to_string(),
                flavor: "small".to_string(),
                backfilled: vec!["cpu".to_string()],
            }]
        }
    );
    assert!(outcome.is_mutated());
    assert_eq!(
        requests_of(&pod, 0),
        expected(&[("cpu", "250m"), ("memory", "1Gi")])
    );
}

#[test]
fn story_unknown_cpu_value_is_rejected() {
    let gate = gate();
    let mut pod = pod(vec![container("app", &[("cpu", "300m")])]);

    let err = gate
        .admit(&mut Attributes::for_pod(Operation::Create, &mut pod))
        .unwrap_err();

    assert_eq!(
        err,
        AdmissionError::NoMatchingFlavor {
            container: "app".to_string()
        }
    );
    assert_eq!(requests_of(&pod, 0), expected(&[("cpu", "300m")]));
}

#[test]
fn story_exact_flavor_is_admitted_unchanged() {
    let gate = gate();
    let mut pod = pod(vec![container(
        "app",
        &[("cpu", "125m"), ("memory", "128Mi")],
    )]);
    let before = pod.clone();

    let outcome = gate
        .admit(&mut Attributes::for_pod(Operation::Update, &mut pod))
        .unwrap();

    assert!(!outcome.is_mutated());
    assert_eq!(pod, before);
}

#[test]
fn story_container_without_requests_is_rejected() {
    let gate = gate();
    let mut pod = pod(vec![container("app", &[])]);

    let err = gate
        .admit(&mut Attributes::for_pod(Operation::Create, &mut pod))
        .unwrap_err();

    assert_eq!(
        err,
        AdmissionError::EmptyRequest {
            container: "app".to_string()
        }
    );
}

#[test]
fn test_empty_requests_map_is_rejected() {
    let gate = gate();
    let mut app = container("app", &[]);
    app.resources = Some(ResourceRequirements {
        requests: Some(BTreeMap::new()),
        ..Default::default()
    });
    let mut pod = pod(vec![app]);

    assert!(matches!(
        gate.admit(&mut Attributes::for_pod(Operation::Create, &mut pod)),
        Err(AdmissionError::EmptyRequest { .. })
    ));
}

#[test]
fn test_every_container_must_match() {
    let gate = gate();
    let mut pod = pod(vec![
        container("app", &[("memory", "1Gi")]),
        container("sidecar", &[("cpu", "300m")]),
    ]);

    let err = gate
        .admit(&mut Attributes::for_pod(Operation::Create, &mut pod))
        .unwrap_err();

    assert_eq!(err.container(), Some("sidecar"));
    // The matching container is not backfilled when the pod is rejected
    assert_eq!(requests_of(&pod, 0), expected(&[("memory", "1Gi")]));
}

#[test]
fn test_empty_container_does_not_hide_later_containers() {
    let gate = gate();
    let mut pod = pod(vec![
        container("init-like", &[]),
        container("app", &[("memory", "1Gi")]),
    ]);

    let err = gate
        .admit(&mut Attributes::for_pod(Operation::Create, &mut pod))
        .unwrap_err();

    assert_eq!(err.reason(), "empty_request");
    assert_eq!(requests_of(&pod, 1), expected(&[("memory", "1Gi")]));
}

#[test]
fn test_each_container_backfills_from_its_own_flavor() {
    let gate = gate();
    let mut pod = pod(vec![
        container("app", &[("memory", "1Gi")]),
        container("sidecar", &[("cpu", "0.125")]),
    ]);

    let outcome = gate
        .admit(&mut Attributes::for_pod(Operation::Create, &mut pod))
        .unwrap();

    assert_eq!(outcome.backfilled_count(), 2);
    assert_eq!(
        requests_of(&pod, 0),
        expected(&[("cpu", "250m"), ("memory", "1Gi")])
    );
    assert_eq!(
        requests_of(&pod, 1),
        expected(&[("cpu", "0.125"), ("memory", "128Mi")])
    );
}

#[test]
fn test_limits_are_left_alone() {
    let gate = gate();
    let mut app = container("app", &[("memory", "128Mi")]);
    app.resources.as_mut().unwrap().limits = Some(BTreeMap::from([(
        "memory".to_string(),
        WireQuantity("256Mi".to_string()),
    )]));
    let mut pod = pod(vec![app]);

    gate.admit(&mut Attributes::for_pod(Operation::Create, &mut pod))
        .unwrap();

    let resources = pod.spec.as_ref().unwrap().containers[0]
        .resources
        .clone()
        .unwrap();
    assert_eq!(resources.limits.unwrap()["memory"].0, "256Mi");
    assert_eq!(resources.requests.unwrap()["cpu"].0, "125m");
}

#[test]
fn test_invalid_quantity_is_a_policy_violation() {
    let gate = gate();
    let mut pod = pod(vec![container("app", &[("cpu", "a-lot")])]);

    let err = gate
        .admit(&mut Attributes::for_pod(Operation::Create, &mut pod))
        .unwrap_err();

    assert!(matches!(
        err,
        AdmissionError::InvalidQuantity { ref resource, .. } if resource == "cpu"
    ));
}

#[test]
fn test_pod_without_containers_is_rejected() {
    let gate = gate();
    let mut empty = pod(vec![]);
    assert_eq!(
        gate.admit(&mut Attributes::for_pod(Operation::Create, &mut empty)),
        Err(AdmissionError::NoContainers)
    );

    let mut no_spec = Pod::default();
    assert_eq!(
        gate.admit(&mut Attributes::for_pod(Operation::Create, &mut no_spec)),
        Err(AdmissionError::NoContainers)
    );
}

#[test]
fn test_out_of_scope_requests_pass_through() {
    let gate = gate();
    let original = pod(vec![container("app", &[("cpu", "300m")])]);

    let mut target = original.clone();
    let outcome = gate
        .admit(&mut Attributes::for_pod(Operation::Delete, &mut target))
        .unwrap();
    assert_eq!(outcome, AdmitOutcome::Skipped(SkipReason::OperationNotHandled));

    let mut target = original.clone();
    let mut attrs = Attributes::for_pod(Operation::Create, &mut target);
    attrs.kind = GroupKind::new("apps", "Deployment");
    assert_eq!(
        gate.admit(&mut attrs).unwrap(),
        AdmitOutcome::Skipped(SkipReason::NotAPod)
    );

    let mut target = original.clone();
    let mut attrs = Attributes::for_pod(Operation::Update, &mut target).with_subresource("status");
    assert_eq!(
        gate.admit(&mut attrs).unwrap(),
        AdmitOutcome::Skipped(SkipReason::Subresource)
    );

    let mut target = original.clone();
    let mut attrs = Attributes::for_pod(Operation::Create, &mut target);
    attrs.resource = GroupResource::new("", "podtemplates");
    assert_eq!(
        gate.admit(&mut attrs).unwrap(),
        AdmitOutcome::Skipped(SkipReason::NotPodsResource)
    );

    let mut attrs = Attributes::for_pod(Operation::Create, &mut target);
    attrs.object = None;
    assert_eq!(
        gate.admit(&mut attrs).unwrap(),
        AdmitOutcome::Skipped(SkipReason::NoObject)
    );

    assert_eq!(target, original);
}

#[test]
fn test_empty_subresource_is_not_a_subresource() {
    let gate = gate();
    let mut pod = pod(vec![container("app", &[("memory", "1Gi")])]);
    let mut attrs = Attributes::for_pod(Operation::Create, &mut pod).with_subresource("");

    assert!(matches!(
        gate.admit(&mut attrs),
        Ok(AdmitOutcome::Admitted { .. })
    ));
}

#[test]
fn test_gate_is_shared_across_threads() {
    let gate = gate();

    std::thread::scope(|scope| {
        for i in 0..8 {
            let gate = &gate;
            scope.spawn(move || {
                let request = if i % 2 == 0 { "1Gi" } else { "128Mi" };
                let mut pod = pod(vec![container("app", &[("memory", request)])]);
                let outcome = gate
                    .admit(&mut Attributes::for_pod(Operation::Create, &mut pod))
                    .unwrap();
                assert_eq!(outcome.backfilled_count(), 1);
            });
        }
    });
}

#[test]
fn test_from_admission_config_file_requires_a_path() {
    assert!(FlavorGate::from_admission_config_file(None).is_err());
}
