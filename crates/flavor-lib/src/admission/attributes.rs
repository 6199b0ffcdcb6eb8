//! Request attributes handed to the gate by the admission pipeline

use std::fmt;

use k8s_openapi::api::core::v1::Pod;

/// API operation being admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of operations a plugin is registered for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    operations: Vec<Operation>,
}

impl Handler {
    pub fn new(operations: &[Operation]) -> Self {
        Self {
            operations: operations.to_vec(),
        }
    }

    pub fn handles(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }
}

/// API group and kind of the object under admission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }

    /// Core-group `Pod`
    pub fn pod() -> Self {
        Self::new("", "Pod")
    }
}

/// API group and collection name the request targets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }

    /// Core-group `pods` collection
    pub fn pods() -> Self {
        Self::new("", "pods")
    }
}

/// Everything the gate may inspect about one admission request
///
/// `object` is borrowed mutably for the duration of the call so that
/// backfilled requests land in the object that will be persisted.
#[derive(Debug)]
pub struct Attributes<'a> {
    pub operation: Operation,
    pub kind: GroupKind,
    pub resource: GroupResource,
    pub subresource: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub object: Option<&'a mut Pod>,
}

impl<'a> Attributes<'a> {
    /// Attributes for a request against the core `pods` collection
    pub fn for_pod(operation: Operation, pod: &'a mut Pod) -> Self {
        let namespace = pod.metadata.namespace.clone();
        let name = pod.metadata.name.clone();
        Self {
            operation,
            kind: GroupKind::pod(),
            resource: GroupResource::pods(),
            subresource: None,
            namespace,
            name,
            object: Some(pod),
        }
    }

    pub fn with_subresource(mut self, subresource: impl Into<String>) -> Self {
        self.subresource = Some(subresource.into());
        self
    }

    /// `namespace/name` for log lines, falling back to what is known
    pub fn object_ref(&self) -> String {
        match (&self.namespace, &self.name) {
            (Some(ns), Some(name)) => format!("{ns}/{name}"),
            (None, Some(name)) => name.clone(),
            (Some(ns), None) => format!("{ns}/<generated>"),
            (None, None) => "<unnamed>".to_string(),
        }
    }
}
