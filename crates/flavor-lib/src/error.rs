//! Error types for the flavor admission gate
//!
//! Two classes exist. [`ConfigError`] is raised while building the catalog and
//! must stop the process before it serves traffic. [`AdmissionError`] is a
//! per-request policy violation returned to the API server as a denial.

use std::path::PathBuf;

use thiserror::Error;

/// A resource quantity string that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,

    #[error("invalid number in quantity '{0}'")]
    InvalidNumber(String),

    #[error("unknown suffix in quantity '{0}'")]
    UnknownSuffix(String),

    #[error("invalid exponent in quantity '{0}'")]
    InvalidExponent(String),

    #[error("quantity '{0}' is out of range")]
    OutOfRange(String),
}

/// Startup failure while locating or loading the flavor catalog
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No admission configuration file was supplied at all
    #[error("flavor admission requires an admission control config file")]
    MissingAdmissionConfig,

    #[error("cannot read admission config file '{path}': {source}")]
    ReadAdmissionConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The admission configuration has no `flavor.config=<path>` line
    #[error("admission config does not specify '{key}'")]
    MissingFlavorConfigKey { key: &'static str },

    #[error("cannot read flavor config file '{path}': {source}")]
    ReadCatalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode flavor config file '{path}': {source}")]
    ParseCatalog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Policy violation raised while admitting a pod
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("container '{container}' declares no resource requests; requests must match a supported flavor")]
    EmptyRequest { container: String },

    #[error("container '{container}' requests do not match any of the supported flavors")]
    NoMatchingFlavor { container: String },

    #[error("container '{container}' has an invalid '{resource}' request: {source}")]
    InvalidQuantity {
        container: String,
        resource: String,
        #[source]
        source: QuantityError,
    },

    #[error("pod has no containers; requests must match a supported flavor")]
    NoContainers,
}

impl AdmissionError {
    /// Name of the offending container, when the violation is tied to one
    pub fn container(&self) -> Option<&str> {
        match self {
            AdmissionError::EmptyRequest { container }
            | AdmissionError::NoMatchingFlavor { container }
            | AdmissionError::InvalidQuantity { container, .. } => Some(container),
            AdmissionError::NoContainers => None,
        }
    }

    /// Short machine-readable reason used for metrics labels and log fields
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::EmptyRequest { .. } => "empty_request",
            AdmissionError::NoMatchingFlavor { .. } => "no_matching_flavor",
            AdmissionError::InvalidQuantity { .. } => "invalid_quantity",
            AdmissionError::NoContainers => "no_containers",
        }
    }
}
