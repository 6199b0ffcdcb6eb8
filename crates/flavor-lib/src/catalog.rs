//! Flavor catalog
//!
//! The catalog is loaded once at startup from a JSON document of the form
//! `{"flavors": {"<name>": {"<resource>": "<quantity>", ...}, ...}}` and is
//! read-only afterwards. The document is located through the API server's
//! admission control config file, which must contain a `flavor.config=<path>`
//! line.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::ser::SerializeMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::quantity::Quantity;

/// Key in the admission control config file that points at the catalog
pub const FLAVOR_CONFIG_KEY: &str = "flavor.config";

/// Resource name to requested amount
pub type ResourceBundle = BTreeMap<String, Quantity>;

/// A named, approved resource request bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flavor {
    pub name: String,
    pub resources: ResourceBundle,
}

impl Flavor {
    pub fn new(name: impl Into<String>, resources: ResourceBundle) -> Self {
        Self {
            name: name.into(),
            resources,
        }
    }
}

/// Immutable set of flavors in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlavorCatalog {
    flavors: Vec<Flavor>,
}

impl FlavorCatalog {
    /// Build a catalog from flavors already in memory
    pub fn from_flavors(flavors: impl IntoIterator<Item = Flavor>) -> Self {
        Self {
            flavors: flavors.into_iter().collect(),
        }
    }

    /// Parse a catalog document
    pub fn from_json_str(document: &str) -> Result<Self, serde_json::Error> {
        let document: CatalogDocument = serde_json::from_str(document)?;
        Ok(Self {
            flavors: document.flavors.0,
        })
    }

    /// Read and parse the catalog document at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadCatalog {
            path: path.to_path_buf(),
            source,
        })?;

        let catalog = Self::from_json_str(&content).map_err(|source| ConfigError::ParseCatalog {
            path: path.to_path_buf(),
            source,
        })?;

        if catalog.is_empty() {
            warn!(path = %path.display(), "Flavor catalog is empty, every pod will be rejected");
        }
        for flavor in catalog.iter().filter(|f| f.resources.is_empty()) {
            warn!(
                path = %path.display(),
                flavor = %flavor.name,
                "Flavor declares no resources and can never match"
            );
        }
        info!(
            path = %path.display(),
            flavors = catalog.len(),
            "Loaded flavor catalog"
        );

        Ok(catalog)
    }

    /// Locate the catalog through admission config text, then load it
    pub fn from_admission_config(config: &str) -> Result<Self, ConfigError> {
        let path = flavor_config_path(config).ok_or(ConfigError::MissingFlavorConfigKey {
            key: FLAVOR_CONFIG_KEY,
        })?;
        Self::load(path)
    }

    /// Read the admission config file, then load the catalog it points at
    ///
    /// `None` means the API server was started without an admission config
    /// file, which is a startup error for this gate.
    pub fn from_admission_config_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.ok_or(ConfigError::MissingAdmissionConfig)?;
        let config =
            std::fs::read_to_string(path).map_err(|source| ConfigError::ReadAdmissionConfig {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_admission_config(&config)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flavor> {
        self.flavors.iter()
    }

    /// Look up a flavor by name
    pub fn get(&self, name: &str) -> Option<&Flavor> {
        self.flavors.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flavors.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.flavors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flavors.is_empty()
    }
}

/// Value of the first `flavor.config=<path>` line, if any
///
/// Lines must split into exactly two `=`-separated parts. Blank lines and
/// `#` comments are skipped. A key with an empty value counts as missing.
pub fn flavor_config_path(config: &str) -> Option<PathBuf> {
    config
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .find_map(|line| {
            let parts: Vec<&str> = line.split('=').collect();
            match parts.as_slice() {
                [key, value] if key.trim() == FLAVOR_CONFIG_KEY => Some(value.trim()),
                _ => None,
            }
        })
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[derive(Deserialize)]
struct CatalogDocument {
    #[serde(alias = "Flavors")]
    flavors: OrderedFlavors,
}

/// Flavors in the order the document lists them
struct OrderedFlavors(Vec<Flavor>);

impl<'de> Deserialize<'de> for OrderedFlavors {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FlavorsVisitor;

        impl<'de> de::Visitor<'de> for FlavorsVisitor {
            type Value = OrderedFlavors;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of flavor name to resource requests")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut seen = HashSet::new();
                let mut flavors = Vec::with_capacity(map.size_hint().unwrap_or(0));

                while let Some((name, resources)) = map.next_entry::<String, ResourceBundle>()? {
                    if !seen.insert(name.clone()) {
                        return Err(de::Error::custom(format!("duplicate flavor '{name}'")));
                    }
                    flavors.push(Flavor { name, resources });
                }

                Ok(OrderedFlavors(flavors))
            }
        }

        deserializer.deserialize_map(FlavorsVisitor)
    }
}

impl Serialize for FlavorCatalog {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct Flavors<'a>(&'a [Flavor]);

        impl Serialize for Flavors<'_> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for flavor in self.0 {
                    map.serialize_entry(&flavor.name, &flavor.resources)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("flavors", &Flavors(&self.flavors))?;
        map.end()
    }
}
