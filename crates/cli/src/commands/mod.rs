//! Subcommand implementations

pub mod check;
pub mod flavors;
pub mod health;
pub mod review;
pub mod settings;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flavor_lib::catalog::FlavorCatalog;
use k8s_openapi::api::core::v1::Pod;

use crate::config::Config;

/// Where the catalog for local commands comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    /// A flavor catalog document
    Catalog(PathBuf),
    /// An admission control config file pointing at the catalog
    AdmissionConfig(PathBuf),
    Missing,
}

impl CatalogSource {
    /// Flags and env vars win over the saved default
    pub fn resolve(
        catalog: Option<PathBuf>,
        admission_config: Option<PathBuf>,
        saved: &Config,
    ) -> Self {
        match (catalog, admission_config) {
            (Some(path), _) => CatalogSource::Catalog(path),
            (None, Some(path)) => CatalogSource::AdmissionConfig(path),
            (None, None) => match &saved.catalog {
                Some(path) => CatalogSource::Catalog(path.clone()),
                None => CatalogSource::Missing,
            },
        }
    }

    pub fn load(&self) -> Result<FlavorCatalog> {
        match self {
            CatalogSource::Catalog(path) => FlavorCatalog::load(path)
                .with_context(|| format!("Failed to load catalog {}", path.display())),
            CatalogSource::AdmissionConfig(path) => {
                FlavorCatalog::from_admission_config_file(Some(path.as_path())).with_context(|| {
                    format!("Failed to load catalog via {}", path.display())
                })
            }
            CatalogSource::Missing => bail!(
                "No flavor catalog given; pass --catalog or --admission-config, \
                 or save one with `flavorctl config set --catalog`"
            ),
        }
    }
}

/// Read a pod manifest in JSON form
pub fn read_pod(path: &Path) -> Result<Pod> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pod manifest {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON pod manifest", path.display()))
}


#[cfg(test)]
mod tests {
    use super::testdata::*;
    use super::*;

    #[test]
    fn test_resolve_prefers_flags() {
        let saved = Config {
            catalog: Some(PathBuf::from("/saved.json")),
            ..Default::default()
        };

        assert_eq!(
            CatalogSource::resolve(Some("/flag.json".into()), None, &saved),
            CatalogSource::Catalog("/flag.json".into())
        );
        assert_eq!(
            CatalogSource::resolve(None, Some("/admission.cfg".into()), &saved),
            CatalogSource::AdmissionConfig("/admission.cfg".into())
        );
        assert_eq!(
            CatalogSource::resolve(None, None, &saved),
            CatalogSource::Catalog("/saved.json".into())
        );
        assert_eq!(
            CatalogSource::resolve(None, None, &Config::default()),
            CatalogSource::Missing
        );
    }

    #[test]
    fn test_load_through_admission_config() {
        let catalog = write_temp(CATALOG);
        let admission = write_temp(&format!("flavor.config={}\n", catalog.path().display()));

        let loaded = CatalogSource::AdmissionConfig(admission.path().to_path_buf())
            .load()
            .unwrap();
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["small", "nano"]);

        assert!(CatalogSource::Missing.load().is_err());
    }

    #[test]
    fn test_read_pod() {
        let manifest = write_temp(&pod_manifest(r#"{"cpu": "250m"}"#));
        let pod = read_pod(manifest.path()).unwrap();
        assert_eq!(pod.metadata.name.as_deref(), Some("web"));

        let broken = write_temp("kind: Pod");
        assert!(read_pod(broken.path()).is_err());
    }
}
