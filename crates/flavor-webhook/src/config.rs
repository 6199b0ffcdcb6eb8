//! Webhook configuration

use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `FLAVOR_WEBHOOK_WEBHOOK_PORT=9443`
pub const ENV_PREFIX: &str = "FLAVOR_WEBHOOK";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Admission control config file holding the `flavor.config=<path>` line
    #[serde(default)]
    pub admission_config_file: Option<PathBuf>,

    /// Port for `POST /mutate/pods`
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,

    /// Port for health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// PEM certificate chain; HTTPS is served when both files are set
    #[serde(default)]
    pub tls_cert_file: Option<PathBuf>,

    #[serde(default)]
    pub tls_key_file: Option<PathBuf>,

    /// Name attached to every structured log event
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

fn default_webhook_port() -> u16 {
    8443
}

fn default_api_port() -> u16 {
    8080
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "flavor-webhook".to_string())
}

impl WebhookConfig {
    /// Load configuration from `FLAVOR_WEBHOOK_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: config::Config) -> Result<Self> {
        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tls_cert_file.is_some() != self.tls_key_file.is_some() {
            bail!("tls_cert_file and tls_key_file must be set together");
        }
        if self.webhook_port == self.api_port {
            bail!(
                "webhook_port and api_port must differ (both are {})",
                self.api_port
            );
        }
        Ok(())
    }

    /// Certificate and key paths when TLS is configured
    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert_file, &self.tls_key_file) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
        config::Config::builder()
    }

    #[test]
    fn test_defaults() {
        let config = WebhookConfig::from_config(builder().build().unwrap()).unwrap();

        assert!(config.admission_config_file.is_none());
        assert_eq!(config.webhook_port, 8443);
        assert_eq!(config.api_port, 8080);
        assert!(config.tls_files().is_none());
        assert!(!config.instance_name.is_empty());
    }

    #[test]
    fn test_overrides() {
        let source = builder()
            .set_override("admission_config_file", "/etc/kubernetes/admission.cfg")
            .unwrap()
            .set_override("webhook_port", 9443)
            .unwrap()
            .set_override("tls_cert_file", "/tls/tls.crt")
            .unwrap()
            .set_override("tls_key_file", "/tls/tls.key")
            .unwrap()
            .build()
            .unwrap();

        let config = WebhookConfig::from_config(source).unwrap();

        assert_eq!(
            config.admission_config_file.as_deref(),
            Some(Path::new("/etc/kubernetes/admission.cfg"))
        );
        assert_eq!(config.webhook_port, 9443);
        let (cert, key) = config.tls_files().unwrap();
        assert_eq!(cert, Path::new("/tls/tls.crt"));
        assert_eq!(key, Path::new("/tls/tls.key"));
    }

    #[test]
    fn test_half_configured_tls_is_an_error() {
        let source = builder()
            .set_override("tls_cert_file", "/tls/tls.crt")
            .unwrap()
            .build()
            .unwrap();
        assert!(WebhookConfig::from_config(source).is_err());
    }

    #[test]
    fn test_bad_values_are_reported() {
        let source = builder()
            .set_override("webhook_port", "not-a-port")
            .unwrap()
            .build()
            .unwrap();
        assert!(WebhookConfig::from_config(source).is_err());

        let source = builder()
            .set_override("webhook_port", 8080)
            .unwrap()
            .build()
            .unwrap();
        assert!(WebhookConfig::from_config(source).is_err());
    }
}
