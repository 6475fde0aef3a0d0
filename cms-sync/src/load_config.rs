//! `load_config`: loads the static YAML config and injects environment
//! secrets into the strongly-typed [`CliConfig`].
//!
//! This is the only place where untrusted YAML is parsed and where
//! credential environment variables are read, so the defaulting and
//! error-message policy lives in exactly one module. All errors here use
//! `anyhow` for context-rich diagnostics surfaced at the CLI boundary.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{error, info};

/// Env var naming the hosted backend's API origin.
pub const ENV_API_URL: &str = "CMS_API_URL";
/// Env var holding the backend service key (REST and storage).
pub const ENV_SERVICE_KEY: &str = "CMS_SERVICE_KEY";
/// Env var holding the payment provider's secret key.
pub const ENV_PAYMENT_SECRET: &str = "PAYMENT_SECRET_KEY";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub site: SiteSection,
    #[serde(default)]
    pub import: ImportSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Deserialize)]
pub struct SiteSection {
    /// Public site origin, used for sitemap loc values.
    pub base_url: String,
    /// Legacy media subdomain for the fix-images heuristic.
    pub legacy_media_host: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ImportSection {
    /// Storage bucket holding re-hosted images.
    pub bucket: String,
    /// Path prefix inside the bucket.
    pub collection: String,
    /// Whether `import` re-hosts featured images at all.
    pub relocate_images: bool,
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            bucket: "media".to_string(),
            collection: "blog-images".to_string(),
            relocate_images: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen_addr: String,
    /// Smallest accepted payment, in minor currency units.
    pub min_payment_amount: i64,
    pub currency: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            min_payment_amount: 100,
            currency: "gbp".to_string(),
        }
    }
}

/// Hosted-backend credentials, injected from the environment rather than
/// the config file so the YAML stays committable.
#[derive(Debug, Clone)]
pub struct BackendCredentials {
    pub api_url: String,
    pub service_key: String,
}

/// Read backend credentials from the environment. `None` when either var is
/// absent; callers decide whether that is fatal (import) or a degraded mode
/// (sitemap endpoint).
pub fn backend_credentials() -> Option<BackendCredentials> {
    let api_url = env::var(ENV_API_URL).ok().filter(|v| !v.is_empty())?;
    let service_key = env::var(ENV_SERVICE_KEY).ok().filter(|v| !v.is_empty())?;
    Some(BackendCredentials {
        api_url: api_url.trim_end_matches('/').to_string(),
        service_key,
    })
}

pub fn payment_secret() -> Option<String> {
    env::var(ENV_PAYMENT_SECRET).ok().filter(|v| !v.is_empty())
}

/// Load and parse the YAML config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read config file {:?}", path_ref))?;

    let config: CliConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML: {e}")
    })?;

    info!(config_path = ?path_ref, "Parsed config YAML successfully");
    Ok(config)
}
