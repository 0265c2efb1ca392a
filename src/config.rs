//! Configuration for the route reconciler and the registration orchestrator.
//!
//! Configuration is an explicit [`LabConfig`] value handed to each subsystem.
//! It is resolved once, at startup, from an ordered list of candidate sources:
//! the first source that is present and fully populated wins.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::labels;
use crate::retry::PollConfig;

/// Environment variable prefix for [`ConfigSource::Env`]
pub const ENV_PREFIX: &str = "LABCTL_";

/// Candidate file names, most specific environment first
pub const CANDIDATE_FILES: [&str; 4] = ["local.toml", "dev.toml", "staging.toml", "prod.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("No fully-populated configuration found (tried: {0})")]
    NotFound(String),
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabConfig {
    pub routes: RouteConfig,

    #[serde(default)]
    pub registration: RegistrationConfig,
}

impl LabConfig {
    pub fn new(ingress_domain: impl Into<String>) -> Self {
        Self {
            routes: RouteConfig::new(ingress_domain),
            registration: RegistrationConfig::default(),
        }
    }
}

/// Route reconciler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Domain suffix of every generated host (e.g. "lab.example.com")
    pub ingress_domain: String,

    /// Shared Istio gateway referenced by every route ("namespace/name")
    #[serde(default = "default_gateway")]
    pub gateway: String,

    #[serde(default = "default_enabled_label")]
    pub enabled_label: String,

    #[serde(default = "default_host_key")]
    pub host_key: String,

    #[serde(default = "default_port_key")]
    pub port_key: String,

    #[serde(default = "default_region_label")]
    pub region_label: String,
}

impl RouteConfig {
    pub fn new(ingress_domain: impl Into<String>) -> Self {
        Self {
            ingress_domain: ingress_domain.into(),
            gateway: default_gateway(),
            enabled_label: default_enabled_label(),
            host_key: default_host_key(),
            port_key: default_port_key(),
            region_label: default_region_label(),
        }
    }

    /// Label selector matching routing-enabled Services
    pub fn enabled_selector(&self) -> String {
        format!("{}=true", self.enabled_label)
    }
}

fn default_gateway() -> String {
    "istio-system/lab-gateway".to_string()
}

fn default_enabled_label() -> String {
    labels::ROUTING_ENABLED_LABEL.to_string()
}

fn default_host_key() -> String {
    labels::ROUTING_HOST_KEY.to_string()
}

fn default_port_key() -> String {
    labels::ROUTING_PORT_KEY.to_string()
}

fn default_region_label() -> String {
    labels::REGION_LABEL.to_string()
}

/// Remote cluster-management API settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Base URL of the management API (e.g. "https://rancher.lab/v3")
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer credential for the management API
    #[serde(default)]
    pub token: Option<String>,

    /// Name of the remote cluster object
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// Skip TLS verification (self-signed lab control planes)
    #[serde(default)]
    pub insecure_tls: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_cluster_poll")]
    pub cluster_poll: PollConfig,

    #[serde(default = "default_manifest_poll")]
    pub manifest_poll: PollConfig,

    /// Reuse a remote cluster object with the same name instead of creating one
    #[serde(default)]
    pub reuse_existing_cluster: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            cluster_name: default_cluster_name(),
            insecure_tls: false,
            request_timeout_secs: default_request_timeout_secs(),
            cluster_poll: default_cluster_poll(),
            manifest_poll: default_manifest_poll(),
            reuse_existing_cluster: false,
        }
    }
}

// Keeps the credential out of logs.
impl fmt::Debug for RegistrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("cluster_name", &self.cluster_name)
            .field("insecure_tls", &self.insecure_tls)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cluster_poll", &self.cluster_poll)
            .field("manifest_poll", &self.manifest_poll)
            .field("reuse_existing_cluster", &self.reuse_existing_cluster)
            .finish()
    }
}

fn default_cluster_name() -> String {
    "lab".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cluster_poll() -> PollConfig {
    PollConfig::new(5_000, 12)
}

fn default_manifest_poll() -> PollConfig {
    PollConfig::new(5_000, 60)
}

/// A place configuration may come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A TOML file; skipped when absent
    File(PathBuf),
    /// `LABCTL_*` environment variables; skipped when `LABCTL_INGRESS_DOMAIN` is unset
    Env,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Env => write!(f, "environment"),
        }
    }
}

impl ConfigSource {
    /// Load this source
    ///
    /// # Returns
    /// * `Ok(Some(config))` - Source present and fully populated
    /// * `Ok(None)` - Source absent or missing required fields
    /// * `Err(ConfigError)` - Source present but unreadable or malformed
    pub fn load(&self) -> Result<Option<LabConfig>, ConfigError> {
        match self {
            ConfigSource::File(path) => load_file(path),
            ConfigSource::Env => load_from_lookup(|key| std::env::var(key).ok()),
        }
    }
}

/// Default candidate list: the environment files under `dir`, then the process environment
pub fn default_candidates(dir: &Path) -> Vec<ConfigSource> {
    CANDIDATE_FILES
        .iter()
        .map(|name| ConfigSource::File(dir.join(name)))
        .chain(std::iter::once(ConfigSource::Env))
        .collect()
}

/// Resolve configuration from candidate sources in order
///
/// Returns the first source that is present and fully populated. A present
/// but malformed source is an error rather than being skipped.
pub fn resolve_config(candidates: &[ConfigSource]) -> Result<LabConfig, ConfigError> {
    for source in candidates {
        match source.load()? {
            Some(config) => {
                info!(source = %source, "Configuration resolved");
                return Ok(config);
            }
            None => debug!(source = %source, "Configuration source not usable, trying next"),
        }
    }

    let tried = candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Err(ConfigError::NotFound(tried))
}

fn load_file(path: &Path) -> Result<Option<LabConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let value: toml::Value = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let has_domain = value
        .get("routes")
        .and_then(|routes| routes.get("ingress_domain"))
        .and_then(|domain| domain.as_str())
        .is_some_and(|domain| !domain.is_empty());
    if !has_domain {
        return Ok(None);
    }

    toml::from_str(&raw)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Build configuration from `LABCTL_*` keys provided by `lookup`
pub fn load_from_lookup<F>(lookup: F) -> Result<Option<LabConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| {
        lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|value| !value.is_empty())
    };

    let Some(ingress_domain) = get("INGRESS_DOMAIN") else {
        return Ok(None);
    };

    let mut config = LabConfig::new(ingress_domain);

    if let Some(gateway) = get("GATEWAY") {
        config.routes.gateway = gateway;
    }

    let registration = &mut config.registration;
    registration.endpoint = get("REMOTE_URL");
    registration.token = get("REMOTE_TOKEN");
    if let Some(name) = get("CLUSTER_NAME") {
        registration.cluster_name = name;
    }
    if let Some(value) = get("INSECURE_TLS") {
        registration.insecure_tls = parse_bool("INSECURE_TLS", &value)?;
    }
    if let Some(value) = get("REUSE_EXISTING_CLUSTER") {
        registration.reuse_existing_cluster = parse_bool("REUSE_EXISTING_CLUSTER", &value)?;
    }

    Ok(Some(config))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: format!("{}{}", ENV_PREFIX, name),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
