//! Configuration for attrbridge.
//!
//! A TOML file layered under `ATTRBRIDGE_` environment variables, and its
//! translation into `attrbridge_core::NamespaceConfig` and
//! `attrbridge_api::TransportConfig`. The binary adds command-line
//! overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use attrbridge_api::{TlsMode, TransportConfig};
use attrbridge_core::{EntityFilter, NamespaceConfig, RecoveryPolicy};

/// Prefix for environment overrides. Nested keys use `__`, e.g.
/// `ATTRBRIDGE_SOURCE__URL`.
pub const ENV_PREFIX: &str = "ATTRBRIDGE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no attribute source configured (set [source].url or pass --url)")]
    NoSource,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub namespace: NamespaceSection,

    #[serde(default)]
    pub source: SourceSection,

    #[serde(default)]
    pub filter: FilterSection,
}

/// `[namespace]`: how the tree is named and refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamespaceSection {
    #[serde(default = "default_namespace_index")]
    pub namespace_index: u16,

    #[serde(default = "default_namespace_uri")]
    pub namespace_uri: String,

    #[serde(default = "default_root_name")]
    pub root_name: String,

    #[serde(default = "default_root_description")]
    pub root_description: String,

    /// Delay between refresh cycles, in milliseconds.
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,

    /// `"manual"` or `"probe"`.
    #[serde(default = "default_recovery")]
    pub recovery: String,

    /// Probe interval in cycles when `recovery = "probe"`.
    #[serde(default = "default_probe_every_cycles")]
    pub probe_every_cycles: u32,
}

impl Default for NamespaceSection {
    fn default() -> Self {
        Self {
            namespace_index: default_namespace_index(),
            namespace_uri: default_namespace_uri(),
            root_name: default_root_name(),
            root_description: default_root_description(),
            refresh_ms: default_refresh_ms(),
            recovery: default_recovery(),
            probe_every_cycles: default_probe_every_cycles(),
        }
    }
}

fn default_namespace_index() -> u16 {
    2
}
fn default_namespace_uri() -> String {
    "urn:attrbridge:attributes".into()
}
fn default_root_name() -> String {
    "attributes".into()
}
fn default_root_description() -> String {
    "Attribute root node.".into()
}
fn default_refresh_ms() -> u64 {
    1000
}
fn default_recovery() -> String {
    "manual".into()
}
fn default_probe_every_cycles() -> u32 {
    10
}

/// `[source]`: the Jolokia agent to mirror.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceSection {
    /// Agent endpoint, e.g. `http://localhost:8778/jolokia/`.
    pub url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    pub username: Option<String>,

    /// Password (plaintext; prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            url: None,
            timeout: default_timeout(),
            username: None,
            password: None,
            password_env: None,
            insecure: false,
            ca_cert: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// `[filter]`: which entity domains are mirrored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterSection {
    #[serde(default)]
    pub include_domains: Vec<String>,

    #[serde(default)]
    pub exclude_domains: Vec<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "attrbridge", "attrbridge").map_or_else(
        || PathBuf::from(".attrbridge.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` plus environment. A missing file is not an
/// error; defaults apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    Ok(config)
}

fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build the core namespace config.
pub fn to_namespace_config(cfg: &Config) -> Result<NamespaceConfig, ConfigError> {
    let ns = &cfg.namespace;
    let recovery = match ns.recovery.as_str() {
        "manual" => RecoveryPolicy::Manual,
        "probe" => RecoveryPolicy::Probe {
            every_cycles: ns.probe_every_cycles,
        },
        other => {
            return Err(ConfigError::Validation {
                field: "namespace.recovery".into(),
                reason: format!("expected 'manual' or 'probe', got '{other}'"),
            });
        }
    };

    let config = NamespaceConfig {
        namespace_index: ns.namespace_index,
        namespace_uri: ns.namespace_uri.clone(),
        root_name: ns.root_name.clone(),
        root_description: ns.root_description.clone(),
        refresh_interval: Duration::from_millis(ns.refresh_ms),
        recovery,
        filter: EntityFilter {
            include_domains: cfg.filter.include_domains.clone(),
            exclude_domains: cfg.filter.exclude_domains.clone(),
        },
    };
    config.validate().map_err(|e| ConfigError::Validation {
        field: "namespace".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}

/// Build the HTTP transport config for the source.
pub fn to_transport_config(source: &SourceSection) -> TransportConfig {
    let tls = if source.insecure {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = source.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };
    TransportConfig {
        tls,
        timeout: Duration::from_secs(source.timeout),
    }
}

/// The agent URL: `override_url` if given, else `[source].url`.
pub fn source_url(source: &SourceSection, override_url: Option<&str>) -> Result<Url, ConfigError> {
    let raw = override_url
        .or(source.url.as_deref())
        .ok_or(ConfigError::NoSource)?;
    raw.parse().map_err(|e| ConfigError::Validation {
        field: "source.url".into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

/// Basic-auth credentials, if a username is configured. The password comes
/// from `password_env` first, then the plaintext `password`.
pub fn resolve_credentials(source: &SourceSection) -> Result<Option<(String, SecretString)>, ConfigError> {
    let Some(username) = source.username.clone() else {
        return Ok(None);
    };

    if let Some(ref env_name) = source.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(Some((username, SecretString::from(val))));
        }
    }
    if let Some(ref pw) = source.password {
        return Ok(Some((username, SecretString::from(pw.clone()))));
    }

    Err(ConfigError::Validation {
        field: "source.password".into(),
        reason: format!("username '{username}' is set but no password was found"),
    })
}
