//! CLI error types with miette diagnostics.
//!
//! Maps config, transport, and core errors into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use attrbridge_config::ConfigError;
use attrbridge_core::{CoreError, StatusCode};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Source ───────────────────────────────────────────────────────
    #[error("Could not enumerate attributes at {url}: {message}")]
    #[diagnostic(
        code(attrbridge::source_unavailable),
        help(
            "Check that the Jolokia agent is running and reachable.\n\
             URL: {url}"
        )
    )]
    SourceUnavailable { url: String, message: String },

    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(attrbridge::connection_failed),
        help("Check the URL and, for HTTPS agents, the TLS settings (--insecure or ca_cert).")
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Authentication failed")]
    #[diagnostic(
        code(attrbridge::auth_failed),
        help("Set [source].username and password_env in the config file.")
    )]
    AuthFailed,

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(attrbridge::timeout),
        help("Increase the timeout with --timeout or check agent responsiveness.")
    )]
    Timeout { seconds: u64 },

    #[error("No attribute source configured")]
    #[diagnostic(
        code(attrbridge::no_source),
        help(
            "Pass --url, set ATTRBRIDGE_URL, or set [source].url in\n\
             {path}"
        )
    )]
    NoSource { path: String },

    // ── Nodes ────────────────────────────────────────────────────────
    #[error("Node '{id}' not found")]
    #[diagnostic(
        code(attrbridge::not_found),
        help("Run: attrbridge tree -o plain to list node ids")
    )]
    NodeNotFound { id: String },

    #[error("Write to '{id}' rejected: {status}")]
    #[diagnostic(code(attrbridge::rejected))]
    Rejected { id: String, status: StatusCode },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(attrbridge::validation))]
    Validation { field: String, reason: String },

    #[error("{message}")]
    #[diagnostic(code(attrbridge::core))]
    Core { message: String },

    #[error(transparent)]
    #[diagnostic(code(attrbridge::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML serialization failed: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SourceUnavailable { .. } | Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NodeNotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::NoSource { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoSource => Self::NoSource {
                path: attrbridge_config::config_path().display().to_string(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidNodeId { input, reason } => Self::Validation {
                field: "node id".into(),
                reason: format!("'{input}': {reason}"),
            },
            CoreError::TypeMismatch { .. } => Self::Validation {
                field: "value".into(),
                reason: err.to_string(),
            },
            CoreError::Config { message } => Self::Validation {
                field: "namespace".into(),
                reason: message,
            },
            other => Self::Core {
                message: other.to_string(),
            },
        }
    }
}

impl From<attrbridge_api::Error> for CliError {
    fn from(err: attrbridge_api::Error) -> Self {
        match err {
            attrbridge_api::Error::Authentication { .. } => Self::AuthFailed,
            attrbridge_api::Error::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            other => Self::ConnectionFailed {
                url: "(agent)".into(),
                source: Box::new(other),
            },
        }
    }
}
