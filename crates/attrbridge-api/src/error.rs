use thiserror::Error;

/// Top-level error type for the `attrbridge-api` crate.
///
/// Covers transport failures, Jolokia protocol errors (reported inside a
/// normal HTTP 200 envelope), and payload decoding. `attrbridge-core` maps
/// these into source-level error kinds.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The agent rejected the supplied credentials (HTTP 401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Jolokia protocol ────────────────────────────────────────────
    /// Error reported inside the Jolokia response envelope.
    #[error("Jolokia error (status {status}): {message}")]
    Jolokia {
        status: u16,
        /// Fully qualified Java exception class, e.g.
        /// `javax.management.InstanceNotFoundException`.
        error_type: Option<String>,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the failure is likely to clear up on its own:
    /// the agent was unreachable, or the attribute getter threw at runtime.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Jolokia { error_type, .. } => error_type
                .as_deref()
                .is_some_and(|t| t.ends_with("RuntimeMBeanException") || t.ends_with("RuntimeErrorException")),
            _ => false,
        }
    }

    /// Returns `true` if the MBean or attribute does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Jolokia { status: 404, .. } => true,
            _ => false,
        }
    }

    /// The Java exception class reported by the agent, if any.
    pub fn error_type(&self) -> Option<&str> {
        match self {
            Self::Jolokia { error_type, .. } => error_type.as_deref(),
            _ => None,
        }
    }
}
