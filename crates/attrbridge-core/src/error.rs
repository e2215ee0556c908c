// ── Core error types ──
//
// Errors that cross the crate boundary. Per-attribute failures during
// population and polling are logged and absorbed; only the variants
// below ever reach a caller.

use thiserror::Error;

use crate::model::DataType;
use crate::source::SourceError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Source errors ────────────────────────────────────────────────
    /// The source could not be enumerated. Fatal to namespace construction.
    #[error("Attribute enumeration failed: {0}")]
    Enumeration(#[source] SourceError),

    #[error(transparent)]
    Source(#[from] SourceError),

    // ── Naming errors ────────────────────────────────────────────────
    #[error("Invalid object name '{name}': {reason}")]
    InvalidObjectName { name: String, reason: String },

    #[error("Invalid node id '{input}': {reason}")]
    InvalidNodeId { input: String, reason: String },

    // ── Type errors ──────────────────────────────────────────────────
    #[error("Unsupported attribute type: {type_name}")]
    UnsupportedType { type_name: String },

    #[error("Cannot convert {value} to {expected}")]
    TypeMismatch { expected: DataType, value: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn mismatch(expected: DataType, value: &serde_json::Value) -> Self {
        Self::TypeMismatch {
            expected,
            value: value.to_string(),
        }
    }
}
