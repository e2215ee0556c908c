// ── Attribute sources ──
//
// The boundary to whatever actually owns the attributes. A source is
// enumerated once at build time and then read and written per attribute.

mod jolokia;
mod memory;

pub use memory::{MemorySource, RecordedWrite};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// How a source failure should be treated by the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum SourceErrorKind {
    /// The entity is temporarily unreachable. Worth retrying.
    Transient,
    /// The attribute does not exist.
    Permanent,
    /// Anything else: protocol errors, rejected writes, bad payloads.
    Other,
}

/// Error returned by an [`AttributeSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} source error: {message}")]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Permanent, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Other, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind == SourceErrorKind::Transient
    }

    pub fn is_permanent(&self) -> bool {
        self.kind == SourceErrorKind::Permanent
    }
}

/// One attribute as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// Entity object name, `domain:key=value,...`.
    pub entity: String,
    pub name: String,
    /// Source type name, e.g. `int` or `java.lang.String`.
    pub type_name: String,
    #[serde(default = "default_true")]
    pub readable: bool,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A management source of typed attributes.
///
/// Implementations must be cheap to call concurrently; the namespace holds
/// one behind an `Arc` and calls it from both request tasks and the polling
/// task.
pub trait AttributeSource: Send + Sync + 'static {
    /// List every attribute the source exposes.
    fn enumerate(&self) -> impl Future<Output = Result<Vec<AttributeDescriptor>, SourceError>> + Send;

    /// Fetch the current raw value of one attribute.
    fn get_value(
        &self,
        entity: &str,
        attribute: &str,
    ) -> impl Future<Output = Result<Value, SourceError>> + Send;

    /// Push a new value for one attribute.
    fn set_value(
        &self,
        entity: &str,
        attribute: &str,
        value: Value,
    ) -> impl Future<Output = Result<(), SourceError>> + Send;
}
