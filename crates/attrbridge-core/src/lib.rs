// attrbridge-core: Folds a flat attribute source into a typed, polled node tree.

pub mod availability;
pub mod config;
pub mod error;
pub mod model;
pub mod namespace;
pub mod source;
pub mod store;
pub mod types;
pub mod worker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use availability::{AvailabilityListener, AvailabilityTracker, ListenerId};
pub use config::{EntityFilter, NamespaceConfig, RecoveryPolicy};
pub use error::CoreError;
pub use namespace::{Namespace, NamespaceStats};
pub use source::{AttributeDescriptor, AttributeSource, MemorySource, SourceError, SourceErrorKind};
pub use store::NamespaceTree;
pub use types::{BuildContext, ScalarTypeFactory, TypeFactory, TypeFactoryRegistry};
pub use worker::{AttributeBinding, CycleReport, PollingWorker};

pub use model::{
    AccessLevel, AttributeRef, DataType, DataValue, Node, NodeClass, NodeId, NodeKind,
    ObjectName, Reference, ReferenceType, StatusCode, UNAVAILABLE, Variable, Variant,
};
