// ── Node tree domain model ──
//
// Identity, typed values, and node shapes shared by the tree, the type
// registry, the polling worker, and the namespace facade.

pub mod node;
pub mod node_id;
pub mod object_name;
pub mod variant;

// ── Re-exports ──────────────────────────────────────────────────────

pub use node::{
    AccessLevel, AttributeRef, DataValue, Node, NodeClass, NodeKind, Reference, ReferenceType,
    StatusCode, UNAVAILABLE, Variable,
};
pub use node_id::NodeId;
pub use object_name::ObjectName;
pub use variant::{DataType, Variant};
