// ── Nodes, references, and values ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node_id::NodeId;
use super::variant::{DataType, Variant};

/// Value a variable carries while its source attribute cannot be read.
pub const UNAVAILABLE: &str = "UNAVAILABLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum NodeClass {
    Object,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum AccessLevel {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum ReferenceType {
    /// Hierarchical parent-to-child link between folders and variables.
    Organizes,
}

/// An outbound reference from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub reference_type: ReferenceType,
    pub target: NodeId,
    pub target_class: NodeClass,
    pub is_forward: bool,
}

/// Per-entry result code for protocol-facing reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum StatusCode {
    Good,
    BadNodeIdUnknown,
    BadAttributeIdInvalid,
    BadNotWritable,
    BadTypeMismatch,
}

impl StatusCode {
    pub fn is_good(self) -> bool {
        self == Self::Good
    }
}

/// A variable's value as handed to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    pub value: Option<Variant>,
    pub status: StatusCode,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub server_timestamp: Option<DateTime<Utc>>,
}

/// The source attribute a variable mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeRef {
    pub entity: String,
    pub attribute: String,
    /// Type name as reported by the source; selects the factory on every poll.
    pub source_type: String,
}

// ── Variable ────────────────────────────────────────────────────────

/// Variable payload of a node.
///
/// `declared_type` and `declared_access` are what the type factory assigned;
/// `data_type` and `access` are what is currently advertised. They differ only
/// while the variable is degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub data_type: DataType,
    pub access: AccessLevel,
    pub value: Option<Variant>,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub server_timestamp: Option<DateTime<Utc>>,
    pub attribute: AttributeRef,
    pub declared_type: DataType,
    pub declared_access: AccessLevel,
    pub degraded: bool,
}

impl Variable {
    pub fn new(attribute: AttributeRef, data_type: DataType, access: AccessLevel) -> Self {
        Self {
            data_type,
            access,
            value: None,
            source_timestamp: None,
            server_timestamp: None,
            attribute,
            declared_type: data_type,
            declared_access: access,
            degraded: false,
        }
    }

    pub fn set_value(&mut self, value: Option<Variant>, at: DateTime<Utc>) {
        self.value = value;
        self.source_timestamp = Some(at);
        self.server_timestamp = Some(at);
    }

    /// Replace the value with the [`UNAVAILABLE`] marker and advertise the
    /// variable as a read-only string.
    pub fn degrade(&mut self, at: DateTime<Utc>) {
        self.data_type = DataType::String;
        self.access = AccessLevel::ReadOnly;
        self.degraded = true;
        self.set_value(Some(Variant::String(UNAVAILABLE.to_owned())), at);
    }

    /// Return to the declared type and access with no value.
    pub fn restore(&mut self) {
        self.data_type = self.declared_type;
        self.access = self.declared_access;
        self.degraded = false;
        self.value = None;
    }

    pub fn is_writable(&self) -> bool {
        self.access == AccessLevel::ReadWrite
    }

    pub fn data_value(&self) -> DataValue {
        DataValue {
            value: self.value.clone(),
            status: StatusCode::Good,
            source_timestamp: self.source_timestamp,
            server_timestamp: self.server_timestamp,
        }
    }
}

// ── Node ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Folder,
    Variable(Variable),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub browse_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub kind: NodeKind,
    /// Outbound references in insertion order, without duplicates.
    pub references: Vec<Reference>,
}

impl Node {
    pub fn folder(id: NodeId, name: impl Into<String>) -> Self {
        Self::with_kind(id, name.into(), NodeKind::Folder)
    }

    pub fn variable(id: NodeId, name: impl Into<String>, variable: Variable) -> Self {
        Self::with_kind(id, name.into(), NodeKind::Variable(variable))
    }

    fn with_kind(id: NodeId, name: String, kind: NodeKind) -> Self {
        Self {
            id,
            display_name: name.clone(),
            browse_name: name,
            description: None,
            kind,
            references: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn node_class(&self) -> NodeClass {
        match self.kind {
            NodeKind::Folder => NodeClass::Object,
            NodeKind::Variable(_) => NodeClass::Variable,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder)
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.kind {
            NodeKind::Variable(v) => Some(v),
            NodeKind::Folder => None,
        }
    }

    pub fn as_variable_mut(&mut self) -> Option<&mut Variable> {
        match &mut self.kind {
            NodeKind::Variable(v) => Some(v),
            NodeKind::Folder => None,
        }
    }

    /// Add a forward `Organizes` reference. Returns `false` if it was
    /// already present.
    pub fn add_reference(&mut self, target: NodeId, target_class: NodeClass) -> bool {
        if self.references.iter().any(|r| r.target == target) {
            return false;
        }
        self.references.push(Reference {
            reference_type: ReferenceType::Organizes,
            target,
            target_class,
            is_forward: true,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size_variable() -> Variable {
        Variable::new(
            AttributeRef {
                entity: "app:type=Cache,name=main".into(),
                attribute: "size".into(),
                source_type: "int".into(),
            },
            DataType::Int32,
            AccessLevel::ReadWrite,
        )
    }

    #[test]
    fn degrade_then_restore_round_trips_declared_shape() {
        let mut var = size_variable();
        var.set_value(Some(Variant::Int32(10)), Utc::now());

        var.degrade(Utc::now());
        assert_eq!(var.data_type, DataType::String);
        assert_eq!(var.access, AccessLevel::ReadOnly);
        assert_eq!(var.value, Some(Variant::String(UNAVAILABLE.into())));
        assert!(!var.is_writable());

        var.restore();
        assert_eq!(var.data_type, DataType::Int32);
        assert!(var.is_writable());
        assert!(!var.degraded);
        assert_eq!(var.value, None);
    }

    #[test]
    fn references_are_not_duplicated() {
        let mut folder = Node::folder(NodeId::new(2, "app"), "app");
        let child = NodeId::new(2, "app/Cache");
        assert!(folder.add_reference(child.clone(), NodeClass::Object));
        assert!(!folder.add_reference(child, NodeClass::Object));
        assert_eq!(folder.references.len(), 1);
        assert_eq!(folder.node_class(), NodeClass::Object);
    }

    #[test]
    fn variable_node_exposes_payload() {
        let node = Node::variable(NodeId::new(2, "app/size"), "size", size_variable());
        assert_eq!(node.node_class(), NodeClass::Variable);
        assert_eq!(node.display_name, "size");
        assert!(node.as_variable().is_some());
        assert!(!node.is_folder());
    }
}
