//! Depth-first listing of the node tree.

use serde::Serialize;
use tabled::Tabled;

use attrbridge_core::{AccessLevel, DataType, Node, NodeClass, NodeKind, Variant};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util::{self, AgentNamespace};

// ── Rows ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct NodeEntry {
    depth: usize,
    id: String,
    browse_name: String,
    class: NodeClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_type: Option<DataType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access: Option<AccessLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Variant>,
    unavailable: bool,
}

impl NodeEntry {
    fn new(depth: usize, node: Node, unavailable: bool) -> Self {
        let class = node.node_class();
        let (data_type, access, value) = match node.kind {
            NodeKind::Folder => (None, None, None),
            NodeKind::Variable(v) => (Some(v.data_type), Some(v.access), v.value),
        };
        Self {
            depth,
            class,
            id: node.id.to_string(),
            browse_name: node.browse_name,
            description: node.description,
            data_type,
            access,
            value,
            unavailable,
        }
    }
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "Type")]
    data_type: String,
    #[tabled(rename = "Access")]
    access: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl From<&NodeEntry> for NodeRow {
    fn from(e: &NodeEntry) -> Self {
        Self {
            name: format!("{}{}", "  ".repeat(e.depth), e.browse_name),
            data_type: util::or_dash(e.data_type),
            access: util::or_dash(e.access),
            value: util::or_dash(e.value.as_ref()),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(namespace: &AgentNamespace, global: &GlobalOpts) -> Result<(), CliError> {
    let entries: Vec<NodeEntry> = namespace
        .browse()
        .into_iter()
        .map(|(depth, node)| {
            let unavailable = namespace.is_unavailable(&node.id);
            NodeEntry::new(depth, node, unavailable)
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &entries,
        |e| NodeRow::from(e),
        |e| e.id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
