//! Outbound references of a node.

use tabled::Tabled;

use attrbridge_core::Reference;

use crate::cli::{GlobalOpts, RefsArgs};
use crate::error::CliError;
use crate::output;

use super::util::{self, AgentNamespace};

#[derive(Tabled)]
struct ReferenceRow {
    #[tabled(rename = "Reference")]
    reference_type: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Class")]
    class: String,
}

impl From<&Reference> for ReferenceRow {
    fn from(r: &Reference) -> Self {
        Self {
            reference_type: r.reference_type.to_string(),
            target: r.target.to_string(),
            class: r.target_class.to_string(),
        }
    }
}

pub fn handle(namespace: &AgentNamespace, args: &RefsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = match args.id.as_deref() {
        Some(raw) => util::parse_node_id(namespace, raw)?,
        None => namespace.root_id().clone(),
    };
    let references = namespace
        .get_references(&id)
        .map_err(|_| CliError::NodeNotFound { id: id.to_string() })?;

    let out = output::render_list(
        &global.output,
        &references,
        |r| ReferenceRow::from(r),
        |r| r.target.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
