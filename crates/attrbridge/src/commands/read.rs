//! Batched variable reads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use attrbridge_core::{StatusCode, Variant};

use crate::cli::{GlobalOpts, ReadArgs};
use crate::error::CliError;
use crate::output;

use super::util::{self, AgentNamespace};

#[derive(Serialize)]
struct ReadEntry {
    node: String,
    status: StatusCode,
    value: Option<Variant>,
    source_timestamp: Option<DateTime<Utc>>,
}

#[derive(Tabled)]
struct ReadRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&ReadEntry> for ReadRow {
    fn from(e: &ReadEntry) -> Self {
        Self {
            node: e.node.clone(),
            value: util::or_dash(e.value.as_ref()),
            status: e.status.to_string(),
            updated: util::or_dash(e.source_timestamp.map(|t| t.format("%H:%M:%S%.3f"))),
        }
    }
}

/// Every id is read independently; bad ids produce a status, not an error.
pub fn handle(namespace: &AgentNamespace, args: &ReadArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ids = args
        .ids
        .iter()
        .map(|raw| util::parse_node_id(namespace, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let entries: Vec<ReadEntry> = ids
        .iter()
        .zip(namespace.read(&ids))
        .map(|(id, result)| match result {
            Ok(dv) => ReadEntry {
                node: id.to_string(),
                status: dv.status,
                value: dv.value,
                source_timestamp: dv.source_timestamp,
            },
            Err(status) => ReadEntry {
                node: id.to_string(),
                status,
                value: None,
                source_timestamp: None,
            },
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &entries,
        |e| ReadRow::from(e),
        |e| util::or_dash(e.value.as_ref()),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
