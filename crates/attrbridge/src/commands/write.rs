//! Single-variable write.

use serde::Serialize;
use serde_json::Value;

use attrbridge_core::{DataType, StatusCode, Variant};

use crate::cli::{GlobalOpts, WriteArgs};
use crate::error::CliError;
use crate::output;

use super::util::{self, AgentNamespace};

#[derive(Serialize)]
struct WriteResult {
    node: String,
    value: Variant,
    status: StatusCode,
}

/// Parse `raw` as JSON, falling back to a bare string, then convert it to
/// the variable's advertised type.
fn parse_value(raw: &str, data_type: DataType) -> Result<Variant, CliError> {
    let json = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
    data_type.coerce(&json)?.ok_or_else(|| CliError::Validation {
        field: "value".into(),
        reason: "null cannot be written".into(),
    })
}

pub async fn handle(namespace: &AgentNamespace, args: &WriteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = util::parse_node_id(namespace, &args.id)?;
    let node = namespace
        .get_node(&id)
        .ok_or_else(|| CliError::NodeNotFound { id: id.to_string() })?;
    let data_type = node
        .as_variable()
        .map_or(DataType::String, |v| v.data_type);
    let value = parse_value(&args.value, data_type)?;

    let status = namespace
        .write(vec![(id.clone(), value.clone())])
        .await
        .into_iter()
        .next()
        .unwrap_or(StatusCode::BadNodeIdUnknown);
    if !status.is_good() {
        return Err(CliError::Rejected {
            id: id.to_string(),
            status,
        });
    }

    let result = WriteResult {
        node: id.to_string(),
        value,
        status,
    };
    let out = output::render_single(
        &global.output,
        &result,
        |r| format!("{} = {}", r.node, r.value),
        |r| r.value.to_string(),
    )?;
    output::print_output(&out, global.quiet);

    if namespace.stats().write_back_failures > 0 && !global.quiet {
        eprintln!("warning: value stored but the agent rejected the write-back");
    }
    Ok(())
}
