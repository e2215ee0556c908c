//! Namespace counters.

use serde::Serialize;

use attrbridge_core::NamespaceStats;

use crate::cli::{GlobalOpts, StatsArgs};
use crate::error::CliError;
use crate::output;

use super::util::AgentNamespace;

#[derive(Serialize)]
struct StatsReport {
    #[serde(flatten)]
    stats: NamespaceStats,
    unavailable_nodes: Vec<String>,
    unsupported_types: Vec<String>,
}

fn detail(report: &StatsReport) -> String {
    let s = &report.stats;
    let mut pairs = vec![
        ("Nodes", s.nodes.to_string()),
        ("Variables", s.variables.to_string()),
        ("Bindings", s.bindings.to_string()),
        ("Unavailable", s.unavailable.to_string()),
        ("Cycles", s.cycles.to_string()),
    ];
    if !report.unsupported_types.is_empty() {
        pairs.push(("Unsupported types", report.unsupported_types.join(", ")));
    }
    let mut out = output::detail_lines(&pairs);
    for id in &report.unavailable_nodes {
        out.push_str("\n  ");
        out.push_str(id);
    }
    out
}

pub async fn handle(namespace: &AgentNamespace, args: &StatsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.refresh {
        namespace.refresh_now().await;
    }
    let report = StatsReport {
        stats: namespace.stats(),
        unavailable_nodes: namespace
            .unavailable_ids()
            .iter()
            .map(ToString::to_string)
            .collect(),
        unsupported_types: namespace.unsupported_types(),
    };

    let out = output::render_single(&global.output, &report, detail, |r| {
        r.stats.variables.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
