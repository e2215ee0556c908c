//! Continuous polling with one report per refresh cycle.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};

use attrbridge_core::{AvailabilityListener, CycleReport, NodeId};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util::AgentNamespace;

/// Logs availability transitions as they happen.
struct LogListener;

impl AvailabilityListener for LogListener {
    fn node_unavailable(&self, id: &NodeId) {
        warn!(node = %id, "node unavailable");
    }

    fn node_available(&self, id: &NodeId) {
        info!(node = %id, "node available again");
    }
}

fn render_cycle(format: &OutputFormat, report: &CycleReport) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(report)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(report)?),
        OutputFormat::Plain => format!("{} {} {}", report.cycle, report.changed, report.failed),
        OutputFormat::Table => format!(
            "cycle {:>5}  polled {:>4}  changed {:>4}  skipped {:>4}  failed {:>4}  {}ms",
            report.cycle,
            report.polled,
            report.changed,
            report.skipped,
            report.failed,
            report.elapsed.as_millis()
        ),
    })
}

pub async fn handle(namespace: &AgentNamespace, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let listener = namespace.add_listener(Arc::new(LogListener));
    let mut cycles = WatchStream::new(namespace.subscribe_cycles());
    namespace.start();
    info!(interval = ?namespace.worker().interval(), "polling started");

    let mut seen = 0_u64;
    let result = loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break Ok(()),
            next = cycles.next() => match next {
                Some(Some(report)) => {
                    match render_cycle(&global.output, &report) {
                        Ok(line) => output::print_output(&line, global.quiet),
                        Err(e) => break Err(e),
                    }
                    seen += 1;
                    if args.cycles.is_some_and(|n| seen >= n) {
                        break Ok(());
                    }
                }
                Some(None) => {}
                None => break Ok(()),
            },
        }
    };

    namespace.stop();
    namespace.remove_listener(listener);

    if !global.quiet {
        let stats = namespace.stats();
        eprintln!(
            "{} cycles, {} of {} variables unavailable",
            stats.cycles, stats.unavailable, stats.variables
        );
        for id in namespace.unavailable_ids() {
            eprintln!("  {id}");
        }
    }
    result
}
