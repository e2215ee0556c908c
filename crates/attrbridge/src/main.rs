//! `attrbridge`: browse, read, write and watch a Jolokia agent's MBean
//! attributes as a polled node tree.

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// Workspace crates raised by `-v`. Dependencies stay at `warn`.
const BRIDGE_CRATES: [&str; 3] = ["attrbridge", "attrbridge_core", "attrbridge_api"];

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose, cli.global.quiet);

    if let Err(err) = commands::run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// `RUST_LOG` takes precedence. Otherwise `-q` keeps only errors and each
/// `-v` lowers the level for the bridge crates.
fn log_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match verbose {
        _ if quiet => return EnvFilter::new("error"),
        0 => return EnvFilter::new("warn"),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let directives: Vec<String> = BRIDGE_CRATES.iter().map(|krate| format!("{krate}={level}")).collect();
    EnvFilter::new(format!("warn,{}", directives.join(",")))
}

fn init_tracing(verbose: u8, quiet: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, quiet))
        .with_target(verbose > 1)
        .with_writer(std::io::stderr)
        .init();
}
