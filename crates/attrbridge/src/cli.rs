//! Clap derive structures for the `attrbridge` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// attrbridge -- browse and poll a Jolokia agent as a node tree
#[derive(Debug, Parser)]
#[command(
    name = "attrbridge",
    version,
    about = "Mirror JMX attributes as a typed, polled node tree",
    long_about = "Enumerates the MBean attributes a Jolokia agent exposes, folds them into\n\
        a folder hierarchy derived from each object name, and keeps the\n\
        resulting variables fresh by polling.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Jolokia agent URL (overrides [source].url)
    #[arg(long, short = 'u', env = "ATTRBRIDGE_URL", global = true)]
    pub url: Option<String>,

    /// Config file path
    #[arg(long, env = "ATTRBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Refresh interval in milliseconds (overrides [namespace].refresh_ms)
    #[arg(long, global = true)]
    pub interval: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ATTRBRIDGE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides [source].timeout)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the source type names that map to node data types
    Types,

    /// Build the namespace and print the node tree
    #[command(alias = "ls")]
    Tree,

    /// Read variable values
    Read(ReadArgs),

    /// Write a value to a variable and mirror it to the source
    Write(WriteArgs),

    /// List the outbound references of a node
    Refs(RefsArgs),

    /// Build the namespace and print its counters
    Stats(StatsArgs),

    /// Poll continuously and print a report per refresh cycle
    Watch(WatchArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Node ids: `ns=2;s=app/Cache/main/size`, `s=...`, or a bare path
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Node id of the variable
    pub id: String,

    /// New value, as JSON or a bare string
    pub value: String,
}

#[derive(Debug, Args)]
pub struct RefsArgs {
    /// Node id; defaults to the root folder
    pub id: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Run one refresh cycle before reporting
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many cycles
    #[arg(long, short = 'n')]
    pub cycles: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
