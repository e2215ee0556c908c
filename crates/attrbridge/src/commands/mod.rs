//! Command routing: CLI args -> namespace operations -> output.

pub mod config_cmd;
pub mod read;
pub mod refs;
pub mod stats;
pub mod tree;
pub mod types;
pub mod util;
pub mod watch;
pub mod write;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

use self::util::AgentNamespace;

/// Run a parsed command line. `types` and `config` work offline; every
/// other command builds the namespace from the agent first.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    match command {
        Command::Types => types::handle(&global),
        Command::Config(args) => config_cmd::handle(&args, &global),
        cmd => {
            let cfg = util::load(&global)?;
            let namespace = util::open_namespace(&global, &cfg).await?;
            tracing::debug!(command = ?cmd, bindings = namespace.stats().bindings, "namespace ready");
            dispatch(cmd, &namespace, &global).await
        }
    }
}

/// Hand a source-bound command to its handler.
async fn dispatch(cmd: Command, namespace: &AgentNamespace, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Tree => tree::handle(namespace, global),
        Command::Read(args) => read::handle(namespace, &args, global),
        Command::Write(args) => write::handle(namespace, &args, global).await,
        Command::Refs(args) => refs::handle(namespace, &args, global),
        Command::Stats(args) => stats::handle(namespace, &args, global).await,
        Command::Watch(args) => watch::handle(namespace, &args, global).await,
        // Answered by `run` without a source
        Command::Types | Command::Config(_) => Ok(()),
    }
}
