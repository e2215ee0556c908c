//! Config file commands. These never contact the agent.

use attrbridge_config::{Config, config_path, save_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

const MASK: &str = "********";

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = util::load(global)?;
            if let Some(url) = &global.url {
                cfg.source.url = Some(url.clone());
            }
            if cfg.source.password.is_some() {
                cfg.source.password = Some(MASK.into());
            }
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
                _ => output::render_single(&global.output, &cfg, |_| String::new(), |_| String::new())?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!("{} already exists (use --force to overwrite)", path.display()),
                });
            }
            let mut cfg = Config::default();
            cfg.source.url.clone_from(&global.url);
            save_config(&cfg, &path)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }
    }
}
