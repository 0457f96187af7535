use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::Path;

use super::OutputContext;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Store the replica list (comma separated URLs, in id order)
    SetReplicas {
        /// e.g. http://order-service-1:8998,http://order-service-2:8999
        replicas: String,
    },
    /// Print the configuration file path
    Path,
}

pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    path: Option<&Path>,
    output: &OutputContext,
) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            if output.json {
                output.print_json(config);
            } else {
                println!("{}", toml::to_string_pretty(config)?);
            }
            Ok(())
        }
        ConfigCommands::SetReplicas { replicas } => {
            let mut updated = config.clone();
            updated.set_replicas(&replicas)?;
            let saved = updated.save(path)?;
            output.print_success(&format!(
                "Saved {} replicas to {}",
                updated.replicas.len(),
                saved.display()
            ));
            Ok(())
        }
        ConfigCommands::Path => {
            let path = path.map_or_else(Config::default_path, Path::to_path_buf);
            println!("{}", path.display());
            Ok(())
        }
    }
}
