use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ordex_cli::client::OrderClient;
use ordex_cli::commands::{self, cluster, config as config_cmd, order};
use ordex_cli::config::Config;

/// Command-line client for the Ordex order ledger
#[derive(Parser)]
#[command(name = "ordex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, env = "ORDEX_CLI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Replica URLs, comma separated, in id order
    #[arg(long, env = "ORDEX_REPLICAS")]
    pub replicas: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cluster status and leader election
    Cluster(cluster::ClusterArgs),
    /// Place and look up orders
    Order(order::OrderArgs),
    /// Configuration management
    Config(config_cmd::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            "ordex_cli=debug,ordex_core=debug".into()
        } else {
            "ordex_cli=warn,ordex_core=error".into()
        }
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(replicas) = &cli.replicas {
        cfg.set_replicas(replicas)?;
    }

    let output = commands::OutputContext {
        json: cli.json,
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Commands::Config(args) => {
            config_cmd::execute(args, &cfg, cli.config.as_deref(), &output).await
        }
        Commands::Cluster(args) => {
            let client = OrderClient::new(&cfg)?;
            cluster::execute(&client, args, &output).await
        }
        Commands::Order(args) => {
            let client = OrderClient::new(&cfg)?;
            order::execute(&client, args, &output).await
        }
    };

    if let Err(e) = &result {
        output.print_error(&e.to_string());
        std::process::exit(1);
    }
    Ok(())
}
