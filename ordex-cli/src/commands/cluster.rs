use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use super::OutputContext;
use crate::client::{OrderClient, ReplicaStatus};

#[derive(Args)]
pub struct ClusterArgs {
    #[command(subcommand)]
    pub command: ClusterCommands,
}

#[derive(Subcommand)]
pub enum ClusterCommands {
    /// Ping every replica and show its role
    Status,
    /// Elect a leader and announce it to every replica
    Elect,
}

pub async fn execute(client: &OrderClient, args: ClusterArgs, output: &OutputContext) -> Result<()> {
    match args.command {
        ClusterCommands::Status => status(client, output).await,
        ClusterCommands::Elect => elect(client, output).await,
    }
}

async fn status(client: &OrderClient, output: &OutputContext) -> Result<()> {
    let statuses = client.status().await;

    if output.json {
        let rows: Vec<_> = statuses
            .iter()
            .map(|s| match &s.health {
                Ok(health) => json!({"endpoint": s.member.endpoint, "health": health}),
                Err(e) => json!({"endpoint": s.member.endpoint, "error": e.to_string()}),
            })
            .collect();
        output.print_json(&rows);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = statuses.iter().map(status_row).collect();
    output.print_table(
        &["ID", "Endpoint", "Status", "Role", "Leader", "Ready"],
        &rows,
    );
    Ok(())
}

/// Table row for one replica
pub fn status_row(status: &ReplicaStatus) -> Vec<String> {
    let id = status.member.id.to_string();
    let endpoint = status.member.endpoint.to_string();
    match &status.health {
        Ok(health) => vec![
            id,
            endpoint,
            health.status.clone(),
            health.role.to_string(),
            health
                .leader_id
                .map_or_else(|| "-".to_string(), |l| l.to_string()),
            health.recovery_ready.to_string(),
        ],
        Err(e) => vec![
            id,
            endpoint,
            format!("down ({:?})", e.code()),
            "-".to_string(),
            "-".to_string(),
            "-".to_string(),
        ],
    }
}

async fn elect(client: &OrderClient, output: &OutputContext) -> Result<()> {
    let leader = client.elect().await?;
    if output.json {
        output.print_json(&leader);
    } else {
        output.print_success(&format!("Elected {}", leader));
    }
    Ok(())
}
