use anyhow::Result;
use clap::{Args, Subcommand};
use ordex_core::{OrderRequest, TradeType};
use serde_json::json;

use super::OutputContext;
use crate::client::OrderClient;

#[derive(Args)]
pub struct OrderArgs {
    #[command(subcommand)]
    pub command: OrderCommands,
}

#[derive(Subcommand)]
pub enum OrderCommands {
    /// Place a buy or sell order through the leader
    Place {
        /// Stock symbol
        stock: String,
        /// buy or sell
        #[arg(value_parser = parse_trade_type)]
        trade_type: TradeType,
        /// Number of shares
        quantity: u64,
    },
    /// Look up a committed order on the leader
    Get {
        /// Transaction number
        transaction_number: u64,
    },
}

fn parse_trade_type(value: &str) -> std::result::Result<TradeType, String> {
    value.parse().map_err(|e: ordex_core::Error| e.to_string())
}

pub async fn execute(client: &OrderClient, args: OrderArgs, output: &OutputContext) -> Result<()> {
    match args.command {
        OrderCommands::Place {
            stock,
            trade_type,
            quantity,
        } => place(client, OrderRequest::new(stock, trade_type, quantity), output).await,
        OrderCommands::Get { transaction_number } => get(client, transaction_number, output).await,
    }
}

async fn place(client: &OrderClient, request: OrderRequest, output: &OutputContext) -> Result<()> {
    let transaction_number = client.place_order(&request).await?;

    if output.json {
        output.print_json(&json!({"transaction_number": transaction_number}));
        return Ok(());
    }

    output.print_success(&format!("Order committed as transaction {}", transaction_number));
    if output.verbose {
        if let Some(leader) = client.leader() {
            output.print_info(&format!("Served by {}", leader));
        }
    }
    Ok(())
}

async fn get(client: &OrderClient, transaction_number: u64, output: &OutputContext) -> Result<()> {
    let order = client.get_order(transaction_number).await?;

    if output.json {
        output.print_json(&order);
        return Ok(());
    }

    output.print_table(
        &["Transaction", "Stock", "Type", "Quantity"],
        &[vec![
            order.transaction_number.to_string(),
            order.stock_name.clone(),
            order.trade_type.to_string(),
            order.quantity.to_string(),
        ]],
    );
    Ok(())
}
