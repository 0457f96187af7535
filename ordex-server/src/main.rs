//! Ordex Server - one replica of the order ledger
//!
//! Startup: open the order log, replay it, pull whatever peers hold beyond
//! the local max, then serve the replica RPC surface until ctrl-c.

use clap::Parser;
use ordex_core::catalog::{Catalog, MemoryCatalog};
use ordex_core::cluster::{PeerClient, Replica};
use ordex_core::store::OrderStore;
use ordex_protocol::{HttpCatalog, HttpPeerClient};
use ordex_server::{OrderServer, api, config::Config};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ordex Server CLI arguments
#[derive(Parser, Debug)]
#[command(name = "ordex-server")]
#[command(about = "Replicated order ledger server", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Path to a TOML config file (defaults to config/ordex.toml if present)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // CPU count * 2 worker threads, between 4 and 16
    let worker_threads = (thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        * 2)
    .clamp(4, 16);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .thread_name("ordex-worker")
        .enable_all()
        .build()?;

    let filter = if args.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ordex_server=debug,ordex_core=debug,tower_http=debug".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ordex_server=info,ordex_core=info,tower_http=warn".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(args.config.as_deref())?;
    rt.block_on(async_main(config))
}

async fn async_main(config: Config) -> anyhow::Result<()> {
    let cluster = config.cluster_config()?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = OrderStore::open(config.log_path())?;
    info!(
        "Replayed {} orders from {}",
        store.len(),
        config.log_path().display()
    );

    let catalog: Arc<dyn Catalog> = match &config.catalog_url {
        Some(url) => {
            info!("Using catalog service at {}", url);
            Arc::new(HttpCatalog::new(url.as_str())?)
        }
        None => {
            info!("No catalog URL configured, using the in-process catalog");
            let (tx, mut rx) = mpsc::unbounded_channel::<String>();
            tokio::spawn(async move {
                while let Some(stock) = rx.recv().await {
                    tracing::debug!("Catalog entry {} changed, cached quotes invalidated", stock);
                }
            });
            Arc::new(MemoryCatalog::with_default_stocks().with_invalidation(tx))
        }
    };

    let peers: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new(cluster.peer_timeout)?);
    let replica = Replica::new(cluster, store, catalog, peers)?;

    let report = replica.sync_on_start().await;
    if report.unreachable > 0 {
        warn!(
            "Cold-start sync could not reach {} peer(s); continuing with {} fetched orders",
            report.unreachable,
            report.applied.len()
        );
    } else {
        info!(
            "Cold-start sync fetched {} orders from {} peer(s)",
            report.applied.len(),
            report.reachable
        );
    }

    let server = Arc::new(OrderServer::new(replica.clone()));
    let app = api::router(server);

    let listener = TcpListener::bind(&config.addr).await?;
    info!(
        "Ordex replica {} listening on {} ({} variant)",
        replica.id(),
        config.addr,
        config.variant
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, flushing pending replication");
    replica.flush_replication().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
