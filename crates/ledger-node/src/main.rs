mod api;
mod constants;
mod fetch;

use api::AppState;
use clap::Parser;
use constants::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_LISTEN, NODE_ID_BYTES};
use fetch::HttpChainFetcher;
use ledger_core::consensus::Resolver;
use ledger_core::constants::DEFAULT_FETCH_CONCURRENCY;
use ledger_core::{Ledger, PeerSet};
use std::{net::SocketAddr, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledger-node", about = "Proof-of-work ledger node")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:5000
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Recipient of mining rewards; random when omitted
    #[arg(long)]
    node_id: Option<String>,

    /// Peer to register at startup (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Per-peer timeout when fetching chains
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    fetch_timeout_secs: u64,

    /// Peers fetched concurrently during resolution
    #[arg(long, default_value_t = DEFAULT_FETCH_CONCURRENCY)]
    fetch_concurrency: usize,

    /// Run consensus every N seconds in the background
    #[arg(long)]
    resolve_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let node_id = args.node_id.unwrap_or_else(new_node_id);

    let mut peers = PeerSet::new();
    peers.register_all(args.peers.iter().map(String::as_str))?;

    let fetcher = HttpChainFetcher::new(Duration::from_secs(args.fetch_timeout_secs))?;
    let resolver = Resolver::new(fetcher).with_concurrency(args.fetch_concurrency);
    let state = AppState::new(Ledger::new(), peers, resolver, node_id.clone());

    if let Some(secs) = args.resolve_interval_secs {
        let period = Duration::from_secs(secs.max(1));
        tokio::spawn(api::resolve_periodically(state.clone(), period));
        info!("resolving against peers every {period:?}");
    }

    let app = api::router(state);
    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node {node_id} listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn new_node_id() -> String {
    hex::encode(rand::random::<[u8; NODE_ID_BYTES]>())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
