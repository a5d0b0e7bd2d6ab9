mod constants;
mod routes;
mod state;
mod sync;
mod transport;

use crate::constants::DEFAULT_LISTEN;
use crate::state::AppState;
use crate::transport::HttpTransport;
use clap::Parser;
use std::net::SocketAddr;
use tokio::runtime::Handle;
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "cryptochain-node")]
#[command(about = "Proof-of-work ledger node")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:3000
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Peer base URL to publish to; repeat for several peers
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Root node to sync chain and pool from at boot
    #[arg(long)]
    root: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let transport = HttpTransport::new(args.peers, Handle::current())?;
    info!("publishing to {} peer(s)", transport.peers().len());
    let state = AppState::new(transport);

    if let Some(root) = &args.root {
        if let Err(e) = sync::sync_with_root(&state, root).await {
            warn!("boot sync with {root} failed: {e:#}");
        }
    }

    let app = routes::router(state);
    let addr: SocketAddr = args.listen.parse()?;
    info!("cryptochain-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("listening for shutdown failed: {e}");
    }
    info!("shutting down");
}
