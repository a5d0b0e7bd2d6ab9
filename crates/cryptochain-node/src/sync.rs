use crate::state::AppState;
use anyhow::Context;
use cryptochain_core::{LedgerBlock, LedgerError, TransactionMap};
use reqwest::Client;
use tracing::{info, warn};

/// Pulls the root node's chain and pending transactions into `state`.
///
/// The chain goes through the normal replacement rules, so a root that is
/// behind or serves an invalid chain leaves the local one in place.
pub async fn sync_with_root(state: &AppState, root: &str) -> anyhow::Result<()> {
    let root = root.trim_end_matches('/');
    let client = Client::new();

    let chain: Vec<LedgerBlock> = client
        .get(format!("{root}/api/blocks"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("decoding root chain")?;
    let pool_map: TransactionMap = client
        .get(format!("{root}/api/transaction-pool-map"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("decoding root transaction pool")?;

    let blocks = chain.len();
    let pending = pool_map.len();
    let state = state.clone();
    tokio::task::spawn_blocking(move || -> Result<(), LedgerError> {
        let replaced = state
            .blockchain
            .write()
            .map_err(|_| LedgerError::LockPoisoned("blockchain"))?
            .replace_chain(chain);
        if let Err(reason) = replaced {
            warn!("kept local chain on sync: {reason}");
        }
        state
            .pool
            .write()
            .map_err(|_| LedgerError::LockPoisoned("transaction pool"))?
            .set_map(pool_map);
        Ok(())
    })
    .await??;

    info!("synced with root {root}: {blocks} blocks, {pending} pending transactions");
    Ok(())
}
