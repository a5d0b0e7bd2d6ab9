use crate::block::LedgerBlock;
use crate::chain::SharedChain;
use crate::error::{LedgerError, Result};
use crate::pool::SharedPool;
use crate::pubsub::{PubSub, Transport};
use crate::transaction::Transaction;
use crate::wallet::SharedWallet;
use std::sync::Arc;
use tracing::info;

/// Turns the pool's valid transactions into a block.
pub struct TransactionMiner<T: Transport> {
    blockchain: SharedChain,
    transaction_pool: SharedPool,
    wallet: SharedWallet,
    pubsub: Arc<PubSub<T>>,
}

impl<T: Transport> TransactionMiner<T> {
    pub fn new(
        blockchain: SharedChain,
        transaction_pool: SharedPool,
        wallet: SharedWallet,
        pubsub: Arc<PubSub<T>>,
    ) -> Self {
        Self {
            blockchain,
            transaction_pool,
            wallet,
            pubsub,
        }
    }

    /// Valid pool entries plus a reward for the local wallet are mined into a
    /// block, the chain is broadcast, then the mined and invalid entries leave
    /// the pool. Entries that arrive while mining stay pending.
    ///
    /// Blocks the calling thread for the whole mining loop.
    pub fn mine_transactions(&self) -> Result<LedgerBlock> {
        let (mut transactions, invalid) = {
            let pool = self
                .transaction_pool
                .read()
                .map_err(|_| LedgerError::LockPoisoned("transaction pool"))?;
            let valid = pool.valid_transactions();
            let invalid: Vec<Transaction> = pool
                .transaction_map()
                .values()
                .filter(|t| !valid.iter().any(|v| v.id == t.id))
                .cloned()
                .collect();
            (valid, invalid)
        };
        let reward = {
            let wallet = self
                .wallet
                .read()
                .map_err(|_| LedgerError::LockPoisoned("wallet"))?;
            Transaction::reward(&wallet)
        };
        transactions.push(reward);
        let count = transactions.len();

        let block = self
            .blockchain
            .write()
            .map_err(|_| LedgerError::LockPoisoned("blockchain"))?
            .add_block(transactions)?
            .clone();
        info!(
            "mined {} transactions at difficulty {}",
            count, block.difficulty
        );

        self.pubsub.broadcast_chain()?;

        let mut pool = self
            .transaction_pool
            .write()
            .map_err(|_| LedgerError::LockPoisoned("transaction pool"))?;
        pool.clear_block_transactions(&block);
        pool.discard(&invalid);
        Ok(block)
    }
}
