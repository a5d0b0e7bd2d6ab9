use crate::transport::HttpTransport;
use cryptochain_core::{
    Ledger, LedgerBlock, LedgerError, PubSub, Result, SharedChain, SharedPool, SharedWallet,
    Transaction, TransactionMiner, TransactionPool, Wallet,
};
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard};

/// Everything a request handler can reach. Locks are always taken in the
/// order chain, wallet, pool.
#[derive(Clone)]
pub struct AppState {
    pub blockchain: SharedChain,
    pub pool: SharedPool,
    pub wallet: SharedWallet,
    pub pubsub: Arc<PubSub<HttpTransport>>,
    pub miner: Arc<TransactionMiner<HttpTransport>>,
}

#[derive(Debug, Serialize)]
pub struct WalletInfo {
    pub address: String,
    pub balance: u64,
}

impl AppState {
    pub fn new(transport: HttpTransport) -> Self {
        let blockchain = Arc::new(RwLock::new(Ledger::new()));
        let pool = Arc::new(RwLock::new(TransactionPool::new()));
        let wallet = Arc::new(RwLock::new(Wallet::new()));
        let pubsub = Arc::new(PubSub::new(blockchain.clone(), pool.clone(), transport));
        let miner = Arc::new(TransactionMiner::new(
            blockchain.clone(),
            pool.clone(),
            wallet.clone(),
            pubsub.clone(),
        ));
        Self {
            blockchain,
            pool,
            wallet,
            pubsub,
            miner,
        }
    }

    pub fn chain(&self) -> Result<RwLockReadGuard<'_, Ledger>> {
        self.blockchain
            .read()
            .map_err(|_| LedgerError::LockPoisoned("blockchain"))
    }

    pub fn pool(&self) -> Result<RwLockReadGuard<'_, TransactionPool>> {
        self.pool
            .read()
            .map_err(|_| LedgerError::LockPoisoned("transaction pool"))
    }

    /// Sends `amount` to `recipient` from the local wallet. A transfer already
    /// pending from this wallet is extended rather than duplicated.
    pub fn transact(&self, recipient: &str, amount: u64) -> Result<Transaction> {
        cryptochain_core::transact(&self.blockchain, &self.wallet, &self.pool, recipient, amount)
    }

    /// Mines caller-supplied transactions into the next block and broadcasts
    /// the chain. Data that would break the transaction rules is refused
    /// before any work is done.
    pub fn mine(&self, data: Vec<Transaction>) -> Result<LedgerBlock> {
        let block = self
            .blockchain
            .write()
            .map_err(|_| LedgerError::LockPoisoned("blockchain"))?
            .add_valid_block(data)?
            .clone();
        self.pubsub.broadcast_chain()?;
        Ok(block)
    }

    pub fn wallet_info(&self) -> Result<WalletInfo> {
        let blockchain = self.chain()?;
        let address = self
            .wallet
            .read()
            .map_err(|_| LedgerError::LockPoisoned("wallet"))?
            .public_key()
            .to_string();
        let balance = Wallet::calculate_balance(blockchain.chain(), &address);
        Ok(WalletInfo { address, balance })
    }
}
