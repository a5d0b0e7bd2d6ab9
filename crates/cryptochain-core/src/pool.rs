use crate::block::LedgerBlock;
use crate::chain::SharedChain;
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use crate::wallet::SharedWallet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Pending transactions keyed by id.
pub type TransactionMap = HashMap<String, Transaction>;

pub type SharedPool = Arc<RwLock<TransactionPool>>;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPool {
    transaction_map: TransactionMap,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_map(&self) -> &TransactionMap {
        &self.transaction_map
    }

    pub fn len(&self) -> usize {
        self.transaction_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_map.is_empty()
    }

    /// Inserts or replaces by id.
    pub fn set_transaction(&mut self, transaction: Transaction) {
        self.transaction_map
            .insert(transaction.id.clone(), transaction);
    }

    /// Replaces every entry, e.g. with a map fetched from the root node.
    pub fn set_map(&mut self, transaction_map: TransactionMap) {
        self.transaction_map = transaction_map;
    }

    /// The pending transaction sent from `input_address`, if any.
    pub fn existing_transaction(&self, input_address: &str) -> Option<&Transaction> {
        self.transaction_map
            .values()
            .find(|t| t.input.address == input_address)
    }

    /// Entries that pass [`Transaction::valid_transaction`]; invalid ones are
    /// logged and skipped.
    pub fn valid_transactions(&self) -> Vec<Transaction> {
        self.transaction_map
            .values()
            .filter(|t| t.valid_transaction())
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.transaction_map.clear();
    }

    /// Drops only the entries committed in `chain`, keeping unrelated pending ones.
    pub fn clear_blockchain_transactions(&mut self, chain: &[LedgerBlock]) {
        for block in chain.iter().skip(1) {
            self.clear_block_transactions(block);
        }
    }

    /// Drops the entries committed in `block`.
    pub fn clear_block_transactions(&mut self, block: &LedgerBlock) {
        for transaction in &block.data {
            if self.transaction_map.remove(&transaction.id).is_some() {
                debug!("dropped committed transaction {}", transaction.id);
            }
        }
    }

    /// Drops each of `stale` whose entry has not been replaced since.
    pub fn discard(&mut self, stale: &[Transaction]) {
        for transaction in stale {
            if self.transaction_map.get(&transaction.id) == Some(transaction) {
                self.transaction_map.remove(&transaction.id);
                debug!("discarded invalid transaction {}", transaction.id);
            }
        }
    }
}

/// Sends `amount` to `recipient` from `wallet` and records the transfer in
/// `pool`. A transfer already pending from the wallet is extended rather
/// than duplicated; otherwise a new one is built against the current chain.
///
/// Locks are taken in the order chain, wallet, pool.
pub fn transact(
    blockchain: &SharedChain,
    wallet: &SharedWallet,
    pool: &SharedPool,
    recipient: &str,
    amount: u64,
) -> Result<Transaction> {
    let blockchain = blockchain
        .read()
        .map_err(|_| LedgerError::LockPoisoned("blockchain"))?;
    let mut wallet = wallet
        .write()
        .map_err(|_| LedgerError::LockPoisoned("wallet"))?;
    let mut pool = pool
        .write()
        .map_err(|_| LedgerError::LockPoisoned("transaction pool"))?;

    let transaction = match pool.existing_transaction(wallet.public_key()) {
        Some(existing) => existing.update(&wallet, recipient, amount)?,
        None => wallet.create_transaction(recipient, amount, Some(blockchain.chain()))?,
    };
    pool.set_transaction(transaction.clone());
    Ok(transaction)
}
