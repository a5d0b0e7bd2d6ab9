//! The seam between the ledger and whatever carries messages between peers.
//!
//! Outbound, the ledger only needs [`Transport::publish`]. Inbound, the
//! transport hands every message to [`PubSub::handle_message`], which routes
//! chains to chain replacement and transactions to the pool. Bad input from a
//! peer is logged and dropped there; it never reaches the caller.

use crate::block::LedgerBlock;
use crate::chain::{Ledger, SharedChain};
use crate::error::{LedgerError, Result};
use crate::pool::SharedPool;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Test,
    Blockchain,
    Transaction,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Test, Channel::Blockchain, Channel::Transaction];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Test => "TEST",
            Channel::Blockchain => "BLOCKCHAIN",
            Channel::Transaction => "TRANSACTION",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| LedgerError::UnknownChannel(s.to_string()))
    }
}

/// Outbound half of the peer network.
pub trait Transport: Send + Sync {
    fn publish(&self, channel: Channel, message: String) -> Result<()>;
}

/// Keeps published messages in memory. Useful for a node without peers and
/// for wiring nodes together in-process.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    published: Mutex<Vec<(Channel, String)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains everything published so far.
    pub fn take(&self) -> Result<Vec<(Channel, String)>> {
        let mut published = self
            .published
            .lock()
            .map_err(|_| LedgerError::LockPoisoned("transport"))?;
        Ok(std::mem::take(&mut *published))
    }
}

impl Transport for MemoryTransport {
    fn publish(&self, channel: Channel, message: String) -> Result<()> {
        self.published
            .lock()
            .map_err(|_| LedgerError::LockPoisoned("transport"))?
            .push((channel, message));
        Ok(())
    }
}

pub struct PubSub<T: Transport> {
    blockchain: SharedChain,
    transaction_pool: SharedPool,
    transport: T,
}

impl<T: Transport> PubSub<T> {
    pub fn new(blockchain: SharedChain, transaction_pool: SharedPool, transport: T) -> Self {
        Self {
            blockchain,
            transaction_pool,
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn publish(&self, channel: Channel, message: String) -> Result<()> {
        self.transport.publish(channel, message)
    }

    /// Publishes the whole local chain on [`Channel::Blockchain`].
    pub fn broadcast_chain(&self) -> Result<()> {
        let message = {
            let blockchain = self
                .blockchain
                .read()
                .map_err(|_| LedgerError::LockPoisoned("blockchain"))?;
            serde_json::to_string(blockchain.chain())?
        };
        self.publish(Channel::Blockchain, message)
    }

    pub fn broadcast_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.publish(Channel::Transaction, serde_json::to_string(transaction)?)
    }

    /// Entry point for inbound peer messages. Never fails: anything that cannot
    /// be applied is logged and dropped.
    pub fn handle_message(&self, channel: &str, message: &str) {
        debug!("message received on {}: {} bytes", channel, message.len());
        if let Err(e) = self.apply_message(channel, message) {
            warn!("dropped message on {}: {}", channel, e);
        }
    }

    fn apply_message(&self, channel: &str, message: &str) -> Result<()> {
        match channel.parse::<Channel>()? {
            Channel::Blockchain => {
                let chain: Vec<LedgerBlock> = serde_json::from_str(message)?;
                self.blockchain
                    .read()
                    .map_err(|_| LedgerError::LockPoisoned("blockchain"))?
                    .check_longer(chain.len())?;
                // validation runs with no lock held; the swap re-checks length
                let checked = Ledger::check_candidate(chain)?;

                let mut blockchain = self
                    .blockchain
                    .write()
                    .map_err(|_| LedgerError::LockPoisoned("blockchain"))?;
                let pool = &self.transaction_pool;
                blockchain.adopt_with(checked, |accepted| match pool.write() {
                    Ok(mut pool) => pool.clear_blockchain_transactions(accepted),
                    Err(_) => warn!("transaction pool lock poisoned; committed entries kept"),
                })
            }
            Channel::Transaction => {
                let transaction: Transaction = serde_json::from_str(message)?;
                info!("received transaction {}", transaction.id);
                self.transaction_pool
                    .write()
                    .map_err(|_| LedgerError::LockPoisoned("transaction pool"))?
                    .set_transaction(transaction);
                Ok(())
            }
            Channel::Test => {
                info!("test message: {}", message);
                Ok(())
            }
        }
    }
}
