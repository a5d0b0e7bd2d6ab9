//! A minimal proof-of-work ledger.
//!
//! Blocks are mined with a self-adjusting leading-zero-bit target and linked
//! by hash. Nodes adopt a peer's chain only when it is longer and valid.
//! Blocks carry signed transfers collected in a shared pending pool.

pub mod block;
pub mod chain;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod mine;
pub mod miner;
pub mod pool;
pub mod pubsub;
pub mod transaction;
pub mod wallet;

pub use block::{Block, LedgerBlock, Payload};
pub use chain::{Blockchain, CheckedChain, Ledger, SharedChain};
pub use error::{LedgerError, RejectReason, Result, ValidationFailure};
pub use miner::TransactionMiner;
pub use pool::{transact, SharedPool, TransactionMap, TransactionPool};
pub use pubsub::{Channel, MemoryTransport, PubSub, Transport};
pub use transaction::{OutputMap, Transaction, TransactionInput};
pub use wallet::{SharedWallet, Wallet};
