use crate::constants::{
    GENESIS_HASH, GENESIS_LAST_HASH, GENESIS_NONCE, GENESIS_TIMESTAMP, INITIAL_DIFFICULTY,
};
use crate::crypto::{crypto_hash, stringify};
use crate::error::{Result, ValidationFailure};
use crate::transaction::Transaction;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;

/// Content a block can carry.
///
/// Each payload type names its own genesis value and may check chain-wide
/// rules over the blocks that carry it. Opaque payloads check nothing.
pub trait Payload:
    Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static
{
    fn genesis_data() -> Self;

    fn validate_chain_data(_chain: &[Block<Self>]) -> std::result::Result<(), ValidationFailure> {
        Ok(())
    }
}

/// Opaque data, e.g. a plain string or any JSON document.
impl Payload for serde_json::Value {
    fn genesis_data() -> Self {
        serde_json::Value::Array(Vec::new())
    }
}

impl Payload for Vec<Transaction> {
    fn genesis_data() -> Self {
        Vec::new()
    }

    fn validate_chain_data(chain: &[Block<Self>]) -> std::result::Result<(), ValidationFailure> {
        crate::chain::validate_transaction_data(chain)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block<T> {
    pub timestamp: u64,
    pub last_hash: String,
    pub hash: String,
    pub data: T,
    pub nonce: u64,
    pub difficulty: u32,
}

pub type LedgerBlock = Block<Vec<Transaction>>;

impl<T: Payload> Block<T> {
    /// The fixed first block every node starts from. It is never mined.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            data: T::genesis_data(),
            nonce: GENESIS_NONCE,
            difficulty: INITIAL_DIFFICULTY,
        }
    }

    pub fn is_genesis(&self) -> bool {
        *self == Self::genesis()
    }

    /// Recomputes the hash from the block's own fields.
    pub fn compute_hash(&self) -> Result<String> {
        Ok(hash_fields(
            self.timestamp,
            &stringify(&self.last_hash)?,
            &stringify(&self.data)?,
            self.nonce,
            self.difficulty,
        ))
    }
}

/// Block hash over already-stringified `last_hash` and `data`, which stay
/// fixed across mining attempts.
pub(crate) fn hash_fields(
    timestamp: u64,
    last_hash_json: &str,
    data_json: &str,
    nonce: u64,
    difficulty: u32,
) -> String {
    crypto_hash(&[
        timestamp.to_string().as_str(),
        last_hash_json,
        data_json,
        nonce.to_string().as_str(),
        difficulty.to_string().as_str(),
    ])
}
