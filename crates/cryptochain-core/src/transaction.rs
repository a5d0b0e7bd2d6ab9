//! Signed transfers.
//!
//! A transaction spends the sender's whole balance: the output map sends
//! `amount` to each recipient and the remainder back to the sender's own
//! address, and the input records the balance the outputs must add up to.

use crate::constants::{MINING_REWARD, REWARD_INPUT_ADDRESS};
use crate::crypto::verify_signature;
use crate::error::{LedgerError, Result, ValidationFailure};
use crate::mine::now_millis;
use crate::wallet::Wallet;
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use tracing::error;
use uuid::Uuid;

/// Recipient address to allocated amount, including the sender's change.
///
/// Keeps insertion order: the signature and block hash cover the map as
/// serialized, so a peer's key order must survive a round trip.
pub type OutputMap = IndexMap<String, u64>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub timestamp: u64,
    pub amount: u64,
    pub address: String,
    pub signature: String,
}

impl TransactionInput {
    fn signed(sender: &Wallet, output_map: &OutputMap) -> Result<Self> {
        Ok(Self {
            timestamp: now_millis(),
            amount: sender.balance,
            address: sender.public_key().to_string(),
            signature: sender.sign(output_map)?,
        })
    }

    /// Fixed, unsigned input carried by every mining reward.
    pub fn reward() -> Self {
        Self {
            timestamp: 0,
            amount: 0,
            address: REWARD_INPUT_ADDRESS.to_string(),
            signature: String::new(),
        }
    }

    pub fn is_reward(&self) -> bool {
        self.address == REWARD_INPUT_ADDRESS
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub output_map: OutputMap,
    pub input: TransactionInput,
}

impl Transaction {
    /// Transfers `amount` from `sender` to `recipient`.
    pub fn new(sender: &Wallet, recipient: &str, amount: u64) -> Result<Self> {
        if amount > sender.balance {
            return Err(LedgerError::InsufficientBalance {
                amount,
                balance: sender.balance,
            });
        }

        let mut output_map = OutputMap::new();
        output_map.insert(recipient.to_string(), amount);
        output_map.insert(sender.public_key().to_string(), sender.balance - amount);
        let input = TransactionInput::signed(sender, &output_map)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            output_map,
            input,
        })
    }

    /// Mining reward of [`MINING_REWARD`] paid to `miner`.
    pub fn reward(miner: &Wallet) -> Self {
        let mut output_map = OutputMap::new();
        output_map.insert(miner.public_key().to_string(), MINING_REWARD);
        Self {
            id: Uuid::new_v4().to_string(),
            output_map,
            input: TransactionInput::reward(),
        }
    }

    pub fn is_reward(&self) -> bool {
        self.input.is_reward()
    }

    /// Returns a copy of this transaction, under the same id, that also sends
    /// `amount` to `recipient` out of the sender's remaining change. The copy
    /// is re-signed by `sender`.
    pub fn update(&self, sender: &Wallet, recipient: &str, amount: u64) -> Result<Self> {
        let remaining = self
            .output_map
            .get(sender.public_key())
            .copied()
            .unwrap_or_default();
        if amount > remaining {
            return Err(LedgerError::InsufficientBalance {
                amount,
                balance: remaining,
            });
        }

        let mut output_map = self.output_map.clone();
        *output_map.entry(recipient.to_string()).or_insert(0) += amount;
        let change = output_map
            .entry(sender.public_key().to_string())
            .or_insert(0);
        *change -= amount;
        let input = TransactionInput::signed(sender, &output_map)?;

        Ok(Self {
            id: self.id.clone(),
            output_map,
            input,
        })
    }

    /// Outputs must add up to the input amount and the signature must verify.
    pub fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        let total: u128 = self.output_map.values().map(|v| u128::from(*v)).sum();
        if total != u128::from(self.input.amount) {
            return Err(ValidationFailure::OutputTotalMismatch {
                id: self.id.clone(),
                total,
                input: self.input.amount,
            });
        }

        if !verify_signature(&self.input.address, &self.output_map, &self.input.signature) {
            return Err(ValidationFailure::InvalidSignature {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    pub fn valid_transaction(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                error!("invalid transaction from {}: {}", self.input.address, e);
                false
            }
        }
    }
}
