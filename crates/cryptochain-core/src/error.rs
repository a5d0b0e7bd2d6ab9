//! Error types shared by every ledger component.

use thiserror::Error;

/// A broken chain or transaction rule. Reported and rejected, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("chain is empty")]
    EmptyChain,

    #[error("chain does not start with the genesis block")]
    GenesisMismatch,

    #[error("block {index} does not link to the hash of its predecessor")]
    BrokenLink { index: usize },

    #[error("block {index} hash does not match its contents")]
    HashMismatch { index: usize },

    #[error("block {index} difficulty jumps from {previous} to {current}")]
    DifficultyJump {
        index: usize,
        previous: u32,
        current: u32,
    },

    #[error("block {index} hash does not carry {difficulty} leading zero bits")]
    InsufficientWork { index: usize, difficulty: u32 },

    #[error("block {index} carries more than one mining reward")]
    MultipleRewards { index: usize },

    #[error("block {index} carries a malformed mining reward")]
    InvalidReward { index: usize },

    #[error("transaction {id} outputs total {total} against an input of {input}")]
    OutputTotalMismatch { id: String, total: u128, input: u64 },

    #[error("transaction {id} has an invalid signature")]
    InvalidSignature { id: String },

    #[error("transaction {id} declares an input of {declared} but the sender holds {actual}")]
    InputAmountMismatch {
        id: String,
        declared: u64,
        actual: u64,
    },

    #[error("transaction {id} appears more than once in block {index}")]
    DuplicateTransaction { id: String, index: usize },
}

/// Why an incoming chain did not replace the local one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("the incoming chain must be longer ({incoming} <= {local} blocks)")]
    NotLonger { incoming: usize, local: usize },

    #[error("the incoming chain must be valid: {0}")]
    Invalid(#[from] ValidationFailure),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("amount {amount} exceeds balance {balance}")]
    InsufficientBalance { amount: u64, balance: u64 },

    #[error("chain replacement rejected: {0}")]
    ReplacementRejected(#[from] RejectReason),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("signature error: {0}")]
    Crypto(#[from] secp256k1::Error),

    #[error("hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("mining cancelled")]
    MiningCancelled,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
