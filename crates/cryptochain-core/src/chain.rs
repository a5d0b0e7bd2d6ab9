use crate::block::{Block, LedgerBlock, Payload};
use crate::constants::MINING_REWARD;
use crate::error::{RejectReason, Result, ValidationFailure};
use crate::mine::meets_difficulty;
use crate::transaction::Transaction;
use crate::wallet::Wallet;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tracing::{error, info};

/// Ordered blocks starting at genesis. Grows by local mining or is swapped
/// wholesale for a longer valid chain; it never shrinks otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct Blockchain<T> {
    chain: Vec<Block<T>>,
}

/// A chain whose blocks carry transactions.
pub type Ledger = Blockchain<Vec<Transaction>>;

pub type SharedChain = Arc<RwLock<Ledger>>;

/// A candidate chain that passed [`Blockchain::check_candidate`].
#[derive(Debug)]
pub struct CheckedChain<T> {
    blocks: Vec<Block<T>>,
}

impl<T> CheckedChain<T> {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl<T: Payload> Default for Blockchain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Payload> Blockchain<T> {
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
        }
    }

    pub fn chain(&self) -> &[Block<T>] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn tip(&self) -> &Block<T> {
        // never empty: `new` seeds genesis and replacements are validated
        &self.chain[self.chain.len() - 1]
    }

    /// Mines `data` on top of the current tip and appends the result.
    pub fn add_block(&mut self, data: T) -> Result<&Block<T>> {
        let block = Block::mine(self.tip(), data)?;
        info!(
            "added block {} at difficulty {}",
            self.chain.len(),
            block.difficulty
        );
        self.chain.push(block);
        Ok(self.tip())
    }

    pub fn replace_chain(&mut self, candidate: Vec<Block<T>>) -> Result<()> {
        self.replace_chain_with(candidate, |_| {})
    }

    /// Swaps in `candidate` when it is strictly longer and fully valid.
    ///
    /// `on_success` sees the accepted chain just before the swap; it does not
    /// run on rejection. A rejected candidate leaves the local chain untouched.
    pub fn replace_chain_with<F>(&mut self, candidate: Vec<Block<T>>, on_success: F) -> Result<()>
    where
        F: FnOnce(&[Block<T>]),
    {
        self.check_longer(candidate.len())?;
        let checked = Self::check_candidate(candidate)?;
        self.adopt_with(checked, on_success)
    }

    /// Runs every validity rule on `candidate` without touching any local
    /// chain, so callers can validate before taking a write lock.
    pub fn check_candidate(candidate: Vec<Block<T>>) -> Result<CheckedChain<T>> {
        if let Err(failure) =
            Self::validate_chain(&candidate).and_then(|()| T::validate_chain_data(&candidate))
        {
            let reason = RejectReason::Invalid(failure);
            error!("{}", reason);
            return Err(reason.into());
        }
        Ok(CheckedChain { blocks: candidate })
    }

    /// Swaps in an already checked chain if it is still strictly longer.
    pub fn adopt_with<F>(&mut self, checked: CheckedChain<T>, on_success: F) -> Result<()>
    where
        F: FnOnce(&[Block<T>]),
    {
        self.check_longer(checked.len())?;
        on_success(&checked.blocks);
        info!(
            "replacing chain of {} blocks with {} blocks",
            self.chain.len(),
            checked.len()
        );
        self.chain = checked.blocks;
        Ok(())
    }

    /// Rejects an incoming chain of `incoming` blocks unless it is strictly longer.
    pub fn check_longer(&self, incoming: usize) -> Result<()> {
        if incoming <= self.chain.len() {
            let reason = RejectReason::NotLonger {
                incoming,
                local: self.chain.len(),
            };
            error!("{}", reason);
            return Err(reason.into());
        }
        Ok(())
    }

    pub fn is_valid_chain(chain: &[Block<T>]) -> bool {
        Self::validate_chain(chain).is_ok()
    }

    /// Structural checks: genesis anchor, hash links, recomputed hashes,
    /// proof of work and difficulty steps of at most one.
    pub fn validate_chain(chain: &[Block<T>]) -> std::result::Result<(), ValidationFailure> {
        let first = chain.first().ok_or(ValidationFailure::EmptyChain)?;
        if !first.is_genesis() {
            return Err(ValidationFailure::GenesisMismatch);
        }

        let failures: Vec<ValidationFailure> = chain
            .par_windows(2)
            .enumerate()
            .filter_map(|(i, pair)| validate_link(i + 1, &pair[0], &pair[1]).err())
            .collect();

        // report the earliest broken block
        match failures.into_iter().min_by_key(failure_index) {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

fn validate_link<T: Payload>(
    index: usize,
    previous: &Block<T>,
    block: &Block<T>,
) -> std::result::Result<(), ValidationFailure> {
    if block.last_hash != previous.hash {
        return Err(ValidationFailure::BrokenLink { index });
    }

    match block.compute_hash() {
        Ok(hash) if hash == block.hash => {}
        _ => return Err(ValidationFailure::HashMismatch { index }),
    }

    if previous.difficulty.abs_diff(block.difficulty) > 1 {
        return Err(ValidationFailure::DifficultyJump {
            index,
            previous: previous.difficulty,
            current: block.difficulty,
        });
    }

    if !meets_difficulty(&block.hash, block.difficulty) {
        return Err(ValidationFailure::InsufficientWork {
            index,
            difficulty: block.difficulty,
        });
    }
    Ok(())
}

fn failure_index(failure: &ValidationFailure) -> usize {
    match failure {
        ValidationFailure::BrokenLink { index }
        | ValidationFailure::HashMismatch { index }
        | ValidationFailure::DifficultyJump { index, .. }
        | ValidationFailure::InsufficientWork { index, .. }
        | ValidationFailure::MultipleRewards { index }
        | ValidationFailure::InvalidReward { index }
        | ValidationFailure::DuplicateTransaction { index, .. } => *index,
        _ => 0,
    }
}

impl Ledger {
    pub fn valid_transaction_data(chain: &[LedgerBlock]) -> bool {
        validate_transaction_data(chain).is_ok()
    }

    /// Mines `data` onto the tip only if it would pass the transaction rules
    /// as the next block.
    pub fn add_valid_block(&mut self, data: Vec<Transaction>) -> Result<&LedgerBlock> {
        validate_block_data(&self.chain, &data)?;
        self.add_block(data)
    }
}

/// Transaction rules for every non-genesis block of `chain`:
/// at most one reward per block paying exactly [`MINING_REWARD`]; every
/// other transaction valid, declaring the sender's true balance as of the
/// blocks before it, and present at most once in its block.
pub fn validate_transaction_data(chain: &[LedgerBlock]) -> std::result::Result<(), ValidationFailure> {
    for (index, block) in chain.iter().enumerate().skip(1) {
        validate_block_data(&chain[..index], &block.data)?;
    }
    Ok(())
}

/// Transaction rules for `data` as the payload of the block that follows `prefix`.
pub fn validate_block_data(
    prefix: &[LedgerBlock],
    data: &[Transaction],
) -> std::result::Result<(), ValidationFailure> {
    let index = prefix.len();
    let mut seen = HashSet::new();
    let mut reward_count = 0usize;

    for transaction in data {
        let outcome = if transaction.is_reward() {
            reward_count += 1;
            check_reward(index, reward_count, transaction)
        } else {
            check_transfer(prefix, index, transaction, &mut seen)
        };
        if let Err(failure) = outcome {
            error!("invalid transaction data: {}", failure);
            return Err(failure);
        }
    }
    Ok(())
}

fn check_reward(
    index: usize,
    reward_count: usize,
    transaction: &Transaction,
) -> std::result::Result<(), ValidationFailure> {
    if reward_count > 1 {
        return Err(ValidationFailure::MultipleRewards { index });
    }
    let mut outputs = transaction.output_map.values();
    match (outputs.next(), outputs.next()) {
        (Some(&MINING_REWARD), None) => Ok(()),
        _ => Err(ValidationFailure::InvalidReward { index }),
    }
}

fn check_transfer<'a>(
    prefix: &[LedgerBlock],
    index: usize,
    transaction: &'a Transaction,
    seen: &mut HashSet<&'a str>,
) -> std::result::Result<(), ValidationFailure> {
    transaction.validate()?;

    let true_balance = Wallet::calculate_balance(prefix, &transaction.input.address);
    if transaction.input.amount != true_balance {
        return Err(ValidationFailure::InputAmountMismatch {
            id: transaction.id.clone(),
            declared: transaction.input.amount,
            actual: true_balance,
        });
    }

    if !seen.insert(transaction.id.as_str()) {
        return Err(ValidationFailure::DuplicateTransaction {
            id: transaction.id.clone(),
            index,
        });
    }
    Ok(())
}
