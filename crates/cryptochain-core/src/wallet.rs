use crate::block::LedgerBlock;
use crate::constants::STARTING_BALANCE;
use crate::crypto::KeyPair;
use crate::error::Result;
use crate::transaction::Transaction;
use serde::Serialize;
use std::sync::{Arc, RwLock};

pub type SharedWallet = Arc<RwLock<Wallet>>;

/// A key pair and the balance it last knew about.
///
/// `balance` is a cache: [`Wallet::calculate_balance`] over a chain is the
/// source of truth, and `create_transaction` refreshes it when given a chain.
#[derive(Clone, Debug)]
pub struct Wallet {
    pub balance: u64,
    keys: KeyPair,
    public_key: String,
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet {
    pub fn new() -> Self {
        let keys = KeyPair::generate();
        let public_key = keys.public_key_hex();
        Self {
            balance: STARTING_BALANCE,
            keys,
            public_key,
        }
    }

    /// Hex public key, also the wallet's address.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn sign<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        self.keys.sign(data)
    }

    pub fn create_transaction(
        &mut self,
        recipient: &str,
        amount: u64,
        chain: Option<&[LedgerBlock]>,
    ) -> Result<Transaction> {
        if let Some(chain) = chain {
            self.balance = Self::calculate_balance(chain, &self.public_key);
        }
        Transaction::new(self, recipient, amount)
    }

    /// Balance of `address` as recorded on `chain`.
    ///
    /// Walks back from the tip. The newest block in which `address` spent
    /// already holds its change output, so the walk stops once that block has
    /// been summed; older outputs are covered by that change. Only an address
    /// that never spent gets [`STARTING_BALANCE`] on top.
    pub fn calculate_balance(chain: &[LedgerBlock], address: &str) -> u64 {
        let mut has_conducted_transaction = false;
        let mut outputs_total = 0u64;

        for block in chain.iter().skip(1).rev() {
            for transaction in &block.data {
                if transaction.input.address == address {
                    has_conducted_transaction = true;
                }
                if let Some(output) = transaction.output_map.get(address) {
                    outputs_total = outputs_total.saturating_add(*output);
                }
            }
            if has_conducted_transaction {
                break;
            }
        }

        if has_conducted_transaction {
            outputs_total
        } else {
            STARTING_BALANCE.saturating_add(outputs_total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Ledger;
    use crate::crypto::verify_signature;
    use crate::error::LedgerError;

    #[test]
    fn wallet_example() {
        let wallet = Wallet::new();
        assert_eq!(wallet.balance, STARTING_BALANCE);
        assert_eq!(wallet.public_key().len(), 66);
    }

    #[test]
    fn signing_data() {
        let wallet = Wallet::new();
        let signature = wallet.sign("testsignature").unwrap();
        assert!(verify_signature(wallet.public_key(), "testsignature", &signature));

        let other = Wallet::new().sign("testsignature").unwrap();
        assert!(!verify_signature(wallet.public_key(), "testsignature", &other));
    }

    #[test]
    fn create_transaction_refuses_overspend() {
        let mut wallet = Wallet::new();
        let err = wallet
            .create_transaction("dodgy-recipient", 999_999, None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    #[test]
    fn create_transaction_example() {
        let mut wallet = Wallet::new();
        let transaction = wallet.create_transaction("R", 75, None).unwrap();

        assert_eq!(transaction.input.address, wallet.public_key());
        assert_eq!(transaction.input.amount, 1000);
        assert_eq!(transaction.output_map.len(), 2);
        assert_eq!(transaction.output_map["R"], 75);
        assert_eq!(transaction.output_map[wallet.public_key()], 925);
    }

    #[test]
    fn create_transaction_refreshes_balance_from_chain() {
        let mut ledger = Ledger::new();
        let mut wallet = Wallet::new();
        let incoming = Wallet::new()
            .create_transaction(wallet.public_key(), 100, None)
            .unwrap();
        ledger.add_block(vec![incoming]).unwrap();
        wallet.balance = 0;

        let transaction = wallet
            .create_transaction("R", 1050, Some(ledger.chain()))
            .unwrap();
        assert_eq!(wallet.balance, STARTING_BALANCE + 100);
        assert_eq!(transaction.input.amount, STARTING_BALANCE + 100);
    }

    #[test]
    fn balance_without_outputs_is_starting_balance() {
        let ledger = Ledger::new();
        let wallet = Wallet::new();
        assert_eq!(
            Wallet::calculate_balance(ledger.chain(), wallet.public_key()),
            STARTING_BALANCE
        );
    }

    #[test]
    fn balance_adds_received_outputs() {
        let mut ledger = Ledger::new();
        let wallet = Wallet::new();
        let one = Wallet::new()
            .create_transaction(wallet.public_key(), 50, None)
            .unwrap();
        let two = Wallet::new()
            .create_transaction(wallet.public_key(), 100, None)
            .unwrap();
        ledger.add_block(vec![one, two]).unwrap();

        assert_eq!(
            Wallet::calculate_balance(ledger.chain(), wallet.public_key()),
            STARTING_BALANCE + 50 + 100
        );
    }

    #[test]
    fn balance_after_spending_is_the_change_output() {
        let mut ledger = Ledger::new();
        let mut wallet = Wallet::new();
        let one = Wallet::new()
            .create_transaction(wallet.public_key(), 50, None)
            .unwrap();
        ledger.add_block(vec![one]).unwrap();

        let recent = wallet
            .create_transaction("test-recipient", 10, Some(ledger.chain()))
            .unwrap();
        let change = recent.output_map[wallet.public_key()];
        ledger.add_block(vec![recent]).unwrap();

        assert_eq!(
            Wallet::calculate_balance(ledger.chain(), wallet.public_key()),
            change
        );
        assert_eq!(change, STARTING_BALANCE + 50 - 10);
    }

    #[test]
    fn balance_counts_outputs_beside_and_after_the_last_spend() {
        let mut ledger = Ledger::new();
        let mut wallet = Wallet::new();

        let recent = wallet
            .create_transaction("later-recipient", 25, Some(ledger.chain()))
            .unwrap();
        let same_block = Transaction::reward(&wallet);
        let expected_change = recent.output_map[wallet.public_key()];
        let expected_reward = same_block.output_map[wallet.public_key()];
        ledger.add_block(vec![recent, same_block]).unwrap();

        let next_block = Wallet::new()
            .create_transaction(wallet.public_key(), 100, None)
            .unwrap();
        ledger.add_block(vec![next_block]).unwrap();

        assert_eq!(
            Wallet::calculate_balance(ledger.chain(), wallet.public_key()),
            expected_change + expected_reward + 100
        );
    }

    #[test]
    fn balance_ignores_blocks_before_the_last_spend() {
        let mut ledger = Ledger::new();
        let mut wallet = Wallet::new();

        let early = Wallet::new()
            .create_transaction(wallet.public_key(), 40, None)
            .unwrap();
        ledger.add_block(vec![early]).unwrap();
        let spend = wallet
            .create_transaction("someone", 30, Some(ledger.chain()))
            .unwrap();
        ledger.add_block(vec![spend]).unwrap();

        // the early 40 is already inside the change, so it must not count twice
        assert_eq!(
            Wallet::calculate_balance(ledger.chain(), wallet.public_key()),
            STARTING_BALANCE + 40 - 30
        );
    }
}
