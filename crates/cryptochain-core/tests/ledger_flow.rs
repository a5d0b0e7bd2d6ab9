use cryptochain_core::{
    transact, Block, Channel, Ledger, LedgerBlock, MemoryTransport, PubSub, SharedChain,
    SharedPool, SharedWallet, Transaction, TransactionMiner, TransactionPool, Wallet,
};
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};

struct Node {
    blockchain: SharedChain,
    pool: SharedPool,
    wallet: SharedWallet,
    pubsub: Arc<PubSub<MemoryTransport>>,
    miner: TransactionMiner<MemoryTransport>,
}

impl Node {
    fn new() -> Self {
        let blockchain = Arc::new(RwLock::new(Ledger::new()));
        let pool = Arc::new(RwLock::new(TransactionPool::new()));
        let wallet = Arc::new(RwLock::new(Wallet::new()));
        let pubsub = Arc::new(PubSub::new(
            blockchain.clone(),
            pool.clone(),
            MemoryTransport::new(),
        ));
        let miner = TransactionMiner::new(
            blockchain.clone(),
            pool.clone(),
            wallet.clone(),
            pubsub.clone(),
        );
        Self {
            blockchain,
            pool,
            wallet,
            pubsub,
            miner,
        }
    }

    fn address(&self) -> String {
        self.wallet.read().unwrap().public_key().to_string()
    }

    fn transact(&self, recipient: &str, amount: u64) -> anyhow::Result<Transaction> {
        Ok(transact(&self.blockchain, &self.wallet, &self.pool, recipient, amount)?)
    }

    /// Delivers everything this node published to `peer`.
    fn deliver_to(&self, peer: &Node) -> anyhow::Result<()> {
        for (channel, message) in self.pubsub.transport().take()? {
            peer.pubsub.handle_message(channel.as_str(), &message);
        }
        Ok(())
    }
}

#[test]
fn test_genesis_only_chain_is_valid() {
    let ledger = Ledger::new();
    assert!(Ledger::is_valid_chain(ledger.chain()));
    assert!(Ledger::valid_transaction_data(ledger.chain()));
}

#[test]
fn test_bogus_last_hash_is_invalid() -> anyhow::Result<()> {
    let mut chain = cryptochain_core::Blockchain::<Value>::new();
    chain.add_block(json!("B1"))?;
    let mut blocks = chain.chain().to_vec();
    blocks[1].last_hash = "bogus".to_string();
    assert!(!cryptochain_core::Blockchain::<Value>::is_valid_chain(&blocks));
    Ok(())
}

#[test]
fn test_transaction_of_75_from_fresh_wallet() -> anyhow::Result<()> {
    let mut wallet = Wallet::new();
    let transaction = wallet.create_transaction("R", 75, None)?;
    assert_eq!(transaction.output_map["R"], 75);
    assert_eq!(transaction.output_map[wallet.public_key()], 925);
    assert_eq!(transaction.input.amount, 1000);
    Ok(())
}

#[test]
fn test_altered_reward_fails_transaction_data() -> anyhow::Result<()> {
    let wallet = Wallet::new();
    let mut reward = Transaction::reward(&wallet);
    reward.output_map.insert(wallet.public_key().to_string(), 51);
    let mut ledger = Ledger::new();
    ledger.add_block(vec![reward])?;
    assert!(!Ledger::valid_transaction_data(ledger.chain()));
    Ok(())
}

#[test]
fn test_chain_round_trip() -> anyhow::Result<()> {
    let mut ledger = Ledger::new();
    let transaction = Wallet::new().create_transaction("R", 10, None)?;
    ledger.add_block(vec![transaction, Transaction::reward(&Wallet::new())])?;

    let text = serde_json::to_string(ledger.chain())?;
    let back: Vec<LedgerBlock> = serde_json::from_str(&text)?;
    assert_eq!(back, ledger.chain());
    assert_eq!(serde_json::to_string(&back)?, text);
    assert!(Ledger::is_valid_chain(&back));
    Ok(())
}

#[test]
fn test_opaque_chain_round_trip() -> anyhow::Result<()> {
    let mut chain = cryptochain_core::Blockchain::<Value>::new();
    chain.add_block(json!({"note": "hello", "n": 1}))?;
    let back: Vec<Block<Value>> = serde_json::from_str(&serde_json::to_string(chain.chain())?)?;
    assert_eq!(back, chain.chain());
    Ok(())
}

#[test]
fn test_transfers_flow_between_two_nodes() -> anyhow::Result<()> {
    let alice = Node::new();
    let bob = Node::new();
    let bob_address = bob.address();

    // alice batches two transfers to bob into one pending transaction
    let first = alice.transact(&bob_address, 30)?;
    let merged = alice.transact(&bob_address, 20)?;
    assert_eq!(first.id, merged.id);
    assert_eq!(merged.output_map[&bob_address], 50);
    assert_eq!(alice.pool.read().unwrap().len(), 1);

    alice.pubsub.broadcast_transaction(&merged)?;
    alice.deliver_to(&bob)?;
    assert_eq!(bob.pool.read().unwrap().transaction_map()[&merged.id], merged);

    // alice mines; bob adopts her chain and drops the committed transfer
    alice.miner.mine_transactions()?;
    alice.deliver_to(&bob)?;

    assert_eq!(
        *bob.blockchain.read().unwrap(),
        *alice.blockchain.read().unwrap()
    );
    assert!(bob.pool.read().unwrap().is_empty());

    let chain = bob.blockchain.read().unwrap();
    assert_eq!(Wallet::calculate_balance(chain.chain(), &bob_address), 1050);
    assert_eq!(
        Wallet::calculate_balance(chain.chain(), &alice.address()),
        1000 - 50 + 50
    );
    Ok(())
}

#[test]
fn test_peer_keeps_unrelated_pending_transactions() -> anyhow::Result<()> {
    let alice = Node::new();
    let bob = Node::new();

    let from_alice = alice.transact("carol", 10)?;
    alice.pubsub.broadcast_transaction(&from_alice)?;
    alice.deliver_to(&bob)?;
    let from_bob = bob.transact("dave", 20)?;

    alice.miner.mine_transactions()?;
    alice.deliver_to(&bob)?;

    let pool = bob.pool.read().unwrap();
    assert_eq!(pool.len(), 1);
    assert!(pool.transaction_map().contains_key(&from_bob.id));
    Ok(())
}

#[test]
fn test_second_round_uses_on_chain_balance() -> anyhow::Result<()> {
    let alice = Node::new();
    alice.transact("carol", 100)?;
    alice.miner.mine_transactions()?;

    let second = alice.transact("carol", 100)?;
    // change 900 plus the 50 reward from the first block
    assert_eq!(second.input.amount, 950);
    alice.miner.mine_transactions()?;

    let chain = alice.blockchain.read().unwrap();
    assert!(Ledger::valid_transaction_data(chain.chain()));
    assert_eq!(Wallet::calculate_balance(chain.chain(), "carol"), 1200);
    Ok(())
}

#[test]
fn test_tampered_broadcast_is_ignored() -> anyhow::Result<()> {
    let alice = Node::new();
    let bob = Node::new();
    alice.transact("carol", 10)?;
    alice.miner.mine_transactions()?;

    let mut published = alice.pubsub.transport().take()?;
    assert_eq!(published.len(), 1);
    let (channel, message) = published.remove(0);
    assert_eq!(channel, Channel::Blockchain);

    let mut chain: Vec<LedgerBlock> = serde_json::from_str(&message)?;
    chain[1].data[0].output_map.insert("carol".to_string(), 900);
    bob.pubsub
        .handle_message(channel.as_str(), &serde_json::to_string(&chain)?);

    assert_eq!(bob.blockchain.read().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_inbound_messages_while_mining() -> anyhow::Result<()> {
    let node = Arc::new(Node::new());
    node.transact("carol", 10)?;

    let miner_node = node.clone();
    let mining = tokio::task::spawn_blocking(move || miner_node.miner.mine_transactions());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let node = node.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let transaction = Wallet::new()
                .create_transaction("erin", 1, None)
                .expect("fresh wallet covers the transfer");
            let message = serde_json::to_string(&transaction).expect("serializes");
            node.pubsub.handle_message("TRANSACTION", &message);
            transaction.id
        }));
    }
    let mut arrived = Vec::new();
    for handle in handles {
        arrived.push(handle.await?);
    }
    let block = mining.await??;

    let chain = node.blockchain.read().unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(*chain.tip(), block);
    assert!(Ledger::is_valid_chain(chain.chain()));

    // every inbound transfer is either in the block or still pending
    let pool = node.pool.read().unwrap();
    for id in &arrived {
        let mined = block.data.iter().any(|t| &t.id == id);
        assert!(
            mined != pool.transaction_map().contains_key(id),
            "transaction {id} lost or duplicated"
        );
    }
    Ok(())
}
