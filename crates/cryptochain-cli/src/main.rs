use anyhow::Result;
use clap::{Parser, Subcommand};
use cryptochain_core::Blockchain;
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cryptochain-cli")]
#[command(about = "CLI client for a cryptochain node")]
struct Cli {
    /// Node base URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:3000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node's chain
    Blocks,
    /// Send coins from the node's wallet
    Transact {
        /// Recipient address
        #[arg(long)]
        recipient: String,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Mine the node's pending transactions into a block
    Mine,
    /// Print the node's pending transactions
    Pool,
    /// Print the node's wallet address and balance
    Wallet,
    /// Mine locally and report how block time tracks the difficulty
    AverageWork {
        /// Number of blocks to mine
        #[arg(long, default_value_t = 100)]
        blocks: usize,
    },
}

#[derive(Serialize)]
struct Transact {
    recipient: String,
    amount: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Blocks => print_response(client.get(format!("{node}/api/blocks"))).await?,
        Command::Transact { recipient, amount } => {
            let body = Transact { recipient, amount };
            print_response(client.post(format!("{node}/api/transact")).json(&body)).await?
        }
        Command::Mine => {
            print_response(client.get(format!("{node}/api/mine-transactions"))).await?
        }
        Command::Pool => {
            print_response(client.get(format!("{node}/api/transaction-pool-map"))).await?
        }
        Command::Wallet => print_response(client.get(format!("{node}/api/wallet-info"))).await?,
        Command::AverageWork { blocks } => {
            tokio::task::spawn_blocking(move || average_work(blocks)).await??
        }
    }
    Ok(())
}

async fn print_response(request: reqwest::RequestBuilder) -> Result<()> {
    let res = request.send().await?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

/// Mines `blocks` blocks on a scratch chain and prints each block's time,
/// its difficulty and the running average block time.
fn average_work(blocks: usize) -> Result<()> {
    let mut chain = Blockchain::<Value>::new();
    // the genesis timestamp is a constant, so time from a mined block
    chain.add_block(json!("initial"))?;
    let mut times = Vec::with_capacity(blocks);

    for i in 0..blocks {
        let previous = chain.tip().timestamp;
        let block = chain.add_block(json!(format!("block {i}")))?;
        let time_diff = block.timestamp.saturating_sub(previous);
        let difficulty = block.difficulty;
        times.push(time_diff);

        let average = times.iter().sum::<u64>() / times.len() as u64;
        println!(
            "time to mine block: {time_diff}ms. difficulty: {difficulty}. average time: {average}ms"
        );
    }
    Ok(())
}
