//! Checkpoint Bot
//!
//! Creates the current Hyperdrive checkpoint whenever it is missing, then
//! sleeps until the next checkpoint boundary.
//!
//! Usage:
//!     cargo run --release --bin checkpoint-bot -- --env-file .env

use anyhow::{Context, Result};
use clap::Parser;
use hyperdrive_bots::config::{load_env, EthConfig, HyperdriveAddresses};
use hyperdrive_bots::logging::init_logging;
use hyperdrive_bots::{ChainClient, HyperdriveClient};
use alloy::primitives::U256;
use alloy::signers::local::PrivateKeySigner;
use std::str::FromStr;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "checkpoint-bot", about = "Keep Hyperdrive checkpoints populated")]
struct Args {
    /// Env var holding the private key of the account submitting checkpoints
    #[arg(long, default_value = "USER_KEY")]
    key_env: String,

    /// Longest sleep between checks, in seconds
    #[arg(long, default_value = "3600")]
    max_sleep_secs: u64,

    /// Environment file (default: .env when present)
    #[arg(long)]
    env_file: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

/// Seconds from `timestamp` until the next checkpoint starts, at least 1.
fn seconds_until_next_checkpoint(timestamp: u64, checkpoint_duration: u64) -> u64 {
    if checkpoint_duration == 0 {
        return 1;
    }
    (checkpoint_duration - timestamp % checkpoint_duration).max(1)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json);
    load_env(args.env_file.as_deref())?;

    let key = std::env::var(&args.key_env).with_context(|| format!("{} not set", args.key_env))?;
    let signer = PrivateKeySigner::from_str(key.trim())
        .with_context(|| format!("{} is not a valid private key", args.key_env))?;
    let sender = signer.address();
    let eth_config = EthConfig::from_env();
    let chain = ChainClient::connect(&eth_config.rpc_url, &[signer])?;
    let client = HyperdriveClient::new(chain, HyperdriveAddresses::load(&eth_config).await?);
    let pool_config = client.pool_config().await?;
    info!(
        "Checkpoint bot for {} from {} (duration {}s)",
        client.addresses().hyperdrive,
        sender,
        pool_config.checkpoint_duration
    );

    loop {
        let state = client.current_pool_state().await?;
        let checkpoint_time = state.checkpoint_time();

        if state.checkpoint.share_price == U256::ZERO {
            match client.create_checkpoint(sender, checkpoint_time).await {
                Ok(receipt) => info!(
                    block = state.block_number(),
                    "Checkpoint {} created: {:?}", checkpoint_time, receipt.transaction_hash
                ),
                // Another caller may have created it first; check again next round.
                Err(e) => error!("Checkpoint {} failed: {:#}", checkpoint_time, e),
            }
        } else {
            info!(block = state.block_number(), "Checkpoint {} exists", checkpoint_time);
        }

        let wait = seconds_until_next_checkpoint(state.block_time(), pool_config.checkpoint_duration)
            .min(args.max_sleep_secs);
        sleep(Duration::from_secs(wait)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_to_next_boundary() {
        assert_eq!(seconds_until_next_checkpoint(86_400 * 2 + 100, 86_400), 86_300);
        assert_eq!(seconds_until_next_checkpoint(86_400 * 2, 86_400), 86_400);
        assert_eq!(seconds_until_next_checkpoint(5, 0), 1);
    }
}
