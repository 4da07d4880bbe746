//! Chainsync Acquire Data
//!
//! Follows the chain and mirrors the Hyperdrive pool into Postgres.
//! Resumes after the latest block already in the database.
//!
//! Usage:
//!     cargo run --release --bin acquire-data -- --start-block 0 --lookback 3000

use anyhow::Result;
use clap::Parser;
use hyperdrive_bots::abi::verify_abi_dir;
use hyperdrive_bots::chainsync::acquire::DEFAULT_LOOKBACK;
use hyperdrive_bots::chainsync::{acquire_data, AcquireConfig, Database};
use hyperdrive_bots::config::{load_env, EthConfig, HyperdriveAddresses, PostgresConfig};
use hyperdrive_bots::logging::init_logging;
use hyperdrive_bots::{ChainClient, HyperdriveClient};
use tracing::info;

#[derive(Parser)]
#[command(name = "acquire-data", about = "Mirror a Hyperdrive pool into Postgres")]
struct Args {
    /// First block to acquire (later if the database is ahead)
    #[arg(long, default_value = "0")]
    start_block: u64,

    /// Skip blocks more than this far behind the latest mined block
    #[arg(long, default_value_t = DEFAULT_LOOKBACK)]
    lookback: u64,

    /// Stop after this block instead of following the chain
    #[arg(long)]
    end_block: Option<u64>,

    /// Environment file (default: .env when present)
    #[arg(long)]
    env_file: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json);
    load_env(args.env_file.as_deref())?;

    let eth_config = EthConfig::from_env();
    verify_abi_dir(&eth_config.abi_dir)?;
    let postgres = PostgresConfig::from_env()?;
    let db = Database::connect(&postgres.database_url()).await?;

    let chain = ChainClient::connect(&eth_config.rpc_url, &[])?;
    let addresses = HyperdriveAddresses::load(&eth_config).await?;
    info!("Acquiring data for pool {}", addresses.hyperdrive);
    let client = HyperdriveClient::new(chain, addresses);

    let config = AcquireConfig {
        start_block: args.start_block,
        lookback: args.lookback,
        end_block: args.end_block,
        ..Default::default()
    };
    acquire_data(&client, &db, &config).await
}
