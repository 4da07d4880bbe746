//! Hyperdrive Trading Bots
//!
//! Runs the agents listed in an agents TOML file against the configured
//! Hyperdrive pool until every agent reports it is done trading.
//!
//! Startup per agent: resolve its key, optionally mint its budget (test
//! chains) and approve the pool for its base. Wallets are registered with
//! the database API under the configured username, then restored from the
//! positions it has recorded (or from chain when it is unreachable).
//!
//! `--liquidate` closes every open position instead of trading.

use anyhow::{Context, Result};
use clap::Parser;
use hyperdrive_bots::abi::verify_abi_dir;
use hyperdrive_bots::agent::{
    build_policy, restore_wallets, run_agents, Agent, DatabaseApiClient, HyperdriveWallet,
    PolicyParams, TradeLoopConfig,
};
use hyperdrive_bots::config::{load_env, AgentsConfig, EthConfig, HyperdriveAddresses};
use hyperdrive_bots::hyperdrive::scaled::decimal_to_scaled;
use hyperdrive_bots::logging::init_logging;
use hyperdrive_bots::retry::DEFAULT_RETRY_DELAY;
use hyperdrive_bots::{ChainClient, HyperdriveClient};
use alloy::primitives::U256;
use alloy::signers::local::PrivateKeySigner;
use tracing::info;

#[derive(Parser)]
#[command(name = "hyperdrive-bots", about = "Run Hyperdrive trading agents")]
struct Args {
    /// Agents TOML file
    #[arg(short, long, env = "AGENT_CONFIG", default_value = "agents.toml")]
    config: String,

    /// Close all open positions and exit
    #[arg(long)]
    liquidate: bool,

    /// Close positions in random order (with --liquidate)
    #[arg(long)]
    randomize_liquidation: bool,

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
    let mut agents_config = AgentsConfig::load(&args.config)?;
    agents_config.general.liquidate |= args.liquidate;
    agents_config.general.randomize_liquidation |= args.randomize_liquidation;
    let general = &agents_config.general;
    info!(
        "Hyperdrive bots starting: {} agent(s) from {}{}",
        agents_config.agents.len(),
        args.config,
        if general.liquidate { " (liquidating)" } else { "" }
    );

    let signers = agents_config
        .agents
        .iter()
        .enumerate()
        .map(|(i, agent)| agent.signer(i))
        .collect::<Result<Vec<PrivateKeySigner>>>()?;
    let addresses: Vec<_> = signers.iter().map(|s| s.address()).collect();

    let chain = ChainClient::connect(&eth_config.rpc_url, &signers)?
        .with_retry(general.retry_count, DEFAULT_RETRY_DELAY);
    let automine = chain.automine().await;
    let pool_addresses = HyperdriveAddresses::load(&eth_config).await?;
    info!("Hyperdrive pool: {} (automine: {})", pool_addresses.hyperdrive, automine);
    let client = HyperdriveClient::new(chain, pool_addresses);

    for (agent_config, &address) in agents_config.agents.iter().zip(&addresses) {
        if general.mint_base {
            let budget = decimal_to_scaled(agent_config.base_budget)?;
            client.mint_base(address, address, budget).await?;
        }
        client.approve_base(address, U256::MAX).await?;
    }

    let api = DatabaseApiClient::new(&eth_config.database_api_uri);
    if general.register_username {
        api.register_username(&general.username, &addresses).await?;
    }

    let wallets = if general.load_wallet_state {
        restore_wallets(Some(&api), &client, &addresses).await?
    } else {
        let mut wallets = Vec::with_capacity(addresses.len());
        for &address in &addresses {
            let balance = client
                .base_balance(address)
                .await
                .with_context(|| format!("Failed to read base balance of {}", address))?;
            wallets.push(HyperdriveWallet::new(address, balance));
        }
        wallets
    };

    let mut agents = Vec::with_capacity(wallets.len());
    for (agent_config, wallet) in agents_config.agents.iter().zip(wallets) {
        let params = PolicyParams::from_config(agent_config)?;
        let policy = build_policy(&agent_config.policy, params)?;
        info!(
            "Agent {} ready: policy {}, base {}, {} long(s), {} short(s)",
            wallet.address,
            policy.name(),
            wallet.base,
            wallet.longs.len(),
            wallet.shorts.len()
        );
        agents.push(Agent::new(policy, wallet));
    }

    let loop_config = TradeLoopConfig::from_general(general, automine);
    run_agents(&client, &mut agents, &loop_config).await
}
