//! Configuration management
//!
//! Environment settings come from a `.env` file (RPC and artifact URLs,
//! Postgres credentials, database API location, keys). Agent setup comes
//! from a TOML file with a `[general]` table and one `[[agent]]` table per
//! bot.

use crate::retry::retry_call;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{anyhow, bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Username the bots refuse to register under
pub const DEFAULT_USERNAME: &str = "changeme";

/// Load a `.env` file; a missing default `.env` is not an error.
pub fn load_env(env_file: Option<&str>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenv::from_filename(path).with_context(|| format!("Failed to load {}", path))?;
            info!("Environment loaded from {}", path);
        }
        None => {
            dotenv::dotenv().ok();
        }
    }
    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_address(key: &str) -> Result<Option<Address>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(
            Address::from_str(value.trim()).with_context(|| format!("{} is not an address", key))?,
        )),
        _ => Ok(None),
    }
}

// ── Chain / services ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EthConfig {
    pub rpc_url: String,
    /// Server publishing `addresses.json` for the deployed contracts
    pub artifacts_url: String,
    /// Directory of JSON ABI files
    pub abi_dir: String,
    /// Base URI of the database REST API
    pub database_api_uri: String,
}

impl EthConfig {
    pub fn from_env() -> Self {
        Self {
            rpc_url: env_or("RPC_URL", "http://localhost:8545"),
            artifacts_url: env_or("ARTIFACTS_URL", "http://localhost:8080"),
            abi_dir: env_or("ABI_DIR", "./packages/hyperdrive/src/abis"),
            database_api_uri: env_or("DATABASE_API_URI", "http://localhost:5002"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl PostgresConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            user: env_or("POSTGRES_USER", "admin"),
            password: env_or("POSTGRES_PASSWORD", "password"),
            database: env_or("POSTGRES_DB", "postgres_db"),
            host: env_or("POSTGRES_HOST", "localhost"),
            port: env_or("POSTGRES_PORT", "5432")
                .parse()
                .context("POSTGRES_PORT must be a port number")?,
        })
    }

    /// `DATABASE_URL` overrides the individual settings.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.database
            )
        })
    }
}

// ── Contract addresses ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HyperdriveAddresses {
    #[serde(alias = "mockHyperdrive")]
    pub hyperdrive: Address,
    pub base_token: Address,
    #[serde(default)]
    pub yield_source: Option<Address>,
}

impl HyperdriveAddresses {
    /// Addresses from `HYPERDRIVE_ADDRESS`/`BASE_TOKEN_ADDRESS`, falling back
    /// to `<artifacts_url>/addresses.json`.
    pub async fn load(eth_config: &EthConfig) -> Result<Self> {
        if let (Some(hyperdrive), Some(base_token)) = (
            optional_address("HYPERDRIVE_ADDRESS")?,
            optional_address("BASE_TOKEN_ADDRESS")?,
        ) {
            return Ok(Self {
                hyperdrive,
                base_token,
                yield_source: optional_address("YIELD_SOURCE_ADDRESS")?,
            });
        }
        Self::fetch(&eth_config.artifacts_url).await
    }

    /// GET `addresses.json` from the artifacts server, retrying while it starts.
    pub async fn fetch(artifacts_url: &str) -> Result<Self> {
        let url = format!("{}/addresses.json", artifacts_url.trim_end_matches('/'));
        let client = reqwest::Client::new();
        let addresses: Self = retry_call(10, Duration::from_secs(10), || async {
            let response = client
                .get(&url)
                .timeout(Duration::from_secs(60))
                .send()
                .await
                .with_context(|| format!("Request to {} failed", url))?;
            if !response.status().is_success() {
                warn!("Artifacts request to {} returned {}", url, response.status());
                bail!("Artifacts request returned {}", response.status());
            }
            response
                .json::<Self>()
                .await
                .context("addresses.json is malformed")
        })
        .await?;
        info!("Hyperdrive addresses fetched from {}: {:?}", url, addresses);
        Ok(addresses)
    }
}

// ── Agents (TOML) ────────────────────────────────────────────────────

/// Top-level agents file
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsConfig {
    pub general: GeneralConfig,
    #[serde(rename = "agent")]
    pub agents: Vec<AgentConfig>,
}

/// Loop and registration settings shared by all agents
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_true")]
    pub halt_on_errors: bool,
    #[serde(default)]
    pub halt_on_slippage: bool,
    /// False on automining chains where every poll sees a new block
    #[serde(default = "default_true")]
    pub wait_for_new_block: bool,
    #[serde(default = "default_max_poll_latency")]
    pub max_poll_latency_secs: f64,
    /// Mint each agent's budget from the base token (test chains only)
    #[serde(default)]
    pub mint_base: bool,
    #[serde(default = "default_true")]
    pub register_username: bool,
    /// Rebuild wallets from the database API (or chain) instead of starting flat
    #[serde(default = "default_true")]
    pub load_wallet_state: bool,
    /// Ignore policies and close every open position, then stop
    #[serde(default)]
    pub liquidate: bool,
    #[serde(default)]
    pub randomize_liquidation: bool,
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
}

fn default_username() -> String { DEFAULT_USERNAME.to_string() }
fn default_true() -> bool { true }
fn default_max_poll_latency() -> f64 { 30.0 }
fn default_retry_count() -> usize { 5 }

/// One bot: its policy, key and budget
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub policy: String,
    /// Env var holding the private key; the first agent defaults to `USER_KEY`
    pub key_env: Option<String>,
    /// Base to mint when `mint_base` is set
    #[serde(default)]
    pub base_budget: Decimal,
    #[serde(default = "default_trade_chance")]
    pub trade_chance: f64,
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: Decimal,
    #[serde(default = "default_slippage")]
    pub slippage_tolerance: Option<Decimal>,
    /// Variable rate assumed when the pool has no yield source
    #[serde(default = "default_variable_rate")]
    pub variable_rate: Decimal,
    pub seed: Option<u64>,
}

fn default_trade_chance() -> f64 { 0.5 }
fn default_risk_threshold() -> Decimal { Decimal::new(1, 4) }
fn default_slippage() -> Option<Decimal> { Some(Decimal::new(1, 2)) }
fn default_variable_rate() -> Decimal { Decimal::new(5, 2) }

impl AgentsConfig {
    /// Load agent configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        if config.agents.is_empty() {
            bail!("No [[agent]] entries configured");
        }
        Ok(config)
    }
}

impl AgentConfig {
    /// Resolve the agent's signing key from the environment.
    pub fn signer(&self, index: usize) -> Result<PrivateKeySigner> {
        let key_env = match (&self.key_env, index) {
            (Some(name), _) => name.clone(),
            (None, 0) => "USER_KEY".to_string(),
            (None, _) => bail!("Agent {} has no key_env configured", index),
        };
        let key = std::env::var(&key_env).map_err(|_| anyhow!("{} not set", key_env))?;
        PrivateKeySigner::from_str(key.trim())
            .with_context(|| format!("{} is not a valid private key", key_env))
    }
}
