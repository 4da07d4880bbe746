//! Hyperdrive Bots Library
//!
//! Trading agents for the Hyperdrive fixed-rate AMM, the chainsync ETL
//! that mirrors a pool into Postgres, and the small REST API over that
//! database. The fixed-point pricing formulas are shared by all three.

pub mod abi;
pub mod agent;
pub mod api;
pub mod chain;
pub mod chainsync;
pub mod config;
pub mod contracts;
pub mod error;
pub mod fixed_point;
pub mod hyperdrive;
pub mod logging;
pub mod retry;

// Re-export commonly used types
pub use agent::{Agent, HyperdriveWallet, Policy, Trade, TradeAction};
pub use chain::ChainClient;
pub use config::{AgentsConfig, EthConfig, HyperdriveAddresses, PostgresConfig};
pub use hyperdrive::{HyperdriveClient, PoolState};
pub use retry::retry_call;
