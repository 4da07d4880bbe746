//! Trading agents: wallets, trade actions, policies and the trade loop.

pub mod action;
pub mod api_client;
pub mod interface;
pub mod policy;
pub mod restore;
pub mod trade_loop;
pub mod wallet;

pub use api_client::{BalanceSource, DatabaseApiClient};
pub use action::{Trade, TradeAction, TradeError, TradeReceipt};
pub use interface::HyperdriveInterface;
pub use policy::{build_policy, Policy, PolicyParams};
pub use restore::restore_wallets;
pub use trade_loop::{liquidation_trades, run_agents, Agent, TradeLoopConfig};
pub use wallet::{HyperdriveWallet, WalletDeltas, WalletError};
