//! Hyperdrive Interface
//!
//! The seam between the trade loop and the chain. `HyperdriveClient`
//! implements it against a live pool; tests implement it in memory.

use super::action::{Trade, TradeError, TradeReceipt};
use super::wallet::HyperdriveWallet;
use crate::hyperdrive::{BlockInfo, HyperdriveClient, PoolState};
use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait HyperdriveInterface: Send + Sync {
    /// Latest block number and timestamp
    async fn current_block(&self) -> Result<BlockInfo>;

    /// Pool snapshot at `block`
    async fn pool_state(&self, block: BlockInfo) -> Result<PoolState>;

    /// Execute a trade signed by `trader`
    async fn execute(&self, trader: Address, trade: &Trade) -> Result<TradeReceipt, TradeError>;

    async fn base_balance(&self, owner: Address) -> Result<U256>;

    /// Holdings of `owner` as recorded on chain
    async fn wallet_from_chain(&self, owner: Address) -> Result<HyperdriveWallet>;
}

#[async_trait]
impl HyperdriveInterface for HyperdriveClient {
    async fn current_block(&self) -> Result<BlockInfo> {
        self.chain().current_block().await
    }

    async fn pool_state(&self, block: BlockInfo) -> Result<PoolState> {
        HyperdriveClient::pool_state(self, block).await
    }

    async fn execute(&self, trader: Address, trade: &Trade) -> Result<TradeReceipt, TradeError> {
        HyperdriveClient::execute(self, trader, trade).await
    }

    async fn base_balance(&self, owner: Address) -> Result<U256> {
        HyperdriveClient::base_balance(self, owner).await
    }

    async fn wallet_from_chain(&self, owner: Address) -> Result<HyperdriveWallet> {
        HyperdriveClient::wallet_from_chain(self, owner).await
    }
}
