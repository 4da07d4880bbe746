//! Chain Client
//!
//! Thin wrapper over an alloy HTTP provider: block number/time reads with
//! retry, transaction submission with receipt status checks, and the anvil
//! test-chain controls used by local fixtures (mining, timestamp interval,
//! snapshots).
//!
//! Every agent key is registered with one `EthereumWallet`, so a contract
//! call sent with `.from(agent)` is signed by that agent's key.

use crate::hyperdrive::BlockInfo;
use crate::retry::{retry_call, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY};
use alloy::eips::BlockNumberOrTag;
use alloy::network::{Ethereum, EthereumWallet};
use alloy::primitives::{B256, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{anyhow, bail, Context, Result};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// A mined transaction whose receipt reports failure
#[derive(Debug, Error)]
#[error("transaction {tx_hash} reverted in block {block_number:?}")]
pub struct RevertedTransaction {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

#[derive(Clone)]
pub struct ChainClient {
    provider: DynProvider,
    retry_count: usize,
    retry_delay: Duration,
}

impl ChainClient {
    /// Connect over HTTP, signing with any of `signers`.
    pub fn connect(rpc_url: &str, signers: &[PrivateKeySigner]) -> Result<Self> {
        let url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;

        let provider = match signers.split_first() {
            Some((first, rest)) => {
                let mut wallet = EthereumWallet::new(first.clone());
                for signer in rest {
                    wallet.register_signer(signer.clone());
                }
                info!("Chain client: {} signer(s) registered", signers.len());
                ProviderBuilder::new().wallet(wallet).connect_http(url).erased()
            }
            None => ProviderBuilder::new().connect_http(url).erased(),
        };

        Ok(Self::from_provider(provider))
    }

    pub fn from_provider(provider: DynProvider) -> Self {
        Self {
            provider,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry(mut self, retry_count: usize, retry_delay: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_delay = retry_delay;
        self
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Run a read with this client's retry settings.
    pub async fn retry<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_call(self.retry_count, self.retry_delay, f).await
    }

    // ── Block reads ──────────────────────────────────────────────────

    pub async fn block_number(&self) -> Result<u64> {
        retry_call(self.retry_count, self.retry_delay, || async {
            self.provider
                .get_block_number()
                .await
                .context("Failed to get block number")
        })
        .await
    }

    /// Number and timestamp of a specific block.
    pub async fn block_info(&self, number: u64) -> Result<BlockInfo> {
        self.block_by_tag(BlockNumberOrTag::Number(number)).await
    }

    /// Number and timestamp of the latest block.
    pub async fn current_block(&self) -> Result<BlockInfo> {
        self.block_by_tag(BlockNumberOrTag::Latest).await
    }

    pub async fn block_time(&self) -> Result<u64> {
        Ok(self.current_block().await?.timestamp)
    }

    async fn block_by_tag(&self, tag: BlockNumberOrTag) -> Result<BlockInfo> {
        retry_call(self.retry_count, self.retry_delay, || async {
            let block = self
                .provider
                .get_block_by_number(tag)
                .await
                .with_context(|| format!("Failed to get block {}", tag))?
                .ok_or_else(|| anyhow!("Block {} not found", tag))?;
            Ok(BlockInfo {
                number: block.header.number,
                timestamp: block.header.timestamp,
            })
        })
        .await
    }

    // ── Transactions ─────────────────────────────────────────────────

    /// Submit a raw transaction request and wait for a successful receipt.
    pub async fn send_transaction(&self, tx: TransactionRequest) -> Result<TransactionReceipt> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("Failed to submit transaction")?;
        confirm(pending).await
    }

    // ── Test-chain controls (anvil) ──────────────────────────────────

    /// Mine `count` blocks, each exactly `interval` seconds after the one
    /// before it.
    pub async fn mine_blocks(&self, count: u64, interval: u64) -> Result<()> {
        let mut timestamp = self.block_time().await?;
        for _ in 0..count {
            timestamp += interval;
            let _: serde_json::Value = self
                .provider
                .raw_request("evm_mine".into(), (timestamp,))
                .await
                .with_context(|| format!("evm_mine at {} failed", timestamp))?;
        }
        debug!("Mined {} blocks at {}s interval", count, interval);
        Ok(())
    }

    /// True when the node mines a block per transaction. Nodes without
    /// `anvil_getAutomine` report false.
    pub async fn automine(&self) -> bool {
        match self
            .provider
            .raw_request::<_, bool>("anvil_getAutomine".into(), ())
            .await
        {
            Ok(automine) => automine,
            Err(e) => {
                debug!("anvil_getAutomine unavailable, assuming interval mining: {}", e);
                false
            }
        }
    }

    /// Fix the timestamp gap between subsequently mined blocks.
    pub async fn set_block_timestamp_interval(&self, seconds: u64) -> Result<()> {
        let _: serde_json::Value = self
            .provider
            .raw_request("anvil_setBlockTimestampInterval".into(), (seconds,))
            .await
            .context("anvil_setBlockTimestampInterval failed")?;
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<U256> {
        self.provider
            .raw_request("evm_snapshot".into(), ())
            .await
            .context("evm_snapshot failed")
    }

    pub async fn revert_to(&self, snapshot_id: U256) -> Result<()> {
        let reverted: bool = self
            .provider
            .raw_request("evm_revert".into(), (snapshot_id,))
            .await
            .context("evm_revert failed")?;
        if !reverted {
            bail!("evm_revert rejected snapshot {}", snapshot_id);
        }
        Ok(())
    }
}

/// Wait for a pending transaction and fail if it reverted.
pub async fn confirm(pending: PendingTransactionBuilder<Ethereum>) -> Result<TransactionReceipt> {
    let tx_hash = *pending.tx_hash();
    let receipt = pending
        .get_receipt()
        .await
        .with_context(|| format!("Failed to get receipt for {}", tx_hash))?;
    if !receipt.status() {
        return Err(RevertedTransaction {
            tx_hash,
            block_number: receipt.block_number,
        }
        .into());
    }
    debug!("Transaction {} mined in block {:?}", tx_hash, receipt.block_number);
    Ok(receipt)
}
