//! Hyperdrive Pool Client
//!
//! Reads pool state from a deployed Hyperdrive contract and executes trades
//! on behalf of agent accounts.
//!
//! Trades are previewed with `eth_call` first so the slippage guard
//! (`minOutput` / `maxDeposit`) can be derived from the expected result.
//! Reverts are decoded against the pool's custom errors; `OutputLimit` and
//! `MinimumSharePrice` surface as `TradeError::Slippage`.

use super::asset_id::{encode_asset_id, AssetIdPrefix};
use super::events::{decode_logs, token_deltas, transfer_balances, TokenDelta, TokenKind};
use super::state::{BlockInfo, Checkpoint, PoolConfig, PoolInfo, PoolState};
use crate::agent::action::{Trade, TradeAction, TradeError, TradeReceipt};
use crate::agent::wallet::{HyperdriveWallet, Long, Short, WalletDeltas};
use crate::chain::{confirm, ChainClient};
use crate::config::HyperdriveAddresses;
use crate::contracts::IHyperdrive::{self, IHyperdriveErrors};
use crate::contracts::{IERC20Mintable, IYieldSource, IERC20};
use crate::fixed_point::{mul_down, mul_up, ONE_18};
use alloy::eips::BlockId;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log, TransactionReceipt, TransactionRequest};
use alloy::sol_types::{SolCall, SolInterface};
use alloy::transports::{RpcError, TransportErrorKind};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct HyperdriveClient {
    chain: ChainClient,
    addresses: HyperdriveAddresses,
    /// Pool config never changes after deployment
    pool_config: Arc<OnceCell<PoolConfig>>,
}

impl HyperdriveClient {
    pub fn new(chain: ChainClient, addresses: HyperdriveAddresses) -> Self {
        Self {
            chain,
            addresses,
            pool_config: Arc::new(OnceCell::new()),
        }
    }

    pub fn chain(&self) -> &ChainClient {
        &self.chain
    }

    pub fn addresses(&self) -> &HyperdriveAddresses {
        &self.addresses
    }

    fn hyperdrive(&self) -> IHyperdrive::IHyperdriveInstance<alloy::providers::DynProvider> {
        IHyperdrive::new(self.addresses.hyperdrive, self.chain.provider().clone())
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub async fn pool_config(&self) -> Result<PoolConfig> {
        let config = self
            .pool_config
            .get_or_try_init(|| async {
                let raw = self
                    .chain
                    .retry(|| async {
                        self.hyperdrive()
                            .getPoolConfig()
                            .call()
                            .await
                            .context("Failed to get pool config")
                    })
                    .await?;
                Ok::<_, anyhow::Error>(PoolConfig::from(raw))
            })
            .await?;
        Ok(config.clone())
    }

    pub async fn pool_info(&self, block_number: u64) -> Result<PoolInfo> {
        let raw = self
            .chain
            .retry(|| async {
                self.hyperdrive()
                    .getPoolInfo()
                    .block(BlockId::number(block_number))
                    .call()
                    .await
                    .with_context(|| format!("Failed to get pool info at block {}", block_number))
            })
            .await?;
        Ok(PoolInfo::from(raw))
    }

    pub async fn checkpoint(&self, checkpoint_time: u64, block_number: u64) -> Result<Checkpoint> {
        let raw = self
            .chain
            .retry(|| async {
                self.hyperdrive()
                    .getCheckpoint(U256::from(checkpoint_time))
                    .block(BlockId::number(block_number))
                    .call()
                    .await
                    .with_context(|| format!("Failed to get checkpoint {}", checkpoint_time))
            })
            .await?;
        Ok(Checkpoint::from(raw))
    }

    /// Yield source rate, `None` when no yield source is configured or it
    /// does not expose `getRate`.
    pub async fn variable_rate(&self, block_number: u64) -> Option<U256> {
        let yield_source = self.addresses.yield_source?;
        let source = IYieldSource::new(yield_source, self.chain.provider().clone());
        match source.getRate().block(BlockId::number(block_number)).call().await {
            Ok(rate) => Some(rate),
            Err(e) => {
                warn!("Yield source {} getRate failed: {}", yield_source, e);
                None
            }
        }
    }

    pub async fn pool_state(&self, block: BlockInfo) -> Result<PoolState> {
        let pool_config = self.pool_config().await?;
        let pool_info = self.pool_info(block.number).await?;
        let checkpoint = self
            .checkpoint(pool_config.checkpoint_time(block.timestamp), block.number)
            .await?;
        let variable_rate = self.variable_rate(block.number).await;
        Ok(PoolState {
            block,
            pool_config,
            pool_info,
            checkpoint,
            variable_rate,
        })
    }

    pub async fn current_pool_state(&self) -> Result<PoolState> {
        let block = self.chain.current_block().await?;
        self.pool_state(block).await
    }

    /// Hyperdrive logs in `[from_block, to_block]`.
    pub async fn logs(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        let filter = Filter::new()
            .address(self.addresses.hyperdrive)
            .from_block(from_block)
            .to_block(to_block);
        self.chain
            .retry(|| async {
                self.chain
                    .provider()
                    .get_logs(&filter)
                    .await
                    .with_context(|| format!("Failed to get logs {}..={}", from_block, to_block))
            })
            .await
    }

    pub async fn base_balance(&self, owner: Address) -> Result<U256> {
        let token = IERC20::new(self.addresses.base_token, self.chain.provider().clone());
        self.chain
            .retry(|| async {
                token
                    .balanceOf(owner)
                    .call()
                    .await
                    .with_context(|| format!("Failed to get base balance of {}", owner))
            })
            .await
    }

    pub async fn position_balance(&self, asset_id: U256, owner: Address) -> Result<U256> {
        self.chain
            .retry(|| async {
                self.hyperdrive()
                    .balanceOf(asset_id, owner)
                    .call()
                    .await
                    .with_context(|| format!("Failed to get balance of {} for {}", asset_id, owner))
            })
            .await
    }

    /// Rebuild `owner`'s holdings from chain: base and LP/withdrawal
    /// balances are read directly, longs and shorts are summed from the
    /// pool's transfer history. Short open share prices are not recoverable
    /// this way and start at zero.
    pub async fn wallet_from_chain(&self, owner: Address) -> Result<HyperdriveWallet> {
        let mut wallet = HyperdriveWallet::new(owner, self.base_balance(owner).await?);
        wallet.lp_tokens = self.position_balance(encode_asset_id(AssetIdPrefix::Lp, 0), owner).await?;
        wallet.withdraw_shares = self
            .position_balance(encode_asset_id(AssetIdPrefix::WithdrawalShare, 0), owner)
            .await?;

        let latest = self.chain.block_number().await?;
        let logs = decode_logs(&self.logs(0, latest).await?)?;
        for (token, balance) in transfer_balances(owner, &logs)? {
            match token {
                TokenKind::Long(maturity) => {
                    wallet.longs.insert(maturity, Long { balance });
                }
                TokenKind::Short(maturity) => {
                    wallet.shorts.insert(maturity, Short { balance, open_share_price: U256::ZERO });
                }
                _ => {}
            }
        }
        debug!(
            "Rebuilt wallet {} from chain: {} long(s), {} short(s)",
            owner,
            wallet.longs.len(),
            wallet.shorts.len()
        );
        Ok(wallet)
    }

    // ── Setup transactions ───────────────────────────────────────────

    /// Approve the pool to spend `owner`'s base, skipping when the allowance
    /// already covers `amount`.
    pub async fn approve_base(&self, owner: Address, amount: U256) -> Result<()> {
        let token = IERC20::new(self.addresses.base_token, self.chain.provider().clone());
        let allowance = token
            .allowance(owner, self.addresses.hyperdrive)
            .call()
            .await
            .context("Failed to get allowance")?;
        if allowance >= amount {
            debug!("Sufficient allowance for {}: {} >= {}", owner, allowance, amount);
            return Ok(());
        }

        let pending = token
            .approve(self.addresses.hyperdrive, U256::MAX)
            .from(owner)
            .send()
            .await
            .context("Failed to send approval")?;
        let receipt = confirm(pending).await?;
        info!("Approval confirmed for {}: {:?}", owner, receipt.transaction_hash);
        Ok(())
    }

    /// Mint base to `destination` (test tokens only).
    pub async fn mint_base(&self, from: Address, destination: Address, amount: U256) -> Result<()> {
        let token = IERC20Mintable::new(self.addresses.base_token, self.chain.provider().clone());
        let pending = token
            .mint(destination, amount)
            .from(from)
            .send()
            .await
            .context("Failed to send mint")?;
        confirm(pending).await?;
        info!("Minted {} base to {}", amount, destination);
        Ok(())
    }

    pub async fn create_checkpoint(&self, from: Address, checkpoint_time: u64) -> Result<TransactionReceipt> {
        let pending = self
            .hyperdrive()
            .checkpoint(U256::from(checkpoint_time))
            .from(from)
            .send()
            .await
            .with_context(|| format!("Failed to send checkpoint {}", checkpoint_time))?;
        confirm(pending).await
    }

    // ── Trades ───────────────────────────────────────────────────────

    /// Execute `trade` from `trader` and return the wallet deltas it caused.
    pub async fn execute(&self, trader: Address, trade: &Trade) -> Result<TradeReceipt, TradeError> {
        let options = IHyperdrive::Options {
            destination: trader,
            asBase: true,
            extraData: Bytes::new(),
        };
        let tolerance = trade.slippage_tolerance;

        let receipt = match trade.action {
            TradeAction::OpenLong { base } => {
                let min_output = match tolerance {
                    Some(tol) => {
                        let preview = self
                            .preview(trader, IHyperdrive::openLongCall {
                                _baseAmount: base,
                                _minOutput: U256::ZERO,
                                _minSharePrice: U256::ZERO,
                                _options: options.clone(),
                            })
                            .await?;
                        min_output_for(preview.bondProceeds, tol)?
                    }
                    None => U256::ZERO,
                };
                self.submit(trader, IHyperdrive::openLongCall {
                    _baseAmount: base,
                    _minOutput: min_output,
                    _minSharePrice: U256::ZERO,
                    _options: options,
                })
                .await?
            }
            TradeAction::CloseLong { maturity_time, bonds } => {
                let call = |limit| IHyperdrive::closeLongCall {
                    _maturityTime: U256::from(maturity_time),
                    _bondAmount: bonds,
                    _minOutput: limit,
                    _options: options.clone(),
                };
                let min_output = match tolerance {
                    Some(tol) => min_output_for(self.preview(trader, call(U256::ZERO)).await?, tol)?,
                    None => U256::ZERO,
                };
                self.submit(trader, call(min_output)).await?
            }
            TradeAction::OpenShort { bonds } => {
                let call = |limit| IHyperdrive::openShortCall {
                    _bondAmount: bonds,
                    _maxDeposit: limit,
                    _minSharePrice: U256::ZERO,
                    _options: options.clone(),
                };
                let max_deposit = match tolerance {
                    Some(tol) => {
                        let preview = self.preview(trader, call(U256::MAX)).await?;
                        max_deposit_for(preview.traderDeposit, tol)?
                    }
                    None => U256::MAX,
                };
                self.submit(trader, call(max_deposit)).await?
            }
            TradeAction::CloseShort { maturity_time, bonds } => {
                let call = |limit| IHyperdrive::closeShortCall {
                    _maturityTime: U256::from(maturity_time),
                    _bondAmount: bonds,
                    _minOutput: limit,
                    _options: options.clone(),
                };
                let min_output = match tolerance {
                    Some(tol) => min_output_for(self.preview(trader, call(U256::ZERO)).await?, tol)?,
                    None => U256::ZERO,
                };
                self.submit(trader, call(min_output)).await?
            }
            TradeAction::AddLiquidity { base } => {
                self.submit(trader, IHyperdrive::addLiquidityCall {
                    _contribution: base,
                    _minApr: U256::ZERO,
                    _maxApr: U256::MAX,
                    _options: options,
                })
                .await?
            }
            TradeAction::RemoveLiquidity { lp_shares } => {
                let call = |limit| IHyperdrive::removeLiquidityCall {
                    _shares: lp_shares,
                    _minOutput: limit,
                    _options: options.clone(),
                };
                let min_output = match tolerance {
                    Some(tol) => {
                        let preview = self.preview(trader, call(U256::ZERO)).await?;
                        min_output_for(preview.baseProceeds, tol)?
                    }
                    None => U256::ZERO,
                };
                self.submit(trader, call(min_output)).await?
            }
            TradeAction::RedeemWithdrawalShares { shares } => {
                let call = |limit| IHyperdrive::redeemWithdrawalSharesCall {
                    _shares: shares,
                    _minOutput: limit,
                    _options: options.clone(),
                };
                let min_output = match tolerance {
                    Some(tol) => {
                        let preview = self.preview(trader, call(U256::ZERO)).await?;
                        min_output_for(preview.proceeds, tol)?
                    }
                    None => U256::ZERO,
                };
                self.submit(trader, call(min_output)).await?
            }
        };

        let token_deltas: Vec<TokenDelta> = decode_logs(receipt.inner.logs())
            .map_err(TradeError::Other)?
            .iter()
            .flat_map(|log| token_deltas(&log.event))
            .collect();
        let deltas = WalletDeltas::from_token_deltas(trader, &token_deltas);
        let block_number = mined_block(receipt.block_number, receipt.transaction_hash)?;
        info!(
            "{} executed {} in block {}: {:?}",
            trader, trade.action, block_number, receipt.transaction_hash
        );

        Ok(TradeReceipt {
            tx_hash: receipt.transaction_hash,
            block_number,
            deltas,
        })
    }

    fn request<C: SolCall>(&self, trader: Address, call: &C) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(trader)
            .with_to(self.addresses.hyperdrive)
            .with_input(call.abi_encode())
    }

    /// `eth_call` the trade to learn its expected result.
    async fn preview<C: SolCall>(&self, trader: Address, call: C) -> Result<C::Return, TradeError> {
        let output = self
            .chain
            .provider()
            .call(self.request(trader, &call))
            .await
            .map_err(|e| classify_rpc_error(e, "preview"))?;
        C::abi_decode_returns(&output)
            .map_err(|e| TradeError::Other(anyhow!("Failed to decode {} preview: {}", C::SIGNATURE, e)))
    }

    async fn submit<C: SolCall>(&self, trader: Address, call: C) -> Result<TransactionReceipt, TradeError> {
        let pending = self
            .chain
            .provider()
            .send_transaction(self.request(trader, &call))
            .await
            .map_err(|e| classify_rpc_error(e, "submit"))?;
        Ok(confirm(pending).await?)
    }
}

fn min_output_for(expected: U256, tolerance: U256) -> Result<U256, TradeError> {
    mul_down(expected, ONE_18.saturating_sub(tolerance)).map_err(|e| TradeError::Other(e.into()))
}

fn max_deposit_for(expected: U256, tolerance: U256) -> Result<U256, TradeError> {
    mul_up(expected, ONE_18.saturating_add(tolerance)).map_err(|e| TradeError::Other(e.into()))
}

fn mined_block(block_number: Option<u64>, tx_hash: B256) -> Result<u64, TradeError> {
    block_number.ok_or_else(|| TradeError::Other(anyhow!("Receipt {} has no block number", tx_hash)))
}

fn hyperdrive_error_name(err: &IHyperdriveErrors) -> &'static str {
    match err {
        IHyperdriveErrors::OutputLimit(_) => "OutputLimit",
        IHyperdriveErrors::MinimumSharePrice(_) => "MinimumSharePrice",
        IHyperdriveErrors::MinimumTransactionAmount(_) => "MinimumTransactionAmount",
        IHyperdriveErrors::InsufficientLiquidity(_) => "InsufficientLiquidity",
    }
}

/// Map revert data to a trade error; non-revert RPC failures become `Other`.
pub(crate) fn classify_revert(data: &[u8]) -> TradeError {
    match IHyperdriveErrors::abi_decode(data) {
        Ok(err @ (IHyperdriveErrors::OutputLimit(_) | IHyperdriveErrors::MinimumSharePrice(_))) => {
            TradeError::Slippage(hyperdrive_error_name(&err).to_string())
        }
        Ok(err) => TradeError::Reverted {
            tx_hash: None,
            reason: hyperdrive_error_name(&err).to_string(),
        },
        Err(_) => TradeError::Reverted {
            tx_hash: None,
            reason: format!("unknown revert data {}", Bytes::copy_from_slice(data)),
        },
    }
}

fn classify_rpc_error(err: RpcError<TransportErrorKind>, stage: &str) -> TradeError {
    let revert = err.as_error_resp().and_then(|payload| payload.as_revert_data());
    match revert {
        Some(data) => classify_revert(&data),
        None => TradeError::Other(anyhow!("Trade {} failed: {}", stage, err)),
    }
}
