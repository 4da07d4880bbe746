//! Agent Trade Loop
//!
//! Polls the chain for new blocks. On each new block every active agent's
//! policy is consulted and its trades are executed in order; the wallet is
//! updated from the deltas decoded out of each receipt.
//!
//! Poll latency starts near one second and doubles while no new block
//! arrives, up to a cap. It resets whenever a block is processed.
//!
//! In liquidation mode policies are bypassed: each agent closes whatever it
//! holds and is done once its wallet is flat.

use super::action::{Trade, TradeAction, TradeError, TradeReceipt};
use super::interface::HyperdriveInterface;
use super::policy::Policy;
use super::wallet::HyperdriveWallet;
use crate::config::GeneralConfig;
use crate::hyperdrive::scaled::scaled_to_decimal;
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Multiplier applied to the poll latency while no new block arrives
pub const BACKOFF: u32 = 2;

/// Poll latency after a new block: one second plus a random fraction
pub fn start_latency() -> Duration {
    Duration::from_secs_f64(1.0 + rand::thread_rng().gen::<f64>())
}

/// Next poll latency while waiting for a block.
pub fn next_poll_latency(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(BACKOFF).min(max)
}

pub struct Agent {
    pub address: Address,
    pub policy: Box<dyn Policy>,
    pub wallet: HyperdriveWallet,
    pub done_trading: bool,
}

impl Agent {
    pub fn new(policy: Box<dyn Policy>, wallet: HyperdriveWallet) -> Self {
        Self {
            address: wallet.address,
            policy,
            wallet,
            done_trading: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TradeLoopConfig {
    pub halt_on_errors: bool,
    pub halt_on_slippage: bool,
    pub wait_for_new_block: bool,
    pub liquidate: bool,
    pub randomize_liquidation: bool,
    pub start_latency: Duration,
    pub max_poll_latency: Duration,
}

impl TradeLoopConfig {
    /// `automine` is what the node reported at startup; an automining node
    /// mines every trade, so waiting for a new block would stall the loop.
    pub fn from_general(general: &GeneralConfig, automine: bool) -> Self {
        Self {
            // Redeeming withdrawal shares is expected to fail while the pool
            // has no idle liquidity.
            halt_on_errors: general.halt_on_errors && !general.liquidate,
            halt_on_slippage: general.halt_on_slippage,
            wait_for_new_block: general.wait_for_new_block && !automine,
            liquidate: general.liquidate,
            randomize_liquidation: general.randomize_liquidation,
            start_latency: start_latency(),
            max_poll_latency: Duration::from_secs_f64(general.max_poll_latency_secs.max(0.0)),
        }
    }
}

/// Trades that close every position in `wallet`.
///
/// Longs, shorts and LP above `minimum_transaction_amount` are closed, in
/// random order when `rng` is given. Withdrawal shares are redeemed last
/// since they only become redeemable as the other positions close.
pub fn liquidation_trades<R: Rng + ?Sized>(
    wallet: &HyperdriveWallet,
    minimum_transaction_amount: U256,
    rng: Option<&mut R>,
) -> Vec<Trade> {
    let mut actions = Vec::new();
    for (&maturity_time, long) in &wallet.longs {
        if long.balance > minimum_transaction_amount {
            actions.push(TradeAction::CloseLong { maturity_time, bonds: long.balance });
        }
    }
    for (&maturity_time, short) in &wallet.shorts {
        if short.balance > minimum_transaction_amount {
            actions.push(TradeAction::CloseShort { maturity_time, bonds: short.balance });
        }
    }
    if wallet.lp_tokens > minimum_transaction_amount {
        actions.push(TradeAction::RemoveLiquidity { lp_shares: wallet.lp_tokens });
    }
    if let Some(rng) = rng {
        actions.shuffle(rng);
    }
    if !wallet.withdraw_shares.is_zero() {
        actions.push(TradeAction::RedeemWithdrawalShares { shares: wallet.withdraw_shares });
    }
    actions.into_iter().map(Trade::new).collect()
}

/// Decide whether a failed trade stops the loop.
///
/// With `halt_on_errors` the failure is returned; slippage is returned only
/// when `halt_on_slippage` is also set. Anything not returned is logged.
pub fn check_result(
    result: Result<TradeReceipt, TradeError>,
    config: &TradeLoopConfig,
) -> Result<Option<TradeReceipt>> {
    match result {
        Ok(receipt) => Ok(Some(receipt)),
        Err(err) => {
            let halt = config.halt_on_errors && (!err.is_slippage() || config.halt_on_slippage);
            if halt {
                return Err(anyhow::Error::new(err).context("Trade failed with halt_on_errors set"));
            }
            if err.is_slippage() {
                warn!("Trade hit slippage guard: {}", err);
            } else {
                error!("Trade failed: {}", err);
            }
            Ok(None)
        }
    }
}

/// Run every agent's policy if a new block has arrived.
///
/// Returns the number of the block traded on, or `last_executed_block`
/// unchanged when there was nothing new.
pub async fn trade_if_new_block<I: HyperdriveInterface + ?Sized>(
    interface: &I,
    agents: &mut [Agent],
    config: &TradeLoopConfig,
    last_executed_block: u64,
) -> Result<u64> {
    let block = interface.current_block().await?;
    if config.wait_for_new_block && block.number <= last_executed_block {
        return Ok(last_executed_block);
    }

    // Read and policy failures are not trade results; they stop the loop
    // regardless of `halt_on_errors`.
    let state = interface.pool_state(block).await?;
    info!(
        "Block {} (time {}): spot price {}, fixed rate {}",
        block.number,
        block.timestamp,
        scaled_to_decimal(state.spot_price()?)?,
        scaled_to_decimal(state.fixed_rate()?)?,
    );

    for agent in agents.iter_mut().filter(|a| !a.done_trading) {
        let (trades, done_trading) = if config.liquidate {
            let minimum = state.pool_config.minimum_transaction_amount;
            let trades = if config.randomize_liquidation {
                liquidation_trades(&agent.wallet, minimum, Some(&mut StdRng::from_entropy()))
            } else {
                liquidation_trades::<StdRng>(&agent.wallet, minimum, None)
            };
            debug!("Agent {} liquidating with {} trade(s)", agent.address, trades.len());
            let flat = trades.is_empty();
            (trades, flat)
        } else {
            agent
                .policy
                .action(&state, &agent.wallet)
                .with_context(|| format!("Policy {} failed for {}", agent.policy.name(), agent.address))?
        };

        for trade in trades {
            info!("Agent {} ({}): {}", agent.address, agent.policy.name(), trade.action);
            let result = interface.execute(agent.address, &trade).await;
            let Some(receipt) = check_result(result, config)? else {
                continue;
            };
            let applied = agent
                .wallet
                .apply_deltas(&receipt.deltas)
                .map(|_| receipt)
                .map_err(TradeError::from);
            check_result(applied, config)?;
        }
        agent.done_trading = done_trading;
    }

    Ok(block.number)
}

/// Trade until every agent reports done.
pub async fn run_agents<I: HyperdriveInterface + ?Sized>(
    interface: &I,
    agents: &mut [Agent],
    config: &TradeLoopConfig,
) -> Result<()> {
    let mut last_executed_block = 0;
    let mut poll_latency = config.start_latency;

    while agents.iter().any(|a| !a.done_trading) {
        let traded_block = trade_if_new_block(interface, agents, config, last_executed_block).await?;
        if traded_block > last_executed_block || !config.wait_for_new_block {
            last_executed_block = traded_block;
            poll_latency = config.start_latency;
        } else {
            poll_latency = next_poll_latency(poll_latency, config.max_poll_latency);
        }
        sleep(poll_latency).await;
    }

    info!("All agents done trading");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::interface::mock::MockInterface;
    use crate::agent::policy::PolicyDecision;
    use crate::agent::wallet::{Long, Short, ShortDelta, WalletDeltas};
    use crate::fixed_point::ONE_18;
    use crate::hyperdrive::PoolState;
    use alloy::primitives::{B256, I256};
    use anyhow::anyhow;
    use std::collections::BTreeMap;

    /// Opens one long per call and finishes after `rounds` calls
    struct ScriptedPolicy {
        rounds: usize,
    }

    impl Policy for ScriptedPolicy {
        fn name(&self) -> &str {
            "scripted"
        }

        fn action(&mut self, _: &PoolState, _: &HyperdriveWallet) -> Result<PolicyDecision> {
            self.rounds = self.rounds.saturating_sub(1);
            let trade = Trade::new(TradeAction::OpenLong { base: ONE_18 });
            Ok((vec![trade], self.rounds == 0))
        }
    }

    fn open_long_receipt(maturity: u64) -> TradeReceipt {
        TradeReceipt {
            tx_hash: B256::repeat_byte(9),
            block_number: 1,
            deltas: WalletDeltas {
                base: -I256::from_raw(ONE_18),
                longs: BTreeMap::from([(maturity, I256::from_raw(ONE_18 + ONE_18 / U256::from(20)))]),
                ..Default::default()
            },
        }
    }

    fn agent(rounds: usize) -> Agent {
        Agent::new(
            Box::new(ScriptedPolicy { rounds }),
            HyperdriveWallet::new(Address::repeat_byte(5), ONE_18 * U256::from(10)),
        )
    }

    fn config(halt_on_errors: bool, halt_on_slippage: bool) -> TradeLoopConfig {
        TradeLoopConfig {
            halt_on_errors,
            halt_on_slippage,
            wait_for_new_block: true,
            liquidate: false,
            randomize_liquidation: false,
            start_latency: Duration::from_millis(1),
            max_poll_latency: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_trades_once_per_new_block() {
        let mock = MockInterface::new(&[1, 1, 2], vec![Ok(open_long_receipt(100)), Ok(open_long_receipt(200))]);
        let mut agents = vec![agent(5)];
        let cfg = config(true, false);

        let mut last = trade_if_new_block(&mock, &mut agents, &cfg, 0).await.unwrap();
        assert_eq!(last, 1);
        last = trade_if_new_block(&mock, &mut agents, &cfg, last).await.unwrap();
        assert_eq!(last, 1, "same block must not trade again");
        last = trade_if_new_block(&mock, &mut agents, &cfg, last).await.unwrap();
        assert_eq!(last, 2);

        assert_eq!(mock.executed.lock().unwrap().len(), 2);
        let wallet = &agents[0].wallet;
        assert_eq!(wallet.base, ONE_18 * U256::from(8));
        assert_eq!(wallet.longs.len(), 2);
    }

    #[tokio::test]
    async fn test_automine_trades_without_new_block() {
        let mock = MockInterface::new(&[3], vec![Ok(open_long_receipt(100)), Ok(open_long_receipt(100))]);
        let mut agents = vec![agent(5)];
        let mut cfg = config(true, false);
        cfg.wait_for_new_block = false;
        trade_if_new_block(&mock, &mut agents, &cfg, 0).await.unwrap();
        trade_if_new_block(&mock, &mut agents, &cfg, 3).await.unwrap();
        assert_eq!(mock.executed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_slippage_halts_only_with_halt_on_slippage() {
        let slippage = || Err(TradeError::Slippage("OutputLimit".into()));

        let mock = MockInterface::new(&[1], vec![slippage()]);
        let mut agents = vec![agent(5)];
        assert!(trade_if_new_block(&mock, &mut agents, &config(true, false), 0).await.is_ok());

        let mock = MockInterface::new(&[1], vec![slippage()]);
        assert!(trade_if_new_block(&mock, &mut agents, &config(true, true), 0).await.is_err());
    }

    #[tokio::test]
    async fn test_errors_logged_without_halt_on_errors() {
        let mock = MockInterface::new(&[1], vec![Err(TradeError::Other(anyhow!("boom")))]);
        let mut agents = vec![agent(5)];
        let before = agents[0].wallet.clone();
        assert!(trade_if_new_block(&mock, &mut agents, &config(false, false), 0).await.is_ok());
        assert_eq!(agents[0].wallet, before);

        let mock = MockInterface::new(&[1], vec![Err(TradeError::Other(anyhow!("boom")))]);
        assert!(trade_if_new_block(&mock, &mut agents, &config(true, false), 0).await.is_err());
    }

    #[tokio::test]
    async fn test_wallet_overdraw_is_a_trade_error() {
        let mut receipt = open_long_receipt(100);
        receipt.deltas.base = -I256::from_raw(ONE_18 * U256::from(1_000));
        let mock = MockInterface::new(&[1], vec![Ok(receipt)]);
        let mut agents = vec![agent(5)];
        assert!(trade_if_new_block(&mock, &mut agents, &config(true, false), 0).await.is_err());
        assert!(agents[0].wallet.longs.is_empty());
    }

    #[tokio::test]
    async fn test_run_agents_stops_when_all_done() {
        let results = (0..3).map(|i| Ok(open_long_receipt(100 + i))).collect();
        let mock = MockInterface::new(&[1, 2, 2, 2, 3], results);
        let mut agents = vec![agent(3)];
        run_agents(&mock, &mut agents, &config(true, false)).await.unwrap();
        assert!(agents[0].done_trading);
        assert_eq!(mock.executed.lock().unwrap().len(), 3);
        assert_eq!(agents[0].wallet.longs.len(), 3);
    }

    fn units(n: u64) -> U256 {
        ONE_18 * U256::from(n)
    }

    fn signed(n: u64) -> I256 {
        I256::from_raw(units(n))
    }

    /// Wallet holding a long, a short, LP and withdrawal shares
    fn invested_wallet() -> HyperdriveWallet {
        let mut wallet = HyperdriveWallet::new(Address::repeat_byte(5), units(10));
        wallet.longs.insert(100, Long { balance: units(3) });
        wallet.shorts.insert(200, Short { balance: units(4), open_share_price: ONE_18 });
        wallet.lp_tokens = units(5);
        wallet.withdraw_shares = units(1);
        wallet
    }

    fn receipt(deltas: WalletDeltas) -> TradeReceipt {
        TradeReceipt { tx_hash: B256::repeat_byte(1), block_number: 1, deltas }
    }

    #[test]
    fn test_liquidation_closes_everything_withdrawals_last() {
        let wallet = invested_wallet();
        let actions: Vec<TradeAction> = liquidation_trades::<StdRng>(&wallet, U256::ZERO, None)
            .into_iter()
            .map(|t| t.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                TradeAction::CloseLong { maturity_time: 100, bonds: units(3) },
                TradeAction::CloseShort { maturity_time: 200, bonds: units(4) },
                TradeAction::RemoveLiquidity { lp_shares: units(5) },
                TradeAction::RedeemWithdrawalShares { shares: units(1) },
            ]
        );

        let dust = liquidation_trades::<StdRng>(&wallet, units(4), None);
        let names: Vec<&str> = dust.iter().map(|t| t.action.name()).collect();
        assert_eq!(names, vec!["remove_liquidity", "redeem_withdrawal_shares"]);

        let flat = HyperdriveWallet::new(wallet.address, units(10));
        assert!(liquidation_trades::<StdRng>(&flat, U256::ZERO, None).is_empty());
    }

    #[test]
    fn test_randomized_liquidation_keeps_withdrawals_last() {
        let mut wallet = invested_wallet();
        for maturity in 300..310 {
            wallet.longs.insert(maturity, Long { balance: units(1) });
        }
        let ordered = liquidation_trades::<StdRng>(&wallet, U256::ZERO, None);
        let mut rng = StdRng::seed_from_u64(11);
        let shuffled = liquidation_trades(&wallet, U256::ZERO, Some(&mut rng));

        assert_eq!(shuffled.len(), ordered.len());
        assert_ne!(shuffled, ordered);
        assert!(matches!(
            shuffled.last().map(|t| t.action),
            Some(TradeAction::RedeemWithdrawalShares { .. })
        ));
        for trade in &ordered {
            assert!(shuffled.contains(trade));
        }
    }

    #[tokio::test]
    async fn test_liquidation_mode_flattens_wallet_then_stops() {
        let close_all = WalletDeltas {
            base: signed(12),
            lp_tokens: -signed(5),
            withdraw_shares: -signed(1),
            longs: BTreeMap::from([(100, -signed(3))]),
            shorts: BTreeMap::from([(200, ShortDelta { balance: -signed(4), open_share_price: ONE_18 })]),
        };
        let results = vec![
            Ok(receipt(WalletDeltas { longs: close_all.longs.clone(), ..Default::default() })),
            Ok(receipt(WalletDeltas { shorts: close_all.shorts.clone(), ..Default::default() })),
            Ok(receipt(WalletDeltas { lp_tokens: close_all.lp_tokens, ..Default::default() })),
            Ok(receipt(WalletDeltas {
                base: close_all.base,
                withdraw_shares: close_all.withdraw_shares,
                ..Default::default()
            })),
        ];
        let mock = MockInterface::new(&[1, 2], results);
        let mut agents = vec![Agent::new(Box::new(ScriptedPolicy { rounds: 5 }), invested_wallet())];
        let mut cfg = config(false, false);
        cfg.liquidate = true;

        run_agents(&mock, &mut agents, &cfg).await.unwrap();

        assert!(agents[0].done_trading);
        assert!(!agents[0].wallet.has_positions());
        assert_eq!(agents[0].wallet.base, units(22));
        let actions = mock.executed_actions();
        assert_eq!(actions.len(), 4, "policy never consulted");
        assert!(actions.iter().all(|a| !matches!(a, TradeAction::OpenLong { .. })));
    }

    #[tokio::test]
    async fn test_liquidation_continues_past_failed_redemption() {
        let results = vec![Err(TradeError::Other(anyhow!("no idle liquidity")))];
        let mock = MockInterface::new(&[1], results);
        let mut wallet = HyperdriveWallet::new(Address::repeat_byte(5), units(1));
        wallet.withdraw_shares = units(1);
        let mut agents = vec![Agent::new(Box::new(ScriptedPolicy { rounds: 5 }), wallet)];

        let general: GeneralConfig = toml::from_str("liquidate = true").unwrap();
        let mut cfg = TradeLoopConfig::from_general(&general, false);
        cfg.start_latency = Duration::from_millis(1);

        assert!(trade_if_new_block(&mock, &mut agents, &cfg, 0).await.is_ok());
        assert!(!agents[0].done_trading, "shares still held");
        assert_eq!(mock.executed_actions().len(), 1);
    }

    #[test]
    fn test_from_general_honors_automine_and_liquidation() {
        let general: GeneralConfig = toml::from_str("").unwrap();
        let cfg = TradeLoopConfig::from_general(&general, false);
        assert!(cfg.wait_for_new_block);
        assert!(cfg.halt_on_errors);
        assert!(!cfg.liquidate);

        assert!(!TradeLoopConfig::from_general(&general, true).wait_for_new_block);

        let liquidating: GeneralConfig =
            toml::from_str("liquidate = true\nrandomize_liquidation = true").unwrap();
        let cfg = TradeLoopConfig::from_general(&liquidating, false);
        assert!(cfg.liquidate && cfg.randomize_liquidation);
        assert!(!cfg.halt_on_errors);
    }

    #[test]
    fn test_poll_latency_backs_off_to_cap() {
        let max = Duration::from_secs(30);
        let mut latency = Duration::from_millis(1_500);
        let mut seen = vec![];
        for _ in 0..8 {
            latency = next_poll_latency(latency, max);
            seen.push(latency);
        }
        assert_eq!(seen[0], Duration::from_secs(3));
        assert_eq!(seen[1], Duration::from_secs(6));
        assert!(seen.iter().all(|l| *l <= max));
        assert_eq!(*seen.last().unwrap(), max);
        let start = start_latency();
        assert!(start >= Duration::from_secs(1) && start < Duration::from_secs(2));
    }
}
