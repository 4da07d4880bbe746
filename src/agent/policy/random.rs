use super::{gonna_trade, random_amount, Policy, PolicyDecision, PolicyParams};
use crate::agent::action::{Trade, TradeAction};
use crate::agent::wallet::HyperdriveWallet;
use crate::hyperdrive::PoolState;
use alloy::primitives::U256;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    OpenLong,
    OpenShort,
    AddLiquidity,
    CloseLong,
    CloseShort,
    RemoveLiquidity,
    RedeemWithdrawalShares,
}

/// Picks a uniformly random feasible action with a random size.
pub struct RandomPolicy {
    params: PolicyParams,
    rng: StdRng,
}

impl RandomPolicy {
    pub const NAME: &'static str = "random";

    pub fn new(params: PolicyParams) -> Self {
        let rng = params.rng();
        Self { params, rng }
    }

    fn available_actions(state: &PoolState, wallet: &HyperdriveWallet) -> Vec<ActionKind> {
        let mut actions = Vec::new();
        if wallet.base > state.pool_config.minimum_transaction_amount {
            actions.extend([ActionKind::OpenLong, ActionKind::OpenShort, ActionKind::AddLiquidity]);
        }
        if !wallet.longs.is_empty() {
            actions.push(ActionKind::CloseLong);
        }
        if !wallet.shorts.is_empty() {
            actions.push(ActionKind::CloseShort);
        }
        if !wallet.lp_tokens.is_zero() {
            actions.push(ActionKind::RemoveLiquidity);
        }
        if !wallet.withdraw_shares.is_zero()
            && !state.pool_info.withdrawal_shares_ready_to_withdraw.is_zero()
        {
            actions.push(ActionKind::RedeemWithdrawalShares);
        }
        actions
    }

    /// Random open size between the pool minimum and the budget held.
    fn open_amount(&mut self, state: &PoolState, wallet: &HyperdriveWallet) -> Result<U256> {
        let high = wallet.base.min(self.params.budget);
        random_amount(&mut self.rng, state.pool_config.minimum_transaction_amount, high)
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn action(&mut self, state: &PoolState, wallet: &HyperdriveWallet) -> Result<PolicyDecision> {
        if !gonna_trade(&mut self.rng, self.params.trade_chance) {
            return Ok((vec![], false));
        }
        let available = Self::available_actions(state, wallet);
        let Some(&kind) = self.pick(&available) else {
            return Ok((vec![], false));
        };

        let action = match kind {
            ActionKind::OpenLong => TradeAction::OpenLong {
                base: self.open_amount(state, wallet)?,
            },
            ActionKind::OpenShort => TradeAction::OpenShort {
                bonds: self.open_amount(state, wallet)?,
            },
            ActionKind::AddLiquidity => TradeAction::AddLiquidity {
                base: self.open_amount(state, wallet)?,
            },
            ActionKind::CloseLong => {
                let maturities: Vec<u64> = wallet.longs.keys().copied().collect();
                let maturity_time = *self.pick(&maturities).unwrap_or(&0);
                TradeAction::CloseLong {
                    maturity_time,
                    bonds: wallet.longs.get(&maturity_time).map(|l| l.balance).unwrap_or_default(),
                }
            }
            ActionKind::CloseShort => {
                let maturities: Vec<u64> = wallet.shorts.keys().copied().collect();
                let maturity_time = *self.pick(&maturities).unwrap_or(&0);
                TradeAction::CloseShort {
                    maturity_time,
                    bonds: wallet.shorts.get(&maturity_time).map(|s| s.balance).unwrap_or_default(),
                }
            }
            ActionKind::RemoveLiquidity => {
                let minimum = state.pool_config.minimum_transaction_amount.min(wallet.lp_tokens);
                TradeAction::RemoveLiquidity {
                    lp_shares: random_amount(&mut self.rng, minimum, wallet.lp_tokens)?,
                }
            }
            ActionKind::RedeemWithdrawalShares => TradeAction::RedeemWithdrawalShares {
                shares: wallet.withdraw_shares,
            },
        };

        let trade = Trade::new(action).with_slippage(self.params.slippage_tolerance);
        Ok((vec![trade], false))
    }
}
