use super::{gonna_trade, Policy, PolicyDecision, PolicyParams};
use crate::agent::action::{Trade, TradeAction};
use crate::agent::wallet::HyperdriveWallet;
use crate::fixed_point::{div_down, ONE_18};
use crate::hyperdrive::PoolState;
use alloy::primitives::U256;
use anyhow::Result;
use rand::rngs::StdRng;
use tracing::debug;

/// Mirror of [`super::SmartLong`]: shorts when the variable rate sits above
/// the fixed rate.
pub struct SmartShort {
    params: PolicyParams,
    rng: StdRng,
}

impl SmartShort {
    pub const NAME: &'static str = "smart_short";

    pub fn new(params: PolicyParams) -> Self {
        let rng = params.rng();
        Self { params, rng }
    }

    /// Bonds to short so the fixed rate rises to `target_rate`, halved for
    /// the share reserves the trade removes.
    fn short_size(state: &PoolState, target_rate: U256) -> Result<U256> {
        let target_bonds = state.bonds_given_rate(target_rate)?;
        let missing_bonds = target_bonds.saturating_sub(state.pool_info.bond_reserves);
        Ok(div_down(missing_bonds, ONE_18 * U256::from(2))?)
    }

    /// Largest short `base` can cover, with deposit ~ bonds * (1 - p).
    fn max_short(state: &PoolState, base: U256) -> Result<U256> {
        let spot_price = state.spot_price()?;
        if spot_price >= ONE_18 {
            return Ok(U256::ZERO);
        }
        Ok(div_down(base, ONE_18 - spot_price)?)
    }
}

impl Policy for SmartShort {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn action(&mut self, state: &PoolState, wallet: &HyperdriveWallet) -> Result<PolicyDecision> {
        if !gonna_trade(&mut self.rng, self.params.trade_chance) {
            return Ok((vec![], false));
        }
        let slippage = self.params.slippage_tolerance;
        let mut trades: Vec<Trade> = wallet
            .shorts
            .iter()
            .filter(|(maturity, _)| state.is_mature(**maturity))
            .map(|(maturity, short)| {
                Trade::new(TradeAction::CloseShort {
                    maturity_time: *maturity,
                    bonds: short.balance,
                })
                .with_slippage(slippage)
            })
            .collect();

        let fixed_rate = state.fixed_rate()?;
        let variable_rate = state.variable_rate.unwrap_or(self.params.variable_rate);
        let has_short = wallet.shorts.values().any(|s| !s.balance.is_zero());
        if variable_rate > fixed_rate
            && variable_rate - fixed_rate > self.params.risk_threshold
            && !has_short
        {
            let budget = wallet.base.min(self.params.budget);
            let bonds = Self::short_size(state, variable_rate)?.min(Self::max_short(state, budget)?);
            debug!(
                "smart_short: variable {} > fixed {}, short size {}",
                variable_rate, fixed_rate, bonds
            );
            if bonds >= state.pool_config.minimum_transaction_amount {
                trades.push(Trade::new(TradeAction::OpenShort { bonds }).with_slippage(slippage));
            }
        }
        Ok((trades, false))
    }
}
