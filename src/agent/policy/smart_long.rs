use super::{gonna_trade, Policy, PolicyDecision, PolicyParams};
use crate::agent::action::{Trade, TradeAction};
use crate::agent::wallet::HyperdriveWallet;
use crate::fixed_point::{div_down, mul_down, ONE_18};
use crate::hyperdrive::PoolState;
use alloy::primitives::U256;
use anyhow::Result;
use rand::rngs::StdRng;
use tracing::debug;

/// Opens a long when the fixed rate sits above the variable rate, sized to
/// pull the fixed rate down to it. Closes longs once they mature and holds
/// at most one long at a time.
pub struct SmartLong {
    params: PolicyParams,
    rng: StdRng,
}

impl SmartLong {
    pub const NAME: &'static str = "smart_long";

    pub fn new(params: PolicyParams) -> Self {
        let rng = params.rng();
        Self { params, rng }
    }

    /// Base to spend so the fixed rate moves to `target_rate`.
    ///
    /// Bonds bought are valued at the spot price and halved, since the
    /// trade also grows the share reserves.
    fn long_size(state: &PoolState, target_rate: U256) -> Result<U256> {
        let target_bonds = state.bonds_given_rate(target_rate)?;
        let excess_bonds = state.pool_info.bond_reserves.saturating_sub(target_bonds);
        let base = mul_down(excess_bonds, state.spot_price()?)?;
        Ok(div_down(base, ONE_18 * U256::from(2))?)
    }
}

impl Policy for SmartLong {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn action(&mut self, state: &PoolState, wallet: &HyperdriveWallet) -> Result<PolicyDecision> {
        if !gonna_trade(&mut self.rng, self.params.trade_chance) {
            return Ok((vec![], false));
        }
        let slippage = self.params.slippage_tolerance;
        let mut trades: Vec<Trade> = wallet
            .longs
            .iter()
            .filter(|(maturity, _)| state.is_mature(**maturity))
            .map(|(maturity, long)| {
                Trade::new(TradeAction::CloseLong {
                    maturity_time: *maturity,
                    bonds: long.balance,
                })
                .with_slippage(slippage)
            })
            .collect();

        let fixed_rate = state.fixed_rate()?;
        let variable_rate = state.variable_rate.unwrap_or(self.params.variable_rate);
        let has_long = wallet.longs.values().any(|l| !l.balance.is_zero());
        if fixed_rate > variable_rate
            && fixed_rate - variable_rate > self.params.risk_threshold
            && !has_long
        {
            let amount = Self::long_size(state, variable_rate)?
                .min(wallet.base)
                .min(self.params.budget);
            debug!(
                "smart_long: fixed {} > variable {}, long size {}",
                fixed_rate, variable_rate, amount
            );
            if amount >= state.pool_config.minimum_transaction_amount {
                trades.push(Trade::new(TradeAction::OpenLong { base: amount }).with_slippage(slippage));
            }
        }
        Ok((trades, false))
    }
}
