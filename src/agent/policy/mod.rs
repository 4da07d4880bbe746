//! Trading Policies
//!
//! A policy looks at the pool and the agent's wallet once per block and
//! returns the trades to make, plus whether the agent is done trading.
//! Policies are built from the `[[agent]]` config by name.

mod random;
mod smart_long;
mod smart_short;

pub use random::RandomPolicy;
pub use smart_long::SmartLong;
pub use smart_short::SmartShort;

use super::action::Trade;
use super::wallet::HyperdriveWallet;
use crate::config::AgentConfig;
use crate::fixed_point::mul_down;
use crate::hyperdrive::scaled::decimal_to_scaled;
use crate::hyperdrive::PoolState;
use alloy::primitives::U256;
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Trades to submit this block and whether the agent should stop
pub type PolicyDecision = (Vec<Trade>, bool);

pub trait Policy: Send + Sync {
    /// Name used in config files and logs
    fn name(&self) -> &str;

    fn action(&mut self, state: &PoolState, wallet: &HyperdriveWallet) -> Result<PolicyDecision>;
}

/// Policy parameters in fixed-point form
#[derive(Debug, Clone)]
pub struct PolicyParams {
    pub budget: U256,
    pub trade_chance: f64,
    pub risk_threshold: U256,
    pub slippage_tolerance: Option<U256>,
    /// Used when the pool reports no variable rate
    pub variable_rate: U256,
    pub seed: Option<u64>,
}

impl PolicyParams {
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.trade_chance) {
            bail!("trade_chance must be within [0, 1], got {}", config.trade_chance);
        }
        Ok(Self {
            budget: decimal_to_scaled(config.base_budget)?,
            trade_chance: config.trade_chance,
            risk_threshold: decimal_to_scaled(config.risk_threshold)?,
            slippage_tolerance: config
                .slippage_tolerance
                .map(decimal_to_scaled)
                .transpose()?,
            variable_rate: decimal_to_scaled(config.variable_rate)?,
            seed: config.seed,
        })
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Build a policy from its config name.
pub fn build_policy(name: &str, params: PolicyParams) -> Result<Box<dyn Policy>> {
    Ok(match name {
        RandomPolicy::NAME => Box::new(RandomPolicy::new(params)),
        SmartLong::NAME => Box::new(SmartLong::new(params)),
        SmartShort::NAME => Box::new(SmartShort::new(params)),
        other => bail!(
            "Unknown policy '{}'; expected one of {}, {}, {}",
            other,
            RandomPolicy::NAME,
            SmartLong::NAME,
            SmartShort::NAME
        ),
    })
}

/// Weighted coin flip shared by all policies.
fn gonna_trade(rng: &mut StdRng, trade_chance: f64) -> bool {
    rng.gen_bool(trade_chance.clamp(0.0, 1.0))
}

/// Uniform amount in `[low, high]`; `low` when the range is empty.
fn random_amount(rng: &mut StdRng, low: U256, high: U256) -> Result<U256> {
    if high <= low {
        return Ok(low);
    }
    let fraction = U256::from(rng.gen_range(0..=1_000_000_000_000_000_000u64));
    Ok(low + mul_down(high - low, fraction)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::ONE_18;

    pub(super) fn params(seed: u64) -> PolicyParams {
        PolicyParams {
            budget: ONE_18 * U256::from(10_000),
            trade_chance: 1.0,
            risk_threshold: ONE_18 / U256::from(10_000),
            slippage_tolerance: Some(ONE_18 / U256::from(100)),
            variable_rate: ONE_18 * U256::from(5) / U256::from(100),
            seed: Some(seed),
        }
    }

    #[test]
    fn test_factory_builds_known_policies() {
        for name in ["random", "smart_long", "smart_short"] {
            assert_eq!(build_policy(name, params(1)).unwrap().name(), name);
        }
        assert!(build_policy("lp_and_arb", params(1)).is_err());
    }

    #[test]
    fn test_random_amount_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let low = U256::from(10);
        let high = ONE_18;
        for _ in 0..100 {
            let amount = random_amount(&mut rng, low, high).unwrap();
            assert!(amount >= low && amount <= high);
        }
        assert_eq!(random_amount(&mut rng, high, low).unwrap(), high);
    }

    #[test]
    fn test_coin_flip_extremes() {
        let mut rng = StdRng::seed_from_u64(9);
        assert!((0..50).all(|_| gonna_trade(&mut rng, 1.0)));
        assert!((0..50).all(|_| !gonna_trade(&mut rng, 0.0)));
    }
}
