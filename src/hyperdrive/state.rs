//! Pool State Snapshots
//!
//! Plain mirrors of `getPoolConfig`, `getPoolInfo` and `getCheckpoint`, plus
//! a per-block `PoolState` bundling them with block metadata. Derived
//! quantities (spot price, fixed rate) are computed on demand.

use super::calculator::{
    calculate_bonds_given_shares_and_rate, calculate_fixed_rate, calculate_spot_price,
    checkpoint_time, effective_share_reserves,
};
use crate::contracts::IHyperdrive;
use crate::fixed_point::{i256_from_i128, FixedPointResult};
use alloy::primitives::{Address, I256, U256};
use serde::{Deserialize, Serialize};

/// Block number and timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fees {
    pub curve: U256,
    pub flat: U256,
    pub governance: U256,
}

/// Immutable pool parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub base_token: Address,
    pub initial_share_price: U256,
    pub minimum_share_reserves: U256,
    pub minimum_transaction_amount: U256,
    /// Seconds
    pub position_duration: u64,
    /// Seconds
    pub checkpoint_duration: u64,
    pub time_stretch: U256,
    pub governance: Address,
    pub fee_collector: Address,
    pub fees: Fees,
    pub oracle_size: U256,
    pub update_gap: U256,
}

/// Mutable pool reserves and accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub share_reserves: U256,
    pub share_adjustment: I256,
    pub bond_reserves: U256,
    pub lp_total_supply: U256,
    pub share_price: U256,
    pub longs_outstanding: U256,
    pub long_average_maturity_time: U256,
    pub shorts_outstanding: U256,
    pub short_average_maturity_time: U256,
    pub withdrawal_shares_ready_to_withdraw: U256,
    pub withdrawal_shares_proceeds: U256,
    pub lp_share_price: U256,
    pub long_exposure: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub share_price: U256,
    pub long_exposure: I256,
}

impl From<IHyperdrive::PoolConfig> for PoolConfig {
    fn from(c: IHyperdrive::PoolConfig) -> Self {
        Self {
            base_token: c.baseToken,
            initial_share_price: c.initialSharePrice,
            minimum_share_reserves: c.minimumShareReserves,
            minimum_transaction_amount: c.minimumTransactionAmount,
            position_duration: c.positionDuration.saturating_to(),
            checkpoint_duration: c.checkpointDuration.saturating_to(),
            time_stretch: c.timeStretch,
            governance: c.governance,
            fee_collector: c.feeCollector,
            fees: Fees {
                curve: c.fees.curve,
                flat: c.fees.flat,
                governance: c.fees.governance,
            },
            oracle_size: c.oracleSize,
            update_gap: c.updateGap,
        }
    }
}

impl From<IHyperdrive::PoolInfo> for PoolInfo {
    fn from(i: IHyperdrive::PoolInfo) -> Self {
        Self {
            share_reserves: i.shareReserves,
            share_adjustment: i.shareAdjustment,
            bond_reserves: i.bondReserves,
            lp_total_supply: i.lpTotalSupply,
            share_price: i.sharePrice,
            longs_outstanding: i.longsOutstanding,
            long_average_maturity_time: i.longAverageMaturityTime,
            shorts_outstanding: i.shortsOutstanding,
            short_average_maturity_time: i.shortAverageMaturityTime,
            withdrawal_shares_ready_to_withdraw: i.withdrawalSharesReadyToWithdraw,
            withdrawal_shares_proceeds: i.withdrawalSharesProceeds,
            lp_share_price: i.lpSharePrice,
            long_exposure: i.longExposure,
        }
    }
}

impl From<IHyperdrive::Checkpoint> for Checkpoint {
    fn from(c: IHyperdrive::Checkpoint) -> Self {
        Self {
            share_price: U256::from(c.sharePrice),
            long_exposure: i256_from_i128(c.longExposure),
        }
    }
}

impl PoolConfig {
    pub fn checkpoint_time(&self, timestamp: u64) -> u64 {
        checkpoint_time(timestamp, self.checkpoint_duration)
    }
}

/// Pool snapshot at one block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub block: BlockInfo,
    pub pool_config: PoolConfig,
    pub pool_info: PoolInfo,
    pub checkpoint: Checkpoint,
    /// Yield source rate, when the pool's vault exposes one
    pub variable_rate: Option<U256>,
}

impl PoolState {
    pub fn block_number(&self) -> u64 {
        self.block.number
    }

    pub fn block_time(&self) -> u64 {
        self.block.timestamp
    }

    pub fn effective_share_reserves(&self) -> FixedPointResult<U256> {
        effective_share_reserves(self.pool_info.share_reserves, self.pool_info.share_adjustment)
    }

    pub fn spot_price(&self) -> FixedPointResult<U256> {
        calculate_spot_price(
            self.effective_share_reserves()?,
            self.pool_info.bond_reserves,
            self.pool_config.initial_share_price,
            self.pool_config.time_stretch,
        )
    }

    pub fn fixed_rate(&self) -> FixedPointResult<U256> {
        calculate_fixed_rate(self.spot_price()?, self.pool_config.position_duration)
    }

    /// Bond reserves that would put the fixed rate at `target_rate`.
    pub fn bonds_given_rate(&self, target_rate: U256) -> FixedPointResult<U256> {
        calculate_bonds_given_shares_and_rate(
            self.effective_share_reserves()?,
            self.pool_config.initial_share_price,
            target_rate,
            self.pool_config.position_duration,
            self.pool_config.time_stretch,
        )
    }

    pub fn checkpoint_time(&self) -> u64 {
        self.pool_config.checkpoint_time(self.block.timestamp)
    }

    /// True when a position with this maturity can be closed at par.
    pub fn is_mature(&self, maturity_time: u64) -> bool {
        self.block.timestamp >= maturity_time
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::fixed_point::ONE_18;

    /// One-year pool with 1M shares at a ~5% fixed rate
    pub fn pool_state(block: u64, timestamp: u64) -> PoolState {
        let pool_config = PoolConfig {
            initial_share_price: ONE_18,
            minimum_transaction_amount: ONE_18 / U256::from(1_000),
            position_duration: 365 * 24 * 60 * 60,
            checkpoint_duration: 24 * 60 * 60,
            time_stretch: ONE_18 / U256::from(22),
            ..Default::default()
        };
        let share_reserves = U256::from(1_000_000) * ONE_18;
        let mut state = PoolState {
            block: BlockInfo { number: block, timestamp },
            pool_config,
            pool_info: PoolInfo {
                share_reserves,
                share_price: ONE_18,
                lp_share_price: ONE_18,
                ..Default::default()
            },
            checkpoint: Checkpoint::default(),
            variable_rate: None,
        };
        state.pool_info.bond_reserves = state
            .bonds_given_rate(ONE_18 * U256::from(5) / U256::from(100))
            .unwrap_or_default();
        state
    }
}
