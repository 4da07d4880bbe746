//! Hyperdrive Pricing Calculator
//!
//! Closed-form YieldSpace formulas used by the bots and chainsync:
//! effective share reserves, spot price, fixed rate (APR), the bond
//! reserves that produce a target rate, and weighted-average updates for
//! position accounting. All inputs and outputs are 18-decimal fixed point
//! unless the parameter is a duration in seconds.

use crate::fixed_point::{
    div_down, div_up, mul_down, mul_up, pow, sub, FixedPointError, FixedPointResult, ONE_18,
};
use alloy::primitives::{I256, U256};

/// Seconds in the 365-day year used to annualize rates
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Update a weighted average after adding or removing `delta` with weight
/// `delta_weight`.
///
/// Removing the entire weight returns exactly zero rather than dividing by
/// zero.
pub fn update_weighted_average(
    average: U256,
    total_weight: U256,
    delta: U256,
    delta_weight: U256,
    is_adding: bool,
) -> FixedPointResult<U256> {
    if is_adding {
        let new_weight = total_weight
            .checked_add(delta_weight)
            .ok_or(FixedPointError::Overflow("update_weighted_average"))?;
        if new_weight.is_zero() {
            return Ok(U256::ZERO);
        }
        let weighted = mul_down(total_weight, average)?
            .checked_add(mul_down(delta_weight, delta)?)
            .ok_or(FixedPointError::Overflow("update_weighted_average"))?;
        return div_down(weighted, new_weight);
    }

    if total_weight == delta_weight {
        return Ok(U256::ZERO);
    }
    let remaining_weight = sub(total_weight, delta_weight)?;
    let weighted = sub(
        mul_down(total_weight, average)?,
        mul_down(delta_weight, delta)?,
    )?;
    div_down(weighted, remaining_weight)
}

/// z_e = z - zeta, the share reserves the pricing curve actually sees.
pub fn effective_share_reserves(
    share_reserves: U256,
    share_adjustment: I256,
) -> FixedPointResult<U256> {
    let adjustment = share_adjustment.unsigned_abs();
    if share_adjustment.is_negative() {
        share_reserves
            .checked_add(adjustment)
            .ok_or(FixedPointError::Overflow("effective_share_reserves"))
    } else {
        sub(share_reserves, adjustment)
    }
}

/// p = ((mu * z_e) / y) ^ ts
pub fn calculate_spot_price(
    effective_share_reserves: U256,
    bond_reserves: U256,
    initial_share_price: U256,
    time_stretch: U256,
) -> FixedPointResult<U256> {
    let ratio = div_down(
        mul_down(initial_share_price, effective_share_reserves)?,
        bond_reserves,
    )?;
    pow(ratio, time_stretch)
}

/// Position duration as a fraction of a year.
pub fn annualized_time(duration_secs: u64) -> FixedPointResult<U256> {
    div_down(U256::from(duration_secs), U256::from(SECONDS_PER_YEAR))
}

/// r = (1 - p) / (p * t)
pub fn calculate_fixed_rate(spot_price: U256, position_duration_secs: u64) -> FixedPointResult<U256> {
    let t = annualized_time(position_duration_secs)?;
    div_down(sub(ONE_18, spot_price)?, mul_up(spot_price, t)?)
}

/// Bond reserves at which the pool's fixed rate equals `target_rate`:
/// y = mu * z_e * (1 + r * t) ^ (1 / ts)
pub fn calculate_bonds_given_shares_and_rate(
    effective_share_reserves: U256,
    initial_share_price: U256,
    target_rate: U256,
    position_duration_secs: u64,
    time_stretch: U256,
) -> FixedPointResult<U256> {
    let t = annualized_time(position_duration_secs)?;
    let inner = ONE_18
        .checked_add(mul_down(target_rate, t)?)
        .ok_or(FixedPointError::Overflow("calculate_bonds_given_shares_and_rate"))?;
    let growth = pow(inner, div_up(ONE_18, time_stretch)?)?;
    mul_down(mul_down(initial_share_price, effective_share_reserves)?, growth)
}

/// Start of the checkpoint containing `timestamp`.
pub fn checkpoint_time(timestamp: u64, checkpoint_duration: u64) -> u64 {
    if checkpoint_duration == 0 {
        return timestamp;
    }
    timestamp - timestamp % checkpoint_duration
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(numerator: u64, denominator: u64) -> U256 {
        U256::from(numerator) * ONE_18 / U256::from(denominator)
    }

    fn diff(a: U256, b: U256) -> U256 {
        if a > b { a - b } else { b - a }
    }

    #[test]
    fn test_weighted_average_add_then_remove_restores_average() {
        let average = fp(5, 100);
        let weight = fp(100, 1);
        let delta = fp(7, 100);
        let delta_weight = fp(50, 1);

        let added = update_weighted_average(average, weight, delta, delta_weight, true).unwrap();
        // (100 * 0.05 + 50 * 0.07) / 150
        assert!(diff(added, fp(85, 1500)) <= U256::from(1));

        let restored =
            update_weighted_average(added, weight + delta_weight, delta, delta_weight, false)
                .unwrap();
        assert!(diff(restored, average) <= U256::from(1_000), "restored {}", restored);
    }

    #[test]
    fn test_weighted_average_removing_all_weight_is_zero() {
        let result =
            update_weighted_average(fp(3, 1), fp(10, 1), fp(3, 1), fp(10, 1), false).unwrap();
        assert_eq!(result, U256::ZERO);
    }

    #[test]
    fn test_weighted_average_from_empty() {
        let result =
            update_weighted_average(U256::ZERO, U256::ZERO, fp(12, 10), fp(4, 1), true).unwrap();
        assert_eq!(result, fp(12, 10));
    }

    #[test]
    fn test_effective_share_reserves_signs() {
        let z = fp(100, 1);
        assert_eq!(effective_share_reserves(z, I256::try_from(fp(10, 1)).unwrap()).unwrap(), fp(90, 1));
        assert_eq!(effective_share_reserves(z, -I256::try_from(fp(10, 1)).unwrap()).unwrap(), fp(110, 1));
        assert!(effective_share_reserves(fp(1, 1), I256::try_from(fp(2, 1)).unwrap()).is_err());
    }

    #[test]
    fn test_spot_price_of_balanced_pool_is_one() {
        let price = calculate_spot_price(fp(100, 1), fp(100, 1), ONE_18, fp(1, 22)).unwrap();
        assert!(diff(price, ONE_18) <= U256::from(100));
    }

    #[test]
    fn test_fixed_rate_from_spot_price() {
        // p = 0.95 over one year: r = 0.05 / 0.95
        let rate = calculate_fixed_rate(fp(95, 100), SECONDS_PER_YEAR).unwrap();
        assert!(diff(rate, fp(5, 95)) <= U256::from(10), "rate {}", rate);
        assert_eq!(calculate_fixed_rate(ONE_18, SECONDS_PER_YEAR).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_bonds_given_rate_round_trips_through_fixed_rate() {
        let shares = fp(1_000_000, 1);
        let mu = ONE_18;
        let ts = fp(1, 22);
        let target = fp(5, 100);
        let bonds =
            calculate_bonds_given_shares_and_rate(shares, mu, target, SECONDS_PER_YEAR, ts).unwrap();
        let price = calculate_spot_price(shares, bonds, mu, ts).unwrap();
        let rate = calculate_fixed_rate(price, SECONDS_PER_YEAR).unwrap();
        // within 1e-9 of the target
        assert!(diff(rate, target) <= U256::from(1_000_000_000u64), "rate {}", rate);
    }

    #[test]
    fn test_checkpoint_time() {
        assert_eq!(checkpoint_time(1_700_003_601, 3_600), 1_700_002_800);
        assert_eq!(checkpoint_time(7_200, 3_600), 7_200);
        assert_eq!(checkpoint_time(42, 0), 42);
    }
}
