//! Scaled Value Conversion
//!
//! On-chain amounts are integers carrying an implicit 1e18 scale. These
//! helpers recover the decimal value for storage and display. Values with
//! more than 28 significant digits are rounded by `rust_decimal`.

use alloy::primitives::{I256, U256};
use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Implicit decimal places of a scaled value
pub const SCALE_DECIMALS: usize = 18;

/// Convert an optional scaled integer to a decimal; `None` passes through.
pub fn convert_scaled_value(value: Option<U256>) -> Result<Option<Decimal>> {
    value.map(scaled_to_decimal).transpose()
}

/// Signed counterpart of [`convert_scaled_value`].
pub fn convert_scaled_signed_value(value: Option<I256>) -> Result<Option<Decimal>> {
    value.map(signed_scaled_to_decimal).transpose()
}

/// Divide a scaled integer by 1e18.
pub fn scaled_to_decimal(value: U256) -> Result<Decimal> {
    let digits = value.to_string();
    let text = if digits.len() > SCALE_DECIMALS {
        let split = digits.len() - SCALE_DECIMALS;
        format!("{}.{}", &digits[..split], &digits[split..])
    } else {
        format!("0.{:0>width$}", digits, width = SCALE_DECIMALS)
    };
    let decimal = Decimal::from_str(&text)
        .with_context(|| format!("Scaled value {} does not fit in a decimal", value))?;
    Ok(decimal.normalize())
}

pub fn signed_scaled_to_decimal(value: I256) -> Result<Decimal> {
    let magnitude = scaled_to_decimal(value.unsigned_abs())?;
    Ok(if value.is_negative() { -magnitude } else { magnitude })
}

/// Scale a non-negative decimal up to an 18-decimal integer, truncating
/// digits past the 18th place.
pub fn decimal_to_scaled(value: Decimal) -> Result<U256> {
    if value.is_sign_negative() && !value.is_zero() {
        bail!("Cannot scale negative value {}", value);
    }
    let text = value.normalize().to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((&text, ""));
    let fraction: String = fraction.chars().take(SCALE_DECIMALS).collect();
    let digits = format!("{}{:0<width$}", whole, fraction, width = SCALE_DECIMALS);
    U256::from_str(&digits).with_context(|| format!("Cannot scale {}", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_none_passes_through() {
        assert_eq!(convert_scaled_value(None).unwrap(), None);
        assert_eq!(convert_scaled_signed_value(None).unwrap(), None);
    }

    #[test]
    fn test_zero_converts_to_zero() {
        assert_eq!(convert_scaled_value(Some(U256::ZERO)).unwrap(), Some(Decimal::ZERO));
    }

    #[test]
    fn test_scaled_values() {
        let one_and_half = U256::from(1_500_000_000_000_000_000u64);
        assert_eq!(scaled_to_decimal(one_and_half).unwrap(), dec!(1.5));
        assert_eq!(scaled_to_decimal(U256::from(1)).unwrap(), dec!(0.000000000000000001));
        let signed = -I256::try_from(one_and_half).unwrap();
        assert_eq!(signed_scaled_to_decimal(signed).unwrap(), dec!(-1.5));
    }

    #[test]
    fn test_conversion_is_monotonic() {
        let inputs = [
            U256::ZERO,
            U256::from(1),
            U256::from(999_999_999_999_999_999u64),
            U256::from(1_000_000_000_000_000_000u64),
            U256::from(10).pow(U256::from(27)),
            U256::from(10).pow(U256::from(30)) + U256::from(7),
        ];
        let outputs: Vec<Decimal> = inputs
            .iter()
            .map(|v| scaled_to_decimal(*v).unwrap())
            .collect();
        for pair in outputs.windows(2) {
            assert!(pair[0] <= pair[1], "{} > {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_decimal_to_scaled() {
        assert_eq!(decimal_to_scaled(dec!(1)).unwrap(), U256::from(10u64.pow(18)));
        assert_eq!(decimal_to_scaled(dec!(0.05)).unwrap(), U256::from(5 * 10u64.pow(16)));
        assert_eq!(decimal_to_scaled(dec!(10000)).unwrap(), U256::from(10_000u64) * U256::from(10u64.pow(18)));
        assert_eq!(decimal_to_scaled(Decimal::ZERO).unwrap(), U256::ZERO);
        assert!(decimal_to_scaled(dec!(-1)).is_err());
    }
}
