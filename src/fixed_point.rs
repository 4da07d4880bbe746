//! 18-Decimal Fixed-Point Math
//!
//! Integer arithmetic on values scaled by 1e18, matching the rounding of the
//! Hyperdrive contracts' FixedPointMath library. Unsigned values are `U256`;
//! `ln`/`exp` work on `I256` because their intermediates go negative.
//!
//! `ln` and `exp` use the same (8,8) and (6,7) rational approximations in a
//! 2**96 binary basis as the on-chain library, so results agree with the
//! contracts to the wei.

use alloy::primitives::{uint, I256, U256};
use thiserror::Error;

/// 1.0 in 18-decimal fixed point
pub const ONE_18: U256 = uint!(1_000_000_000_000_000_000_U256);

/// floor(ln((2**255 - 1) / 1e18) * 1e18)
pub const EXP_MAX: i128 = 135_305_999_368_893_231_589;

/// floor(ln(0.5e-18) * 1e18)
pub const EXP_MIN: i128 = -42_139_678_854_452_767_622;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FixedPointError {
    #[error("{0}: division by zero")]
    DivisionByZero(&'static str),
    #[error("{0}: arithmetic overflow")]
    Overflow(&'static str),
    #[error("{0}: arithmetic underflow")]
    Underflow(&'static str),
    #[error("ln: argument must be positive, got {0}")]
    LnNonPositive(I256),
    #[error("exp: exponent {0} must be less than {EXP_MAX}")]
    ExpTooLarge(I256),
}

pub type FixedPointResult<T> = std::result::Result<T, FixedPointError>;

// ── Unsigned arithmetic ──────────────────────────────────────────────

/// x * y / d, rounding down.
pub fn mul_div_down(x: U256, y: U256, d: U256) -> FixedPointResult<U256> {
    if d.is_zero() {
        return Err(FixedPointError::DivisionByZero("mul_div_down"));
    }
    let z = x
        .checked_mul(y)
        .ok_or(FixedPointError::Overflow("mul_div_down"))?;
    Ok(z / d)
}

/// x * y / d, rounding up. Zero products return zero.
pub fn mul_div_up(x: U256, y: U256, d: U256) -> FixedPointResult<U256> {
    if d.is_zero() {
        return Err(FixedPointError::DivisionByZero("mul_div_up"));
    }
    let z = x
        .checked_mul(y)
        .ok_or(FixedPointError::Overflow("mul_div_up"))?;
    if z.is_zero() {
        return Ok(U256::ZERO);
    }
    Ok((z - U256::from(1)) / d + U256::from(1))
}

pub fn mul_down(a: U256, b: U256) -> FixedPointResult<U256> {
    mul_div_down(a, b, ONE_18)
}

pub fn mul_up(a: U256, b: U256) -> FixedPointResult<U256> {
    mul_div_up(a, b, ONE_18)
}

pub fn div_down(a: U256, b: U256) -> FixedPointResult<U256> {
    mul_div_down(a, ONE_18, b)
}

pub fn div_up(a: U256, b: U256) -> FixedPointResult<U256> {
    mul_div_up(a, ONE_18, b)
}

/// a - b, failing instead of wrapping.
pub fn sub(a: U256, b: U256) -> FixedPointResult<U256> {
    a.checked_sub(b).ok_or(FixedPointError::Underflow("sub"))
}

// ── Signed helpers ───────────────────────────────────────────────────

fn lit(v: U256) -> I256 {
    I256::from_raw(v)
}

/// Signed 256-bit value from an `i128` (e.g. an `int128` contract field).
pub fn i256_from_i128(v: i128) -> I256 {
    let magnitude = I256::from_raw(U256::from(v.unsigned_abs()));
    if v < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Reinterpret an unsigned fixed-point value as signed.
pub fn to_signed(x: U256) -> FixedPointResult<I256> {
    I256::try_from(x).map_err(|_| FixedPointError::Overflow("to_signed"))
}

// ── Transcendental functions ─────────────────────────────────────────

/// ln(x) in 1e18 fixed point. Fails for x <= 0.
pub fn ln(x: I256) -> FixedPointResult<I256> {
    if x <= I256::ZERO {
        return Err(FixedPointError::LnNonPositive(x));
    }
    let raw = x.into_raw();

    // ln(2^k * x) = k * ln(2) + ln(x); reduce x to [1, 2) * 2**96
    let k = raw.bit_len() as i128 - 1 - 96;
    let reduced = if k >= 0 {
        raw >> (k as usize)
    } else {
        raw << ((-k) as usize)
    };
    let x = lit(reduced);

    // p is monic, scaled later
    let mut p = x + lit(uint!(3273285459638523848632254066296_U256));
    p = (p * x).asr(96) + lit(uint!(24828157081833163892658089445524_U256));
    p = (p * x).asr(96) + lit(uint!(43456485725739037958740375743393_U256));
    p = (p * x).asr(96) - lit(uint!(11111509109440967052023855526967_U256));
    p = (p * x).asr(96) - lit(uint!(45023709667254063763336534515857_U256));
    p = (p * x).asr(96) - lit(uint!(14706773417378608786704636184526_U256));
    p = p * x - lit(uint!(795164235651350426258249787498_U256) << 96);

    // q is monic by convention
    let mut q = x + lit(uint!(5573035233440673466300451813936_U256));
    q = (q * x).asr(96) + lit(uint!(71694874799317883764090561454958_U256));
    q = (q * x).asr(96) + lit(uint!(283447036172924575727196451306956_U256));
    q = (q * x).asr(96) + lit(uint!(401686690394027663651624208769553_U256));
    q = (q * x).asr(96) + lit(uint!(204048457590392012362485061816622_U256));
    q = (q * x).asr(96) + lit(uint!(31853899698501571402653359427138_U256));
    q = (q * x).asr(96) + lit(uint!(909429971244387300277376558375_U256));

    // r is in (0, 0.125) * 2**96
    let mut r = p / q;

    // scale factor, k * ln(2), ln(2**96 / 1e18), then base 2**192 * 5**18 back to 1e18
    r = r * lit(uint!(1677202110996718588342820967067443963516166_U256));
    r = r + lit(uint!(
        16597577552685614221487285958193947469193820559219878177908093499208371_U256
    )) * i256_from_i128(k);
    r = r + lit(uint!(
        600920179829731861736702779321621459595472258049074101567377883020018308_U256
    ));
    Ok(r.asr(174))
}

/// e^x in 1e18 fixed point. Returns zero below `EXP_MIN`.
pub fn exp(x: I256) -> FixedPointResult<U256> {
    if x <= i256_from_i128(EXP_MIN) {
        return Ok(U256::ZERO);
    }
    if x >= i256_from_i128(EXP_MAX) {
        return Err(FixedPointError::ExpTooLarge(x));
    }

    // 1e18 basis to 2**96 basis: multiply by 2**78 / 5**18
    let x: I256 = (x << 78) / lit(uint!(3814697265625_U256));

    // exp(x) = exp(x') * 2**k with k = round(x / ln 2), k in [-61, 195]
    let ln2 = lit(uint!(54916777467707473351141471128_U256));
    let k = I256::asr((x << 96) / ln2 + lit(U256::from(1) << 95), 96);
    let x: I256 = x - k * ln2;

    let mut p = x + lit(uint!(2772001395605857295435445496992_U256));
    p = (p * x).asr(96) + lit(uint!(44335888930127919016834873520032_U256));
    p = (p * x).asr(96) + lit(uint!(398888492587501845352592340339721_U256));
    p = (p * x).asr(96) + lit(uint!(1993839819670624470859228494792842_U256));
    p = p * x + lit(uint!(4385272521454847904659076985693276_U256) << 96);

    // Knuth's scheme for q
    let mut z = x + lit(uint!(750530180792738023273180420736_U256));
    z = (z * x).asr(96) + lit(uint!(32788456221302202726307501949080_U256));
    let mut w = x - lit(uint!(2218138959503481824038194425854_U256));
    w = (w * z).asr(96) + lit(uint!(892943633302991980437332862907700_U256));
    let mut q = z + w - lit(uint!(78174809823045304726920794422040_U256));
    q = (q * w).asr(96) + lit(uint!(4203224763890128580604056984195872_U256));

    // r is in (0.09, 0.25) * 2**96
    let r = (p / q).into_raw();

    let k = i128::try_from(k).map_err(|_| FixedPointError::Overflow("exp"))?;
    let shift = (195 - k) as usize;
    let scaled = r
        .checked_mul(uint!(3822833074963236453042738258902158003155416615667_U256))
        .ok_or(FixedPointError::Overflow("exp"))?;
    Ok(scaled >> shift)
}

/// x^y = exp(y * ln(x)) for fixed-point x and y.
pub fn pow(x: U256, y: U256) -> FixedPointResult<U256> {
    if x.is_zero() {
        return Ok(if y.is_zero() { ONE_18 } else { U256::ZERO });
    }
    let ln_x = ln(to_signed(x)?)?;
    let y_ln_x = to_signed(y)?
        .checked_mul(ln_x)
        .ok_or(FixedPointError::Overflow("pow"))?
        / to_signed(ONE_18)?;
    exp(y_ln_x)
}

/// Square root of a fixed-point value.
pub fn sqrt(x: U256) -> FixedPointResult<U256> {
    if x.is_zero() || x == ONE_18 {
        return Ok(x);
    }
    pow(x, ONE_18 / U256::from(2))
}
