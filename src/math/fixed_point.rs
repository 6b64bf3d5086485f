//! Decimal re-scaling and fee arithmetic shared by the kernels.

use crate::error::{MathError, RangeError};
use crate::math::math_helpers::{mul_div, mul_div_rounding_up};
use crate::{FEE_PRECISION, U256_E18, U256_E36};
use alloy_primitives::U256;

const TEN: U256 = U256::from_limbs([10, 0, 0, 0]);

/// `10^exp`, or an overflow error past `10^77`.
pub fn pow10(exp: u32) -> Result<U256, MathError> {
    let mut result = U256::ONE;
    for _ in 0..exp {
        result = result.checked_mul(TEN).ok_or(MathError::Overflow)?;
    }
    Ok(result)
}

/// Moves `amount` from `from` decimals to `to` decimals.
///
/// Scaling down floors, scaling up is exact.
pub fn rescale(amount: U256, from: u8, to: u8) -> Result<U256, MathError> {
    match from.cmp(&to) {
        std::cmp::Ordering::Equal => Ok(amount),
        std::cmp::Ordering::Greater => Ok(amount / pow10((from - to) as u32)?),
        std::cmp::Ordering::Less => amount
            .checked_mul(pow10((to - from) as u32)?)
            .ok_or(MathError::Overflow),
    }
}

/// Fee charged on `amount` at `fee_ppm` parts per million, floored.
#[inline]
pub fn ppm_fee(amount: U256, fee_ppm: U256) -> Result<U256, MathError> {
    mul_div(amount, fee_ppm, FEE_PRECISION)
}

/// Gross amount whose net after a `fee_ppm` fee is `net`: `net * 1e6 / (1e6 - fee)`.
pub fn gross_up_ppm(net: U256, fee_ppm: U256) -> Result<U256, RangeError> {
    if fee_ppm >= FEE_PRECISION {
        return Err(RangeError::InvalidFeeRate);
    }
    Ok(mul_div(net, FEE_PRECISION, FEE_PRECISION - fee_ppm)?)
}

/// Converts a fee fraction (`0.0001` = 1 bp) to an integer at `scale`
/// (`1e6` for ppm, `1e18` for wad), rounded to nearest.
pub fn fraction_to_scaled(fraction: f64, scale: u64) -> Result<U256, RangeError> {
    if !fraction.is_finite() || !(0.0..1.0).contains(&fraction) {
        return Err(RangeError::InvalidFeeRate);
    }
    let scaled = (fraction * scale as f64).round();
    Ok(U256::from(scaled as u128))
}

/// Amount scaled from `from` decimals to `to` decimals, rounded up when
/// scaling down.
pub fn rescale_up(amount: U256, from: u8, to: u8) -> Result<U256, MathError> {
    if from <= to {
        return rescale(amount, from, to);
    }
    let divisor = pow10((from - to) as u32)?;
    let (quotient, remainder) = amount.div_rem(divisor);
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        Ok(quotient + U256::ONE)
    }
}

// 1e18 fixed point. A zero divisor yields zero, matching the on-chain
// library these kernels mirror.

/// `a * b / 1e18`, floored.
#[inline]
pub fn mul_down(a: U256, b: U256) -> Result<U256, MathError> {
    mul_div(a, b, U256_E18)
}

/// `a * 1e18 / b`, floored.
#[inline]
pub fn div_down(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Ok(U256::ZERO);
    }
    mul_div(a, U256_E18, b)
}

/// `a * 1e18 / b`, rounded up.
#[inline]
pub fn div_up(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Ok(U256::ZERO);
    }
    mul_div_rounding_up(a, U256_E18, b)
}

/// `1e36 / x`, floored.
#[inline]
pub fn inv_floor(x: U256) -> U256 {
    if x.is_zero() {
        return U256::ZERO;
    }
    U256_E36 / x
}

/// `1e36 / x`, rounded up.
#[inline]
pub fn inv_ceil(x: U256) -> U256 {
    if x.is_zero() {
        return U256::ZERO;
    }
    let (quotient, remainder) = U256_E36.div_rem(x);
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::ONE
    }
}
