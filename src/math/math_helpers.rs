use crate::error::MathError;
use crate::math::bit_math::most_significant_bit;
use alloy_primitives::U256;

const U256_TWO: U256 = U256::from_limbs([2, 0, 0, 0]);
const U256_THREE: U256 = U256::from_limbs([3, 0, 0, 0]);

/// Computes `a * b / denominator` with a 512-bit intermediate product,
/// returning a `MathError` on overflow or division by zero.
///
/// Solidity `FullMath.mulDiv` semantics: the result is floored and must fit
/// in 256 bits even when `a * b` does not.
#[inline]
pub fn mul_div(a: U256, b: U256, mut denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    let mm = a.mul_mod(b, U256::MAX);
    let mut prod0 = a.wrapping_mul(b);

    let (mut prod1, borrow) = mm.overflowing_sub(prod0);
    if borrow {
        prod1 = prod1.wrapping_sub(U256::ONE);
    }

    if prod1.is_zero() {
        return Ok(prod0.wrapping_div(denominator));
    }

    if denominator <= prod1 {
        return Err(MathError::Overflow);
    }

    let remainder = a.mul_mod(b, denominator);
    let (lowered, borrow) = prod0.overflowing_sub(remainder);
    prod0 = lowered;
    if borrow {
        prod1 = prod1.wrapping_sub(U256::ONE);
    }

    let twos = denominator & denominator.wrapping_neg();
    denominator = denominator.wrapping_div(twos);
    prod0 = prod0.wrapping_div(twos);

    let flip = twos.wrapping_neg().wrapping_div(twos).wrapping_add(U256::ONE);
    prod0 |= prod1.wrapping_mul(flip);

    // inverse of the odd denominator mod 2^256, doubling correct bits each round
    let mut inv = U256_THREE.wrapping_mul(denominator) ^ U256_TWO;
    for _ in 0..6 {
        inv = inv.wrapping_mul(U256_TWO.wrapping_sub(denominator.wrapping_mul(inv)));
    }

    Ok(prod0.wrapping_mul(inv))
}

/// Like [`mul_div`], but rounds the result up when there is a
/// non-zero remainder.
#[inline]
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    let result = mul_div(a, b, denominator)?;

    if a.mul_mod(b, denominator).is_zero() {
        return Ok(result);
    }
    result.checked_add(U256::ONE).ok_or(MathError::Overflow)
}

/// Divides `a` by `b`, rounding up on a non-zero remainder.
#[inline]
pub fn div_rounding_up(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        Ok(quotient + U256::ONE)
    }
}

/// Floor of the square root of `x`.
///
/// Newton iteration seeded above the root from the bit length; stops as soon
/// as an iterate fails to decrease.
pub fn sqrt(x: U256) -> U256 {
    let Ok(msb) = most_significant_bit(x) else {
        return U256::ZERO;
    };

    let mut current = U256::ONE << (msb as usize / 2 + 1);
    loop {
        let next = (current + x / current) >> 1usize;
        if next >= current {
            return current;
        }
        current = next;
    }
}

/// `a - b`, or zero when `b > a`.
#[inline]
pub fn clip(a: U256, b: U256) -> U256 {
    a.saturating_sub(b)
}

#[inline]
pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

#[inline]
pub fn checked_add(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

#[inline]
pub fn checked_sub(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

#[inline]
pub fn checked_mul(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}
