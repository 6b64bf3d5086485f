//! Tick prices and per-tick liquidity.
//!
//! Prices are square roots in 1e18 fixed point. A tick `t` spans
//! `[sqrt_price(t), sqrt_price(t + 1))`, where `sqrt_price(t)` is
//! `1.0001^(t * spacing / 2)`.

use crate::error::MathError;
use crate::math::fixed_point::{div_down, mul_down};
use crate::math::math_helpers::{checked_add, mul_div, sqrt};
use crate::{U256_E18, U256_E36, U256_E9};
use alloy_primitives::U256;

/// Largest `|tick| * spacing` the multiplier table covers.
pub const MAX_TICK: u32 = 460_540;

/// Reserves below `2^78` are lifted by this many bits before solving for
/// liquidity.
const PRECISION_BUMP: usize = 57;

/// Square root price at the lower edge of `tick`.
///
/// Fails with `MathError::Overflow` when `|tick| * spacing` is past
/// [`MAX_TICK`].
pub fn tick_sqrt_price(tick_spacing: u32, tick: i32) -> Result<U256, MathError> {
    let sub_tick = tick
        .unsigned_abs()
        .checked_mul(tick_spacing)
        .filter(|t| *t <= MAX_TICK)
        .ok_or(MathError::Overflow)?;

    let mut ratio = if sub_tick & 1 != 0 {
        U256::from_limbs([4248566504919774422, 18445821805675392413, 0, 0])
    } else {
        U256::from_limbs([0, 0, 1, 0])
    };

    macro_rules! apply_multiplier {
        ($bit:expr, $l0:expr, $l1:expr) => {
            if sub_tick & $bit != 0 {
                ratio = ratio.wrapping_mul(U256::from_limbs([$l0, $l1, 0, 0])) >> 128;
            }
        };
    }

    apply_multiplier!(0x2, 8690976083492514332, 18444899583751176701);
    apply_multiplier!(0x4, 2493981567320781705, 18443055278223354569);
    apply_multiplier!(0x8, 6463736237030525249, 18439367220385605650);
    apply_multiplier!(0x10, 11423529854141013687, 18431993317065451441);
    apply_multiplier!(0x20, 6320345498803448906, 18417254355718163758);
    apply_multiplier!(0x40, 352168949795565515, 18387811781193597832);
    apply_multiplier!(0x80, 3225517153479810016, 18329067761203533086);
    apply_multiplier!(0x100, 4771189086247050421, 18212142134806113526);
    apply_multiplier!(0x200, 4755917106326744631, 17980523815641602329);
    apply_multiplier!(0x400, 17918671332225964478, 17526086738831245830);
    apply_multiplier!(0x800, 5700738759582405760, 16651378430235212015);
    apply_multiplier!(0x1000, 4313673444332828766, 15030750278693768936);
    apply_multiplier!(0x2000, 1041542700018643763, 12247334978883386833);
    apply_multiplier!(0x4000, 4170992670926219931, 8131365268885459754);
    apply_multiplier!(0x8000, 11645679062419429952, 3584323654723989001);
    apply_multiplier!(0x10000, 9273136268770155094, 696457651847846551);
    apply_multiplier!(0x20000, 7839496904069169701, 26294789957471034);
    apply_multiplier!(0x40000, 4078889427174906126, 37481735321136);
    apply_multiplier!(0x80000, 10522173256771839230, 76158723);
    apply_multiplier!(0x100000, 5800151175873842, 0);

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    Ok(ratio.wrapping_mul(U256_E18) >> 128)
}

/// `(lower, upper)` square root prices of `tick`.
pub fn tick_sqrt_prices(tick_spacing: u32, tick: i32) -> Result<(U256, U256), MathError> {
    let upper_tick = tick.checked_add(1).ok_or(MathError::Overflow)?;
    Ok((tick_sqrt_price(tick_spacing, tick)?, tick_sqrt_price(tick_spacing, upper_tick)?))
}

/// Liquidity of a tick holding `reserve_a` / `reserve_b` between `lower` and
/// `upper`.
///
/// Solves `L² (1 - lower/upper) - L (rA/upper + rB·lower) - rA·rB = 0` for
/// its positive root.
pub fn get_tick_l(
    reserve_a: U256,
    reserve_b: U256,
    lower: U256,
    upper: U256,
) -> Result<U256, MathError> {
    let bump = if (reserve_a >> 78usize).is_zero() && (reserve_b >> 78usize).is_zero() {
        PRECISION_BUMP
    } else {
        0
    };
    let reserve_a = reserve_a << bump;
    let reserve_b = reserve_b << bump;

    let diff = upper.checked_sub(lower).ok_or(MathError::Underflow)?;
    if diff.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let b = checked_add(div_down(reserve_a, upper)?, mul_down(reserve_b, lower)?)?;

    if reserve_a.is_zero() || reserve_b.is_zero() {
        return Ok(mul_div(b, upper, diff)? >> bump);
    }

    let b = b >> 1usize;
    let discriminant = checked_add(
        mul_down(b, b)?,
        mul_div(mul_down(reserve_b, reserve_a)?, diff, upper)?,
    )?;
    let root = sqrt(discriminant)
        .checked_mul(U256_E9)
        .ok_or(MathError::Overflow)?;

    Ok(mul_div(checked_add(b, root)?, upper, diff)? >> bump)
}

/// Current square root price of a tick, clamped to `[lower, upper]`.
///
/// An empty A side prices the tick at its lower edge, an empty B side at its
/// upper edge.
pub fn get_sqrt_price(
    reserve_a: U256,
    reserve_b: U256,
    lower: U256,
    upper: U256,
    liquidity: U256,
) -> Result<U256, MathError> {
    if reserve_a.is_zero() {
        return Ok(lower);
    }
    if reserve_b.is_zero() {
        return Ok(upper);
    }

    let numerator = checked_add(reserve_a, mul_down(liquidity, lower)?)?;
    let denominator = checked_add(reserve_b, div_down(liquidity, upper)?)?;
    let price_squared = if denominator.is_zero() {
        U256::ZERO
    } else {
        mul_div(numerator, U256_E36, denominator)?
    };
    let price = sqrt(price_squared);

    Ok(price.clamp(lower, upper))
}

/// `(sqrt_price, liquidity)` of a tick.
pub fn get_tick_sqrt_price_and_l(
    reserve_a: U256,
    reserve_b: U256,
    lower: U256,
    upper: U256,
) -> Result<(U256, U256), MathError> {
    let liquidity = get_tick_l(reserve_a, reserve_b, lower, upper)?;
    let sqrt_price = get_sqrt_price(reserve_a, reserve_b, lower, upper, liquidity)?;
    Ok((sqrt_price, liquidity))
}
