//! Center price and imaginary reserves.
//!
//! The pool trades on constant-product curves over imaginary reserves: the
//! real supplies plus virtual liquidity sized so that the curve spans the
//! configured price range around the center price.

use super::layout::PoolState;
use super::shift::{range_percents, range_prices, rebalanced_center_price};
use crate::error::{MathError, RangeError};
use crate::math::math_helpers::{checked_add, checked_mul, checked_sub, mul_div, sqrt};
use crate::{PRICE_PRECISION, U256_E18, U256_E38, U256_E54};
use alloy_primitives::U256;

/// Price inputs of one quote, in 9-decimal units and `1e27` prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricesAndReserves {
    pub center_price: U256,
    pub upper_range_price: U256,
    pub lower_range_price: U256,
    pub imaginary: [U256; 2],
}

/// `√(upper · lower)`, computed on 1e18-scaled-down inputs when `upper` is
/// at least `1e38`.
pub fn geometric_mean(upper: U256, lower: U256) -> Result<U256, MathError> {
    if upper < U256_E38 {
        return Ok(sqrt(checked_mul(upper, lower)?));
    }
    let product = checked_mul(upper / U256_E18, lower / U256_E18)?;
    checked_mul(sqrt(product), U256_E18)
}

/// Virtual reserves `(xa, yb)` outside the range for geometric mean `gp`,
/// range edge `pa` and real reserves `rx`, `ry`.
///
/// Solves `xa² - 2·p2·xa - rx·ry/(pa - gp) = 0` with
/// `p2 = (gp·rx + ry·1e27) / (2·(pa - gp))`.
pub fn reserves_outside_range(
    gp: U256,
    pa: U256,
    rx: U256,
    ry: U256,
) -> Result<(U256, U256), MathError> {
    if pa <= gp {
        return Ok((U256::ZERO, U256::ZERO));
    }
    let p1 = pa - gp;

    let numerator = checked_add(checked_mul(gp, rx)?, checked_mul(ry, PRICE_PRECISION)?)?;
    let p2 = numerator / checked_mul(U256::from(2u8), p1)?;

    let discriminant = checked_add(
        mul_div(checked_mul(rx, ry)?, PRICE_PRECISION, p1)?,
        checked_mul(p2, p2)?,
    )?;
    let xa = checked_add(p2, sqrt(discriminant))?;
    let yb = mul_div(xa, gp, PRICE_PRECISION)?;
    Ok((xa, yb))
}

/// Resolves every shift active at `now` and derives the curve.
///
/// Finished range shifts are cleared from `state`. An external center price
/// is `UnsupportedConfiguration`.
pub fn prices_and_reserves(state: &mut PoolState, now: u64) -> Result<PricesAndReserves, RangeError> {
    if state.uses_external_center_price() {
        return Err(RangeError::UnsupportedConfiguration("external center price"));
    }

    let mut center_price = state.center_price();
    let (upper_percent, lower_percent) = range_percents(state, now)?;
    let (mut upper_range_price, mut lower_range_price) =
        range_prices(center_price, upper_percent, lower_percent)?;

    if let Some(shifted) =
        rebalanced_center_price(state, center_price, upper_range_price, lower_range_price, now)?
    {
        center_price = shifted;
        (upper_range_price, lower_range_price) =
            range_prices(center_price, upper_percent, lower_percent)?;
    }

    let mean = geometric_mean(upper_range_price, lower_range_price)?;
    let [supply0, supply1] = state.supplies();

    let (virtual0, virtual1) = if mean < PRICE_PRECISION {
        reserves_outside_range(mean, upper_range_price, supply0, supply1)?
    } else {
        // mirrored around 1e27 so the quadratic stays in range for large prices
        let (virtual1, virtual0) = reserves_outside_range(
            U256_E54 / mean,
            U256_E54 / lower_range_price,
            supply1,
            supply0,
        )?;
        (virtual0, virtual1)
    };

    Ok(PricesAndReserves {
        center_price,
        upper_range_price,
        lower_range_price,
        imaginary: [checked_add(virtual0, supply0)?, checked_add(virtual1, supply1)?],
    })
}

/// `token1 / token0` of the imaginary reserves, over `1e27`.
pub fn pool_price(imaginary: &[U256; 2]) -> Result<U256, MathError> {
    mul_div(imaginary[1], PRICE_PRECISION, imaginary[0])
}

/// The side being drained must keep `1 / min_liquidity` of the other side's
/// value at `center_price`.
pub fn reserves_ratio_ok(
    supplies: &[U256; 2],
    index_in: usize,
    center_price: U256,
    min_liquidity: U256,
) -> Result<bool, MathError> {
    let (price_in, price_out) = if index_in == 0 {
        (center_price, PRICE_PRECISION)
    } else {
        (PRICE_PRECISION, center_price)
    };
    let floor = mul_div(supplies[index_in], price_in, checked_mul(price_out, min_liquidity)?)?;
    Ok(supplies[1 - index_in] >= floor)
}

/// Output of a constant-product swap of `amount_in`.
pub fn amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> Result<U256, MathError> {
    mul_div(amount_in, reserve_out, checked_add(reserve_in, amount_in)?)
}

/// Input a constant-product swap needs to release `amount_out`.
pub fn amount_in(amount_out: U256, reserve_in: U256, reserve_out: U256) -> Result<U256, MathError> {
    let remaining = checked_sub(reserve_out, amount_out)?;
    if remaining.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    mul_div(amount_out, reserve_in, remaining)
}

#[cfg(test)]
mod tests {
    use super::super::layout::test_words::*;
    use super::super::layout::{dex_variables as dv, range_shift as rs};
    use super::*;
    use std::str::FromStr;

    const NOW: u64 = 1_700_000_000;

    fn u(value: &str) -> U256 {
        U256::from_str(value).unwrap()
    }

    // --- curve pieces -------------------------------------------------------------

    #[test]
    fn range_prices_and_mean_at_unit_price() {
        let (upper, lower) = range_prices(PRICE_PRECISION, U256::from(1_000u16), U256::from(1_000u16)).unwrap();
        assert_eq!(upper, u("1111111111111111111111111111"));
        assert_eq!(lower, u("900000000000000000000000000"));
        assert_eq!(geometric_mean(upper, lower).unwrap(), u("999999999999999999999999999"));
    }

    #[test]
    fn geometric_mean_scales_down_large_prices() {
        let upper = u("11111111111111111111111111111111111111111");
        let lower = u("9000000000000000000000000000000000000000");
        assert_eq!(geometric_mean(upper, lower).unwrap(), u("9999999999999999999999000000000000000000"));
    }

    #[test]
    fn virtual_reserves_for_a_symmetric_range() {
        let mean = u("999999999999999999999999999");
        let upper = u("1111111111111111111111111111");
        let supply = U256::from(1_000_000_000_000u64);
        let (xa, yb) = reserves_outside_range(mean, upper, supply, supply).unwrap();
        assert_eq!(xa, U256::from(18_486_832_980_503u64));
        assert_eq!(yb, U256::from(18_486_832_980_502u64));
    }

    #[test]
    fn edge_at_or_below_mean_has_no_virtual_reserves() {
        let (xa, yb) = reserves_outside_range(U256::from(5u8), U256::from(5u8), U256::ONE, U256::ONE).unwrap();
        assert!(xa.is_zero() && yb.is_zero());
    }

    #[test]
    fn constant_product_in_and_out() {
        let r = U256::from(1_000_000u32);
        assert_eq!(amount_out(U256::from(1_000u16), r, r).unwrap(), U256::from(999u16));
        assert_eq!(amount_in(U256::from(999u16), r, r).unwrap(), U256::from(999u16));
        assert_eq!(amount_in(r, r, r), Err(MathError::DivisionByZero));
    }

    // --- full derivation ----------------------------------------------------------

    #[test]
    fn imaginary_reserves_of_the_base_pool() {
        let mut state = PoolState { dex_variables: base_dex_variables(), ..PoolState::default() };
        let prices = prices_and_reserves(&mut state, NOW).unwrap();

        assert_eq!(prices.center_price, u("999999999725139423651692544"));
        assert_eq!(prices.upper_range_price, u("1111111110805710470724102826"));
        assert_eq!(prices.imaginary, [U256::from(19_486_832_983_044u64), U256::from(19_486_832_977_962u64)]);
    }

    #[test]
    fn active_range_shift_widens_the_curve() {
        let mut state = PoolState {
            dex_variables: dv::RANGE_SHIFT_ACTIVE.set(base_dex_variables(), U256::ONE).unwrap(),
            range_shift: pack(&[
                (rs::OLD_UPPER, 2_000),
                (rs::OLD_LOWER, 2_000),
                (rs::TIME_TO_SHIFT, 1_000),
                (rs::TIMESTAMP, (NOW - 250) as u128),
            ]),
            ..PoolState::default()
        };
        let prices = prices_and_reserves(&mut state, NOW).unwrap();
        assert_eq!(prices.imaginary, [U256::from(10_904_543_465_527u64), U256::from(10_904_543_462_804u64)]);
    }

    #[test]
    fn external_center_price_is_unsupported() {
        let mut state = PoolState {
            dex_variables: dv::CENTER_PRICE_SHIFT_ACTIVE.set(base_dex_variables(), U256::ONE).unwrap(),
            ..PoolState::default()
        };
        assert!(matches!(
            prices_and_reserves(&mut state, NOW),
            Err(RangeError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn ratio_floor_depends_on_direction() {
        let supplies = [U256::from(10_000u16), U256::ONE];
        assert!(reserves_ratio_ok(&supplies, 0, PRICE_PRECISION, U256::from(10_000u16)).unwrap());
        let supplies = [U256::from(10_001u16 * 2), U256::ONE];
        assert!(!reserves_ratio_ok(&supplies, 0, PRICE_PRECISION, U256::from(10_000u16)).unwrap());
        assert!(reserves_ratio_ok(&supplies, 1, PRICE_PRECISION, U256::from(10_000u16)).unwrap());
    }
}
