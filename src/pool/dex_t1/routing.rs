//! Collateral / debt split of a swap and the constant-product legs.
//!
//! Both sub-pools price with `x * y = k` on their imaginary reserves. The
//! split that equalises the two post-swap prices has a closed form in the
//! square roots of the two reserve products, so no search is needed.

use crate::error::{LiquidityError, MathError};
use crate::math::math_helpers::{checked_add, checked_mul, mul_div, sqrt};
use crate::pool::serde_u256;
use crate::U256_E18;
use alloy_primitives::U256;
use serde::Deserialize;

/// Reserves of one sub-pool, in 1e12 precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolReserves {
    #[serde(deserialize_with = "serde_u256::deserialize")]
    pub token0_real_reserves: U256,
    #[serde(deserialize_with = "serde_u256::deserialize")]
    pub token1_real_reserves: U256,
    #[serde(deserialize_with = "serde_u256::deserialize")]
    pub token0_imaginary_reserves: U256,
    #[serde(deserialize_with = "serde_u256::deserialize")]
    pub token1_imaginary_reserves: U256,
}

/// Debt sub-pool: reserves plus the outstanding debt per token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtReserves {
    #[serde(default, deserialize_with = "serde_u256::deserialize")]
    pub token0_debt: U256,
    #[serde(default, deserialize_with = "serde_u256::deserialize")]
    pub token1_debt: U256,
    #[serde(flatten)]
    pub reserves: PoolReserves,
}

impl PoolReserves {
    /// A sub-pool takes part in routing only when all four reserves are set.
    pub fn is_enabled(&self) -> bool {
        !(self.token0_real_reserves.is_zero()
            || self.token1_real_reserves.is_zero()
            || self.token0_imaginary_reserves.is_zero()
            || self.token1_imaginary_reserves.is_zero())
    }

    #[inline]
    pub fn real(&self, index: usize) -> U256 {
        if index == 0 {
            self.token0_real_reserves
        } else {
            self.token1_real_reserves
        }
    }

    #[inline]
    pub fn imaginary(&self, index: usize) -> U256 {
        if index == 0 {
            self.token0_imaginary_reserves
        } else {
            self.token1_imaginary_reserves
        }
    }

    /// Reserves after `amount_in` of token `index_in` entered and `amount_out`
    /// of the other token left.
    pub fn after_swap(
        &self,
        index_in: usize,
        amount_in: U256,
        amount_out: U256,
    ) -> Result<Self, MathError> {
        let mut next = *self;
        let (real_in, real_out, imaginary_in, imaginary_out) = if index_in == 0 {
            (
                &mut next.token0_real_reserves,
                &mut next.token1_real_reserves,
                &mut next.token0_imaginary_reserves,
                &mut next.token1_imaginary_reserves,
            )
        } else {
            (
                &mut next.token1_real_reserves,
                &mut next.token0_real_reserves,
                &mut next.token1_imaginary_reserves,
                &mut next.token0_imaginary_reserves,
            )
        };
        *real_in = checked_add(*real_in, amount_in)?;
        *imaginary_in = checked_add(*imaginary_in, amount_in)?;
        *real_out = real_out.checked_sub(amount_out).ok_or(MathError::Underflow)?;
        *imaginary_out = imaginary_out.checked_sub(amount_out).ok_or(MathError::Underflow)?;
        Ok(next)
    }
}

/// How a trade is spread over the two sub-pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Everything through the debt pool.
    Debt,
    /// Everything through the collateral pool.
    Collateral,
    /// `a` through collateral, the rest through debt.
    Split(U256),
}

impl Route {
    /// Classifies a split numerator `positive - negative` over `denominator`
    /// against the trade size `total`.
    fn classify(
        positive: U256,
        negative: U256,
        denominator: U256,
        total: U256,
    ) -> Result<Self, MathError> {
        if positive <= negative {
            return Ok(Route::Debt);
        }
        if denominator.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let a = (positive - negative) / denominator;
        Ok(if a.is_zero() {
            Route::Debt
        } else if a >= total {
            Route::Collateral
        } else {
            Route::Split(a)
        })
    }

    /// `(collateral, debt)` shares of `total`.
    pub fn shares(&self, total: U256) -> (U256, U256) {
        match *self {
            Route::Debt => (U256::ZERO, total),
            Route::Collateral => (total, U256::ZERO),
            Route::Split(a) => (a, total - a),
        }
    }
}

fn root_of_product(x: U256, y: U256) -> Result<U256, MathError> {
    Ok(sqrt(checked_mul(checked_mul(x, y)?, U256_E18)?))
}

/// Split of an exact-in trade of `t`.
///
/// `x`/`y` are the collateral imaginary reserves of token out / token in,
/// `x2`/`y2` the same for the debt pool:
/// `a = (y2·√(xy) + t·√(xy) − y·√(x2y2)) / (√(xy) + √(x2y2))`.
pub fn swap_routing_in(t: U256, x: U256, y: U256, x2: U256, y2: U256) -> Result<Route, MathError> {
    let xy_root = root_of_product(x, y)?;
    let x2y2_root = root_of_product(x2, y2)?;

    let positive = checked_add(checked_mul(y2, xy_root)?, checked_mul(t, xy_root)?)?;
    let negative = checked_mul(y, x2y2_root)?;
    Route::classify(positive, negative, checked_add(xy_root, x2y2_root)?, t)
}

/// Split of an exact-out trade of `t`.
///
/// `x`/`y` are the collateral imaginary reserves of token in / token out,
/// `x2`/`y2` the same for the debt pool:
/// `a = (t·√(xy) + y·√(x2y2) − y2·√(xy)) / (√(xy) + √(x2y2))`.
pub fn swap_routing_out(t: U256, x: U256, y: U256, x2: U256, y2: U256) -> Result<Route, MathError> {
    let xy_root = root_of_product(x, y)?;
    let x2y2_root = root_of_product(x2, y2)?;

    let positive = checked_add(checked_mul(t, xy_root)?, checked_mul(y, x2y2_root)?)?;
    let negative = checked_mul(y2, xy_root)?;
    Route::classify(positive, negative, checked_add(xy_root, x2y2_root)?, t)
}

/// `amount_in · reserve_out / (reserve_in + amount_in)`.
pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> Result<U256, MathError> {
    mul_div(amount_in, reserve_out, checked_add(reserve_in, amount_in)?)
}

/// `amount_out · reserve_in / (reserve_out − amount_out)`.
pub fn get_amount_in(
    amount_out: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> Result<U256, crate::error::Error> {
    if amount_out >= reserve_out {
        return Err(LiquidityError::InsufficientReserve.into());
    }
    Ok(mul_div(amount_out, reserve_in, reserve_out - amount_out)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col() -> PoolReserves {
        PoolReserves {
            token0_real_reserves: U256::from(20_000_000_006_000_000u64),
            token1_real_reserves: U256::from(20_000_000_000_500_000u64),
            token0_imaginary_reserves: U256::from(389_736_659_726_997_981u64),
            token1_imaginary_reserves: U256::from(389_736_659_619_871_949u64),
        }
    }

    fn debt() -> PoolReserves {
        PoolReserves {
            token0_real_reserves: U256::from(9_486_832_995_556_050u64),
            token1_real_reserves: U256::from(9_486_832_993_079_885u64),
            token0_imaginary_reserves: U256::from(184_868_330_099_560_759u64),
            token1_imaginary_reserves: U256::from(184_868_330_048_879_109u64),
        }
    }

    // --- routing ------------------------------------------------------------------

    #[test]
    fn split_through_both_pools() {
        let (c, d) = (col(), debt());
        let route = swap_routing_in(
            U256::from(1_000_000_000_000_000u64),
            c.imaginary(1),
            c.imaginary(0),
            d.imaginary(1),
            d.imaginary(0),
        )
        .unwrap();
        assert_eq!(route, Route::Split(U256::from(678_268_839_640_142u64)));
    }

    #[test]
    fn empty_debt_pool_routes_everything_through_collateral() {
        let c = col();
        let route = swap_routing_in(
            U256::from(1_000_000_000_000_000u64),
            c.imaginary(1),
            c.imaginary(0),
            U256::ZERO,
            U256::ZERO,
        )
        .unwrap();
        assert_eq!(route, Route::Collateral);
        assert_eq!(route.shares(U256::from(10u8)), (U256::from(10u8), U256::ZERO));
    }

    #[test]
    fn negative_split_routes_through_debt() {
        assert_eq!(
            Route::classify(U256::from(5u8), U256::from(9u8), U256::ONE, U256::from(3u8)).unwrap(),
            Route::Debt
        );
    }

    #[test]
    fn exact_out_split_matches_mirrored_formula() {
        let (c, d) = (col(), debt());
        let route = swap_routing_out(
            U256::from(998_262_697_204_710u64),
            c.imaginary(0),
            c.imaginary(1),
            d.imaginary(0),
            d.imaginary(1),
        )
        .unwrap();
        assert_eq!(route, Route::Split(U256::from(677_090_481_288_999u64)));
    }

    // --- constant product ---------------------------------------------------------

    #[test]
    fn amount_out_and_in_are_floored() {
        let out = get_amount_out(U256::from(100u8), U256::from(1_000u16), U256::from(1_000u16)).unwrap();
        assert_eq!(out, U256::from(90u8));
        let needed = get_amount_in(U256::from(90u8), U256::from(1_000u16), U256::from(1_000u16)).unwrap();
        assert_eq!(needed, U256::from(98u8));
    }

    #[test]
    fn amount_in_rejects_draining_the_pool() {
        assert!(get_amount_in(U256::from(10u8), U256::ONE, U256::from(10u8)).is_err());
    }

    // --- reserves -----------------------------------------------------------------

    #[test]
    fn enabled_requires_all_four_reserves() {
        assert!(col().is_enabled());
        let mut partial = col();
        partial.token1_imaginary_reserves = U256::ZERO;
        assert!(!partial.is_enabled());
        assert!(!PoolReserves::default().is_enabled());
    }

    #[test]
    fn after_swap_moves_real_and_imaginary_together() {
        let next = col().after_swap(1, U256::from(10u8), U256::from(7u8)).unwrap();
        assert_eq!(next.token1_real_reserves, col().token1_real_reserves + U256::from(10u8));
        assert_eq!(next.token0_imaginary_reserves, col().token0_imaginary_reserves - U256::from(7u8));
    }

    #[test]
    fn debt_reserves_decode_flattened() {
        let raw = r#"{"token0Debt":"5","token1Debt":"6","token0RealReserves":"1",
            "token1RealReserves":"2","token0ImaginaryReserves":"3","token1ImaginaryReserves":"4"}"#;
        let decoded: DebtReserves = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.token1_debt, U256::from(6u8));
        assert_eq!(decoded.reserves.imaginary(1), U256::from(4u8));
    }
}
