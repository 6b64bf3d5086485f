//! One swap step inside a single tick.
//!
//! Amounts are 18-decimal internal units. Fees are 1e18-scaled fractions of
//! the input; the protocol's share of a fee is in thousandths.

use crate::error::MathError;
use crate::math::fixed_point::{div_up, inv_ceil, inv_floor, mul_down};
use crate::math::math_helpers::{checked_add, clip, mul_div, mul_div_rounding_up};
use crate::{U256_E18, U256_E3};
use alloy_primitives::U256;

/// Consolidated reserves of a tick with its price and liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickLiquidity {
    pub reserve_a: U256,
    pub reserve_b: U256,
    pub sqrt_price: U256,
    pub liquidity: U256,
}

impl TickLiquidity {
    #[inline]
    pub fn reserve_out(&self, token_a_in: bool) -> U256 {
        if token_a_in {
            self.reserve_b
        } else {
            self.reserve_a
        }
    }
}

/// Outcome of swapping against one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSwap {
    /// Input taken from the trader, fee included.
    pub amount_in: U256,
    /// Input credited to the tick's bins, net of the protocol fee.
    pub amount_in_bin: U256,
    pub amount_out: U256,
    pub fee_basis: U256,
    /// Amount still to be swapped in the next tick.
    pub excess: U256,
    /// The tick's output side was used up.
    pub drained: bool,
}

fn mul_div_down(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Ok(U256::ZERO);
    }
    mul_div(a, b, denominator)
}

fn mul_div_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Ok(U256::ZERO);
    }
    mul_div_rounding_up(a, b, denominator)
}

/// Input the tick needs to release `output`.
pub fn remaining_bin_input_space_given_output(
    liquidity: U256,
    output: U256,
    sqrt_price: U256,
    token_a_in: bool,
) -> Result<U256, MathError> {
    let out_over_l = if liquidity.is_zero() {
        U256::ZERO
    } else {
        div_up(output, liquidity)?
    };

    if token_a_in {
        let denominator = inv_floor(sqrt_price)
            .checked_sub(out_over_l)
            .ok_or(MathError::Underflow)?;
        mul_div_up(output, sqrt_price, denominator)
    } else {
        let price_left = sqrt_price.checked_sub(out_over_l).ok_or(MathError::Underflow)?;
        div_up(output, mul_down(sqrt_price, price_left)?)
    }
}

/// Steps allowed when inverting the exact-in price.
const MAX_INVERSION_STEPS: usize = 256;

/// Smallest bin input for which [`compute_swap_exact_in`] prices at least
/// `output`, or `None` when no input does.
///
/// Exact-in prices a partial fill as `input * n / (ceil(input / (L + 1)) + d)`.
/// Iterating `input = ceil(output * (ceil(input / (L + 1)) + d) / n)` from
/// the real-valued root climbs to the least integer solution.
pub fn bin_input_for_priced_output(
    liquidity: U256,
    output: U256,
    sqrt_price: U256,
    token_a_in: bool,
) -> Result<Option<U256>, MathError> {
    let (numerator, offset) = if token_a_in {
        (inv_floor(sqrt_price), sqrt_price)
    } else {
        (sqrt_price, inv_ceil(sqrt_price))
    };
    if numerator.is_zero() {
        return Ok(None);
    }
    let liquidity = checked_add(liquidity, U256::ONE)?;

    let scaled_numerator = numerator.checked_mul(liquidity);
    let scaled_output = output.checked_mul(U256_E18);
    let mut input = match (scaled_numerator, scaled_output) {
        (Some(n), Some(o)) if n <= o => return Ok(None),
        (Some(n), Some(o)) => match offset.checked_mul(liquidity) {
            Some(scaled_offset) => mul_div_up(output, scaled_offset, n - o)?,
            None => U256::ZERO,
        },
        _ => U256::ZERO,
    };

    for _ in 0..MAX_INVERSION_STEPS {
        let in_over_l = div_up(input, liquidity)?;
        let needed = mul_div_up(output, checked_add(in_over_l, offset)?, numerator)?;
        if input >= needed {
            return Ok(Some(input));
        }
        input = needed;
    }
    Ok(None)
}

/// Input left for the bins once the protocol has taken its share of the fee.
pub fn amount_to_bin_net_of_protocol_fee(
    amount_in: U256,
    fee_basis: U256,
    protocol_fee_ratio: u8,
) -> Result<U256, MathError> {
    if protocol_fee_ratio == 0 {
        return Ok(amount_in);
    }
    let protocol_fee = mul_div_up(fee_basis, U256::from(protocol_fee_ratio), U256_E3)?;
    Ok(clip(amount_in, protocol_fee))
}

fn fee_on_bin_input(bin_amount_in: U256, fee: U256) -> Result<U256, MathError> {
    mul_div_up(bin_amount_in, fee, U256_E18 - fee)
}

/// Spends up to `amount_in` against `tick`.
///
/// `fee` must be below `1e18`.
pub fn compute_swap_exact_in(
    amount_in: U256,
    token_a_in: bool,
    tick: &TickLiquidity,
    fee: U256,
    protocol_fee_ratio: u8,
) -> Result<TickSwap, MathError> {
    let available = tick.reserve_out(token_a_in);
    let mut bin_amount_in =
        remaining_bin_input_space_given_output(tick.liquidity, available, tick.sqrt_price, token_a_in)?;
    let user_bin_amount_in = mul_down(amount_in, U256_E18 - fee)?;

    let mut step = TickSwap { amount_out: available, ..TickSwap::default() };
    if user_bin_amount_in < bin_amount_in {
        bin_amount_in = user_bin_amount_in;
        step.amount_in = amount_in;
        step.fee_basis = amount_in - user_bin_amount_in;
    } else {
        step.fee_basis = fee_on_bin_input(bin_amount_in, fee)?;
        step.amount_in = checked_add(bin_amount_in, step.fee_basis)?;
        step.excess = clip(amount_in, step.amount_in);
    }
    step.amount_in_bin =
        amount_to_bin_net_of_protocol_fee(step.amount_in, step.fee_basis, protocol_fee_ratio)?;

    if !step.excess.is_zero() {
        step.drained = true;
        return Ok(step);
    }

    let in_over_l = div_up(bin_amount_in, checked_add(tick.liquidity, U256::ONE)?)?;
    let priced_out = if token_a_in {
        mul_div_down(
            bin_amount_in,
            inv_floor(tick.sqrt_price),
            checked_add(in_over_l, tick.sqrt_price)?,
        )?
    } else {
        mul_div_down(
            bin_amount_in,
            tick.sqrt_price,
            checked_add(in_over_l, inv_ceil(tick.sqrt_price))?,
        )?
    };
    step.amount_out = step.amount_out.min(priced_out);
    Ok(step)
}

/// Releases up to `amount_out` from `tick`.
///
/// The bin input is the cheaper of the on-chain exact-out formula and the
/// least input that exact-in prices at `amount_out`, so quoting exact-out for
/// an exact-in result never asks for more than was put in.
pub fn compute_swap_exact_out(
    amount_out: U256,
    token_a_in: bool,
    tick: &TickLiquidity,
    fee: U256,
    protocol_fee_ratio: u8,
) -> Result<TickSwap, MathError> {
    let available = tick.reserve_out(token_a_in);
    let drained = available <= amount_out;
    let released = available.min(amount_out);

    let on_chain =
        remaining_bin_input_space_given_output(tick.liquidity, released, tick.sqrt_price, token_a_in)?;
    let bin_amount_in =
        match bin_input_for_priced_output(tick.liquidity, released, tick.sqrt_price, token_a_in)? {
            Some(input) => input.min(on_chain),
            None => on_chain,
        };
    let fee_basis = fee_on_bin_input(bin_amount_in, fee)?;
    let total_in = checked_add(bin_amount_in, fee_basis)?;

    Ok(TickSwap {
        amount_in: total_in,
        amount_in_bin: amount_to_bin_net_of_protocol_fee(total_in, fee_basis, protocol_fee_ratio)?,
        amount_out: released,
        fee_basis,
        excess: if drained { amount_out - available } else { U256::ZERO },
        drained,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::maverick_v2::tick_math::{get_tick_sqrt_price_and_l, tick_sqrt_prices};

    const FEE: U256 = U256::from_limbs([1_000_000_000_000_000, 0, 0, 0]);

    fn e18(units: u64) -> U256 {
        U256::from(units) * U256_E18
    }

    /// Tick 0 at spacing 10 holding 3 A and 4 B.
    fn tick_zero() -> TickLiquidity {
        let (lower, upper) = tick_sqrt_prices(10, 0).unwrap();
        let (sqrt_price, liquidity) = get_tick_sqrt_price_and_l(e18(3), e18(4), lower, upper).unwrap();
        TickLiquidity { reserve_a: e18(3), reserve_b: e18(4), sqrt_price, liquidity }
    }

    // --- exact in -----------------------------------------------------------------

    #[test]
    fn partial_fill_stays_in_tick() {
        let step = compute_swap_exact_in(U256::from(100_000_000_000_000_000u64), true, &tick_zero(), FEE, 0)
            .unwrap();
        assert_eq!(step.amount_out, U256::from(99_856_496_131_691_309u64));
        assert_eq!(step.fee_basis, U256::from(100_000_000_000_000u64));
        assert_eq!(step.excess, U256::ZERO);
        assert!(!step.drained);
    }

    #[test]
    fn oversized_input_drains_the_tick() {
        let step = compute_swap_exact_in(e18(10), true, &tick_zero(), FEE, 0).unwrap();
        assert!(step.drained);
        assert_eq!(step.amount_out, e18(4));
        assert_eq!(step.amount_in + step.excess, e18(10));
    }

    #[test]
    fn protocol_fee_is_kept_out_of_the_bins() {
        let step = compute_swap_exact_in(U256::from(100_000_000_000_000_000u64), true, &tick_zero(), FEE, 250)
            .unwrap();
        assert_eq!(step.amount_in_bin, U256::from(99_975_000_000_000_000u64));
        assert_eq!(step.amount_out, U256::from(99_856_496_131_691_309u64));
    }

    // --- exact out ----------------------------------------------------------------

    #[test]
    fn releasing_the_whole_side_drains_the_tick() {
        let step = compute_swap_exact_out(e18(4), true, &tick_zero(), FEE, 0).unwrap();
        assert!(step.drained);
        assert_eq!(step.excess, U256::ZERO);
        assert_eq!(step.amount_in, U256::from(4_006_864_657_707_489_424u64));
    }

    #[test]
    fn exact_out_of_a_partial_fill_costs_what_was_paid() {
        let amount_in = U256::from(100_000_000_000_000_000u64);
        for token_a_in in [true, false] {
            let filled = compute_swap_exact_in(amount_in, token_a_in, &tick_zero(), FEE, 0).unwrap();
            let step = compute_swap_exact_out(filled.amount_out, token_a_in, &tick_zero(), FEE, 0).unwrap();
            assert_eq!(step.amount_in, amount_in, "token_a_in {token_a_in}");
            assert!(!step.drained);
        }
    }

    #[test]
    fn exact_out_carries_the_shortfall() {
        let step = compute_swap_exact_out(e18(4) + U256::from(7u8), true, &tick_zero(), FEE, 0).unwrap();
        assert_eq!(step.amount_out, e18(4));
        assert_eq!(step.excess, U256::from(7u8));
    }

    // --- price inversion ----------------------------------------------------------

    #[test]
    fn inversion_undercuts_the_exact_out_formula() {
        let tick = tick_zero();
        let on_chain =
            remaining_bin_input_space_given_output(tick.liquidity, e18(4), tick.sqrt_price, true).unwrap();
        let inverted = bin_input_for_priced_output(tick.liquidity, e18(4), tick.sqrt_price, true)
            .unwrap()
            .unwrap();
        assert_eq!(on_chain, U256::from(4_002_857_793_049_781_937u64));
        assert_eq!(inverted, U256::from(4_002_857_793_049_781_934u64));
    }

    #[test]
    fn inverted_input_prices_the_requested_output() {
        let tick = tick_zero();
        let output = U256::from(99_856_496_131_691_309u64);
        let input = bin_input_for_priced_output(tick.liquidity, output, tick.sqrt_price, true)
            .unwrap()
            .unwrap();
        assert_eq!(input, U256::from(99_900_000_000_000_000u64));

        let gross = mul_div_up(input, U256_E18, U256_E18 - FEE).unwrap();
        let filled = compute_swap_exact_in(gross, true, &tick, FEE, 0).unwrap();
        assert!(filled.amount_out >= output);
    }

    #[test]
    fn output_beyond_the_curve_has_no_input() {
        let tick = tick_zero();
        let output = tick.liquidity * U256::from(2u8);
        assert_eq!(bin_input_for_priced_output(tick.liquidity, output, tick.sqrt_price, true).unwrap(), None);
    }

    // --- helpers ------------------------------------------------------------------

    #[test]
    fn protocol_fee_rounds_up() {
        // 5 * 250 / 1000 = 1.25, so 2 goes to the protocol
        let net = amount_to_bin_net_of_protocol_fee(U256::from(1_000u16), U256::from(5u8), 250).unwrap();
        assert_eq!(net, U256::from(998u16));
        assert_eq!(
            amount_to_bin_net_of_protocol_fee(U256::from(1_000u16), U256::from(3u8), 0).unwrap(),
            U256::from(1_000u16)
        );
    }
}
