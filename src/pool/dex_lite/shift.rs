//! Time-linear parameter shifts and the rebalancing state machine.

use super::layout::{
    center_price_shift as cps, dex_variables as dv, expand_center_price, range_shift as rs,
    threshold_shift as ts, PoolState, RebalancingStatus,
};
use crate::error::{MathError, RangeError};
use crate::math::math_helpers::{checked_add, checked_sub, mul_div};
use crate::{U256_E2, U256_E4};
use alloy_primitives::U256;
use tracing::trace;

/// Value `time_passed / duration` of the way from `old` to `current`.
pub fn calc_shifting_done(
    current: U256,
    old: U256,
    time_passed: U256,
    duration: U256,
) -> Result<U256, MathError> {
    if current > old {
        checked_add(old, mul_div(current - old, time_passed, duration)?)
    } else {
        checked_sub(old, mul_div(old - current, time_passed, duration)?)
    }
}

/// A shift recorded as `(old_upper, old_lower, duration, start)`.
struct Shift {
    old_upper: U256,
    old_lower: U256,
    duration: U256,
    start: U256,
}

impl Shift {
    /// Interpolated `(upper, lower)`, or `None` once the shift is over.
    fn at(&self, upper: U256, lower: U256, now: u64) -> Result<Option<(U256, U256)>, MathError> {
        let now = U256::from(now);
        if self.duration.is_zero() || now >= checked_add(self.start, self.duration)? {
            return Ok(None);
        }
        let time_passed = now.saturating_sub(self.start);
        Ok(Some((
            calc_shifting_done(upper, self.old_upper, time_passed, self.duration)?,
            calc_shifting_done(lower, self.old_lower, time_passed, self.duration)?,
        )))
    }
}

/// Upper and lower range percents in effect at `now`.
///
/// A finished range shift is cleared from `state`: the `rangeShift` word is
/// zeroed and its active bit dropped.
pub fn range_percents(state: &mut PoolState, now: u64) -> Result<(U256, U256), RangeError> {
    let upper = state.get(dv::UPPER_PERCENT);
    let lower = state.get(dv::LOWER_PERCENT);
    if !dv::RANGE_SHIFT_ACTIVE.is_set(state.dex_variables) {
        return Ok((upper, lower));
    }

    let word = state.range_shift;
    let shift = Shift {
        old_upper: rs::OLD_UPPER.get(word),
        old_lower: rs::OLD_LOWER.get(word),
        duration: rs::TIME_TO_SHIFT.get(word),
        start: rs::TIMESTAMP.get(word),
    };
    match shift.at(upper, lower, now)? {
        Some(shifted) => Ok(shifted),
        None => {
            trace!(now, "dex-lite range shift finished");
            state.range_shift = U256::ZERO;
            state.set(dv::RANGE_SHIFT_ACTIVE, U256::ZERO)?;
            Ok((upper, lower))
        }
    }
}

/// Upper and lower shift thresholds in effect at `now`, clearing a finished
/// threshold shift the same way [`range_percents`] does.
pub fn threshold_percents(state: &mut PoolState, now: u64) -> Result<(U256, U256), RangeError> {
    let upper = state.get(dv::UPPER_SHIFT_THRESHOLD);
    let lower = state.get(dv::LOWER_SHIFT_THRESHOLD);
    if !dv::THRESHOLD_SHIFT_ACTIVE.is_set(state.dex_variables) {
        return Ok((upper, lower));
    }

    let word = state.threshold_shift;
    let shift = Shift {
        old_upper: ts::OLD_UPPER.get(word),
        old_lower: ts::OLD_LOWER.get(word),
        duration: ts::TIME_TO_SHIFT.get(word),
        start: ts::TIMESTAMP.get(word),
    };
    match shift.at(upper, lower, now)? {
        Some(shifted) => Ok(shifted),
        None => {
            trace!(now, "dex-lite threshold shift finished");
            state.threshold_shift = U256::ZERO;
            state.set(dv::THRESHOLD_SHIFT_ACTIVE, U256::ZERO)?;
            Ok((upper, lower))
        }
    }
}

/// Center price moved toward the upper (ShiftingUp) or lower (ShiftingDown)
/// range price, clamped to the bounds stored in `centerPriceShift`.
///
/// Returns `None` when no rebalancing is in progress.
pub fn rebalanced_center_price(
    state: &PoolState,
    center_price: U256,
    upper_range_price: U256,
    lower_range_price: U256,
    now: u64,
) -> Result<Option<U256>, MathError> {
    let status = state.rebalancing_status();
    let word = state.center_price_shift;
    if !status.is_shifting() || word.is_zero() {
        return Ok(None);
    }

    let shifting_time = cps::SHIFTING_TIME.get(word);
    let elapsed = U256::from(now).saturating_sub(cps::LAST_INTERACTION.get(word));

    let shifted = match status {
        RebalancingStatus::ShiftingUp if elapsed < shifting_time => {
            let step = mul_div(checked_sub(upper_range_price, center_price)?, elapsed, shifting_time)?;
            checked_add(center_price, step)?
        }
        RebalancingStatus::ShiftingUp => upper_range_price,
        _ if elapsed < shifting_time => {
            let step = mul_div(checked_sub(center_price, lower_range_price)?, elapsed, shifting_time)?;
            checked_sub(center_price, step)?
        }
        _ => lower_range_price,
    };

    let max = expand_center_price(cps::MAX_CENTER_PRICE.get(word));
    let min = expand_center_price(cps::MIN_CENTER_PRICE.get(word));
    Ok(Some(if shifted > max {
        max
    } else if shifted < min {
        min
    } else {
        shifted
    }))
}

/// Thresholds a post-swap price is compared against.
fn threshold_prices(
    center_price: U256,
    upper_range_price: U256,
    lower_range_price: U256,
    upper_threshold: U256,
    lower_threshold: U256,
) -> Result<(U256, U256), MathError> {
    let up = mul_div(
        checked_sub(upper_range_price, center_price)?,
        checked_sub(U256_E2, upper_threshold)?,
        U256_E2,
    )?;
    let down = mul_div(
        checked_sub(center_price, lower_range_price)?,
        checked_sub(U256_E2, lower_threshold)?,
        U256_E2,
    )?;
    Ok((checked_add(center_price, up)?, checked_sub(center_price, down)?))
}

/// Upper and lower range prices around `center_price`.
pub fn range_prices(
    center_price: U256,
    upper_percent: U256,
    lower_percent: U256,
) -> Result<(U256, U256), MathError> {
    let upper = mul_div(center_price, U256_E4, checked_sub(U256_E4, upper_percent)?)?;
    let lower = mul_div(center_price, checked_sub(U256_E4, lower_percent)?, U256_E4)?;
    Ok((upper, lower))
}

/// Moves the status to ShiftingUp above the upper threshold, ShiftingDown
/// below the lower one and back to Normal in between, writing any change
/// into `state`.
pub fn next_rebalancing_status(
    state: &mut PoolState,
    price: U256,
    center_price: U256,
    now: u64,
) -> Result<RebalancingStatus, RangeError> {
    let status = state.rebalancing_status();
    let (upper_percent, lower_percent) = range_percents(state, now)?;
    let (upper_range, lower_range) = range_prices(center_price, upper_percent, lower_percent)?;
    let (upper_threshold, lower_threshold) = threshold_percents(state, now)?;
    let (upper, lower) =
        threshold_prices(center_price, upper_range, lower_range, upper_threshold, lower_threshold)?;

    let next = if price > upper {
        RebalancingStatus::ShiftingUp
    } else if price < lower {
        RebalancingStatus::ShiftingDown
    } else {
        RebalancingStatus::Normal
    };
    if next != status {
        trace!(?status, ?next, %price, "dex-lite rebalancing status change");
        state.set_rebalancing_status(next)?;
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::super::layout::test_words::*;
    use super::*;
    use std::str::FromStr;

    const NOW: u64 = 1_700_000_000;

    fn u(value: &str) -> U256 {
        U256::from_str(value).unwrap()
    }

    fn with_range_shift(start: u64) -> PoolState {
        PoolState {
            dex_variables: dv::RANGE_SHIFT_ACTIVE.set(base_dex_variables(), U256::ONE).unwrap(),
            range_shift: pack(&[
                (rs::OLD_UPPER, 2_000),
                (rs::OLD_LOWER, 2_000),
                (rs::TIME_TO_SHIFT, 1_000),
                (rs::TIMESTAMP, start as u128),
            ]),
            ..PoolState::default()
        }
    }

    // --- linear shifts ------------------------------------------------------------

    #[test]
    fn shifting_done_moves_in_both_directions() {
        let at = |current: u64, old: u64| {
            calc_shifting_done(U256::from(current), U256::from(old), U256::from(250u16), U256::from(1_000u16))
                .unwrap()
        };
        assert_eq!(at(1_000, 2_000), U256::from(1_750u16));
        assert_eq!(at(3_000, 2_000), U256::from(2_250u16));
        assert_eq!(at(7, 7), U256::from(7u8));
    }

    #[test]
    fn range_shift_in_progress_is_interpolated() {
        let mut state = with_range_shift(NOW - 250);
        let before = state;
        let (upper, lower) = range_percents(&mut state, NOW).unwrap();
        assert_eq!((upper, lower), (U256::from(1_750u16), U256::from(1_750u16)));
        assert_eq!(state, before);
    }

    #[test]
    fn finished_range_shift_is_cleared() {
        let mut state = with_range_shift(NOW - 2_000);
        let (upper, lower) = range_percents(&mut state, NOW).unwrap();
        assert_eq!((upper, lower), (U256::from(1_000u16), U256::from(1_000u16)));
        assert!(state.range_shift.is_zero());
        assert!(!dv::RANGE_SHIFT_ACTIVE.is_set(state.dex_variables));
    }

    #[test]
    fn threshold_shift_uses_its_own_word() {
        let mut state = PoolState {
            dex_variables: dv::THRESHOLD_SHIFT_ACTIVE.set(base_dex_variables(), U256::ONE).unwrap(),
            threshold_shift: pack(&[
                (ts::OLD_UPPER, 90),
                (ts::OLD_LOWER, 90),
                (ts::TIME_TO_SHIFT, 1_000),
                (ts::TIMESTAMP, (NOW - 100) as u128),
            ]),
            ..PoolState::default()
        };
        assert_eq!(
            threshold_percents(&mut state, NOW).unwrap(),
            (U256::from(83u8), U256::from(83u8))
        );
    }

    // --- center price -------------------------------------------------------------

    fn shifting_up(last_interaction: u64, max: u64) -> PoolState {
        PoolState {
            dex_variables: dv::REBALANCING_STATUS.set(base_dex_variables(), U256::from(2u8)).unwrap(),
            center_price_shift: pack(&[
                (cps::LAST_INTERACTION, last_interaction as u128),
                (cps::SHIFTING_TIME, 3_600),
                (cps::MAX_CENTER_PRICE, max as u128),
                (cps::MIN_CENTER_PRICE, 216_840_261),
            ]),
            ..PoolState::default()
        }
    }

    #[test]
    fn center_price_moves_halfway_after_half_the_shifting_time() {
        // max 2e27, min 5e26
        let state = shifting_up(NOW - 1_800, 216_840_263);
        let center = state.center_price();
        let (upper, lower) = range_prices(center, U256::from(1_000u16), U256::from(1_000u16)).unwrap();

        let shifted = rebalanced_center_price(&state, center, upper, lower, NOW).unwrap();
        assert_eq!(shifted, Some(u("1055555555265424947187897685")));

        let done = rebalanced_center_price(&state, center, upper, lower, NOW + 3_600).unwrap();
        assert_eq!(done, Some(upper));
    }

    #[test]
    fn center_price_is_clamped_to_the_stored_bounds() {
        let state = shifting_up(NOW - 1_800, 217_057_094);
        let center = state.center_price();
        let (upper, lower) = range_prices(center, U256::from(1_000u16), U256::from(1_000u16)).unwrap();
        assert_eq!(
            rebalanced_center_price(&state, center, upper, lower, NOW).unwrap(),
            Some(u("1000998842782257978535837696"))
        );
    }

    #[test]
    fn normal_status_keeps_the_center_price() {
        let state = PoolState { dex_variables: base_dex_variables(), ..PoolState::default() };
        let center = state.center_price();
        assert_eq!(rebalanced_center_price(&state, center, center, center, NOW).unwrap(), None);
    }

    // --- status machine -----------------------------------------------------------

    #[test]
    fn status_follows_the_thresholds() {
        let mut state = PoolState { dex_variables: base_dex_variables(), ..PoolState::default() };
        let center = state.center_price();

        // upper threshold is 80% of the way to +11.1%, lower 80% of the way to -10%
        let high = u("1094478961349932546399833983");
        let low = u("910000000000000000000000000");
        assert_eq!(next_rebalancing_status(&mut state, high, center, NOW).unwrap(), RebalancingStatus::ShiftingUp);
        assert_eq!(state.rebalancing_status(), RebalancingStatus::ShiftingUp);
        assert_eq!(next_rebalancing_status(&mut state, low, center, NOW).unwrap(), RebalancingStatus::ShiftingDown);
        assert_eq!(next_rebalancing_status(&mut state, center, center, NOW).unwrap(), RebalancingStatus::Normal);
        assert_eq!(state.dex_variables, base_dex_variables());
    }

    #[test]
    fn range_percent_above_one_hundred_is_rejected() {
        assert_eq!(
            range_prices(U256::from(1u8), U256::from(10_001u16), U256::ZERO),
            Err(MathError::Underflow)
        );
    }
}
