//! Concentrated-liquidity tick/bin pool.
//!
//! Liquidity sits in bins, and bins sit at integer ticks. A swap starts at
//! the active tick, prices each tick on its consolidated reserves and walks
//! one tick at a time in the swap direction while input (or requested
//! output) is left. Internal amounts use 18 decimals.

pub mod bins;
pub mod swap_math;
pub mod tick_math;

use crate::config::{GasConfig, SimConfig};
use crate::error::{DecodeError, Error, LiquidityError, MathError, RangeError, ValidationError};
use crate::hash::FastMap;
use crate::math::fixed_point::{rescale, rescale_up};
use crate::math::math_helpers::checked_add;
use crate::pool::{
    serde_u256, PoolSimulator, PoolSnapshot, StateDelta, SwapRequest, SwapResult, TokenInfo,
};
use crate::U256_E18;
use alloy_primitives::{Address, U256};
use bins::{Bin, BinTable, BinUpdate};
use serde::Deserialize;
use swap_math::{compute_swap_exact_in, compute_swap_exact_out, TickLiquidity};
use tick_math::{get_tick_sqrt_price_and_l, tick_sqrt_prices};
use tracing::{debug, trace, warn};

/// Decimals of every kernel amount.
pub const AMOUNT_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaticExtra {
    tick_spacing: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Extra {
    #[serde(deserialize_with = "serde_u256::deserialize")]
    fee_a_in: U256,
    #[serde(deserialize_with = "serde_u256::deserialize")]
    fee_b_in: U256,
    #[serde(default)]
    protocol_fee_ratio: u8,
    active_tick: i32,
    bins: FastMap<u32, Bin>,
    #[serde(default)]
    bin_positions: FastMap<i32, Vec<u32>>,
    #[serde(default)]
    last_twa_d8: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaverickV2State {
    /// Fee on token A input, over `1e18`.
    pub fee_a_in: U256,
    /// Fee on token B input, over `1e18`.
    pub fee_b_in: U256,
    /// Protocol share of the fee, in thousandths.
    pub protocol_fee_ratio: u8,
    pub active_tick: i32,
    pub tick_spacing: u32,
    /// Time-weighted average tick, scaled by 256. Movable bins follow it.
    pub last_twa_d8: i64,
    pub bins: BinTable,
}

/// Post-swap state of a [`MaverickV2Pool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaverickV2Delta {
    pub pool: Address,
    pub active_tick: i32,
    pub bins: Vec<BinUpdate>,
    pub reserves: Vec<U256>,
}

/// Totals of a swap across ticks, in 18-decimal units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapOutcome {
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee: U256,
    pub end_tick: i32,
    pub crossings: u32,
    pub bins: Vec<BinUpdate>,
}

#[derive(Debug, Clone)]
pub struct MaverickV2Pool {
    address: Address,
    tokens: Vec<TokenInfo>,
    reserves: Vec<U256>,
    state: MaverickV2State,
    max_tick_distance: i32,
    max_swap_iterations: u32,
    gas: GasConfig,
}

impl MaverickV2Pool {
    pub fn from_snapshot(snapshot: &PoolSnapshot, config: &SimConfig) -> Result<Self, Error> {
        snapshot.validate()?;
        if snapshot.tokens.len() != 2 {
            return Err(DecodeError::TokenCount { expected: 2, found: snapshot.tokens.len() }.into());
        }
        let static_extra: StaticExtra = snapshot.decode_static_extra()?;
        let extra: Extra = snapshot.decode_extra()?;
        if extra.bins.is_empty() {
            return Err(DecodeError::EmptyBins.into());
        }
        if static_extra.tick_spacing == 0 {
            return Err(DecodeError::InvalidInteger("tickSpacing 0".into()).into());
        }

        let (fee_a_in, fee_b_in) = (extra.fee_a_in, extra.fee_b_in);
        if fee_a_in >= U256_E18 || fee_b_in >= U256_E18 {
            return Err(RangeError::InvalidFeeRate.into());
        }

        let mut table = BinTable { bins: extra.bins, bin_positions: extra.bin_positions };
        table.index();

        debug!(
            pool = %snapshot.address,
            tick_spacing = static_extra.tick_spacing,
            active_tick = extra.active_tick,
            bins = table.len(),
            fee_a_in = %fee_a_in,
            "maverick-v2 pool decoded"
        );

        Ok(Self {
            address: snapshot.address,
            tokens: snapshot.tokens.clone(),
            reserves: snapshot.reserves.clone(),
            state: MaverickV2State {
                fee_a_in,
                fee_b_in,
                protocol_fee_ratio: extra.protocol_fee_ratio,
                active_tick: extra.active_tick,
                tick_spacing: static_extra.tick_spacing,
                last_twa_d8: extra.last_twa_d8,
                bins: table,
            },
            max_tick_distance: config.max_tick_distance,
            max_swap_iterations: config.max_swap_iterations,
            gas: config.gas,
        })
    }

    pub fn state(&self) -> &MaverickV2State {
        &self.state
    }

    pub fn active_tick(&self) -> i32 {
        self.state.active_tick
    }

    /// Walks ticks from the active one until `amount` (input for exact-in,
    /// output for exact-out) is used up.
    ///
    /// A step that leaves its tick, by skipping empty ticks or by passing
    /// excess on, counts as one crossing.
    pub fn swap(&self, amount: U256, token_a_in: bool, exact_out: bool) -> Result<SwapOutcome, Error> {
        let state = &self.state;
        let fee = if token_a_in { state.fee_a_in } else { state.fee_b_in };
        let step_dir: i32 = if token_a_in { 1 } else { -1 };
        let start = state.active_tick;

        let mut outcome = SwapOutcome { end_tick: start, ..SwapOutcome::default() };
        let mut tick = start;
        let mut excess = amount;
        let mut iterations = 0u32;

        while !excess.is_zero() {
            let mut crossed = false;
            let reserves = loop {
                if (i64::from(tick) - i64::from(start)).abs() > i64::from(self.max_tick_distance) {
                    return Err(LiquidityError::BeyondSwapLimit.into());
                }
                iterations += 1;
                if iterations > self.max_swap_iterations {
                    return Err(LiquidityError::TooManyTicksSearched.into());
                }
                match state.bins.tick_reserves(tick)? {
                    Some(reserves) if !reserves.is_empty() => break reserves,
                    _ => {
                        tick = tick.checked_add(step_dir).ok_or(MathError::Overflow)?;
                        crossed = true;
                    }
                }
            };

            let (lower, upper) = tick_sqrt_prices(state.tick_spacing, tick)?;
            let (sqrt_price, liquidity) =
                get_tick_sqrt_price_and_l(reserves.reserve_a, reserves.reserve_b, lower, upper)?;
            let liquidity = TickLiquidity {
                reserve_a: reserves.reserve_a,
                reserve_b: reserves.reserve_b,
                sqrt_price,
                liquidity,
            };

            let step = if exact_out {
                compute_swap_exact_out(excess, token_a_in, &liquidity, fee, state.protocol_fee_ratio)?
            } else {
                compute_swap_exact_in(excess, token_a_in, &liquidity, fee, state.protocol_fee_ratio)?
            };
            trace!(
                tick,
                %sqrt_price,
                amount_in = %step.amount_in,
                amount_out = %step.amount_out,
                drained = step.drained,
                "maverick-v2 tick step"
            );

            outcome.bins.extend(state.bins.allocate(
                tick,
                token_a_in,
                step.amount_in_bin,
                step.amount_out,
                step.drained,
            )?);
            outcome.amount_in = checked_add(outcome.amount_in, step.amount_in)?;
            outcome.amount_out = checked_add(outcome.amount_out, step.amount_out)?;
            outcome.fee = checked_add(outcome.fee, step.fee_basis)?;
            excess = step.excess;

            if !excess.is_zero() {
                tick = tick.checked_add(step_dir).ok_or(MathError::Overflow)?;
                crossed = true;
            }
            if crossed {
                outcome.crossings += 1;
            }
        }

        outcome.end_tick = tick;
        Ok(outcome)
    }
}

impl PoolSimulator for MaverickV2Pool {
    fn address(&self) -> Address {
        self.address
    }

    fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    fn reserves(&self) -> &[U256] {
        &self.reserves
    }

    fn quote(&self, request: &SwapRequest) -> Result<SwapResult, Error> {
        let (index_in, index_out) = self.pair_indices(request)?;
        let token_a_in = index_in == 0;
        let decimals_in = self.tokens[index_in].decimals;
        let decimals_out = self.tokens[index_out].decimals;

        let (outcome, amount_in, amount_out) = if request.is_exact_in() {
            let amount = rescale(request.amount, decimals_in, AMOUNT_DECIMALS)?;
            if amount.is_zero() {
                return Err(ValidationError::InvalidAmount.into());
            }
            let outcome = self.swap(amount, token_a_in, false)?;
            let amount_out = rescale(outcome.amount_out, AMOUNT_DECIMALS, decimals_out)?;
            if amount_out.is_zero() {
                return Err(ValidationError::InvalidAmount.into());
            }
            (outcome, request.amount, amount_out)
        } else {
            let amount = rescale_up(request.amount, decimals_out, AMOUNT_DECIMALS)?;
            let outcome = self.swap(amount, token_a_in, true)?;
            let amount_in = rescale_up(outcome.amount_in, AMOUNT_DECIMALS, decimals_in)?;
            (outcome, amount_in, request.amount)
        };

        let mut reserves = self.reserves.clone();
        reserves[index_in] = checked_add(reserves[index_in], amount_in)?;
        reserves[index_out] = reserves[index_out].saturating_sub(amount_out);

        Ok(SwapResult {
            amount: if request.is_exact_in() { amount_out } else { amount_in },
            fee: rescale(outcome.fee, AMOUNT_DECIMALS, decimals_in)?,
            fee_token: request.token_in,
            gas: self.gas.maverick(outcome.crossings),
            delta: StateDelta::MaverickV2(MaverickV2Delta {
                pool: self.address,
                active_tick: outcome.end_tick,
                bins: outcome.bins,
                reserves,
            }),
        })
    }

    fn apply(&mut self, delta: &StateDelta) -> Result<(), Error> {
        let StateDelta::MaverickV2(delta) = delta else {
            warn!(pool = %self.address, "maverick-v2 pool received a foreign delta");
            return Err(ValidationError::DeltaMismatch.into());
        };
        let known = delta.bins.iter().all(|u| self.state.bins.bins.contains_key(&u.id));
        if delta.pool != self.address || delta.reserves.len() != self.reserves.len() || !known {
            warn!(pool = %self.address, delta_pool = %delta.pool, "maverick-v2 delta does not fit this pool");
            return Err(ValidationError::DeltaMismatch.into());
        }

        let mut bins = self.state.bins.clone();
        for update in &delta.bins {
            bins.update(update);
        }
        bins.move_bins(self.state.active_tick, delta.active_tick, self.state.last_twa_d8)?;
        if self.state.active_tick != delta.active_tick {
            debug!(
                pool = %self.address,
                from = self.state.active_tick,
                to = delta.active_tick,
                "maverick-v2 active tick moved"
            );
        }

        self.state.bins = bins;
        self.state.active_tick = delta.active_tick;
        self.reserves = delta.reserves.clone();
        Ok(())
    }
}
