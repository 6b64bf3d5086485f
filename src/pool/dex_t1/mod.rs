//! Dual-pool router: a collateral and a debt constant-product pool quoted as
//! one venue.
//!
//! Kernel amounts are in 1e12 precision. Every trade is split between the two
//! sub-pools with [`routing::swap_routing_in`] / [`routing::swap_routing_out`],
//! then checked, in order, against real reserves, the borrow / withdraw
//! ceilings, the price impact of the dominant leg and the post-swap reserve
//! ratio.

pub mod limits;
pub mod routing;

use crate::config::SimConfig;
use crate::error::{DecodeError, Error, LiquidityError, ProtocolPausedError, ValidationError};
use crate::math::fixed_point::{fraction_to_scaled, gross_up_ppm, ppm_fee, rescale};
use crate::math::math_helpers::{abs_diff, checked_add, checked_mul, mul_div};
use crate::pool::{
    serde_u256, PoolSimulator, PoolSnapshot, StateDelta, SwapRequest, SwapResult, TokenInfo,
};
use crate::{PRICE_PRECISION, U256_E4};
use alloy_primitives::{Address, U256};
use limits::DexLimits;
use routing::{
    get_amount_in, get_amount_out, swap_routing_in, swap_routing_out, DebtReserves, PoolReserves,
    Route,
};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// Decimals of every kernel amount.
pub const DEX_AMOUNTS_DECIMALS: u8 = 12;

/// Reserves of a sub-pool may not fall below `1 / MIN_SWAP_LIQUIDITY` of the
/// opposite side, valued at the center price.
pub const MIN_SWAP_LIQUIDITY: U256 = U256_E4;

/// Protocol state carried in the snapshot's `extra` blob.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexT1State {
    pub collateral_reserves: PoolReserves,
    pub debt_reserves: DebtReserves,
    pub dex_limits: DexLimits,
    /// Token1 per token0 over `1e27`; zero when the tracker did not read it.
    #[serde(default, deserialize_with = "serde_u256::deserialize")]
    pub center_price: U256,
    #[serde(default)]
    pub sync_timestamp: u64,
    #[serde(default)]
    pub is_swap_and_arbitrage_paused: bool,
}

/// Post-swap state of a [`DexT1Pool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexT1Delta {
    pub pool: Address,
    pub state: DexT1State,
    pub reserves: Vec<U256>,
}

/// Amounts through each sub-pool, in kernel precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Legs {
    col_in: U256,
    col_out: U256,
    debt_in: U256,
    debt_out: U256,
}

impl Legs {
    fn amount_in(&self) -> Result<U256, Error> {
        Ok(checked_add(self.col_in, self.debt_in)?)
    }

    fn amount_out(&self) -> Result<U256, Error> {
        Ok(checked_add(self.col_out, self.debt_out)?)
    }
}

#[derive(Debug, Clone)]
pub struct DexT1Pool {
    address: Address,
    tokens: Vec<TokenInfo>,
    reserves: Vec<U256>,
    state: DexT1State,
    fee_ppm: U256,
    gas: u64,
    max_price_impact: U256,
    clock: Option<u64>,
}

impl DexT1Pool {
    pub fn from_snapshot(snapshot: &PoolSnapshot, config: &SimConfig) -> Result<Self, Error> {
        snapshot.validate()?;
        if snapshot.tokens.len() != 2 {
            return Err(DecodeError::TokenCount { expected: 2, found: snapshot.tokens.len() }.into());
        }
        let state: DexT1State = snapshot.decode_extra()?;
        let fee_ppm = fraction_to_scaled(snapshot.swap_fee, 1_000_000)
            .map_err(|_| DecodeError::InvalidFee(snapshot.swap_fee))?;

        debug!(
            pool = %snapshot.address,
            fee_ppm = %fee_ppm,
            collateral_enabled = state.collateral_reserves.is_enabled(),
            debt_enabled = state.debt_reserves.reserves.is_enabled(),
            "dex-t1 pool decoded"
        );

        Ok(Self {
            address: snapshot.address,
            tokens: snapshot.tokens.clone(),
            reserves: snapshot.reserves.clone(),
            state,
            fee_ppm,
            gas: config.gas.dex_t1,
            max_price_impact: config.max_price_impact,
            clock: config.clock,
        })
    }

    pub fn state(&self) -> &DexT1State {
        &self.state
    }

    pub fn fee_ppm(&self) -> U256 {
        self.fee_ppm
    }

    /// Quotes against the ceilings as expanded at unix time `now`.
    pub fn quote_at(&self, request: &SwapRequest, now: u64) -> Result<SwapResult, Error> {
        let (index_in, index_out) = self.pair_indices(request)?;
        if self.state.is_swap_and_arbitrage_paused {
            return Err(ProtocolPausedError::SwapAndArbitragePaused.into());
        }

        let decimals_in = self.tokens[index_in].decimals;
        let decimals_out = self.tokens[index_out].decimals;
        let elapsed = now.saturating_sub(self.state.sync_timestamp);

        let (legs, amount_in, amount_out, fee) = if request.is_exact_in() {
            let amount = rescale(request.amount, decimals_in, DEX_AMOUNTS_DECIMALS)?;
            let fee = ppm_fee(amount, self.fee_ppm)?;
            let net = amount - fee;
            if net.is_zero() {
                return Err(ValidationError::InvalidAmount.into());
            }

            let legs = self.legs_in(index_in, net)?;
            self.check(&legs, index_in, index_out, elapsed)?;

            let amount_out = rescale(legs.amount_out()?, DEX_AMOUNTS_DECIMALS, decimals_out)?;
            if amount_out.is_zero() {
                return Err(ValidationError::InvalidAmount.into());
            }
            (legs, request.amount, amount_out, rescale(fee, DEX_AMOUNTS_DECIMALS, decimals_in)?)
        } else {
            let amount = rescale(request.amount, decimals_out, DEX_AMOUNTS_DECIMALS)?;
            if amount.is_zero() {
                return Err(ValidationError::InvalidAmount.into());
            }

            let legs = self.legs_out(index_in, amount)?;
            self.check(&legs, index_in, index_out, elapsed)?;

            let net = legs.amount_in()?;
            let gross = gross_up_ppm(net, self.fee_ppm)?;
            let amount_in = rescale(gross, DEX_AMOUNTS_DECIMALS, decimals_in)?;
            (legs, amount_in, request.amount, rescale(gross - net, DEX_AMOUNTS_DECIMALS, decimals_in)?)
        };

        let delta = self.next_state(&legs, index_in, index_out, amount_in, amount_out)?;

        Ok(SwapResult {
            amount: if request.is_exact_in() { amount_out } else { amount_in },
            fee,
            fee_token: request.token_in,
            gas: self.gas,
            delta: StateDelta::DexT1(delta),
        })
    }

    /// Imaginary reserves `(collateral in, collateral out, debt in, debt out)`.
    fn imaginary(&self, index_in: usize) -> (U256, U256, U256, U256) {
        let col = &self.state.collateral_reserves;
        let debt = &self.state.debt_reserves.reserves;
        let index_out = 1 - index_in;
        (
            col.imaginary(index_in),
            col.imaginary(index_out),
            debt.imaginary(index_in),
            debt.imaginary(index_out),
        )
    }

    fn route(&self, total: U256, exact_in: bool, index_in: usize) -> Result<Route, Error> {
        let (col_in, col_out, debt_in, debt_out) = self.imaginary(index_in);
        let col_enabled = self.state.collateral_reserves.is_enabled();
        let debt_enabled = self.state.debt_reserves.reserves.is_enabled();

        let route = match (col_enabled, debt_enabled) {
            (true, true) if exact_in => swap_routing_in(total, col_out, col_in, debt_out, debt_in)?,
            (true, true) => swap_routing_out(total, col_in, col_out, debt_in, debt_out)?,
            (false, true) => Route::Debt,
            (true, false) => Route::Collateral,
            (false, false) => return Err(LiquidityError::NoPoolsEnabled.into()),
        };
        trace!(?route, %total, exact_in, "dex-t1 split");
        Ok(route)
    }

    fn legs_in(&self, index_in: usize, amount: U256) -> Result<Legs, Error> {
        let (col_in, col_out, debt_in, debt_out) = self.imaginary(index_in);
        let (col_amount, debt_amount) = self.route(amount, true, index_in)?.shares(amount);

        let mut legs = Legs { col_in: col_amount, debt_in: debt_amount, ..Legs::default() };
        if !col_amount.is_zero() {
            legs.col_out = get_amount_out(col_amount, col_in, col_out)?;
        }
        if !debt_amount.is_zero() {
            legs.debt_out = get_amount_out(debt_amount, debt_in, debt_out)?;
        }
        Ok(legs)
    }

    fn legs_out(&self, index_in: usize, amount: U256) -> Result<Legs, Error> {
        let (col_in, col_out, debt_in, debt_out) = self.imaginary(index_in);
        let (col_amount, debt_amount) = self.route(amount, false, index_in)?.shares(amount);

        let mut legs = Legs { col_out: col_amount, debt_out: debt_amount, ..Legs::default() };
        if !col_amount.is_zero() {
            legs.col_in = get_amount_in(col_amount, col_in, col_out)?;
        }
        if !debt_amount.is_zero() {
            legs.debt_in = get_amount_in(debt_amount, debt_in, debt_out)?;
        }
        Ok(legs)
    }

    fn check(&self, legs: &Legs, index_in: usize, index_out: usize, elapsed: u64) -> Result<(), Error> {
        let col = &self.state.collateral_reserves;
        let debt = &self.state.debt_reserves.reserves;
        let decimals_out = self.tokens[index_out].decimals;

        if legs.col_out > col.real(index_out) || legs.debt_out > debt.real(index_out) {
            return Err(LiquidityError::InsufficientReserve.into());
        }

        if !legs.debt_out.is_zero() {
            let borrow = rescale(legs.debt_out, DEX_AMOUNTS_DECIMALS, decimals_out)?;
            if borrow > self.state.dex_limits.borrowable(index_out).expanded(elapsed) {
                return Err(LiquidityError::InsufficientBorrowable.into());
            }
        }
        if !legs.col_out.is_zero() {
            let withdraw = rescale(legs.col_out, DEX_AMOUNTS_DECIMALS, decimals_out)?;
            if withdraw > self.state.dex_limits.withdrawable(index_out).expanded(elapsed) {
                return Err(LiquidityError::InsufficientWithdrawable.into());
            }
        }

        // price impact is measured on whichever leg carries more input
        let (dominant, amount_in, amount_out) = if legs.col_in > legs.debt_in {
            (col, legs.col_in, legs.col_out)
        } else {
            (debt, legs.debt_in, legs.debt_out)
        };
        let old_price = price_of(dominant)?;
        let new_price = price_of(&dominant.after_swap(index_in, amount_in, amount_out)?)?;
        let impact = mul_div(abs_diff(old_price, new_price), PRICE_PRECISION, old_price)?;
        if impact > self.max_price_impact {
            return Err(LiquidityError::ExcessivePriceImpact.into());
        }

        let center_price = if self.state.center_price.is_zero() {
            old_price
        } else {
            self.state.center_price
        };
        for (reserves, amount_in, amount_out) in
            [(col, legs.col_in, legs.col_out), (debt, legs.debt_in, legs.debt_out)]
        {
            if amount_in.is_zero() {
                continue;
            }
            let next = reserves.after_swap(index_in, amount_in, amount_out)?;
            if !reserves_ratio_ok(&next, index_out, center_price)? {
                return Err(LiquidityError::ReservesRatioTooHigh.into());
            }
        }
        Ok(())
    }

    fn next_state(
        &self,
        legs: &Legs,
        index_in: usize,
        index_out: usize,
        amount_in: U256,
        amount_out: U256,
    ) -> Result<DexT1Delta, Error> {
        let mut state = self.state.clone();
        let decimals_out = self.tokens[index_out].decimals;

        if !legs.col_in.is_zero() || !legs.col_out.is_zero() {
            state.collateral_reserves =
                state.collateral_reserves.after_swap(index_in, legs.col_in, legs.col_out)?;
            state
                .dex_limits
                .withdrawable_mut(index_out)
                .consume(rescale(legs.col_out, DEX_AMOUNTS_DECIMALS, decimals_out)?);
        }
        if !legs.debt_in.is_zero() || !legs.debt_out.is_zero() {
            let debt = &mut state.debt_reserves;
            debt.reserves = debt.reserves.after_swap(index_in, legs.debt_in, legs.debt_out)?;
            let (debt_in, debt_out) = if index_in == 0 {
                (&mut debt.token0_debt, &mut debt.token1_debt)
            } else {
                (&mut debt.token1_debt, &mut debt.token0_debt)
            };
            *debt_in = debt_in.saturating_sub(legs.debt_in);
            *debt_out = checked_add(*debt_out, legs.debt_out)?;
            state
                .dex_limits
                .borrowable_mut(index_out)
                .consume(rescale(legs.debt_out, DEX_AMOUNTS_DECIMALS, decimals_out)?);
        }

        let mut reserves = self.reserves.clone();
        reserves[index_in] = checked_add(reserves[index_in], amount_in)?;
        reserves[index_out] = reserves[index_out].saturating_sub(amount_out);

        Ok(DexT1Delta { pool: self.address, state, reserves })
    }
}

/// Token1 per token0 of a sub-pool, over `1e27`.
fn price_of(reserves: &PoolReserves) -> Result<U256, Error> {
    Ok(mul_div(reserves.imaginary(1), PRICE_PRECISION, reserves.imaginary(0))?)
}

/// The side being drained must keep `1 / MIN_SWAP_LIQUIDITY` of the other
/// side's value at `price`.
fn reserves_ratio_ok(reserves: &PoolReserves, index_out: usize, price: U256) -> Result<bool, Error> {
    let token0 = reserves.token0_real_reserves;
    let token1 = reserves.token1_real_reserves;
    if index_out == 1 {
        let floor = mul_div(token0, price, checked_mul(PRICE_PRECISION, MIN_SWAP_LIQUIDITY)?)?;
        Ok(token1 >= floor)
    } else {
        let floor = mul_div(token1, PRICE_PRECISION, checked_mul(price, MIN_SWAP_LIQUIDITY)?)?;
        Ok(token0 >= floor)
    }
}

impl PoolSimulator for DexT1Pool {
    fn address(&self) -> Address {
        self.address
    }

    fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    fn reserves(&self) -> &[U256] {
        &self.reserves
    }

    /// Ceilings are expanded to the configured clock, or not at all when
    /// none is set.
    fn quote(&self, request: &SwapRequest) -> Result<SwapResult, Error> {
        self.quote_at(request, self.clock.unwrap_or(self.state.sync_timestamp))
    }

    fn apply(&mut self, delta: &StateDelta) -> Result<(), Error> {
        let StateDelta::DexT1(delta) = delta else {
            warn!(pool = %self.address, "dex-t1 pool received a foreign delta");
            return Err(ValidationError::DeltaMismatch.into());
        };
        if delta.pool != self.address || delta.reserves.len() != self.reserves.len() {
            warn!(pool = %self.address, delta_pool = %delta.pool, "dex-t1 delta for another pool");
            return Err(ValidationError::DeltaMismatch.into());
        }
        self.state = delta.state.clone();
        self.reserves = delta.reserves.clone();
        Ok(())
    }
}
