//! Bit-packed dynamic-state pool.
//!
//! The whole pool lives in four storage words (see [`layout`]). A quote
//! resolves any time-based shift, derives imaginary reserves from the
//! center price and range ([`reserves`]), swaps on the constant-product curve
//! over them and, for an active pool, advances the rebalancing status
//! ([`shift`]). Kernel amounts use 9 decimals.

pub mod layout;
pub mod reserves;
pub mod shift;

use crate::config::SimConfig;
use crate::error::{DecodeError, Error, LiquidityError, ValidationError};
use crate::math::fixed_point::{gross_up_ppm, ppm_fee, rescale};
use crate::math::math_helpers::{checked_add, checked_sub, mul_div};
use crate::pool::{PoolSimulator, PoolSnapshot, StateDelta, SwapRequest, SwapResult, TokenInfo};
use crate::{U256_E2, U256_E4};
use alloy_primitives::{Address, B256, U256};
use layout::{dex_variables as dv, PoolState, RebalancingStatus};
use reserves::{amount_in, amount_out, pool_price, prices_and_reserves, reserves_ratio_ok};
use serde::Deserialize;
use shift::next_rebalancing_status;
use tracing::{debug, trace, warn};

/// Decimals of every kernel amount.
pub const TOKENS_DECIMALS_PRECISION: u8 = 9;

/// Smallest swap amount, in kernel units.
pub const MIN_SWAP_AMOUNT: U256 = U256_E4;

/// Supplies may not fall below `1 / MINIMUM_LIQUIDITY_SWAP` of the other
/// side, valued at the center price.
pub const MINIMUM_LIQUIDITY_SWAP: U256 = U256_E4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DexKey {
    pub token0: Address,
    pub token1: Address,
    pub salt: B256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Extra {
    #[serde(default)]
    dex_key: Option<DexKey>,
    pool_state: PoolState,
    #[serde(default)]
    block_timestamp: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaticExtra {
    #[serde(default)]
    dex_lite_address: Option<Address>,
}

/// Post-swap state of a [`DexLitePool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexLiteDelta {
    pub pool: Address,
    pub state: PoolState,
    pub reserves: Vec<U256>,
}

/// A priced swap in kernel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Trade {
    amount_in: U256,
    amount_out: U256,
    fee: U256,
}

#[derive(Debug, Clone)]
pub struct DexLitePool {
    address: Address,
    tokens: Vec<TokenInfo>,
    reserves: Vec<U256>,
    state: PoolState,
    dex_key: Option<DexKey>,
    dex_lite_address: Option<Address>,
    block_timestamp: u64,
    gas: u64,
}

impl DexLitePool {
    pub fn from_snapshot(snapshot: &PoolSnapshot, config: &SimConfig) -> Result<Self, Error> {
        snapshot.validate()?;
        if snapshot.tokens.len() != 2 {
            return Err(DecodeError::TokenCount { expected: 2, found: snapshot.tokens.len() }.into());
        }
        let extra: Extra = snapshot.decode_extra()?;
        let static_extra: StaticExtra = if snapshot.static_extra.trim().is_empty() {
            StaticExtra::default()
        } else {
            snapshot.decode_static_extra()?
        };
        if !extra.pool_state.is_initialized() {
            return Err(DecodeError::NotInitialized.into());
        }

        let block_timestamp = if extra.block_timestamp == 0 {
            snapshot.timestamp
        } else {
            extra.block_timestamp
        };
        let state = extra.pool_state;
        let packed = state.token_decimals();
        if packed != [snapshot.tokens[0].decimals, snapshot.tokens[1].decimals] {
            warn!(pool = %snapshot.address, ?packed, "packed token decimals differ from the snapshot");
        }

        debug!(
            pool = %snapshot.address,
            fee_ppm = %state.fee(),
            status = ?state.rebalancing_status(),
            center_price = %state.center_price(),
            block_timestamp,
            "dex-lite pool decoded"
        );

        Ok(Self {
            address: snapshot.address,
            tokens: snapshot.tokens.clone(),
            reserves: snapshot.reserves.clone(),
            state,
            dex_key: extra.dex_key,
            dex_lite_address: static_extra.dex_lite_address,
            block_timestamp,
            gas: config.gas.dex_lite,
        })
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub fn dex_key(&self) -> Option<&DexKey> {
        self.dex_key.as_ref()
    }

    /// Contract the swap is routed through.
    pub fn dex_lite_address(&self) -> Option<Address> {
        self.dex_lite_address
    }

    /// Timestamp every shift is evaluated at by [`PoolSimulator::quote`].
    pub fn block_timestamp(&self) -> u64 {
        self.block_timestamp
    }

    fn to_internal(&self, amount: U256, index: usize) -> Result<U256, Error> {
        Ok(rescale(amount, self.tokens[index].decimals, TOKENS_DECIMALS_PRECISION)?)
    }

    fn from_internal(&self, amount: U256, index: usize) -> Result<U256, Error> {
        Ok(rescale(amount, TOKENS_DECIMALS_PRECISION, self.tokens[index].decimals)?)
    }

    fn check_amount(amount: U256, reserve: U256) -> Result<(), Error> {
        if amount < MIN_SWAP_AMOUNT || amount > dv::TOKEN0_TOTAL_SUPPLY_ADJUSTED.max_value() {
            return Err(ValidationError::InvalidAmount.into());
        }
        if amount > reserve / U256::from(2u8) {
            return Err(LiquidityError::ExcessiveSwapAmount.into());
        }
        Ok(())
    }

    /// Quotes with every shift evaluated at unix time `now`.
    pub fn quote_at(&self, request: &SwapRequest, now: u64) -> Result<SwapResult, Error> {
        let (index_in, index_out) = self.pair_indices(request)?;

        let mut state = self.state;
        let prices = prices_and_reserves(&mut state, now)?;
        let mut imaginary = prices.imaginary;

        let trade = if request.is_exact_in() {
            let amount = self.to_internal(request.amount, index_in)?;
            Self::check_amount(amount, imaginary[index_in])?;

            let fee = ppm_fee(amount, state.fee())?;
            let out = amount_out(amount - fee, imaginary[index_in], imaginary[index_out])?;
            Trade { amount_in: amount, amount_out: out, fee }
        } else {
            let amount = self.to_internal(request.amount, index_out)?;
            Self::check_amount(amount, imaginary[index_out])?;

            let net = amount_in(amount, imaginary[index_in], imaginary[index_out])
                .map_err(|_| LiquidityError::InsufficientReserve)?;
            let gross = gross_up_ppm(net, state.fee())?;
            Trade { amount_in: gross, amount_out: amount, fee: gross - net }
        };

        let supplies = state.supplies();
        if supplies[index_out] < trade.amount_out {
            return Err(LiquidityError::InsufficientReserve.into());
        }
        let revenue_cut = mul_div(trade.fee, state.revenue_cut(), U256_E2)?;
        let mut next_supplies = supplies;
        next_supplies[index_in] =
            checked_add(supplies[index_in], checked_sub(trade.amount_in, revenue_cut)?)?;
        next_supplies[index_out] = supplies[index_out] - trade.amount_out;

        if !reserves_ratio_ok(&next_supplies, index_in, prices.center_price, MINIMUM_LIQUIDITY_SWAP)? {
            return Err(LiquidityError::ReservesRatioTooHigh.into());
        }

        let (amount_in_erc, amount_out_erc) = if request.is_exact_in() {
            (request.amount, self.from_internal(trade.amount_out, index_out)?)
        } else {
            (self.from_internal(trade.amount_in, index_in)?, request.amount)
        };
        if amount_in_erc.is_zero() || amount_out_erc.is_zero() {
            return Err(ValidationError::InvalidAmount.into());
        }

        // the post-swap price is taken on the amounts the trader actually moves
        imaginary[index_in] = checked_add(imaginary[index_in], self.to_internal(amount_in_erc, index_in)?)?;
        imaginary[index_out] =
            checked_sub(imaginary[index_out], self.to_internal(amount_out_erc, index_out)?)?;
        let price = pool_price(&imaginary)?;

        if state.rebalancing_status() != RebalancingStatus::Inactive {
            let status = next_rebalancing_status(&mut state, price, prices.center_price, now)?;
            if status.is_shifting() || dv::CENTER_PRICE_SHIFT_ACTIVE.is_set(state.dex_variables) {
                state.touch_center_price_shift(now)?;
            }
        }
        state.set_supplies(next_supplies)?;

        trace!(
            pool = %self.address,
            amount_in = %trade.amount_in,
            amount_out = %trade.amount_out,
            %price,
            status = ?state.rebalancing_status(),
            "dex-lite swap"
        );

        let reserves = vec![self.from_internal(next_supplies[0], 0)?, self.from_internal(next_supplies[1], 1)?];
        Ok(SwapResult {
            amount: if request.is_exact_in() { amount_out_erc } else { amount_in_erc },
            fee: self.from_internal(trade.fee, index_in)?,
            fee_token: request.token_in,
            gas: self.gas,
            delta: StateDelta::DexLite(DexLiteDelta { pool: self.address, state, reserves }),
        })
    }
}

impl PoolSimulator for DexLitePool {
    fn address(&self) -> Address {
        self.address
    }

    fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    fn reserves(&self) -> &[U256] {
        &self.reserves
    }

    /// Shifts are evaluated at the snapshot's block timestamp.
    fn quote(&self, request: &SwapRequest) -> Result<SwapResult, Error> {
        self.quote_at(request, self.block_timestamp)
    }

    fn apply(&mut self, delta: &StateDelta) -> Result<(), Error> {
        let StateDelta::DexLite(delta) = delta else {
            warn!(pool = %self.address, "dex-lite pool received a foreign delta");
            return Err(ValidationError::DeltaMismatch.into());
        };
        if delta.pool != self.address || delta.reserves.len() != self.reserves.len() {
            warn!(pool = %self.address, delta_pool = %delta.pool, "dex-lite delta for another pool");
            return Err(ValidationError::DeltaMismatch.into());
        }
        if !delta.state.is_initialized() {
            warn!(pool = %self.address, "dex-lite delta carries an empty state");
            return Err(ValidationError::DeltaMismatch.into());
        }
        self.state = delta.state;
        self.reserves = delta.reserves.clone();
        Ok(())
    }
}
