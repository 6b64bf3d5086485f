//! The simulator lifecycle shared by every kernel.
//!
//! A simulator is built once from a [`PoolSnapshot`], quoted through `&self`,
//! cloned before speculative route branches and advanced with
//! [`PoolSimulator::apply`] once a swap is accepted. [`Pool`] closes the set
//! of kernels into one enum so routers can hold them in a single collection.

pub mod dex_lite;
pub mod dex_t1;
pub mod maverick_v2;
pub mod registry;
pub(crate) mod serde_u256;

use crate::config::SimConfig;
use crate::error::{DecodeError, Error, ValidationError};
use alloy_primitives::{Address, U256};
use serde::Deserialize;

use dex_lite::{DexLiteDelta, DexLitePool};
use dex_t1::{DexT1Delta, DexT1Pool};
use maverick_v2::{MaverickV2Delta, MaverickV2Pool};

/// Largest token decimals a snapshot may carry.
pub const MAX_TOKEN_DECIMALS: u8 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub decimals: u8,
}

/// Decoded state handed over by the tracker layer.
///
/// `extra` and `static_extra` are protocol blobs (JSON text); each kernel
/// decodes them into its own typed state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub address: Address,
    #[serde(default)]
    pub exchange: String,
    pub tokens: Vec<TokenInfo>,
    #[serde(deserialize_with = "serde_u256::deserialize_vec")]
    pub reserves: Vec<U256>,
    #[serde(default)]
    pub swap_fee: f64,
    #[serde(default)]
    pub extra: String,
    #[serde(default)]
    pub static_extra: String,
    #[serde(default)]
    pub block_number: u64,
    #[serde(default)]
    pub timestamp: u64,
}

impl PoolSnapshot {
    /// Shape checks every kernel relies on.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.tokens.len() < 2 {
            return Err(DecodeError::TokenCount { expected: 2, found: self.tokens.len() });
        }
        if self.tokens.len() != self.reserves.len() {
            return Err(DecodeError::ReserveCount {
                tokens: self.tokens.len(),
                reserves: self.reserves.len(),
            });
        }
        if let Some(token) = self.tokens.iter().find(|t| t.decimals > MAX_TOKEN_DECIMALS) {
            return Err(DecodeError::InvalidDecimals(token.decimals));
        }
        if !self.swap_fee.is_finite() || !(0.0..1.0).contains(&self.swap_fee) {
            return Err(DecodeError::InvalidFee(self.swap_fee));
        }
        Ok(())
    }

    /// Parses `extra` into `T`.
    pub fn decode_extra<'a, T: Deserialize<'a>>(&'a self) -> Result<T, DecodeError> {
        Ok(serde_json::from_str(&self.extra)?)
    }

    /// Parses `static_extra` into `T`.
    pub fn decode_static_extra<'a, T: Deserialize<'a>>(&'a self) -> Result<T, DecodeError> {
        Ok(serde_json::from_str(&self.static_extra)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapKind {
    /// `amount` is what the trader sends.
    ExactIn,
    /// `amount` is what the trader wants to receive.
    ExactOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRequest {
    pub token_in: Address,
    pub token_out: Address,
    pub amount: U256,
    pub kind: SwapKind,
}

impl SwapRequest {
    #[inline]
    pub fn exact_in(token_in: Address, token_out: Address, amount: U256) -> Self {
        Self { token_in, token_out, amount, kind: SwapKind::ExactIn }
    }

    #[inline]
    pub fn exact_out(token_in: Address, token_out: Address, amount: U256) -> Self {
        Self { token_in, token_out, amount, kind: SwapKind::ExactOut }
    }

    #[inline]
    pub fn is_exact_in(&self) -> bool {
        self.kind == SwapKind::ExactIn
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapResult {
    /// Output amount for exact-in requests, input amount for exact-out ones.
    pub amount: U256,
    pub fee: U256,
    pub fee_token: Address,
    pub gas: u64,
    /// Post-swap state, consumed by [`PoolSimulator::apply`].
    pub delta: StateDelta,
}

/// Post-swap state of one kernel, tagged with the pool it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateDelta {
    DexLite(DexLiteDelta),
    DexT1(DexT1Delta),
    MaverickV2(MaverickV2Delta),
}

impl StateDelta {
    pub fn pool(&self) -> Address {
        match self {
            StateDelta::DexLite(delta) => delta.pool,
            StateDelta::DexT1(delta) => delta.pool,
            StateDelta::MaverickV2(delta) => delta.pool,
        }
    }
}

/// Construct / Quote / Clone / Apply.
///
/// `quote` takes `&self` and never mutates, so one instance may be quoted from
/// many threads. `apply` needs `&mut self`; callers clone first when the
/// branch may be discarded.
pub trait PoolSimulator: Clone {
    fn address(&self) -> Address;

    fn tokens(&self) -> &[TokenInfo];

    /// Reserves in token decimals, index-aligned with [`tokens`](Self::tokens).
    fn reserves(&self) -> &[U256];

    fn quote(&self, request: &SwapRequest) -> Result<SwapResult, Error>;

    fn apply(&mut self, delta: &StateDelta) -> Result<(), Error>;

    fn token_index(&self, token: Address) -> Option<usize> {
        self.tokens().iter().position(|t| t.address == token)
    }

    /// Resolves the request's tokens to `(index_in, index_out)`.
    fn pair_indices(&self, request: &SwapRequest) -> Result<(usize, usize), ValidationError> {
        if request.token_in == request.token_out {
            return Err(ValidationError::IdenticalTokens);
        }
        let index_in = self
            .token_index(request.token_in)
            .ok_or(ValidationError::TokenNotInPool(request.token_in))?;
        let index_out = self
            .token_index(request.token_out)
            .ok_or(ValidationError::TokenNotInPool(request.token_out))?;
        if request.amount.is_zero() {
            return Err(ValidationError::InvalidAmount);
        }
        Ok((index_in, index_out))
    }
}

pub const DEX_LITE: &str = "fluid-dex-lite";
pub const DEX_T1: &str = "fluid-dex-t1";
pub const MAVERICK_V2: &str = "maverick-v2";

/// Closed set of kernels.
#[derive(Debug, Clone)]
pub enum Pool {
    DexLite(Box<DexLitePool>),
    DexT1(Box<DexT1Pool>),
    MaverickV2(Box<MaverickV2Pool>),
}

/// Forwards a method call to the kernel inside each variant.
macro_rules! delegate {
    ($self:ident, $method:ident ( $($arg:expr),* )) => {
        match $self {
            Pool::DexLite(p) => p.$method($($arg),*),
            Pool::DexT1(p) => p.$method($($arg),*),
            Pool::MaverickV2(p) => p.$method($($arg),*),
        }
    };
}

impl Pool {
    /// Builds the kernel named by `snapshot.exchange` with default limits.
    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Result<Self, Error> {
        Self::from_snapshot_with_config(snapshot, &SimConfig::default())
    }

    pub fn from_snapshot_with_config(
        snapshot: &PoolSnapshot,
        config: &SimConfig,
    ) -> Result<Self, Error> {
        match snapshot.exchange.as_str() {
            DEX_LITE => Self::dex_lite(snapshot, config),
            DEX_T1 => Self::dex_t1(snapshot, config),
            MAVERICK_V2 => Self::maverick_v2(snapshot, config),
            other => Err(DecodeError::UnknownProtocol(other.to_string()).into()),
        }
    }

    pub fn dex_lite(snapshot: &PoolSnapshot, config: &SimConfig) -> Result<Self, Error> {
        Ok(Pool::DexLite(Box::new(DexLitePool::from_snapshot(snapshot, config)?)))
    }

    pub fn dex_t1(snapshot: &PoolSnapshot, config: &SimConfig) -> Result<Self, Error> {
        Ok(Pool::DexT1(Box::new(DexT1Pool::from_snapshot(snapshot, config)?)))
    }

    pub fn maverick_v2(snapshot: &PoolSnapshot, config: &SimConfig) -> Result<Self, Error> {
        Ok(Pool::MaverickV2(Box::new(MaverickV2Pool::from_snapshot(snapshot, config)?)))
    }

    /// Registry tag of the wrapped kernel.
    pub fn exchange(&self) -> &'static str {
        match self {
            Pool::DexLite(_) => DEX_LITE,
            Pool::DexT1(_) => DEX_T1,
            Pool::MaverickV2(_) => MAVERICK_V2,
        }
    }
}

impl PoolSimulator for Pool {
    fn address(&self) -> Address {
        delegate!(self, address())
    }

    fn tokens(&self) -> &[TokenInfo] {
        delegate!(self, tokens())
    }

    fn reserves(&self) -> &[U256] {
        delegate!(self, reserves())
    }

    fn quote(&self, request: &SwapRequest) -> Result<SwapResult, Error> {
        delegate!(self, quote(request))
    }

    fn apply(&mut self, delta: &StateDelta) -> Result<(), Error> {
        delegate!(self, apply(delta))
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use alloy_primitives::address;

    pub const TOKEN_A: Address = address!("0x00000000000000000000000000000000000000aa");
    pub const TOKEN_B: Address = address!("0x00000000000000000000000000000000000000bb");
    pub const POOL: Address = address!("0x0000000000000000000000000000000000001234");

    pub fn snapshot(exchange: &str, decimals: (u8, u8), extra: String) -> PoolSnapshot {
        PoolSnapshot {
            address: POOL,
            exchange: exchange.to_string(),
            tokens: vec![
                TokenInfo { address: TOKEN_A, decimals: decimals.0 },
                TokenInfo { address: TOKEN_B, decimals: decimals.1 },
            ],
            reserves: vec![U256::ZERO, U256::ZERO],
            swap_fee: 0.0,
            extra,
            static_extra: String::new(),
            block_number: 1,
            timestamp: 0,
        }
    }
}
