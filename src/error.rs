use alloy_primitives::Address;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("Math error - overflow")]
    Overflow,
    #[error("Math error - underflow")]
    Underflow,
    #[error("Math error - division by zero")]
    DivisionByZero,
    #[error("BitMath error - zero input value")]
    ZeroValue,
}

/// Bad request: wrong token pair, non-positive amount or a foreign delta.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Validation error - token {0} is not in pool")]
    TokenNotInPool(Address),
    #[error("Validation error - token in and token out are identical")]
    IdenticalTokens,
    #[error("Validation error - invalid swap amount")]
    InvalidAmount,
    #[error("Validation error - state delta does not belong to this pool")]
    DeltaMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiquidityError {
    #[error("Liquidity error - insufficient reserve")]
    InsufficientReserve,
    #[error("Liquidity error - swap amount exceeds half of the imaginary reserve")]
    ExcessiveSwapAmount,
    #[error("Liquidity error - token reserves ratio too high")]
    ReservesRatioTooHigh,
    #[error("Liquidity error - insufficient borrowable")]
    InsufficientBorrowable,
    #[error("Liquidity error - insufficient withdrawable")]
    InsufficientWithdrawable,
    #[error("Liquidity error - price impact above maximum")]
    ExcessivePriceImpact,
    #[error("Liquidity error - no pools are enabled")]
    NoPoolsEnabled,
    #[error("Liquidity error - swap goes beyond the tick limit")]
    BeyondSwapLimit,
    #[error("Liquidity error - too many ticks searched")]
    TooManyTicksSearched,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error(transparent)]
    Math(#[from] MathError),
    #[error("Range error - adjusted supply overflow")]
    SupplyOverflow,
    #[error("Range error - value does not fit {field} ({width} bits)")]
    FieldOverflow { field: &'static str, width: u32 },
    #[error("Range error - unsupported configuration: {0}")]
    UnsupportedConfiguration(&'static str),
    #[error("Range error - invalid fee rate")]
    InvalidFeeRate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolPausedError {
    #[error("Protocol paused - swap and arbitrage paused")]
    SwapAndArbitragePaused,
}

/// Raised while turning a [`PoolSnapshot`](crate::pool::PoolSnapshot) into a simulator.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Decode error - {0}")]
    Json(#[from] serde_json::Error),
    #[error("Decode error - expected at least {expected} tokens, found {found}")]
    TokenCount { expected: usize, found: usize },
    #[error("Decode error - {tokens} tokens but {reserves} reserves")]
    ReserveCount { tokens: usize, reserves: usize },
    #[error("Decode error - unsupported decimals {0}")]
    InvalidDecimals(u8),
    #[error("Decode error - invalid swap fee {0}")]
    InvalidFee(f64),
    #[error("Decode error - empty bins")]
    EmptyBins,
    #[error("Decode error - pool is not initialized")]
    NotInitialized,
    #[error("Decode error - unknown protocol `{0}`")]
    UnknownProtocol(String),
    #[error("Decode error - invalid integer `{0}`")]
    InvalidInteger(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Liquidity(#[from] LiquidityError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Paused(#[from] ProtocolPausedError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl From<MathError> for Error {
    fn from(err: MathError) -> Self {
        Error::Range(RangeError::Math(err))
    }
}

#[cfg(feature = "onchain")]
#[derive(Debug, Error)]
pub enum OnchainError {
    #[error("Onchain error - live check timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Onchain error - resolver call failed: {0}")]
    Call(String),
    #[error("Onchain error - live check unsupported for this pool")]
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn math_error_is_reported_as_range_error() {
        let err: Error = MathError::Overflow.into();
        assert!(matches!(err, Error::Range(RangeError::Math(MathError::Overflow))));
        assert_eq!(err.to_string(), "Math error - overflow");
    }

    #[test]
    fn field_overflow_names_the_field() {
        let err = RangeError::FieldOverflow { field: "fee", width: 13 };
        assert_eq!(err.to_string(), "Range error - value does not fit fee (13 bits)");
    }
}
