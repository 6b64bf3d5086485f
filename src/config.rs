//! Kernel limits and gas constants.
//!
//! Loading these from files or the environment is left to the embedding
//! process; the struct only derives `Deserialize` so that it can be nested in
//! whatever configuration the caller already has.

use alloy_primitives::U256;
use serde::Deserialize;
use std::time::Duration;

/// 5% over `1e27`.
const DEFAULT_MAX_PRICE_IMPACT: U256 =
    U256::from_limbs([7954489891797073920, 2710505, 0, 0]);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    /// Ticks a tick/bin swap may move away from the starting tick.
    pub max_tick_distance: i32,
    /// Ceiling on kernel loop steps before a typed error is returned.
    pub max_swap_iterations: u32,
    /// Largest accepted mid-price move of a single swap, over `1e27`.
    #[serde(deserialize_with = "crate::pool::serde_u256::deserialize")]
    pub max_price_impact: U256,
    #[serde(with = "duration_secs")]
    pub live_check_timeout: Duration,
    /// Unix time that time-dependent ceilings are expanded to. Unset means
    /// each pool quotes as of its own sync timestamp.
    pub clock: Option<u64>,
    pub gas: GasConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GasConfig {
    pub dex_lite: u64,
    pub dex_t1: u64,
    pub maverick_base: u64,
    pub maverick_per_crossing: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            dex_lite: 60_000,
            dex_t1: 250_000,
            maverick_base: 125_000,
            maverick_per_crossing: 20_000,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_tick_distance: 100,
            max_swap_iterations: 1_000,
            max_price_impact: DEFAULT_MAX_PRICE_IMPACT,
            live_check_timeout: Duration::from_secs(5),
            clock: None,
            gas: GasConfig::default(),
        }
    }
}

impl GasConfig {
    /// Gas of a tick/bin swap that crossed `crossings` ticks.
    pub fn maverick(&self, crossings: u32) -> u64 {
        self.maverick_base
            .saturating_add(self.maverick_per_crossing.saturating_mul(crossings as u64))
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("timeout must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
