//! Borrow and withdraw ceilings of the dual pool.
//!
//! Each ceiling grows linearly from `available` towards `expands_to` over
//! `expand_duration` seconds, counted from the last sync. Values are in token
//! decimals.

use crate::pool::serde_u256;
use alloy_primitives::U256;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenLimit {
    #[serde(deserialize_with = "serde_u256::deserialize")]
    pub available: U256,
    #[serde(deserialize_with = "serde_u256::deserialize")]
    pub expands_to: U256,
    #[serde(deserialize_with = "serde_u256::deserialize")]
    pub expand_duration: U256,
}

impl TokenLimit {
    /// The ceiling `elapsed` seconds after sync.
    pub fn expanded(&self, elapsed: u64) -> U256 {
        if self.expand_duration.is_zero() || U256::from(elapsed) >= self.expand_duration {
            return self.expands_to;
        }
        if self.expands_to <= self.available {
            return self.available;
        }
        let growth = (self.expands_to - self.available) * U256::from(elapsed) / self.expand_duration;
        (self.available + growth).min(self.expands_to)
    }

    /// Lowers both ends of the ceiling by `used`.
    pub fn consume(&mut self, used: U256) {
        self.available = self.available.saturating_sub(used);
        self.expands_to = self.expands_to.saturating_sub(used);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexLimits {
    pub withdrawable_token0: TokenLimit,
    pub withdrawable_token1: TokenLimit,
    pub borrowable_token0: TokenLimit,
    pub borrowable_token1: TokenLimit,
}

impl DexLimits {
    #[inline]
    pub fn withdrawable(&self, index: usize) -> &TokenLimit {
        if index == 0 {
            &self.withdrawable_token0
        } else {
            &self.withdrawable_token1
        }
    }

    #[inline]
    pub fn borrowable(&self, index: usize) -> &TokenLimit {
        if index == 0 {
            &self.borrowable_token0
        } else {
            &self.borrowable_token1
        }
    }

    pub fn withdrawable_mut(&mut self, index: usize) -> &mut TokenLimit {
        if index == 0 {
            &mut self.withdrawable_token0
        } else {
            &mut self.withdrawable_token1
        }
    }

    pub fn borrowable_mut(&mut self, index: usize) -> &mut TokenLimit {
        if index == 0 {
            &mut self.borrowable_token0
        } else {
            &mut self.borrowable_token1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(available: u64, expands_to: u64, duration: u64) -> TokenLimit {
        TokenLimit {
            available: U256::from(available),
            expands_to: U256::from(expands_to),
            expand_duration: U256::from(duration),
        }
    }

    #[test]
    fn expands_linearly_then_caps() {
        let l = limit(100, 700, 600);
        assert_eq!(l.expanded(0), U256::from(100u16));
        assert_eq!(l.expanded(300), U256::from(400u16));
        assert_eq!(l.expanded(600), U256::from(700u16));
        assert_eq!(l.expanded(6_000), U256::from(700u16));
    }

    #[test]
    fn zero_duration_is_fully_expanded() {
        assert_eq!(limit(1, 9, 0).expanded(0), U256::from(9u8));
    }

    #[test]
    fn shrinking_ceiling_keeps_available() {
        assert_eq!(limit(500, 200, 60).expanded(30), U256::from(500u16));
    }

    #[test]
    fn consume_saturates() {
        let mut l = limit(10, 50, 60);
        l.consume(U256::from(20u8));
        assert_eq!(l, limit(0, 30, 60));
    }

    #[test]
    fn decodes_camel_case_blob() {
        let raw = r#"{
            "withdrawableToken0": {"available": "1", "expandsTo": "2", "expandDuration": 3},
            "withdrawableToken1": {"available": "4", "expandsTo": "5", "expandDuration": 6},
            "borrowableToken0": {"available": "7", "expandsTo": "8", "expandDuration": 9},
            "borrowableToken1": {"available": "10", "expandsTo": "11", "expandDuration": 12}
        }"#;
        let limits: DexLimits = serde_json::from_str(raw).unwrap();
        assert_eq!(limits.borrowable(1).expands_to, U256::from(11u8));
        assert_eq!(limits.withdrawable(0).expand_duration, U256::from(3u8));
    }
}
