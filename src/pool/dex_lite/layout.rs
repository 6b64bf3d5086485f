//! The four storage words of a pool and their bit layouts.
//!
//! Every read and write goes through a [`BitField`]; the words are never
//! reinterpreted as structs.

use crate::error::RangeError;
use crate::math::bit_field::BitField;
use crate::pool::serde_u256;
use alloy_primitives::U256;
use serde::Deserialize;

/// Sub-fields of `dexVariables`.
pub mod dex_variables {
    use super::BitField;

    /// Swap fee in ppm.
    pub const FEE: BitField = BitField::new("fee", 0, 13);
    /// Share of the fee kept by the protocol, in percent.
    pub const REVENUE_CUT: BitField = BitField::new("revenueCut", 13, 7);
    pub const REBALANCING_STATUS: BitField = BitField::new("rebalancingStatus", 20, 2);
    pub const CENTER_PRICE_SHIFT_ACTIVE: BitField = BitField::new("centerPriceShiftActive", 22, 1);
    /// Compressed as `coefficient << 8 | exponent`.
    pub const CENTER_PRICE: BitField = BitField::new("centerPrice", 23, 40);
    pub const CENTER_PRICE_CONTRACT: BitField = BitField::new("centerPriceContract", 63, 19);
    pub const RANGE_SHIFT_ACTIVE: BitField = BitField::new("rangeShiftActive", 82, 1);
    /// `1e4` is 100%.
    pub const UPPER_PERCENT: BitField = BitField::new("upperPercent", 83, 14);
    pub const LOWER_PERCENT: BitField = BitField::new("lowerPercent", 97, 14);
    pub const THRESHOLD_SHIFT_ACTIVE: BitField = BitField::new("thresholdShiftActive", 111, 1);
    /// Percent of the way from the center price to a range edge.
    pub const UPPER_SHIFT_THRESHOLD: BitField = BitField::new("upperShiftThreshold", 112, 7);
    pub const LOWER_SHIFT_THRESHOLD: BitField = BitField::new("lowerShiftThreshold", 119, 7);
    pub const TOKEN0_DECIMALS: BitField = BitField::new("token0Decimals", 126, 5);
    pub const TOKEN1_DECIMALS: BitField = BitField::new("token1Decimals", 131, 5);
    pub const TOKEN0_TOTAL_SUPPLY_ADJUSTED: BitField = BitField::new("token0TotalSupplyAdjusted", 136, 60);
    pub const TOKEN1_TOTAL_SUPPLY_ADJUSTED: BitField = BitField::new("token1TotalSupplyAdjusted", 196, 60);
}

/// Sub-fields of `centerPriceShift`.
pub mod center_price_shift {
    use super::BitField;

    pub const LAST_INTERACTION: BitField = BitField::new("lastInteraction", 0, 33);
    pub const SHIFTING_TIME: BitField = BitField::new("shiftingTime", 33, 24);
    /// Compressed like the center price, with a 20-bit coefficient.
    pub const MAX_CENTER_PRICE: BitField = BitField::new("maxCenterPrice", 57, 28);
    pub const MIN_CENTER_PRICE: BitField = BitField::new("minCenterPrice", 85, 28);
    pub const SHIFT_PERCENTAGE: BitField = BitField::new("shiftPercentage", 113, 20);
    pub const TIME_TO_SHIFT: BitField = BitField::new("timeToShift", 133, 20);
    pub const TIMESTAMP: BitField = BitField::new("timestamp", 153, 33);
}

/// Sub-fields of `rangeShift`.
pub mod range_shift {
    use super::BitField;

    pub const OLD_UPPER: BitField = BitField::new("oldUpperPercent", 0, 14);
    pub const OLD_LOWER: BitField = BitField::new("oldLowerPercent", 14, 14);
    pub const TIME_TO_SHIFT: BitField = BitField::new("timeToShift", 28, 20);
    pub const TIMESTAMP: BitField = BitField::new("timestamp", 48, 33);
}

/// Sub-fields of `thresholdShift`.
pub mod threshold_shift {
    use super::BitField;

    pub const OLD_UPPER: BitField = BitField::new("oldUpperThreshold", 0, 7);
    pub const OLD_LOWER: BitField = BitField::new("oldLowerThreshold", 7, 7);
    pub const TIME_TO_SHIFT: BitField = BitField::new("timeToShift", 14, 20);
    pub const TIMESTAMP: BitField = BitField::new("timestamp", 34, 33);
}

use dex_variables as dv;

/// Expands a `coefficient << 8 | exponent` price.
#[inline]
pub fn expand_center_price(compressed: U256) -> U256 {
    let exponent = (compressed & U256::from(0xffu8)).to::<usize>();
    (compressed >> 8usize) << exponent
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalancingStatus {
    Inactive,
    Normal,
    ShiftingUp,
    ShiftingDown,
}

impl RebalancingStatus {
    pub fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => RebalancingStatus::Inactive,
            1 => RebalancingStatus::Normal,
            2 => RebalancingStatus::ShiftingUp,
            _ => RebalancingStatus::ShiftingDown,
        }
    }

    pub fn bits(self) -> u64 {
        match self {
            RebalancingStatus::Inactive => 0,
            RebalancingStatus::Normal => 1,
            RebalancingStatus::ShiftingUp => 2,
            RebalancingStatus::ShiftingDown => 3,
        }
    }

    /// The center price is moving toward a range edge.
    pub fn is_shifting(self) -> bool {
        matches!(self, RebalancingStatus::ShiftingUp | RebalancingStatus::ShiftingDown)
    }
}

/// The four storage words, as read from the pool contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolState {
    #[serde(deserialize_with = "serde_u256::deserialize")]
    pub dex_variables: U256,
    #[serde(default, deserialize_with = "serde_u256::deserialize")]
    pub center_price_shift: U256,
    #[serde(default, deserialize_with = "serde_u256::deserialize")]
    pub range_shift: U256,
    #[serde(default, deserialize_with = "serde_u256::deserialize")]
    pub threshold_shift: U256,
}

impl PoolState {
    pub fn is_initialized(&self) -> bool {
        !self.dex_variables.is_zero()
    }

    #[inline]
    pub fn get(&self, field: BitField) -> U256 {
        field.get(self.dex_variables)
    }

    #[inline]
    pub fn set(&mut self, field: BitField, value: U256) -> Result<(), RangeError> {
        self.dex_variables = field.set(self.dex_variables, value)?;
        Ok(())
    }

    pub fn fee(&self) -> U256 {
        self.get(dv::FEE)
    }

    pub fn revenue_cut(&self) -> U256 {
        self.get(dv::REVENUE_CUT)
    }

    pub fn rebalancing_status(&self) -> RebalancingStatus {
        RebalancingStatus::from_bits(dv::REBALANCING_STATUS.get_u64(self.dex_variables))
    }

    pub fn set_rebalancing_status(&mut self, status: RebalancingStatus) -> Result<(), RangeError> {
        self.set(dv::REBALANCING_STATUS, U256::from(status.bits()))
    }

    /// Static center price over `1e27`.
    pub fn center_price(&self) -> U256 {
        expand_center_price(self.get(dv::CENTER_PRICE))
    }

    /// The price comes from an external source this crate does not model.
    pub fn uses_external_center_price(&self) -> bool {
        dv::CENTER_PRICE_SHIFT_ACTIVE.is_set(self.dex_variables)
            || dv::CENTER_PRICE_CONTRACT.is_set(self.dex_variables)
    }

    pub fn token_decimals(&self) -> [u8; 2] {
        [
            dv::TOKEN0_DECIMALS.get_u64(self.dex_variables) as u8,
            dv::TOKEN1_DECIMALS.get_u64(self.dex_variables) as u8,
        ]
    }

    /// Adjusted total supplies, in 9-decimal units.
    pub fn supplies(&self) -> [U256; 2] {
        [self.get(dv::TOKEN0_TOTAL_SUPPLY_ADJUSTED), self.get(dv::TOKEN1_TOTAL_SUPPLY_ADJUSTED)]
    }

    /// Fails with `SupplyOverflow` when a supply needs more than 60 bits.
    pub fn set_supplies(&mut self, supplies: [U256; 2]) -> Result<(), RangeError> {
        let max = dv::TOKEN0_TOTAL_SUPPLY_ADJUSTED.max_value();
        if supplies.iter().any(|s| *s > max) {
            return Err(RangeError::SupplyOverflow);
        }
        self.set(dv::TOKEN0_TOTAL_SUPPLY_ADJUSTED, supplies[0])?;
        self.set(dv::TOKEN1_TOTAL_SUPPLY_ADJUSTED, supplies[1])
    }

    /// Stamps `now` as the last interaction in `centerPriceShift`.
    pub fn touch_center_price_shift(&mut self, now: u64) -> Result<(), RangeError> {
        self.center_price_shift =
            center_price_shift::LAST_INTERACTION.set(self.center_price_shift, U256::from(now))?;
        Ok(())
    }
}
