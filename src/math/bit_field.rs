//! Named sub-fields of a packed 256-bit storage word.
//!
//! A [`BitField`] is an `(offset, width)` pair. Reads mask and shift; writes
//! clear the field's bits and OR in the new value after checking it fits, so
//! neighbouring fields are never touched.

use crate::math::bit_math::{bit_length, low_mask};
use crate::error::RangeError;
use alloy_primitives::U256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub name: &'static str,
    pub offset: u32,
    pub width: u32,
}

impl BitField {
    pub const fn new(name: &'static str, offset: u32, width: u32) -> Self {
        Self { name, offset, width }
    }

    #[inline]
    pub fn mask(&self) -> U256 {
        low_mask(self.width)
    }

    /// Largest value the field can hold.
    #[inline]
    pub fn max_value(&self) -> U256 {
        self.mask()
    }

    #[inline]
    pub fn get(&self, word: U256) -> U256 {
        (word >> self.offset as usize) & self.mask()
    }

    /// Reads the field as a `u64`. Every field used here is at most 60 bits wide.
    #[inline]
    pub fn get_u64(&self, word: U256) -> u64 {
        self.get(word).to::<u64>()
    }

    #[inline]
    pub fn is_set(&self, word: U256) -> bool {
        !self.get(word).is_zero()
    }

    /// Returns `word` with this field replaced by `value`.
    pub fn set(&self, word: U256, value: U256) -> Result<U256, RangeError> {
        if bit_length(value) > self.width {
            return Err(RangeError::FieldOverflow { field: self.name, width: self.width });
        }
        Ok(self.clear(word) | (value << self.offset as usize))
    }

    #[inline]
    pub fn clear(&self, word: U256) -> U256 {
        word & !(self.mask() << self.offset as usize)
    }
}
