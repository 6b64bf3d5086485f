use crate::error::MathError;
use alloy_primitives::U256;

/// Returns the index (0–255) of the most significant set bit in a `U256`,
/// or `MathError::ZeroValue` if the input is zero.
///
/// Seeds the Newton square root with an upper bound of the root.
pub fn most_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(255 - x.leading_zeros() as u8)
}

/// `2^width - 1`, the mask of a `width`-bit field. `width` saturates at 256.
pub fn low_mask(width: u32) -> U256 {
    if width >= 256 {
        U256::MAX
    } else {
        (U256::ONE << width as usize) - U256::ONE
    }
}

/// Number of bits needed to represent `x` (zero for zero).
pub fn bit_length(x: U256) -> u32 {
    most_significant_bit(x).map_or(0, |msb| msb as u32 + 1)
}
