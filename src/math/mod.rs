pub mod bit_field;
pub mod bit_math;
pub mod fixed_point;
pub mod math_helpers;
