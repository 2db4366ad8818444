//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Number of mantissa bits used when mapping a unit draw onto a `u64` word.
const UNIT_PRECISION_BITS: u32 = 53;

/// Convert usize to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Floor a f64 and clamp it to the usize range, returning 0 for non-finite values.
#[must_use]
pub fn floor_f64_to_usize(value: f64) -> usize {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let max = cast::<usize, f64>(usize::MAX).unwrap_or(f64::MAX);
    cast::<f64, usize>(value.min(max).floor()).unwrap_or(usize::MAX)
}

/// Clamp a unit value into `[0, 1)`, mapping non-finite input to 0.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if !value.is_finite() || value < 0.0 {
        return 0.0;
    }
    if value >= 1.0 {
        return 1.0 - f64::EPSILON;
    }
    value
}

/// Encode a unit draw as the `u64` word that `rand`'s standard `f64`
/// distribution maps back onto the same value (53-bit precision).
#[must_use]
pub fn unit_to_word(value: f64) -> u64 {
    let scale = u64_to_f64(1_u64 << UNIT_PRECISION_BITS);
    let mantissa = cast::<f64, u64>((clamp_unit(value) * scale).floor()).unwrap_or(0);
    mantissa << (u64::BITS - UNIT_PRECISION_BITS)
}
