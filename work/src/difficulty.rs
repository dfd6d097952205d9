//! Conversions between raw difficulty values and multipliers.
//!
//! Difficulty is measured on the "inverted" scale: a value `d` is
//! `2^64 - d` away from the ceiling, so the multiplier of `d` against `base`
//! is `(2^64 - base) / (2^64 - d)`.

/// Multiplier of `difficulty` relative to `base`.
pub fn to_multiplier(difficulty: u64, base: u64) -> f64 {
    base.wrapping_neg() as f64 / difficulty.wrapping_neg() as f64
}

/// Inverse of [`to_multiplier`]. Saturates to `u64::MAX` for a multiplier
/// that would exceed the ceiling, and to `0` when the result underflows.
pub fn from_multiplier(multiplier: f64, base: u64) -> u64 {
    let reverse = base.wrapping_neg() as f64 / multiplier;
    if !reverse.is_finite() || reverse > u64::MAX as f64 {
        return 0;
    }
    let reverse = reverse as u64;
    if reverse != 0 || base == 0 || multiplier < 1.0 {
        reverse.wrapping_neg()
    } else {
        u64::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u64 = 0xffff_ffc0_0000_0000;

    #[test]
    fn base_is_multiplier_one() {
        assert_eq!(to_multiplier(BASE, BASE), 1.0);
        assert_eq!(from_multiplier(1.0, BASE), BASE);
    }

    #[test]
    fn doubling_halves_the_gap() {
        let doubled = from_multiplier(2.0, BASE);
        assert_eq!(doubled.wrapping_neg(), BASE.wrapping_neg() / 2);
        assert!((to_multiplier(doubled, BASE) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn lower_difficulty_has_multiplier_below_one() {
        let lower = 0xffff_fe00_0000_0000;
        assert!(to_multiplier(lower, BASE) < 1.0);
    }

    #[test]
    fn tiny_multiplier_underflows_to_zero() {
        assert_eq!(from_multiplier(1e-30, BASE), 0);
    }
}
