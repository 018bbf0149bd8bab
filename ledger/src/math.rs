//! # Fixed-Point Helpers
//!
//! Multiply-then-divide on `u64` amounts with `u128` intermediates. Every
//! rate computation in the engine funnels through these three functions,
//! so rounding behavior is decided exactly once: [`mul_div_floor`] for
//! amounts owed to the protocol, [`mul_div_round`] for display ratios,
//! [`mul_div_ceil`] for amounts owed by the protocol's counterparty.

use crate::engine::CollateralError;

/// `floor(a * b / d)`, overflow-checked.
///
/// # Errors
///
/// Returns [`CollateralError::AmountOverflow`] when `d == 0` or the result
/// does not fit in a `u64`. The `u128` product itself cannot overflow.
pub fn mul_div_floor(a: u64, b: u64, d: u64) -> Result<u64, CollateralError> {
    if d == 0 {
        return Err(CollateralError::AmountOverflow);
    }
    let q = (a as u128) * (b as u128) / (d as u128);
    u64::try_from(q).map_err(|_| CollateralError::AmountOverflow)
}

/// `round(a * b / d)`, half-up, overflow-checked.
pub fn mul_div_round(a: u64, b: u64, d: u64) -> Result<u64, CollateralError> {
    if d == 0 {
        return Err(CollateralError::AmountOverflow);
    }
    let q = ((a as u128) * (b as u128) + (d as u128) / 2) / (d as u128);
    u64::try_from(q).map_err(|_| CollateralError::AmountOverflow)
}

/// `ceil(a * b / d)`, overflow-checked.
pub fn mul_div_ceil(a: u64, b: u64, d: u64) -> Result<u64, CollateralError> {
    if d == 0 {
        return Err(CollateralError::AmountOverflow);
    }
    let q = ((a as u128) * (b as u128) + (d as u128) - 1) / (d as u128);
    u64::try_from(q).map_err(|_| CollateralError::AmountOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_truncates() {
        // 250 * 120000 / 250000 = 120 exactly.
        assert_eq!(mul_div_floor(250, 120_000, 250_000).unwrap(), 120);
        // 7 * 3 / 2 = 10.5 -> 10.
        assert_eq!(mul_div_floor(7, 3, 2).unwrap(), 10);
    }

    #[test]
    fn round_is_half_up() {
        assert_eq!(mul_div_round(7, 3, 2).unwrap(), 11); // 10.5 -> 11
        assert_eq!(mul_div_round(300, 100_000, 250).unwrap(), 120_000);
        assert_eq!(mul_div_round(1, 1, 3).unwrap(), 0); // 0.33 -> 0
    }

    #[test]
    fn ceil_rounds_up() {
        assert_eq!(mul_div_ceil(25, 120_000, 200_000).unwrap(), 15);
        assert_eq!(mul_div_ceil(1, 1, 3).unwrap(), 1);
        assert_eq!(mul_div_ceil(0, 5, 3).unwrap(), 0);
    }

    #[test]
    fn zero_divisor_rejected() {
        assert!(mul_div_floor(1, 1, 0).is_err());
        assert!(mul_div_round(1, 1, 0).is_err());
        assert!(mul_div_ceil(1, 1, 0).is_err());
    }

    #[test]
    fn u128_intermediate_avoids_overflow() {
        // a * b overflows u64 but the quotient fits.
        assert_eq!(
            mul_div_floor(u64::MAX, 100_000, 100_000).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn oversized_quotient_rejected() {
        assert!(mul_div_floor(u64::MAX, 2, 1).is_err());
        assert!(mul_div_ceil(u64::MAX, 2, 1).is_err());
    }
}
