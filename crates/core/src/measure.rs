//! Money and ratio helpers.
//!
//! Monetary amounts are stored as integer cents (`u64`) everywhere; conversion
//! to fractional units only happens at reporting edges.

/// Convert cents to currency units.
pub fn cents_to_units(cents: u64) -> f64 {
    cents as f64 / 100.0
}

/// Convert currency units to cents, rounding to the nearest cent.
///
/// Negative and non-finite inputs clamp to zero.
pub fn units_to_cents(units: f64) -> u64 {
    if !units.is_finite() || units <= 0.0 {
        return 0;
    }
    (units * 100.0).round() as u64
}

/// `part / whole * 100`, or 0 when `whole` is zero.
pub fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 { 0.0 } else { part / whole * 100.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn percent_of_zero_is_zero() {
        assert_eq!(percent(5.0, 0.0), 0.0);
        assert_eq!(percent(1.0, 4.0), 25.0);
    }

    #[test]
    fn units_round_to_nearest_cent() {
        assert_eq!(units_to_cents(19.999), 2000);
        assert_eq!(units_to_cents(-3.0), 0);
        assert_eq!(units_to_cents(f64::NAN), 0);
    }

    proptest! {
        #[test]
        fn cents_survive_unit_conversion(cents in 0u64..10_000_000_000) {
            prop_assert_eq!(units_to_cents(cents_to_units(cents)), cents);
        }
    }
}
