//! Rate and amount primitives shared by comparison and rendering.
//!
//! Rates are integer basis points (1 bp = 0.01%) and USD amounts are
//! fixed-point micro-dollars. Both only become floats for percent-change
//! arithmetic and display.

use serde::{Deserialize, Serialize};
use std::ops::Add;

/// Fixed-point USD amount with 6 decimal places.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UsdValue(pub u64);

impl UsdValue {
    /// Number of decimal places.
    pub const DECIMALS: u32 = 6;
    /// Scale factor: 10^6.
    pub const SCALE: u64 = 1_000_000;
    pub const ZERO: UsdValue = UsdValue(0);

    /// Create from a float dollar amount. Negative, NaN and infinite inputs become zero.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::ZERO;
        }
        Self((value * Self::SCALE as f64).round() as u64)
    }

    /// Create from whole dollars.
    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars.saturating_mul(Self::SCALE))
    }

    /// Convert to f64 dollars (for display and ratios).
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Absolute difference between two amounts.
    #[inline]
    pub fn abs_diff(self, other: UsdValue) -> UsdValue {
        UsdValue(self.0.abs_diff(other.0))
    }
}

impl Add for UsdValue {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for UsdValue {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(UsdValue::ZERO, Add::add)
    }
}

impl std::fmt::Display for UsdValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_usd(*self))
    }
}

/// Signed relative change from `previous` to `current`, in percent.
///
/// Returns 0 when both are zero and a signed infinity when only `previous`
/// is zero. Callers must treat a non-finite result as "not comparable".
pub fn percent_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 && current == 0.0 {
        return 0.0;
    }
    if previous == 0.0 {
        return if current > 0.0 {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        };
    }
    // Multiply first so integer-valued inputs produce exact percentages.
    (current - previous) * 100.0 / previous.abs()
}

/// Percent change between two basis-point rates.
#[inline]
pub fn bps_change(previous: i64, current: i64) -> f64 {
    percent_change(previous as f64, current as f64)
}

/// Percent change between two USD amounts, computed on the raw fixed-point units.
#[inline]
pub fn usd_change(previous: UsdValue, current: UsdValue) -> f64 {
    percent_change(previous.0 as f64, current.0 as f64)
}

/// Basis points to a percentage string: `390 -> "3.90%"`, `-150 -> "-1.50%"`.
pub fn bps_to_percent(bps: i64) -> String {
    format!("{:.2}%", bps as f64 / 100.0)
}

/// Utilization bps (10000 = 100%) as a float percentage.
#[inline]
pub fn utilization_percent(bps: u32) -> f64 {
    bps as f64 / 100.0
}

/// Compact USD string: `$1.50B`, `$2.35M`, `$12.5K`, `$950`.
pub fn format_usd(value: UsdValue) -> String {
    let v = value.to_f64();
    if v >= 1e9 {
        format!("${:.2}B", v / 1e9)
    } else if v >= 1e6 {
        format!("${:.2}M", v / 1e6)
    } else if v >= 1e3 {
        format!("${:.1}K", v / 1e3)
    } else {
        format!("${:.0}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_change_basic() {
        assert_eq!(percent_change(100.0, 120.0), 20.0);
        assert_eq!(percent_change(100.0, 80.0), -20.0);
        assert_eq!(percent_change(100.0, 121.0), 21.0);
    }

    #[test]
    fn test_percent_change_zero_baseline() {
        assert_eq!(percent_change(0.0, 0.0), 0.0);
        assert_eq!(percent_change(0.0, 5.0), f64::INFINITY);
        assert_eq!(percent_change(0.0, -5.0), f64::NEG_INFINITY);
        assert!(!percent_change(0.0, 5.0).is_finite());
    }

    #[test]
    fn test_percent_change_negative_previous_uses_magnitude() {
        // -100 -> -50 is a rise of 50% of the magnitude
        assert_eq!(percent_change(-100.0, -50.0), 50.0);
    }

    #[test]
    fn test_usd_change_is_exact_for_round_amounts() {
        let prev = UsdValue::from_dollars(1_000_000);
        let curr = UsdValue::from_dollars(1_100_000);
        assert_eq!(usd_change(prev, curr), 10.0);
        assert_eq!(usd_change(curr, prev), -100_000.0 * 100.0 / 1_100_000.0);
    }

    #[test]
    fn test_bps_to_percent() {
        assert_eq!(bps_to_percent(390), "3.90%");
        assert_eq!(bps_to_percent(-150), "-1.50%");
        assert_eq!(bps_to_percent(0), "0.00%");
        assert_eq!(bps_to_percent(5), "0.05%");
    }

    #[test]
    fn test_format_usd_breakpoints() {
        assert_eq!(format_usd(UsdValue::from_dollars(950)), "$950");
        assert_eq!(format_usd(UsdValue::from_dollars(12_500)), "$12.5K");
        assert_eq!(format_usd(UsdValue::from_dollars(2_350_000)), "$2.35M");
        assert_eq!(format_usd(UsdValue::from_dollars(1_500_000_000)), "$1.50B");
        assert_eq!(format_usd(UsdValue::ZERO), "$0");
    }

    #[test]
    fn test_usd_value_from_f64() {
        assert_eq!(UsdValue::from_f64(1.5), UsdValue(1_500_000));
        assert_eq!(UsdValue::from_f64(-3.0), UsdValue::ZERO);
        assert_eq!(UsdValue::from_f64(f64::NAN), UsdValue::ZERO);
        assert_eq!(UsdValue::from_dollars(7).to_f64(), 7.0);
    }

    #[test]
    fn test_usd_value_abs_diff_and_sum() {
        let a = UsdValue::from_dollars(10);
        let b = UsdValue::from_dollars(25);
        assert_eq!(a.abs_diff(b), UsdValue::from_dollars(15));
        assert_eq!(b.abs_diff(a), UsdValue::from_dollars(15));
        let total: UsdValue = [a, b].into_iter().sum();
        assert_eq!(total, UsdValue::from_dollars(35));
    }

    #[test]
    fn test_usd_value_serializes_as_integer() {
        let json = serde_json::to_string(&UsdValue(1_234_567)).unwrap();
        assert_eq!(json, "1234567");
        let back: UsdValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UsdValue(1_234_567));
    }
}
