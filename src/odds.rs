//! Odds conversion.
//!
//! American, decimal and implied-probability conversions plus the
//! validity rules for American prices. Every function here is total:
//! degenerate inputs clamp to even money instead of producing
//! infinities or NaN.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Even money (+100, 50% implied).
pub const EVEN_MONEY: i32 = 100;

// ---------------------------------------------------------------------------
// AmericanOdds
// ---------------------------------------------------------------------------

/// A signed American price, always `<= -100` or `>= 100`.
///
/// Values inside the open interval (-100, 100) are snapped to the nearest
/// boundary on construction: 0..100 becomes +100, -99..0 becomes -100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct AmericanOdds(i32);

impl AmericanOdds {
    pub const EVEN: AmericanOdds = AmericanOdds(EVEN_MONEY);

    pub fn new(raw: i32) -> Self {
        if is_valid(raw) {
            Self(raw)
        } else if raw < 0 {
            Self(-EVEN_MONEY)
        } else {
            Self(EVEN_MONEY)
        }
    }

    pub fn value(self) -> i32 {
        self.0
    }

    /// Raw implied probability (vig included).
    pub fn implied_probability(self) -> f64 {
        american_to_probability(self)
    }

    /// Profit on a 1-unit stake if the bet wins.
    pub fn profit_per_unit(self) -> f64 {
        profit_per_unit_stake(self)
    }
}

impl From<i32> for AmericanOdds {
    fn from(raw: i32) -> Self {
        Self::new(raw)
    }
}

impl From<AmericanOdds> for i32 {
    fn from(odds: AmericanOdds) -> Self {
        odds.0
    }
}

impl fmt::Display for AmericanOdds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 > 0 {
            write!(f, "+{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Whether a raw integer is a legal American price.
pub fn is_valid(raw: i32) -> bool {
    raw <= -EVEN_MONEY || raw >= EVEN_MONEY
}

/// Implied probability of an American price.
///
/// +odds: 100 / (odds + 100); -odds: |odds| / (|odds| + 100).
pub fn american_to_probability(odds: AmericanOdds) -> f64 {
    let v = odds.value() as f64;
    if v >= 100.0 {
        100.0 / (v + 100.0)
    } else {
        let abs = v.abs();
        abs / (abs + 100.0)
    }
}

/// Inverse of [`american_to_probability`], rounded to the nearest integer.
///
/// p > 0.5 is a favourite (negative price); p <= 0.5 an underdog, so
/// exactly 0.5 maps to +100. Degenerate p returns even money.
pub fn probability_to_american(p: f64) -> AmericanOdds {
    if !p.is_finite() || p <= 0.0 || p >= 1.0 {
        return AmericanOdds::EVEN;
    }
    let raw = if p > 0.5 {
        -(p / (1.0 - p) * 100.0)
    } else {
        (1.0 - p) / p * 100.0
    };
    if !raw.is_finite() || raw.abs() > i32::MAX as f64 {
        return AmericanOdds::EVEN;
    }
    AmericanOdds::new(raw.round() as i32)
}

/// Profit per 1-unit stake: +odds → odds/100, -odds → 100/|odds|.
pub fn profit_per_unit_stake(odds: AmericanOdds) -> f64 {
    let v = odds.value();
    if v > 0 {
        v as f64 / 100.0
    } else {
        // unsigned_abs: i32::MIN is a legal price
        100.0 / f64::from(v.unsigned_abs())
    }
}

/// Decimal (European) odds, stake included.
pub fn american_to_decimal(odds: AmericanOdds) -> f64 {
    1.0 + profit_per_unit_stake(odds)
}

/// Decimal odds to an American price. Anything at or below 1.0 is even money.
pub fn decimal_to_american(decimal: f64) -> AmericanOdds {
    if !decimal.is_finite() || decimal <= 1.0 {
        return AmericanOdds::EVEN;
    }
    let profit = decimal - 1.0;
    let raw = if profit >= 1.0 {
        profit * 100.0
    } else {
        -100.0 / profit
    };
    if raw.abs() > i32::MAX as f64 {
        return AmericanOdds::EVEN;
    }
    AmericanOdds::new(raw.round() as i32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_correction() {
        assert_eq!(AmericanOdds::new(-99).value(), -100);
        assert_eq!(AmericanOdds::new(99).value(), 100);
        assert_eq!(AmericanOdds::new(0).value(), 100);
        assert_eq!(AmericanOdds::new(-1).value(), -100);
        assert_eq!(AmericanOdds::new(-110).value(), -110);
        assert_eq!(AmericanOdds::new(150).value(), 150);
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid(100));
        assert!(is_valid(-100));
        assert!(is_valid(-2500));
        assert!(!is_valid(0));
        assert!(!is_valid(99));
        assert!(!is_valid(-99));
    }

    #[test]
    fn test_round_trip_representative_prices() {
        for v in [-150, 200, -110, 100] {
            let p = american_to_probability(AmericanOdds::new(v));
            assert_eq!(probability_to_american(p).value(), v, "price {v} did not round-trip");
        }
    }

    #[test]
    fn test_implied_probability() {
        assert!((american_to_probability(AmericanOdds::new(100)) - 0.5).abs() < 1e-12);
        assert!((american_to_probability(AmericanOdds::new(-150)) - 0.6).abs() < 1e-12);
        assert!((american_to_probability(AmericanOdds::new(300)) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_probability_is_even_money() {
        assert_eq!(probability_to_american(0.0), AmericanOdds::EVEN);
        assert_eq!(probability_to_american(1.0), AmericanOdds::EVEN);
        assert_eq!(probability_to_american(-0.3), AmericanOdds::EVEN);
        assert_eq!(probability_to_american(f64::NAN), AmericanOdds::EVEN);
    }

    #[test]
    fn test_profit_per_unit() {
        assert!((profit_per_unit_stake(AmericanOdds::new(150)) - 1.5).abs() < 1e-12);
        assert!((profit_per_unit_stake(AmericanOdds::new(-200)) - 0.5).abs() < 1e-12);
        assert!((profit_per_unit_stake(AmericanOdds::new(-100)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_extreme_prices_do_not_overflow() {
        let longest = AmericanOdds::new(i32::MIN);
        assert_eq!(longest.value(), i32::MIN);
        let profit = longest.profit_per_unit();
        assert!(profit > 0.0 && profit < 1e-7);
        assert!(longest.implied_probability() > 0.999_999);
        assert!(american_to_decimal(longest) > 1.0);

        let shortest = AmericanOdds::new(i32::MAX);
        assert!((shortest.profit_per_unit() - i32::MAX as f64 / 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_decimal_conversions() {
        assert!((american_to_decimal(AmericanOdds::new(100)) - 2.0).abs() < 1e-12);
        assert!((american_to_decimal(AmericanOdds::new(-200)) - 1.5).abs() < 1e-12);
        assert_eq!(decimal_to_american(2.5).value(), 150);
        assert_eq!(decimal_to_american(1.5).value(), -200);
        assert_eq!(decimal_to_american(1.0), AmericanOdds::EVEN);
    }

    #[test]
    fn test_serde_snaps_invalid_values() {
        let odds: AmericanOdds = serde_json::from_str("50").unwrap();
        assert_eq!(odds.value(), 100);
        assert_eq!(serde_json::to_string(&AmericanOdds::new(-110)).unwrap(), "-110");
    }

    #[test]
    fn test_display_sign() {
        assert_eq!(AmericanOdds::new(150).to_string(), "+150");
        assert_eq!(AmericanOdds::new(-110).to_string(), "-110");
    }
}
