//! Per-book fee schedules.
//!
//! Exchange-style books take a commission on winnings; traditional books
//! bake their margin into the price. Books with no entry are fee-free so a
//! gap in the schedule never blocks EV display.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use super::books::normalise_book;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeProfile {
    /// net = gross
    None,
    /// net = gross × (1 − rate)
    PercentOnWinnings(Decimal),
}

impl FeeProfile {
    pub fn net_profit(&self, gross: f64) -> f64 {
        match self {
            FeeProfile::None => gross,
            FeeProfile::PercentOnWinnings(_) => gross * (1.0 - self.rate()),
        }
    }

    pub fn rate(&self) -> f64 {
        match self {
            FeeProfile::None => 0.0,
            FeeProfile::PercentOnWinnings(rate) => rate.to_f64().unwrap_or(0.0).clamp(0.0, 1.0),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.rate() > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct FeeSchedule {
    profiles: HashMap<String, FeeProfile>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert("betfair_exchange".to_string(), FeeProfile::PercentOnWinnings(dec!(0.05)));
        profiles.insert("prophetx".to_string(), FeeProfile::PercentOnWinnings(dec!(0.02)));
        profiles.insert("sporttrade".to_string(), FeeProfile::PercentOnWinnings(dec!(0.02)));
        Self { profiles }
    }
}

impl FeeSchedule {
    pub fn empty() -> Self {
        Self { profiles: HashMap::new() }
    }

    /// Default schedule with configured rates layered on top. A zero rate
    /// marks the book fee-free.
    pub fn with_rates(rates: &HashMap<String, Decimal>) -> Self {
        let mut schedule = Self::default();
        for (book, rate) in rates {
            schedule.set(book, *rate);
        }
        schedule
    }

    pub fn set(&mut self, book: &str, rate: Decimal) {
        let profile = if rate <= Decimal::ZERO {
            FeeProfile::None
        } else {
            FeeProfile::PercentOnWinnings(rate)
        };
        self.profiles.insert(normalise_book(book), profile);
    }

    pub fn profile_for(&self, book: &str) -> FeeProfile {
        self.profiles
            .get(&normalise_book(book))
            .copied()
            .unwrap_or(FeeProfile::None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_fee_reduces_net() {
        let fee = FeeProfile::PercentOnWinnings(dec!(0.02));
        for gross in [0.1, 0.909, 1.0, 2.5] {
            assert!(fee.net_profit(gross) < gross);
        }
        assert!((fee.net_profit(1.0) - 0.98).abs() < 1e-12);
        assert!(fee.is_applied());
    }

    #[test]
    fn test_no_fee_is_identity() {
        let fee = FeeProfile::None;
        assert_eq!(fee.net_profit(1.5), 1.5);
        assert_eq!(fee.rate(), 0.0);
        assert!(!fee.is_applied());
    }

    #[test]
    fn test_unknown_book_is_fee_free() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.profile_for("draftkings"), FeeProfile::None);
        assert_eq!(schedule.profile_for("some-new-book"), FeeProfile::None);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.profile_for(" ProphetX "), FeeProfile::PercentOnWinnings(dec!(0.02)));
    }

    #[test]
    fn test_configured_rates() {
        let mut rates = HashMap::new();
        rates.insert("Novig".to_string(), dec!(0.01));
        rates.insert("prophetx".to_string(), Decimal::ZERO);
        let schedule = FeeSchedule::with_rates(&rates);
        assert_eq!(schedule.profile_for("novig"), FeeProfile::PercentOnWinnings(dec!(0.01)));
        assert_eq!(schedule.profile_for("prophetx"), FeeProfile::None);
        assert!(schedule.profile_for("sporttrade").is_applied());
    }

    #[test]
    fn test_empty_schedule() {
        assert_eq!(FeeSchedule::empty().profile_for("betfair_exchange"), FeeProfile::None);
    }
}
