//! Fair odds: vig removal and confidence grading.
//!
//! A book "covers" a market when it quotes every outcome. Sharp books that
//! cover the market set the consensus; without sharp coverage, a broad
//! enough spread of any-book quotes yields a low-confidence estimate.
//! Per outcome the median raw implied probability is taken (robust to a
//! single stale line) and the outcomes are normalised to sum to 1.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::market::books::{normalise_book, BookClassifier};
use crate::odds::{probability_to_american, AmericanOdds};
use crate::types::{Confidence, FairOddsResult, Selection};

/// Minimum quotes across a market for a non-sharp consensus.
pub const MIN_CONSENSUS_QUOTES: usize = 3;

pub struct FairOddsEngine {
    classifier: BookClassifier,
}

impl FairOddsEngine {
    pub fn new(classifier: BookClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &BookClassifier {
        &self.classifier
    }

    /// Fair results for each outcome, in input order.
    ///
    /// `None` when fewer than two outcomes are given or the quotes are too
    /// thin for any estimate.
    pub fn devig(&self, outcomes: &[&Selection]) -> Option<Vec<FairOddsResult>> {
        if outcomes.len() < 2 {
            return None;
        }
        let sport = outcomes[0].game.league.as_str();

        // outcome -> book -> implied probabilities (a book may quote twice)
        let sharp: Vec<BTreeMap<String, Vec<f64>>> = outcomes
            .iter()
            .map(|sel| {
                let mut by_book: BTreeMap<String, Vec<f64>> = BTreeMap::new();
                for price in sel.prices.iter().filter(|p| self.classifier.is_sharp_price(sport, p)) {
                    by_book
                        .entry(normalise_book(&price.book))
                        .or_default()
                        .push(price.implied_probability());
                }
                by_book
            })
            .collect();

        let covering: BTreeSet<&String> = sharp[0]
            .keys()
            .filter(|book| sharp[1..].iter().all(|m| m.contains_key(*book)))
            .collect();

        let (raw, confidence, book_count) = if !covering.is_empty() {
            let raw: Vec<f64> = sharp
                .iter()
                .map(|by_book| {
                    let probs: Vec<f64> = covering
                        .iter()
                        .flat_map(|book| by_book[*book].iter().copied())
                        .collect();
                    median(&probs)
                })
                .collect::<Option<Vec<f64>>>()?;
            let confidence = if covering.len() >= 2 {
                Confidence::High
            } else {
                Confidence::Medium
            };
            (raw, confidence, covering.len())
        } else {
            let total: usize = outcomes.iter().map(|s| s.prices.len()).sum();
            if total < MIN_CONSENSUS_QUOTES {
                debug!(
                    selection = %outcomes[0].selection_key,
                    quotes = total,
                    "Too few quotes for a consensus"
                );
                return None;
            }
            let raw: Vec<f64> = outcomes
                .iter()
                .map(|sel| {
                    let probs: Vec<f64> = sel.prices.iter().map(|p| p.implied_probability()).collect();
                    median(&probs)
                })
                .collect::<Option<Vec<f64>>>()?;
            let books: BTreeSet<String> = outcomes
                .iter()
                .flat_map(|s| s.prices.iter().map(|p| normalise_book(&p.book)))
                .collect();
            (raw, Confidence::Low, books.len())
        };

        let sum: f64 = raw.iter().sum();
        if !sum.is_finite() || sum <= 0.0 {
            return None;
        }

        Some(
            raw.iter()
                .map(|p| {
                    let fair = p / sum;
                    FairOddsResult {
                        fair_probability: fair,
                        fair_american_odds: probability_to_american(fair),
                        confidence,
                        book_count,
                    }
                })
                .collect(),
        )
    }
}

/// Fair probability minus the price's implied probability.
pub fn calculate_edge(price: AmericanOdds, p_fair: f64) -> f64 {
    p_fair - price.implied_probability()
}

/// Ratio edge: `(p_fair / implied − 1) × 100`.
///
/// A relative-mispricing heuristic; stake-accurate EV lives in `ev`.
pub fn calculate_ev_percent(price: AmericanOdds, p_fair: f64) -> f64 {
    let implied = price.implied_probability();
    if implied <= 0.0 {
        return 0.0;
    }
    (p_fair / implied - 1.0) * 100.0
}

fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::fixtures::selection;

    fn engine() -> FairOddsEngine {
        FairOddsEngine::new(BookClassifier::default())
    }

    #[test]
    fn test_two_sharp_books_high_confidence() {
        let over = selection("o", "total", "over", Some(220.5), &[("pinnacle", -110), ("circa", -110)]);
        let under = selection("u", "total", "under", Some(220.5), &[("pinnacle", -110), ("circa", -110)]);
        let raw_sum = over.prices[0].implied_probability() + under.prices[0].implied_probability();
        assert!(raw_sum > 1.0);

        let fair = engine().devig(&[&over, &under]).unwrap();
        assert!((fair[0].fair_probability - 0.5).abs() < 1e-9);
        assert!((fair[1].fair_probability - 0.5).abs() < 1e-9);
        assert_eq!(fair[0].confidence, Confidence::High);
        assert_eq!(fair[0].book_count, 2);
        assert_eq!(fair[0].fair_american_odds.value(), 100);
    }

    #[test]
    fn test_single_sharp_book_medium_confidence() {
        let over = selection("o", "total", "over", Some(220.5), &[("pinnacle", -110), ("draftkings", -115)]);
        let under = selection("u", "total", "under", Some(220.5), &[("pinnacle", -110), ("draftkings", -105)]);
        let fair = engine().devig(&[&over, &under]).unwrap();
        assert_eq!(fair[0].confidence, Confidence::Medium);
        assert!((fair[0].fair_probability - 0.5).abs() < 1e-9);
        assert_eq!(fair[0].book_count, 1);
    }

    #[test]
    fn test_sharp_on_one_side_only_falls_back_to_low() {
        let over = selection("o", "total", "over", Some(220.5), &[("pinnacle", -120), ("fanduel", -115)]);
        let under = selection("u", "total", "under", Some(220.5), &[("circa", 100), ("fanduel", -105)]);
        let fair = engine().devig(&[&over, &under]).unwrap();
        assert_eq!(fair[0].confidence, Confidence::Low);
        assert_eq!(fair[0].book_count, 3);
    }

    #[test]
    fn test_non_sharp_consensus_is_low() {
        let fav = selection("f", "moneyline", "BOS", None, &[("draftkings", -150), ("fanduel", -145)]);
        let dog = selection("d", "moneyline", "LAL", None, &[("draftkings", 130)]);
        let fair = engine().devig(&[&fav, &dog]).unwrap();
        assert_eq!(fair[0].confidence, Confidence::Low);
        let sum: f64 = fair.iter().map(|f| f.fair_probability).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(fair[0].fair_probability > fair[1].fair_probability);
    }

    #[test]
    fn test_insufficient_data_is_absent() {
        let fav = selection("f", "moneyline", "BOS", None, &[("draftkings", -150)]);
        let dog = selection("d", "moneyline", "LAL", None, &[("fanduel", 130)]);
        assert!(engine().devig(&[&fav, &dog]).is_none());

        let lonely = selection("l", "moneyline", "BOS", None, &[("pinnacle", -150)]);
        assert!(engine().devig(&[&lonely]).is_none());
    }

    #[test]
    fn test_median_resists_outlier() {
        let over = selection(
            "o", "total", "over", Some(220.5),
            &[("pinnacle", -110), ("circa", -110), ("bookmaker", 250)],
        );
        let under = selection(
            "u", "total", "under", Some(220.5),
            &[("pinnacle", -110), ("circa", -110), ("bookmaker", -110)],
        );
        let fair = engine().devig(&[&over, &under]).unwrap();
        assert!((fair[0].fair_probability - 0.5).abs() < 1e-9);
        assert_eq!(fair[0].book_count, 3);
    }

    #[test]
    fn test_three_way_normalises_to_one() {
        let home = selection("h", "moneyline_3way", "BOS", None, &[("pinnacle", 150), ("circa", 155)]);
        let away = selection("a", "moneyline_3way", "LAL", None, &[("pinnacle", 180), ("circa", 175)]);
        let draw = selection("d", "moneyline_3way", "draw", None, &[("pinnacle", 230), ("circa", 225)]);
        let fair = engine().devig(&[&home, &away, &draw]).unwrap();
        let sum: f64 = fair.iter().map(|f| f.fair_probability).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(fair[2].confidence, Confidence::High);
    }

    #[test]
    fn test_edge_and_ev_percent() {
        let even = AmericanOdds::new(100);
        assert!((calculate_edge(even, 0.55) - 0.05).abs() < 1e-12);
        assert!((calculate_ev_percent(even, 0.55) - 10.0).abs() < 1e-9);
        assert!(calculate_ev_percent(AmericanOdds::new(-200), 0.5) < 0.0);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }
}
