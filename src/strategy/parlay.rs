//! Parlay slip and combined fair odds.
//!
//! Legs are treated as independent: the combined fair probability is the
//! product of leg probabilities and the combined confidence is the weakest
//! leg's. No correlation adjustment is made for same-game legs.

use serde::{Deserialize, Serialize};

use crate::odds::{probability_to_american, AmericanOdds};
use crate::types::Confidence;

/// One leg as priced at quote time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParlayLeg {
    pub bet_id: String,
    /// `None` when the leg has no fair estimate.
    pub fair_probability: Option<f64>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParlayQuote {
    pub legs: Vec<ParlayLeg>,
    /// Product of leg probabilities; `None` if any leg lacks one. An empty
    /// slip quotes 0.5.
    pub fair_probability: Option<f64>,
    pub fair_american_odds: AmericanOdds,
    pub confidence: Confidence,
}

/// Neutral probability quoted for an empty slip.
pub const EMPTY_SLIP_PROBABILITY: f64 = 0.5;

/// Combine legs. An empty slip prices at even money with no confidence.
pub fn combine(legs: &[ParlayLeg]) -> ParlayQuote {
    if legs.is_empty() {
        return ParlayQuote {
            legs: Vec::new(),
            fair_probability: Some(EMPTY_SLIP_PROBABILITY),
            fair_american_odds: AmericanOdds::EVEN,
            confidence: Confidence::None,
        };
    }

    let fair_probability = legs
        .iter()
        .map(|l| l.fair_probability)
        .try_fold(1.0, |acc, p| p.map(|p| acc * p));
    let confidence = match fair_probability {
        Some(_) => legs.iter().map(|l| l.confidence).min().unwrap_or_default(),
        None => Confidence::None,
    };

    ParlayQuote {
        legs: legs.to_vec(),
        fair_probability,
        fair_american_odds: fair_probability
            .map(probability_to_american)
            .unwrap_or(AmericanOdds::EVEN),
        confidence,
    }
}

// ---------------------------------------------------------------------------
// Slip state
// ---------------------------------------------------------------------------

/// The legs picked for a parlay, in selection order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParlayState {
    bet_ids: Vec<String>,
}

impl ParlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bet_ids(&self) -> &[String] {
        &self.bet_ids
    }

    pub fn len(&self) -> usize {
        self.bet_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bet_ids.is_empty()
    }

    pub fn contains(&self, bet_id: &str) -> bool {
        self.bet_ids.iter().any(|id| id == bet_id)
    }

    /// Returns false if the leg was already on the slip.
    pub fn add(&mut self, bet_id: &str) -> bool {
        if self.contains(bet_id) {
            return false;
        }
        self.bet_ids.push(bet_id.to_string());
        true
    }

    /// Returns false if the leg was not on the slip.
    pub fn remove(&mut self, bet_id: &str) -> bool {
        let before = self.bet_ids.len();
        self.bet_ids.retain(|id| id != bet_id);
        self.bet_ids.len() != before
    }

    /// Add or remove; returns whether the leg is now on the slip.
    pub fn toggle(&mut self, bet_id: &str) -> bool {
        if self.remove(bet_id) {
            false
        } else {
            self.add(bet_id)
        }
    }

    pub fn clear(&mut self) {
        self.bet_ids.clear();
    }

    /// Quote the slip, looking each leg up in the current results. Legs no
    /// longer present contribute no probability.
    pub fn quote<F>(&self, lookup: F) -> ParlayQuote
    where
        F: Fn(&str) -> Option<(f64, Confidence)>,
    {
        let legs: Vec<ParlayLeg> = self
            .bet_ids
            .iter()
            .map(|id| {
                let found = lookup(id);
                ParlayLeg {
                    bet_id: id.clone(),
                    fair_probability: found.map(|(p, _)| p),
                    confidence: found.map(|(_, c)| c).unwrap_or_default(),
                }
            })
            .collect();
        combine(&legs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
