//! Pricing: fair odds, per-book EV and parlay combination.

pub mod ev;
pub mod fair;
pub mod parlay;

use chrono::Utc;
use tracing::debug;

use crate::market::books::BookClassifier;
use crate::market::fees::FeeSchedule;
use crate::market::pairing::PairIndex;
use crate::types::{BetGroup, BetGroupEvResult, Selection, SelectionEvResult};
use ev::EvEngine;
use fair::FairOddsEngine;

/// Reason shown when a selection has no counterpart to de-vig against.
pub const REASON_NO_OPPOSITE: &str = "no opposite side";
/// Reason shown when the market's quotes are too thin for a consensus.
pub const REASON_NO_CONSENSUS: &str = "insufficient sharp or consensus pricing";

// ---------------------------------------------------------------------------
// Pricer
// ---------------------------------------------------------------------------

/// Fair-odds engine plus EV engine.
///
/// Usable server annotations take precedence; otherwise the selection is
/// de-vigged against its counterpart (or its whole n-way group) and every
/// book is priced against the local fair probability.
pub struct Pricer {
    fair: FairOddsEngine,
    ev: EvEngine,
}

impl Pricer {
    pub fn new(fair: FairOddsEngine, ev: EvEngine) -> Self {
        Self { fair, ev }
    }

    pub fn from_parts(classifier: BookClassifier, fees: FeeSchedule, stake: f64) -> Self {
        Self::new(FairOddsEngine::new(classifier), EvEngine::new(fees, stake))
    }

    pub fn fair(&self) -> &FairOddsEngine {
        &self.fair
    }

    pub fn ev(&self) -> &EvEngine {
        &self.ev
    }

    /// Price `bets[pos]` against whatever counterparts `index` knows about.
    pub fn price_selection(&self, bets: &[Selection], index: &PairIndex, pos: usize) -> Option<SelectionEvResult> {
        let bet = bets.get(pos)?;

        if let Some(server) = bet.usable_server_annotations() {
            return Some(self.ev.evaluate_server(bet, server));
        }

        let Some(positions) = index.outcomes(bets, pos) else {
            return Some(self.ev.unavailable(bet, REASON_NO_OPPOSITE));
        };
        let outcomes: Vec<&Selection> = positions.iter().map(|&p| &bets[p]).collect();

        match self.fair.devig(&outcomes) {
            Some(fair) => Some(self.ev.evaluate(bet, &fair[0])),
            None => {
                debug!(bet_id = %bet.id, outcomes = outcomes.len(), "No fair estimate");
                Some(self.ev.unavailable(bet, REASON_NO_CONSENSUS))
            }
        }
    }

    /// Price one complete group in isolation.
    pub fn price_group(&self, group: &BetGroup) -> BetGroupEvResult {
        let mut index = PairIndex::new();
        for (pos, sel) in group.selections.iter().enumerate() {
            index.insert(sel, pos);
        }
        let selections = (0..group.selections.len())
            .filter_map(|pos| self.price_selection(&group.selections, &index, pos))
            .collect();
        BetGroupEvResult {
            bet_group_key: group.key.clone(),
            selections,
            computed_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
