//! The accumulated dataset for one refresh generation.
//!
//! Bets are kept in fetch order and deduplicated by id. Each appended page
//! is indexed for pairing first, then only the newly added bets are
//! priced, so a bet sees every counterpart loaded so far (including ones
//! on its own page). Cached results are not recomputed, except that a bet
//! priced without an opposite side is priced again once its counterpart
//! arrives on a later page. A reset starts a fresh dataset.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::market::pairing::PairIndex;
use crate::market::selection_from_record;
use crate::sources::BetRecord;
use crate::strategy::{Pricer, REASON_NO_OPPOSITE};
use crate::types::{Selection, SelectionEvResult};

/// A computed EV result stamped with when and for which generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedEv {
    pub result: SelectionEvResult,
    pub computed_at: DateTime<Utc>,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct Dataset {
    pub(crate) generation: u64,
    bets: Vec<Selection>,
    positions: HashMap<String, usize>,
    pairs: PairIndex,
    ev: HashMap<String, CachedEv>,
    ev_computations: u64,
    /// Total records the source reported on the first page.
    pub(crate) source_total: usize,
    pub(crate) complete: bool,
    pub(crate) last_error: Option<String>,
    pub(crate) refreshed_at: Option<DateTime<Utc>>,
}

impl Dataset {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }

    /// Bets in fetch order.
    pub fn bets(&self) -> &[Selection] {
        &self.bets
    }

    pub fn bet(&self, id: &str) -> Option<&Selection> {
        self.positions.get(id).map(|&pos| &self.bets[pos])
    }

    pub fn ev(&self, id: &str) -> Option<&CachedEv> {
        self.ev.get(id)
    }

    pub fn ev_results(&self) -> &HashMap<String, CachedEv> {
        &self.ev
    }

    /// Number of EV computations since this dataset was created.
    pub fn ev_computations(&self) -> u64 {
        self.ev_computations
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Append a page of records, pricing only the bets not seen before.
    /// Returns how many bets were added.
    pub fn append(&mut self, records: &[BetRecord], pricer: &Pricer) -> usize {
        let first_new = self.bets.len();

        for record in records {
            if self.positions.contains_key(record.id.trim()) {
                debug!(bet_id = %record.id, "Duplicate bet skipped");
                continue;
            }
            let selection = match selection_from_record(record) {
                Ok(s) => s,
                Err(e) => {
                    warn!(bet_id = %record.id, error = %e, "Skipping unusable record");
                    continue;
                }
            };
            let pos = self.bets.len();
            self.positions.insert(selection.id.clone(), pos);
            self.pairs.insert(&selection, pos);
            self.bets.push(selection);
        }

        let now = Utc::now();
        for pos in first_new..self.bets.len() {
            self.price(pos, pricer, now);
        }

        for pos in self.waiting_for_counterpart(first_new) {
            debug!(bet_id = %self.bets[pos].id, "Counterpart arrived, re-pricing");
            self.price(pos, pricer, now);
        }

        self.bets.len() - first_new
    }

    /// Earlier bets cached as having no opposite side whose outcome set now
    /// includes a bet at or after `first_new`.
    fn waiting_for_counterpart(&self, first_new: usize) -> Vec<usize> {
        let mut waiting = Vec::new();
        for pos in first_new..self.bets.len() {
            let Some(outcomes) = self.pairs.outcomes(&self.bets, pos) else {
                continue;
            };
            for p in outcomes {
                if p >= first_new || waiting.contains(&p) {
                    continue;
                }
                let stale = self
                    .ev
                    .get(&self.bets[p].id)
                    .is_some_and(|c| c.result.disabled_reason() == Some(REASON_NO_OPPOSITE));
                if stale {
                    waiting.push(p);
                }
            }
        }
        waiting
    }

    fn price(&mut self, pos: usize, pricer: &Pricer, now: DateTime<Utc>) {
        if let Some(result) = pricer.price_selection(&self.bets, &self.pairs, pos) {
            self.ev_computations += 1;
            self.ev.insert(
                result.bet_id.clone(),
                CachedEv {
                    result,
                    computed_at: now,
                    generation: self.generation,
                },
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::books::BookClassifier;
    use crate::market::fees::FeeSchedule;
    use crate::sources::mock::MockOddsSource;

    fn pricer() -> Pricer {
        Pricer::from_parts(BookClassifier::default(), FeeSchedule::default(), 100.0)
    }

    #[test]
    fn test_append_dedupes_and_prices_once() {
        let src = MockOddsSource::new(10);
        let records: Vec<BetRecord> = (0..10).map(|i| src.record(i, 0)).collect();
        let mut ds = Dataset::new(1);

        assert_eq!(ds.append(&records[..6], &pricer()), 6);
        assert_eq!(ds.append(&records[4..], &pricer()), 4);
        assert_eq!(ds.len(), 10);
        assert_eq!(ds.ev_computations(), 10);
        assert_eq!(ds.ev_results().len(), 10);
        assert_eq!(ds.bets()[9].id, "mock-000009");
        assert_eq!(ds.ev("mock-000003").unwrap().generation, 1);
    }

    #[test]
    fn test_bad_record_is_skipped() {
        let src = MockOddsSource::new(2);
        let mut bad = src.record(0, 0);
        bad.away_team.clear();
        let good = src.record(1, 0);
        let mut ds = Dataset::new(1);
        assert_eq!(ds.append(&[bad, good], &pricer()), 1);
        assert!(ds.bet("mock-000000").is_none());
        assert!(ds.bet("mock-000001").is_some());
    }

    #[test]
    fn test_counterpart_on_same_page_is_visible() {
        let src = MockOddsSource::new(2);
        let records = vec![src.record(0, 0), src.record(1, 0)];
        let mut ds = Dataset::new(1);
        ds.append(&records, &pricer());
        assert!(ds.ev("mock-000000").unwrap().result.is_available());
        assert!(ds.ev("mock-000001").unwrap().result.is_available());
    }

    #[test]
    fn test_counterpart_on_later_page_reprices_earlier_side() {
        let src = MockOddsSource::new(2);
        let mut ds = Dataset::new(1);
        ds.append(&[src.record(0, 0)], &pricer());
        let first = ds.ev("mock-000000").unwrap().result.clone();
        assert_eq!(first.disabled_reason(), Some(REASON_NO_OPPOSITE));

        ds.append(&[src.record(1, 0)], &pricer());
        assert!(ds.ev("mock-000000").unwrap().result.is_available());
        assert!(ds.ev("mock-000001").unwrap().result.is_available());
        assert_eq!(ds.ev_computations(), 3);
    }

    #[test]
    fn test_odd_page_split_leaves_other_results_untouched() {
        let src = MockOddsSource::new(6);
        let records: Vec<BetRecord> = (0..6).map(|i| src.record(i, 0)).collect();
        let mut ds = Dataset::new(1);

        // pair (2, 3) straddles the page boundary
        ds.append(&records[..3], &pricer());
        assert!(!ds.ev("mock-000002").unwrap().result.is_available());
        let before: Vec<CachedEv> = ["mock-000000", "mock-000001"]
            .iter()
            .map(|id| ds.ev(id).unwrap().clone())
            .collect();

        ds.append(&records[3..], &pricer());
        assert_eq!(ds.len(), 6);
        for id in ["mock-000002", "mock-000003", "mock-000004", "mock-000005"] {
            assert!(ds.ev(id).unwrap().result.is_available(), "{id} not priced");
        }
        assert_eq!(ds.ev("mock-000000"), Some(&before[0]));
        assert_eq!(ds.ev("mock-000001"), Some(&before[1]));
        assert_eq!(ds.ev_computations(), 7);
    }

    #[test]
    fn test_single_sided_bet_stays_unavailable() {
        let src = MockOddsSource::new(4);
        let mut ds = Dataset::new(1);
        ds.append(&[src.record(0, 0)], &pricer());
        // an unrelated pair never touches the orphan
        ds.append(&[src.record(2, 0), src.record(3, 0)], &pricer());
        assert!(!ds.ev("mock-000000").unwrap().result.is_available());
        assert_eq!(ds.ev_computations(), 3);
    }
}
