//! Dataset statistics.
//!
//! A bet is data-qualified when its own selection carries at least
//! `MIN_QUALIFIED_QUOTES` book quotes. It is reliably positive when it is
//! qualified, has an available (local or server) EV, a strictly positive
//! best EV, and medium or high confidence. Rarity is the reliably-positive
//! share of qualified bets.

use serde::Serialize;
use std::collections::BTreeMap;

use super::dataset::Dataset;

pub const MIN_QUALIFIED_QUOTES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeagueStats {
    pub bets: usize,
    pub qualified: usize,
    pub reliably_positive: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetStats {
    pub total_bets: usize,
    /// Bets with a fair probability behind their EV.
    pub with_ev: usize,
    pub qualified: usize,
    pub reliably_positive: usize,
    /// `reliably_positive / qualified × 100`, 0 when nothing qualifies.
    pub rarity_pct: f64,
    pub best_ev_percent: Option<f64>,
    pub by_league: BTreeMap<String, LeagueStats>,
}

impl DatasetStats {
    pub fn compute(dataset: &Dataset) -> Self {
        let mut stats = DatasetStats::default();

        for bet in dataset.bets() {
            let ev = dataset.ev(&bet.id).map(|c| &c.result);
            let qualified = bet.quote_count() >= MIN_QUALIFIED_QUOTES;
            let available = ev.is_some_and(|r| r.is_available());
            let positive = qualified && ev.is_some_and(|r| r.is_reliably_positive());

            stats.total_bets += 1;
            stats.with_ev += usize::from(available);
            stats.qualified += usize::from(qualified);
            stats.reliably_positive += usize::from(positive);

            if let Some(pct) = ev.and_then(|r| r.best_ev()).map(|b| b.ev_percent) {
                stats.best_ev_percent = Some(stats.best_ev_percent.map_or(pct, |best| best.max(pct)));
            }

            let league = stats.by_league.entry(bet.game.league.clone()).or_default();
            league.bets += 1;
            league.qualified += usize::from(qualified);
            league.reliably_positive += usize::from(positive);
        }

        stats.rarity_pct = if stats.qualified > 0 {
            stats.reliably_positive as f64 / stats.qualified as f64 * 100.0
        } else {
            0.0
        };
        stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
