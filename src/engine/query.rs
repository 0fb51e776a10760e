//! Filtering and sorting the priced dataset into display rows.

use serde::{Deserialize, Serialize};

use super::dataset::Dataset;
use crate::odds::AmericanOdds;
use crate::types::{Confidence, EvOrigin, Selection, SelectionEvResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Best EV% descending.
    #[default]
    Ev,
    /// Best price descending.
    Price,
    /// Fetch order.
    Fetch,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BetQuery {
    pub league: Option<String>,
    pub market: Option<String>,
    /// Minimum best-EV percent; rows without a fair estimate never match.
    pub min_ev: Option<f64>,
    pub min_confidence: Option<Confidence>,
    #[serde(default)]
    pub positive_only: bool,
    #[serde(default)]
    pub sort: SortKey,
    pub limit: Option<usize>,
}

/// One bet as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetRow {
    pub bet_id: String,
    pub fetch_index: usize,
    pub league: String,
    pub game: String,
    pub market_key: String,
    pub label: String,
    pub line: Option<f64>,
    pub quotes: usize,
    pub fair_probability: Option<f64>,
    pub confidence: Confidence,
    pub origin: Option<EvOrigin>,
    pub best_ev_book: Option<String>,
    pub best_ev_odds: Option<AmericanOdds>,
    pub best_ev_percent: f64,
    pub best_price_book: Option<String>,
    pub best_price_odds: Option<AmericanOdds>,
    pub disabled_reason: Option<String>,
}

impl BetRow {
    pub fn build(fetch_index: usize, bet: &Selection, ev: Option<&SelectionEvResult>) -> Self {
        let best_ev = ev.and_then(SelectionEvResult::best_ev);
        let best_price = ev.and_then(SelectionEvResult::best_price);
        Self {
            bet_id: bet.id.clone(),
            fetch_index,
            league: bet.game.league.clone(),
            game: bet.game.to_string(),
            market_key: bet.market_key.clone(),
            label: bet.label(),
            line: bet.line,
            quotes: bet.quote_count(),
            fair_probability: ev.and_then(SelectionEvResult::fair_probability),
            confidence: ev.map(SelectionEvResult::confidence).unwrap_or_default(),
            origin: ev.map(|r| r.origin),
            best_ev_book: best_ev.map(|b| b.book.clone()),
            best_ev_odds: best_ev.map(|b| b.odds),
            best_ev_percent: best_ev.map(|b| b.ev_percent).unwrap_or(0.0),
            best_price_book: best_price.map(|b| b.book.clone()),
            best_price_odds: best_price.map(|b| b.odds),
            disabled_reason: ev.and_then(|r| r.disabled_reason().map(str::to_string)),
        }
    }

    fn best_payout(&self) -> f64 {
        self.best_price_odds.map(AmericanOdds::profit_per_unit).unwrap_or(f64::MIN)
    }
}

impl BetQuery {
    fn matches(&self, bet: &Selection, ev: Option<&SelectionEvResult>) -> bool {
        if let Some(league) = &self.league {
            if !bet.game.league.eq_ignore_ascii_case(league.trim()) {
                return false;
            }
        }
        if let Some(market) = &self.market {
            if !bet.market_key.eq_ignore_ascii_case(market.trim()) {
                return false;
            }
        }
        let confidence = ev.map(SelectionEvResult::confidence).unwrap_or_default();
        if self.min_confidence.is_some_and(|min| confidence < min) {
            return false;
        }
        let positive = ev.is_some_and(|r| r.is_available() && r.best_by_ev.is_some());
        if self.positive_only && !positive {
            return false;
        }
        if let Some(min_ev) = self.min_ev {
            let available = ev.filter(|r| r.is_available());
            if available.map_or(true, |r| r.best_ev_percent() < min_ev) {
                return false;
            }
        }
        true
    }

    /// Apply the filters and ordering to a dataset.
    pub fn run(&self, dataset: &Dataset) -> Vec<BetRow> {
        let mut rows: Vec<BetRow> = dataset
            .bets()
            .iter()
            .enumerate()
            .filter_map(|(i, bet)| {
                let ev = dataset.ev(&bet.id).map(|c| &c.result);
                self.matches(bet, ev).then(|| BetRow::build(i, bet, ev))
            })
            .collect();

        // stable sorts keep fetch order among equals
        match self.sort {
            SortKey::Ev => rows.sort_by(|a, b| b.best_ev_percent.total_cmp(&a.best_ev_percent)),
            SortKey::Price => rows.sort_by(|a, b| b.best_payout().total_cmp(&a.best_payout())),
            SortKey::Fetch => {}
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
