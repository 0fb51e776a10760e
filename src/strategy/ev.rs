//! Per-book expected value.
//!
//! EV per unit stake: `p × net_profit − (1 − p)`, where `net_profit` is the
//! book's payout after its fee profile. EV% is EV × 100. The best-EV book
//! is the strictly positive maximum; the best-price book is the maximum
//! gross payout regardless of EV. Ties go to the first book in fetch order.

use crate::market::fees::FeeSchedule;
use crate::types::{
    BookEvResult, BookPrice, Confidence, EvAvailability, EvOrigin, FairOddsResult,
    Selection, SelectionEvResult, ServerAnnotations,
};

/// Stake used when none is configured.
pub const DEFAULT_STAKE: f64 = 100.0;

/// Confidence assumed when the server omits its tier.
pub const DEFAULT_SERVER_CONFIDENCE: Confidence = Confidence::Medium;

/// Expected value per unit stake.
pub fn expected_value(p_fair: f64, net_profit: f64) -> f64 {
    p_fair * net_profit - (1.0 - p_fair)
}

pub struct EvEngine {
    fees: FeeSchedule,
    stake: f64,
}

impl EvEngine {
    pub fn new(fees: FeeSchedule, stake: f64) -> Self {
        let stake = if stake.is_finite() && stake > 0.0 { stake } else { DEFAULT_STAKE };
        Self { fees, stake }
    }

    pub fn stake(&self) -> f64 {
        self.stake
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// EV of one price. Without a fair probability EV is zero but the
    /// payout and fee fields are still filled in.
    pub fn book_ev(&self, price: &BookPrice, p_fair: Option<f64>) -> BookEvResult {
        let profile = self.fees.profile_for(&price.book);
        let gross_profit = price.odds.profit_per_unit();
        let net_profit = profile.net_profit(gross_profit);
        let ev = p_fair.map(|p| expected_value(p, net_profit)).unwrap_or(0.0);
        BookEvResult {
            book: price.book.clone(),
            odds: price.odds,
            gross_profit,
            net_profit,
            ev,
            ev_amount: ev * self.stake,
            ev_percent: ev * 100.0,
            fee_applied: profile.is_applied(),
            fee_rate: profile.rate(),
        }
    }

    /// EV of every book on `selection` against a local fair estimate.
    pub fn evaluate(&self, selection: &Selection, fair: &FairOddsResult) -> SelectionEvResult {
        let books: Vec<BookEvResult> = selection
            .prices
            .iter()
            .map(|price| self.book_ev(price, Some(fair.fair_probability)))
            .collect();
        build_result(
            selection,
            EvAvailability::Available {
                fair_probability: fair.fair_probability,
                confidence: fair.confidence,
            },
            EvOrigin::Local,
            books,
        )
    }

    /// EV from the server's annotations. A server EV% (the quote's, else
    /// the bet's) wins over the local formula; otherwise the quote's (or
    /// the bet's) true probability is run through the local formula.
    pub fn evaluate_server(&self, selection: &Selection, server: &ServerAnnotations) -> SelectionEvResult {
        let p_bet = server.true_probability.unwrap_or(0.5);
        let bet_ev_percent = server.ev_percent.filter(|v| v.is_finite());
        let books: Vec<BookEvResult> = selection
            .prices
            .iter()
            .map(|price| {
                let p = price
                    .true_probability
                    .filter(|p| *p > 0.0 && *p < 1.0)
                    .unwrap_or(p_bet);
                let mut result = self.book_ev(price, Some(p));
                if let Some(pct) = price.ev_percent.or(bet_ev_percent) {
                    result.ev = pct / 100.0;
                    result.ev_percent = pct;
                    result.ev_amount = result.ev * self.stake;
                }
                result
            })
            .collect();
        build_result(
            selection,
            EvAvailability::Available {
                fair_probability: p_bet,
                confidence: server.confidence.unwrap_or(DEFAULT_SERVER_CONFIDENCE),
            },
            EvOrigin::Server,
            books,
        )
    }

    /// Zero-EV result carrying the reason no fair probability exists.
    pub fn unavailable(&self, selection: &Selection, reason: &str) -> SelectionEvResult {
        let books: Vec<BookEvResult> = selection.prices.iter().map(|p| self.book_ev(p, None)).collect();
        build_result(
            selection,
            EvAvailability::Unavailable { reason: reason.to_string() },
            EvOrigin::Local,
            books,
        )
    }
}

fn build_result(
    selection: &Selection,
    availability: EvAvailability,
    origin: EvOrigin,
    books: Vec<BookEvResult>,
) -> SelectionEvResult {
    let best_by_ev = if matches!(availability, EvAvailability::Available { .. }) {
        best_by(&books, |b| b.ev).filter(|b| b.ev > 0.0)
    } else {
        None
    }
    .map(|b| b.book.clone());
    let best_by_price = best_by(&books, |b| b.gross_profit).map(|b| b.book.clone());

    SelectionEvResult {
        bet_id: selection.id.clone(),
        selection_key: selection.selection_key.clone(),
        availability,
        origin,
        books,
        best_by_ev,
        best_by_price,
    }
}

/// Maximum by `key`; the first of equal maxima wins.
fn best_by(books: &[BookEvResult], key: impl Fn(&BookEvResult) -> f64) -> Option<&BookEvResult> {
    books.iter().fold(None, |best: Option<&BookEvResult>, b| match best {
        Some(current) if key(b) <= key(current) => Some(current),
        _ if key(b).is_nan() => best,
        _ => Some(b),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
