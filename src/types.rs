//! Shared types for the FAIRLINE engine.
//!
//! These types form the data model used across all modules. Selections,
//! groups and prices are built once per fetched page and never mutated;
//! fair-odds and EV results are pure derivations over them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::odds::AmericanOdds;

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// Reliability grade of a fair-odds estimate.
///
/// Ordering is ordinal: `None < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Whether results at this grade count toward aggregate statistics.
    pub fn is_reliable(self) -> bool {
        self >= Confidence::Medium
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::None => write!(f, "none"),
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// Case-insensitive parse; accepts the server's tier aliases.
impl std::str::FromStr for Confidence {
    type Err = FairlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(Confidence::None),
            "low" | "weak" => Ok(Confidence::Low),
            "medium" | "med" | "moderate" => Ok(Confidence::Medium),
            "high" | "strong" => Ok(Confidence::High),
            other => Err(FairlineError::InvalidRecord(format!("unknown confidence tier: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// The outcome a selection backs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Over,
    Under,
    /// Normalised (upper-case) team code.
    Team(String),
}

impl Side {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "over" | "o" => Side::Over,
            "under" | "u" => Side::Under,
            _ => Side::Team(trimmed.to_uppercase()),
        }
    }

    pub fn is_over_under(&self) -> bool {
        matches!(self, Side::Over | Side::Under)
    }

    /// Key fragment used in selection keys.
    pub fn key(&self) -> String {
        match self {
            Side::Over => "OVER".to_string(),
            Side::Under => "UNDER".to_string(),
            Side::Team(code) => code.clone(),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Over => write!(f, "Over"),
            Side::Under => write!(f, "Under"),
            Side::Team(code) => write!(f, "{code}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Game / prices / selections
// ---------------------------------------------------------------------------

/// Game identity. Team codes and league are stored normalised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub league: String,
    pub date: NaiveDate,
    pub away: String,
    pub home: String,
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ {} ({})", self.league, self.away, self.home, self.date)
    }
}

/// One book's quote on one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookPrice {
    pub book: String,
    pub odds: AmericanOdds,
    pub observed_at: DateTime<Utc>,
    /// Server-computed EV percent for this quote.
    pub ev_percent: Option<f64>,
    /// Server-computed true probability for this quote's outcome.
    pub true_probability: Option<f64>,
    /// Server sharp flag; overrides the local allow-list when present.
    pub is_sharp: Option<bool>,
}

impl BookPrice {
    pub fn new(book: &str, odds: i32, observed_at: DateTime<Utc>) -> Self {
        Self {
            book: book.to_string(),
            odds: AmericanOdds::new(odds),
            observed_at,
            ev_percent: None,
            true_probability: None,
            is_sharp: None,
        }
    }

    pub fn implied_probability(&self) -> f64 {
        self.odds.implied_probability()
    }
}

impl fmt::Display for BookPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.book, self.odds)
    }
}

/// Bet-level annotations supplied by the odds server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ServerAnnotations {
    pub true_probability: Option<f64>,
    pub ev_percent: Option<f64>,
    pub confidence: Option<Confidence>,
}

impl ServerAnnotations {
    /// Server EV can only be trusted when a usable true probability exists.
    pub fn is_usable(&self) -> bool {
        matches!(self.true_probability, Some(p) if p > 0.0 && p < 1.0)
    }
}

/// One side of a market with every book's price on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Stable bet identity from the source.
    pub id: String,
    pub selection_key: String,
    /// Side-independent group key (line made absolute).
    pub bet_group_key: String,
    pub game: Game,
    pub market_key: String,
    /// Normalised player subject id; empty for team markets.
    pub subject_id: String,
    pub line: Option<f64>,
    pub side: Side,
    /// Fetch order; not semantically significant.
    pub prices: Vec<BookPrice>,
    pub server: Option<ServerAnnotations>,
}

impl Selection {
    pub fn quote_count(&self) -> usize {
        self.prices.len()
    }

    /// Human-readable label, e.g. `LAL -3.5` or `Over 221.5`.
    pub fn label(&self) -> String {
        let mut label = String::new();
        if !self.subject_id.is_empty() {
            label.push_str(&self.subject_id);
            label.push(' ');
        }
        label.push_str(&self.side.to_string());
        if let Some(line) = self.line {
            if self.side.is_over_under() {
                label.push_str(&format!(" {line:.1}"));
            } else {
                label.push_str(&format!(" {line:+.1}"));
            }
        }
        label
    }

    /// Server annotations that are usable in place of local computation.
    pub fn usable_server_annotations(&self) -> Option<&ServerAnnotations> {
        self.server.as_ref().filter(|s| s.is_usable())
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {} ({} books)", self.game, self.market_key, self.label(), self.prices.len())
    }
}

/// Mutually exclusive outcomes of one market (2+ selections).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetGroup {
    pub key: String,
    pub game: Game,
    pub market_key: String,
    pub subject_id: String,
    pub selections: Vec<Selection>,
}

impl BetGroup {
    pub fn total_quotes(&self) -> usize {
        self.selections.iter().map(Selection::quote_count).sum()
    }
}

// ---------------------------------------------------------------------------
// Fair odds / EV results
// ---------------------------------------------------------------------------

/// De-vigged consensus for one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairOddsResult {
    pub fair_probability: f64,
    pub fair_american_odds: AmericanOdds,
    pub confidence: Confidence,
    /// Distinct books that contributed to the estimate.
    pub book_count: usize,
}

impl fmt::Display for FairOddsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fair {:.1}% ({}) conf={} books={}",
            self.fair_probability * 100.0,
            self.fair_american_odds,
            self.confidence,
            self.book_count,
        )
    }
}

/// EV of one book's price on one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEvResult {
    pub book: String,
    pub odds: AmericanOdds,
    /// Profit per unit stake before fees.
    pub gross_profit: f64,
    /// Profit per unit stake after fees.
    pub net_profit: f64,
    /// Expected value per unit stake.
    pub ev: f64,
    /// Expected value for the configured stake, in currency.
    pub ev_amount: f64,
    pub ev_percent: f64,
    pub fee_applied: bool,
    pub fee_rate: f64,
}

/// Whether a fair probability backs the EV numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvAvailability {
    Available {
        fair_probability: f64,
        confidence: Confidence,
    },
    Unavailable {
        reason: String,
    },
}

/// Where an EV result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvOrigin {
    Local,
    Server,
}

/// EV results across every book quoting one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionEvResult {
    pub bet_id: String,
    pub selection_key: String,
    pub availability: EvAvailability,
    pub origin: EvOrigin,
    pub books: Vec<BookEvResult>,
    pub best_by_ev: Option<String>,
    pub best_by_price: Option<String>,
}

impl SelectionEvResult {
    pub fn is_available(&self) -> bool {
        matches!(self.availability, EvAvailability::Available { .. })
    }

    pub fn fair_probability(&self) -> Option<f64> {
        match self.availability {
            EvAvailability::Available { fair_probability, .. } => Some(fair_probability),
            EvAvailability::Unavailable { .. } => None,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self.availability {
            EvAvailability::Available { confidence, .. } => confidence,
            EvAvailability::Unavailable { .. } => Confidence::None,
        }
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        match &self.availability {
            EvAvailability::Unavailable { reason } => Some(reason),
            EvAvailability::Available { .. } => None,
        }
    }

    /// The best-EV book's result, if any book is strictly positive.
    pub fn best_ev(&self) -> Option<&BookEvResult> {
        let book = self.best_by_ev.as_deref()?;
        self.books.iter().find(|b| b.book == book)
    }

    pub fn best_price(&self) -> Option<&BookEvResult> {
        let book = self.best_by_price.as_deref()?;
        self.books.iter().find(|b| b.book == book)
    }

    /// EV% of the best-EV book, 0 when none is positive.
    pub fn best_ev_percent(&self) -> f64 {
        self.best_ev().map(|b| b.ev_percent).unwrap_or(0.0)
    }

    /// Available, positive, and medium/high confidence.
    pub fn is_reliably_positive(&self) -> bool {
        self.is_available() && self.best_by_ev.is_some() && self.confidence().is_reliable()
    }
}

/// Per-selection EV results for one group, stamped at computation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetGroupEvResult {
    pub bet_group_key: String,
    pub selections: Vec<SelectionEvResult>,
    pub computed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for FAIRLINE.
#[derive(Debug, thiserror::Error)]
pub enum FairlineError {
    #[error("Odds source error ({source_name}): {message}")]
    Source { source_name: String, message: String },

    #[error("Initial page fetch failed: {0}")]
    InitialFetch(String),

    #[error("Refresh cancelled (generation {0})")]
    Cancelled(u64),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
