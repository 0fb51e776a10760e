//! Odds sources: the page-fetch boundary.
//!
//! Defines the `OddsSource` trait and the wire records it returns, with
//! two implementations:
//! - `HttpOddsSource`: JSON pages from an odds API over HTTP
//! - `MockOddsSource`: deterministic in-memory pages for tests and demos

pub mod http;
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One quote as it arrives from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub book: String,
    /// American price; out-of-domain values are snapped on conversion.
    pub odds: i32,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub ev_percent: Option<f64>,
    #[serde(default)]
    pub true_probability: Option<f64>,
    #[serde(default)]
    pub is_sharp: Option<bool>,
}

impl PriceQuote {
    pub fn new(book: &str, odds: i32, observed_at: DateTime<Utc>) -> Self {
        Self {
            book: book.to_string(),
            odds,
            observed_at,
            ev_percent: None,
            true_probability: None,
            is_sharp: None,
        }
    }
}

/// One selection as it arrives from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: String,
    pub league: String,
    pub game_date: NaiveDate,
    pub away_team: String,
    pub home_team: String,
    pub market_key: String,
    /// Player name for player props.
    #[serde(default)]
    pub subject: Option<String>,
    /// Disambiguation for players sharing a name.
    #[serde(default)]
    pub subject_suffix: Option<String>,
    #[serde(default)]
    pub line: Option<f64>,
    /// Team code, "over" or "under".
    pub side: String,
    #[serde(default)]
    pub prices: Vec<PriceQuote>,
    #[serde(default)]
    pub true_probability: Option<f64>,
    #[serde(default)]
    pub ev_percent: Option<f64>,
    #[serde(default)]
    pub confidence: Option<String>,
}

/// A page of records starting at `offset` out of `total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetPage {
    pub offset: usize,
    pub total: usize,
    #[serde(default)]
    pub bets: Vec<BetRecord>,
}

/// Abstraction over anything that serves paginated bet records.
#[async_trait]
pub trait OddsSource: Send + Sync {
    /// Fetch up to `limit` records starting at `offset`.
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<BetPage>;

    /// Source name for logging and identification.
    fn name(&self) -> &str;
}
