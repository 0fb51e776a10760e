//! Deterministic in-memory odds source.
//!
//! Generates `total` selections (opposite sides adjacent, so pairs never
//! straddle an even page boundary) across moneyline, spread and total
//! markets with a mix of sharp and soft books. Latency, failures and a
//! price shift are controllable from test code; every completed request is
//! logged and the in-flight high-water mark is tracked.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{BetPage, BetRecord, OddsSource, PriceQuote};
use crate::odds::probability_to_american;
use crate::types::FairlineError;

const SOURCE_NAME: &str = "mock";

const LEAGUES: &[&str] = &["NBA", "NFL", "NHL"];

const TEAMS: &[&str] = &[
    "ATL", "BOS", "BKN", "CHI", "DAL", "DEN", "LAL", "MIA", "NYK", "PHX", "SAC", "TOR",
];

/// (book, margin): margin is the book's total overround on a pair.
const BOOKS: &[(&str, f64)] = &[
    ("pinnacle", 0.020),
    ("circa", 0.025),
    ("draftkings", 0.045),
    ("fanduel", 0.045),
    ("prophetx", 0.010),
];

/// A completed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub returned: usize,
}

pub struct MockOddsSource {
    total: usize,
    latency: Duration,
    offset_latency: HashMap<usize, Duration>,
    annotate: bool,
    failures: Mutex<HashSet<usize>>,
    price_shift: AtomicI32,
    requests: Mutex<Vec<PageRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockOddsSource {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            latency: Duration::ZERO,
            offset_latency: HashMap::new(),
            annotate: false,
            failures: Mutex::new(HashSet::new()),
            price_shift: AtomicI32::new(0),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Latency applied to every page.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Latency for one offset, overriding the default.
    pub fn with_offset_latency(mut self, offset: usize, latency: Duration) -> Self {
        self.offset_latency.insert(offset, latency);
        self
    }

    /// Attach server-side true probabilities to every record.
    pub fn with_server_annotations(mut self) -> Self {
        self.annotate = true;
        self
    }

    pub fn fail_at(&self, offset: usize) {
        self.lock_failures().insert(offset);
    }

    pub fn clear_failures(&self) {
        self.lock_failures().clear();
    }

    /// Shift every generated raw price by `shift` (simulates a line move).
    pub fn set_price_shift(&self, shift: i32) {
        self.price_shift.store(shift, Ordering::SeqCst);
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Completed requests in completion order.
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, HashSet<usize>> {
        // a poisoned set is still a valid set
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The record at `index` for a given price shift.
    pub fn record(&self, index: usize, shift: i32) -> BetRecord {
        let pair = index / 2;
        let first_side = index % 2 == 0;

        let league = LEAGUES[pair % LEAGUES.len()];
        let away = TEAMS[pair % TEAMS.len()];
        let home = TEAMS[(pair * 5 + 1) % TEAMS.len()];
        let base_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap_or_default();
        let game_date = base_date + ChronoDuration::days((pair / 36) as i64);

        let (market_key, line, side) = match (pair / TEAMS.len()) % 3 {
            0 => ("moneyline", None, if first_side { away } else { home }),
            1 => {
                let spread = (pair % 10) as f64 + 0.5;
                if first_side {
                    ("spread", Some(spread), away)
                } else {
                    ("spread", Some(-spread), home)
                }
            }
            _ => {
                let total = 200.5 + (pair % 30) as f64;
                ("total", Some(total), if first_side { "over" } else { "under" })
            }
        };

        // fair probability of the first side
        let fair_first = 0.35 + ((pair * 7) % 30) as f64 / 100.0;
        let fair = if first_side { fair_first } else { 1.0 - fair_first };

        let books: Vec<(usize, &(&str, f64))> = BOOKS
            .iter()
            .enumerate()
            .filter(|(i, _)| match pair % 10 {
                // soft books only
                9 => *i >= 2,
                // a single sharp book
                8 => *i != 1,
                _ => true,
            })
            .collect();

        let observed_at = epoch() + ChronoDuration::seconds(index as i64);
        let prices = books
            .into_iter()
            .map(|(i, (book, margin))| {
                let noise = (((pair + i * 3) % 5) as f64 - 2.0) * 0.005;
                let noise = if first_side { noise } else { -noise };
                let implied = fair + margin / 2.0 + noise;
                let odds = probability_to_american(implied).value() + shift;
                PriceQuote::new(book, odds, observed_at)
            })
            .collect();

        let (true_probability, confidence) = if self.annotate {
            (Some(fair), Some("high".to_string()))
        } else {
            (None, None)
        };

        BetRecord {
            id: format!("mock-{index:06}"),
            league: league.to_string(),
            game_date,
            away_team: away.to_string(),
            home_team: home.to_string(),
            market_key: market_key.to_string(),
            subject: None,
            subject_suffix: None,
            line,
            side: side.to_string(),
            prices,
            true_probability,
            ev_percent: None,
            confidence,
        }
    }
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 17, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Decrements the in-flight counter even when the request future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OddsSource for MockOddsSource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<BetPage> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let shift = self.price_shift.load(Ordering::SeqCst);
        let latency = self.offset_latency.get(&offset).copied().unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.lock_failures().contains(&offset) {
            return Err(FairlineError::Source {
                source_name: SOURCE_NAME.to_string(),
                message: format!("simulated failure at offset {offset}"),
            }
            .into());
        }

        let end = offset.saturating_add(limit).min(self.total);
        let bets: Vec<BetRecord> = (offset..end).map(|i| self.record(i, shift)).collect();

        if let Ok(mut log) = self.requests.lock() {
            log.push(PageRequest { offset, returned: bets.len() });
        }

        Ok(BetPage {
            offset,
            total: self.total,
            bets,
        })
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
