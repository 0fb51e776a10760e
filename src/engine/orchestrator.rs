//! Refresh orchestration.
//!
//! A refresh fetches and prices the first page, publishes it, and then
//! fills the remaining pages in the background. Starting a refresh cancels
//! the previous cycle's token and bumps the generation; every append after
//! an await point checks both, so a superseded cycle can never write into
//! the new dataset.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dataset::{CachedEv, Dataset};
use super::fetcher::{self, FetchOutcome, PagePlan};
use super::query::{BetQuery, BetRow};
use super::stats::DatasetStats;
use crate::sources::{BetPage, OddsSource};
use crate::strategy::parlay::{ParlayQuote, ParlayState};
use crate::strategy::Pricer;
use crate::types::{FairlineError, Selection};

pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub page_size: usize,
    pub max_in_flight: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Snapshot of the engine for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub source: String,
    pub generation: u64,
    pub loaded: usize,
    pub source_total: usize,
    pub loading_more: bool,
    pub complete: bool,
    pub ev_computations: u64,
    pub last_error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// A bet with its cached EV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetDetail {
    pub selection: Selection,
    pub ev: Option<CachedEv>,
}

// ---------------------------------------------------------------------------
// Refresh ticket
// ---------------------------------------------------------------------------

/// Handle on a started refresh. The first page is already published.
#[derive(Debug)]
pub struct RefreshTicket {
    pub generation: u64,
    pub cycle_id: Uuid,
    /// Bets published with the first page.
    pub first_page: usize,
    fill: Option<JoinHandle<FetchOutcome>>,
    immediate: Option<FetchOutcome>,
}

impl RefreshTicket {
    /// Whether more pages are being fetched in the background.
    pub fn has_background_fill(&self) -> bool {
        self.fill.is_some()
    }

    /// Wait for the background fill to end.
    pub async fn wait(self) -> FetchOutcome {
        if let Some(outcome) = self.immediate {
            return outcome;
        }
        match self.fill {
            Some(handle) => handle.await.unwrap_or(FetchOutcome::Cancelled),
            None => FetchOutcome::Complete { pages: 0 },
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct OddsEngine {
    source: Arc<dyn OddsSource>,
    pricer: Pricer,
    settings: EngineSettings,
    dataset: RwLock<Dataset>,
    generation: AtomicU64,
    cancel: Mutex<CancellationToken>,
    loading_more: watch::Sender<bool>,
}

impl OddsEngine {
    pub fn new(source: Arc<dyn OddsSource>, pricer: Pricer, settings: EngineSettings) -> Self {
        let (loading_more, _) = watch::channel(false);
        Self {
            source,
            pricer,
            settings: EngineSettings {
                page_size: settings.page_size.max(1),
                max_in_flight: settings.max_in_flight.max(1),
            },
            dataset: RwLock::new(Dataset::new(0)),
            generation: AtomicU64::new(0),
            cancel: Mutex::new(CancellationToken::new()),
            loading_more,
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn pricer(&self) -> &Pricer {
        &self.pricer
    }

    /// Current generation. Bumped by every refresh.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Observe the "loading more pages" flag.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading_more.subscribe()
    }

    pub fn is_loading_more(&self) -> bool {
        *self.loading_more.borrow()
    }

    /// Cancel the in-flight cycle, if any, without starting a new one.
    pub fn cancel(&self) {
        self.lock_token().cancel();
        self.loading_more.send_replace(false);
    }

    fn lock_token(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cancel the previous cycle and open a new one under a single lock,
    /// so the token and generation always move together.
    fn begin_cycle(&self) -> (CancellationToken, u64) {
        let mut current = self.lock_token();
        current.cancel();
        let token = CancellationToken::new();
        *current = token.clone();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (token, generation)
    }

    /// Start a refresh cycle.
    ///
    /// Cancels the previous cycle, fetches and publishes the first page and
    /// spawns the background fill. Fails with `InitialFetch` when the first
    /// page fails and nothing was loaded before; with prior data the old
    /// dataset is kept and the error recorded.
    pub async fn start_refresh(self: &Arc<Self>) -> Result<RefreshTicket, FairlineError> {
        let (token, generation) = self.begin_cycle();
        let cycle_id = Uuid::new_v4();
        self.loading_more.send_replace(false);

        info!(%cycle_id, generation, source = self.source.name(), "Refresh started");

        let page_size = self.settings.page_size;
        let first = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(FairlineError::Cancelled(generation)),
            res = self.source.fetch_page(0, page_size) => res,
        };

        let page = match first {
            Ok(page) => page,
            Err(e) => return self.first_page_failed(generation, cycle_id, format!("{e:#}")).await,
        };

        let (first_page, total) = {
            let mut ds = self.dataset.write().await;
            if token.is_cancelled() || self.generation() != generation {
                return Err(FairlineError::Cancelled(generation));
            }
            let mut fresh = Dataset::new(generation);
            fresh.source_total = page.total;
            fresh.refreshed_at = Some(Utc::now());
            let added = fresh.append(&page.bets, &self.pricer);
            *ds = fresh;
            (added, page.total)
        };

        info!(%cycle_id, generation, loaded = first_page, total, "First page published");

        let plan = PagePlan {
            start: page_size,
            page_size,
            total,
        };
        if page.bets.is_empty() || plan.offsets().is_empty() {
            self.finish_cycle(generation, cycle_id, &FetchOutcome::Complete { pages: 1 }).await;
            return Ok(RefreshTicket {
                generation,
                cycle_id,
                first_page,
                fill: None,
                immediate: Some(FetchOutcome::Complete { pages: 1 }),
            });
        }

        self.loading_more.send_replace(true);
        let engine = Arc::clone(self);
        let fill = tokio::spawn(async move {
            let source = Arc::clone(&engine.source);
            let max_in_flight = engine.settings.max_in_flight;
            let sink = Arc::clone(&engine);
            let gate = token.clone();
            let outcome = fetcher::fetch_pages(source, plan, max_in_flight, token, move |page| {
                let sink = Arc::clone(&sink);
                let gate = gate.clone();
                async move { sink.append_page(generation, &gate, page).await }
            })
            .await;
            engine.finish_cycle(generation, cycle_id, &outcome).await;
            outcome
        });

        Ok(RefreshTicket {
            generation,
            cycle_id,
            first_page,
            fill: Some(fill),
            immediate: None,
        })
    }

    async fn first_page_failed(
        &self,
        generation: u64,
        cycle_id: Uuid,
        error: String,
    ) -> Result<RefreshTicket, FairlineError> {
        let mut ds = self.dataset.write().await;
        if self.generation() != generation {
            return Err(FairlineError::Cancelled(generation));
        }
        if ds.is_empty() {
            warn!(%cycle_id, generation, %error, "First page failed with no prior data");
            ds.last_error = Some(error.clone());
            return Err(FairlineError::InitialFetch(error));
        }
        warn!(%cycle_id, generation, %error, kept = ds.len(), "First page failed, keeping previous data");
        ds.last_error = Some(error.clone());
        Ok(RefreshTicket {
            generation,
            cycle_id,
            first_page: 0,
            fill: None,
            immediate: Some(FetchOutcome::Failed { offset: 0, error }),
        })
    }

    /// Append one background page if its cycle is still current.
    async fn append_page(&self, generation: u64, token: &CancellationToken, page: BetPage) -> bool {
        let mut ds = self.dataset.write().await;
        if token.is_cancelled() || self.generation() != generation || ds.generation != generation {
            debug!(generation, offset = page.offset, "Dropping page from superseded cycle");
            return false;
        }
        let added = ds.append(&page.bets, &self.pricer);
        debug!(generation, offset = page.offset, added, loaded = ds.len(), "Page appended");
        true
    }

    async fn finish_cycle(&self, generation: u64, cycle_id: Uuid, outcome: &FetchOutcome) {
        let mut ds = self.dataset.write().await;
        if self.generation() != generation || ds.generation != generation {
            return;
        }
        match outcome {
            FetchOutcome::Complete { .. } => {
                ds.complete = true;
                info!(%cycle_id, generation, loaded = ds.len(), evs = ds.ev_computations(), "Refresh complete");
            }
            FetchOutcome::Failed { offset, error } => {
                ds.last_error = Some(error.clone());
                warn!(%cycle_id, generation, offset, loaded = ds.len(), "Background fill stopped early");
            }
            FetchOutcome::Cancelled | FetchOutcome::Superseded => {
                debug!(%cycle_id, generation, "Background fill ended without completing");
            }
        }
        self.loading_more.send_replace(false);
    }

    // -- Reads ---------------------------------------------------------------

    pub async fn status(&self) -> EngineStatus {
        let ds = self.dataset.read().await;
        EngineStatus {
            source: self.source.name().to_string(),
            generation: ds.generation(),
            loaded: ds.len(),
            source_total: ds.source_total,
            loading_more: self.is_loading_more(),
            complete: ds.complete,
            ev_computations: ds.ev_computations(),
            last_error: ds.last_error.clone(),
            refreshed_at: ds.refreshed_at,
        }
    }

    pub async fn query(&self, query: &BetQuery) -> Vec<BetRow> {
        query.run(&*self.dataset.read().await)
    }

    pub async fn stats(&self) -> DatasetStats {
        DatasetStats::compute(&*self.dataset.read().await)
    }

    pub async fn bet(&self, id: &str) -> Option<BetDetail> {
        let ds = self.dataset.read().await;
        let selection = ds.bet(id)?.clone();
        Some(BetDetail {
            selection,
            ev: ds.ev(id).cloned(),
        })
    }

    /// Bet ids in display (fetch) order.
    pub async fn bet_ids(&self) -> Vec<String> {
        self.dataset.read().await.bets().iter().map(|b| b.id.clone()).collect()
    }

    pub async fn ev_result(&self, id: &str) -> Option<CachedEv> {
        self.dataset.read().await.ev(id).cloned()
    }

    /// Quote a slip against the current EV cache.
    pub async fn parlay_quote(&self, slip: &ParlayState) -> ParlayQuote {
        let ds = self.dataset.read().await;
        slip.quote(|id| {
            let result = &ds.ev(id)?.result;
            result.fair_probability().map(|p| (p, result.confidence()))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
