//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::{BetDetail, BetQuery, BetRow, DatasetStats, EngineStatus, FetchOutcome, OddsEngine};
use crate::strategy::parlay::{ParlayQuote, ParlayState};

/// Refresh log entries kept for `/api/refreshes`.
const MAX_REFRESH_LOG: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub engine: Arc<OddsEngine>,
    pub started_at: DateTime<Utc>,
    pub refresh_log: RwLock<Vec<RefreshLogEntry>>,
}

impl DashboardState {
    pub fn new(engine: Arc<OddsEngine>) -> Self {
        Self {
            engine,
            started_at: Utc::now(),
            refresh_log: RwLock::new(Vec::new()),
        }
    }

    /// Record how a refresh cycle ended.
    pub async fn record_refresh(&self, entry: RefreshLogEntry) {
        let mut log = self.refresh_log.write().await;
        log.push(entry);
        if log.len() > MAX_REFRESH_LOG {
            let excess = log.len() - MAX_REFRESH_LOG;
            log.drain(..excess);
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub engine: EngineStatus,
    pub uptime_secs: i64,
    pub refreshes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshLogEntry {
    pub cycle_id: String,
    pub generation: u64,
    pub timestamp: String,
    pub first_page: usize,
    pub loaded: usize,
    pub outcome: String,
    pub error: Option<String>,
}

impl RefreshLogEntry {
    pub fn new(cycle_id: String, generation: u64, first_page: usize, loaded: usize, outcome: &FetchOutcome) -> Self {
        let (label, error) = match outcome {
            FetchOutcome::Complete { .. } => ("complete", None),
            FetchOutcome::Failed { error, .. } => ("failed", Some(error.clone())),
            FetchOutcome::Cancelled => ("cancelled", None),
            FetchOutcome::Superseded => ("superseded", None),
        };
        Self {
            cycle_id,
            generation,
            timestamp: Utc::now().to_rfc3339(),
            first_page,
            loaded,
            outcome: label.to_string(),
            error,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParlayParams {
    /// Comma-separated bet ids.
    pub legs: Option<String>,
}

impl ParlayParams {
    pub fn slip(&self) -> ParlayState {
        let mut slip = ParlayState::new();
        for id in self.legs.as_deref().unwrap_or("").split(',') {
            let id = id.trim();
            if !id.is_empty() {
                slip.add(id);
            }
        }
        slip
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let engine = state.engine.status().await;
    let refreshes = state.refresh_log.read().await.len();
    Json(StatusResponse {
        engine,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        refreshes,
    })
}

/// GET /api/bets
pub async fn get_bets(State(state): State<AppState>, Query(query): Query<BetQuery>) -> Json<Vec<BetRow>> {
    Json(state.engine.query(&query).await)
}

/// GET /api/bets/:id
pub async fn get_bet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BetDetail>, StatusCode> {
    state.engine.bet(&id).await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<DatasetStats> {
    Json(state.engine.stats().await)
}

/// GET /api/parlay?legs=a,b
pub async fn get_parlay(State(state): State<AppState>, Query(params): Query<ParlayParams>) -> Json<ParlayQuote> {
    Json(state.engine.parlay_quote(&params.slip()).await)
}

/// GET /api/refreshes
pub async fn get_refreshes(State(state): State<AppState>) -> Json<Vec<RefreshLogEntry>> {
    Json(state.refresh_log.read().await.clone())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use crate::market::books::BookClassifier;
    use crate::market::fees::FeeSchedule;
    use crate::sources::mock::MockOddsSource;
    use crate::strategy::Pricer;

    fn state() -> AppState {
        let engine = OddsEngine::new(
            Arc::new(MockOddsSource::new(20)),
            Pricer::from_parts(BookClassifier::default(), FeeSchedule::default(), 100.0),
            EngineSettings::default(),
        );
        Arc::new(DashboardState::new(Arc::new(engine)))
    }

    #[test]
    fn test_parlay_params_slip() {
        let params = ParlayParams {
            legs: Some(" a, b,,a ,c".into()),
        };
        assert_eq!(params.slip().bet_ids(), &["a".to_string(), "b".to_string(), "c".to_string()]);
        assert!(ParlayParams::default().slip().is_empty());
    }

    #[test]
    fn test_refresh_log_entry_from_outcome() {
        let failed = FetchOutcome::Failed {
            offset: 500,
            error: "boom".into(),
        };
        let entry = RefreshLogEntry::new("c1".into(), 2, 500, 500, &failed);
        assert_eq!(entry.outcome, "failed");
        assert_eq!(entry.error.as_deref(), Some("boom"));

        let done = RefreshLogEntry::new("c2".into(), 3, 500, 1200, &FetchOutcome::Complete { pages: 2 });
        assert_eq!(done.outcome, "complete");
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn test_refresh_log_is_capped() {
        let state = state();
        for i in 0..(MAX_REFRESH_LOG + 5) {
            let entry = RefreshLogEntry::new(format!("c{i}"), i as u64, 0, 0, &FetchOutcome::Cancelled);
            state.record_refresh(entry).await;
        }
        let Json(log) = get_refreshes(State(state)).await;
        assert_eq!(log.len(), MAX_REFRESH_LOG);
        assert_eq!(log[0].cycle_id, "c5");
    }

    #[tokio::test]
    async fn test_get_status_before_refresh() {
        let Json(resp) = get_status(State(state())).await;
        assert_eq!(resp.engine.loaded, 0);
        assert_eq!(resp.engine.generation, 0);
        assert_eq!(resp.refreshes, 0);
    }

    #[tokio::test]
    async fn test_get_bet_not_found() {
        let result = get_bet(State(state()), Path("missing".into())).await;
        assert_eq!(result.err(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_get_bets_after_refresh() {
        let state = state();
        state.engine.start_refresh().await.unwrap().wait().await;
        let Json(rows) = get_bets(State(state.clone()), Query(BetQuery::default())).await;
        assert_eq!(rows.len(), 20);
        let Json(stats) = get_stats(State(state)).await;
        assert_eq!(stats.total_bets, 20);
    }
}
