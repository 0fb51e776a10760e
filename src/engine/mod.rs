//! Core engine: paginated refresh, incremental pricing and the read side
//! (queries, statistics, parlay quotes) over the accumulated dataset.

pub mod dataset;
pub mod fetcher;
pub mod orchestrator;
pub mod query;
pub mod stats;

pub use dataset::{CachedEv, Dataset};
pub use fetcher::FetchOutcome;
pub use orchestrator::{BetDetail, EngineSettings, EngineStatus, OddsEngine, RefreshTicket};
pub use query::{BetQuery, BetRow, SortKey};
pub use stats::DatasetStats;
