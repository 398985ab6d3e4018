use async_trait::async_trait;

use crate::domain::candle::Candle;
use crate::domain::errors::EngineResult;
use crate::domain::optimization::{OptimizationResultRecord, OptimizationRun};
use crate::domain::result::ReplayResult;

/// Where a replay's candle series comes from (§4.7 "Data loader",
/// §9 "Replacing an open-ended data-source trait with a closed set").
/// A closed enum rather than an open trait object keeps the set of
/// backends reviewable at a glance.
#[derive(Debug, Clone)]
pub enum DataSource {
    File(String),
    Database(String),
    Remote(String),
    Synthetic(u64),
}

/// Fetches aligned M1 candle history for one symbol over a time range.
/// Implementations never mix timeframes: the loader is responsible for
/// enforcing M1-only ingestion before any aggregation happens.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn load(&self, symbol: &str, from_ms: i64, to_ms: i64) -> EngineResult<Vec<Candle>>;
}

/// Persists replay and optimization output (§3 "Result sink", §4.9).
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn save_replay(&self, result: &ReplayResult) -> EngineResult<()>;
    async fn save_optimization_run(&self, run: &OptimizationRun) -> EngineResult<()>;
    async fn update_optimization_status(&self, run: &OptimizationRun) -> EngineResult<()>;
    async fn save_optimization_result(
        &self,
        record: &OptimizationResultRecord,
    ) -> EngineResult<()>;
    async fn load_replay(&self, run_id: uuid::Uuid) -> EngineResult<Option<ReplayResult>>;
}

/// A single fundamental/news interval affecting one symbol on one date.
#[derive(Debug, Clone, Copy)]
pub struct NewsWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Supplies news blackout windows per `(symbol, date)`. Implementations
/// must be fault-isolated per key: one lookup failure must not block
/// lookups for other symbols or dates in the same run (§9).
#[async_trait]
pub trait NewsWindowSource: Send + Sync {
    async fn windows_for(&self, symbol: &str, date_ymd: &str) -> EngineResult<Vec<NewsWindow>>;
}

/// Narrow collaborator standing in for the excluded ML predictor
/// (§1 Non-goals). A real scorer could rank candidate parameter sets
/// before a full replay; the engine ships only a placeholder.
pub trait Scorer: Send + Sync {
    fn score(&self, features: &[f64]) -> f64;
}

/// Always returns zero; used where no scorer is configured.
pub struct NullScorer;

impl Scorer for NullScorer {
    fn score(&self, _features: &[f64]) -> f64 {
        0.0
    }
}
