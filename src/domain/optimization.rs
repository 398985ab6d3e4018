use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::equity::EquityPoint;
use crate::domain::params::ParameterSet;
use crate::domain::position::ClosedTrade;
use crate::domain::result::ReplayStats;

/// Search strategy driving C8 (§3 "Optimization run").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMethod {
    Grid,
    Random,
    Tpe,
    WalkForward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// One optimization job: a method applied across a symbol set and date
/// range, producing many `OptimizationResultRecord`s (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub run_id: Uuid,
    pub method: SearchMethod,
    pub symbols: Vec<String>,
    pub in_sample_start_ms: i64,
    pub in_sample_end_ms: i64,
    pub out_sample_start_ms: Option<i64>,
    pub out_sample_end_ms: Option<i64>,
    pub status: OptimizationStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl OptimizationRun {
    pub fn is_walk_forward(&self) -> bool {
        self.out_sample_start_ms.is_some()
    }
}

/// One evaluated parameter combination within an `OptimizationRun`.
/// `ranked_score` is the scalar objective (§4.8 "scoring") used to order
/// results; a combination that errored during replay has no score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResultRecord {
    pub run_id: Uuid,
    pub params: ParameterSet,
    pub stats: ReplayStats,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<ClosedTrade>,
    pub ranked_score: Option<f64>,
    pub out_of_sample_score: Option<f64>,
}

/// Weights over the five normalized components of the composite score
/// (§4.8 "scoring"): win_rate, profit_factor, sharpe, drawdown, stability.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub sharpe: f64,
    pub drawdown: f64,
    pub stability: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            win_rate: 0.25,
            profit_factor: 0.30,
            sharpe: 0.25,
            drawdown: 0.10,
            stability: 0.10,
        }
    }
}

impl ScoreWeights {
    /// A failed replay is scored `-inf` so it always sorts last (§4.8
    /// "Dispatch") without needing a separate failure branch at call sites.
    pub fn score(&self, stats: &ReplayStats) -> f64 {
        let win_rate = (stats.win_rate_pct.to_f64().unwrap_or(0.0) / 100.0).clamp(0.0, 1.0);
        let pf = stats
            .profit_factor
            .and_then(|pf| pf.to_f64())
            .unwrap_or(0.0);
        let pf_norm = (pf / 5.0).min(1.0);
        let sharpe = stats.sharpe_ratio.unwrap_or(0.0);
        let sharpe_norm = ((sharpe + 2.0) / 4.0).clamp(0.0, 1.0);
        let dd_pct = stats.max_drawdown_pct.to_f64().unwrap_or(0.0);
        let dd_norm = (1.0 - dd_pct / 50.0).max(0.0);
        let stability_norm = (1.0 - stats.max_consecutive_losses as f64 / 10.0).max(0.0);

        self.win_rate * win_rate
            + self.profit_factor * pf_norm
            + self.sharpe * sharpe_norm
            + self.drawdown * dd_norm
            + self.stability * stability_norm
    }
}
