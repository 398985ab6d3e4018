use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::equity::EquityPoint;
use crate::domain::params::ParameterSet;
use crate::domain::position::ClosedTrade;

/// Summary statistics derived from a completed replay's trade list and
/// equity curve (C9). All ratios are `None` when the sample is too small
/// to be meaningful rather than reported as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayStats {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub win_rate_pct: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub net_profit: Decimal,
    pub profit_factor: Option<Decimal>,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub max_consecutive_wins: u32,
    pub max_consecutive_losses: u32,
}

/// The complete output of one deterministic replay (§3 "Replay result").
/// `run_id` is a v4 UUID minted once at the start of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    pub run_id: Uuid,
    pub params: ParameterSet,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub stats: ReplayStats,
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub runtime_ms: u64,
}
