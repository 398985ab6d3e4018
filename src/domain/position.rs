use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::swing::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    ForcedClose,
}

/// Lifecycle: created by the fill simulator at bar open after passing all
/// gates, mutated only on close (§3 "Simulated position"). Tickets are
/// monotonically increasing per replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedPosition {
    pub ticket: u64,
    pub symbol: String,
    pub strategy: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub entry_price: Decimal,
    pub sl: Decimal,
    pub tp: Decimal,
    pub open_time_ms: i64,
    pub close_time_ms: Option<i64>,
    pub close_price: Option<Decimal>,
    pub close_reason: Option<CloseReason>,
    pub realized_pnl: Option<Decimal>,
}

impl SimulatedPosition {
    pub fn is_open(&self) -> bool {
        self.close_time_ms.is_none()
    }

    /// Mark-to-market unrealized PnL at `price`, direction-aware.
    pub fn unrealized_pnl(&self, price: Decimal, contract_size: Decimal) -> Decimal {
        let diff = match self.direction {
            Direction::Bullish => price - self.entry_price,
            Direction::Bearish => self.entry_price - price,
        };
        diff * self.volume * contract_size
    }
}

/// One row of `trades.csv` (§6 "Output artifacts per replay").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub strategy: String,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub entry_time_ms: i64,
    pub exit_time_ms: i64,
    pub sl: Decimal,
    pub tp: Decimal,
    pub volume: Decimal,
    pub pnl: Decimal,
    pub duration_minutes: i64,
    pub pips: Decimal,
    pub risk_reward: Decimal,
    pub close_reason: CloseReason,
}

impl ClosedTrade {
    pub fn from_position(pos: &SimulatedPosition, pip_size: Decimal) -> Self {
        let exit_price = pos.close_price.expect("closed position carries close_price");
        let exit_time_ms = pos.close_time_ms.expect("closed position carries close_time");
        let pnl = pos.realized_pnl.unwrap_or(Decimal::ZERO);
        let risk = (pos.entry_price - pos.sl).abs();
        let reward = (exit_price - pos.entry_price).abs();
        let risk_reward = if risk.is_zero() {
            Decimal::ZERO
        } else {
            reward / risk
        };
        let pip_diff = match pos.direction {
            Direction::Bullish => exit_price - pos.entry_price,
            Direction::Bearish => pos.entry_price - exit_price,
        };
        let pips = if pip_size.is_zero() {
            Decimal::ZERO
        } else {
            pip_diff / pip_size
        };
        Self {
            ticket: pos.ticket,
            symbol: pos.symbol.clone(),
            direction: pos.direction,
            strategy: pos.strategy.clone(),
            entry_price: pos.entry_price,
            exit_price,
            entry_time_ms: pos.open_time_ms,
            exit_time_ms,
            sl: pos.sl,
            tp: pos.tp,
            volume: pos.volume,
            pnl,
            duration_minutes: (exit_time_ms - pos.open_time_ms) / 60_000,
            pips,
            risk_reward,
            close_reason: pos.close_reason.unwrap_or(CloseReason::ForcedClose),
        }
    }
}
