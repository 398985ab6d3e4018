use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::swing::Direction;
use crate::domain::swing::TrendBias;

/// Produced by the signal synthesizer (C3), consumed by the risk gate and
/// fill simulator (C4/C5); discarded if rejected (§3 "Trade intent").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub direction: Direction,
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub htf_trend: TrendBias,
    pub confluence_score: u8,
    pub reasons: Vec<String>,
}

impl TradeIntent {
    pub fn risk_per_unit(&self) -> Decimal {
        (self.entry - self.stop_loss).abs()
    }

    pub fn reward_to_risk(&self) -> Option<Decimal> {
        let risk = self.risk_per_unit();
        if risk.is_zero() {
            return None;
        }
        Some((self.take_profit - self.entry).abs() / risk)
    }
}

/// Outcome of a pipeline stage: filter/guardrail rejections are values, not
/// exceptions (§9 "Replacing async exception control flow").
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Ok(T),
    Skip(Vec<String>),
    Fail(String),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }
}
