use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::signal::TradeIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailMode {
    Normal,
    Reduced,
    Blocked,
}

#[derive(Debug, Clone)]
pub struct ExecutionFilterConfig {
    pub session_start_minute: u32,
    pub session_end_minute: u32,
    pub max_spread_pips: Decimal,
    pub min_minutes_between_trades: i64,
    pub max_daily_trades: u32,
    pub max_concurrent_per_symbol: u32,
    pub max_concurrent_per_direction: Option<u32>,
    pub max_concurrent_global: u32,
    pub max_daily_risk_dollars_per_symbol: Decimal,
    pub max_daily_risk_dollars_global: Decimal,
    pub confluence_threshold: u8,
}

/// Per-(symbol, strategy) counters threaded through the replay loop as an
/// explicit snapshot rather than ambient mutable state (§9 "Replacing
/// shared mutable state in the optimizer"). Updated only at bar
/// boundaries by the caller.
#[derive(Debug, Clone, Default)]
pub struct TradeContext {
    pub last_trade_ts: HashMap<(String, String), i64>,
    pub daily_trade_count: HashMap<(String, String, String), u32>,
    pub open_positions_per_symbol: HashMap<String, u32>,
    pub open_positions_per_symbol_direction: HashMap<(String, String), u32>,
    pub open_positions_global: u32,
    pub daily_risk_dollars_per_symbol: HashMap<(String, String), Decimal>,
    pub daily_risk_dollars_global: Decimal,
}

pub struct GateInput<'a> {
    pub intent: &'a TradeIntent,
    pub strategy: &'a str,
    pub date_ymd: &'a str,
    pub timestamp_ms: i64,
    pub spread_pips: Decimal,
    pub session_minute_of_day: u32,
    pub news_blocked: bool,
    pub guardrail_mode: GuardrailMode,
    pub candidate_risk_dollars: Decimal,
}

#[derive(Debug, Clone)]
pub struct GateDecision {
    pub risk_percent_multiplier: Decimal,
}

/// Stateless per-evaluation gate: reads a snapshot of shared counters and
/// the bar's own facts, returns pass/fail with reasons (§4.4).
pub struct ExecutionFilter {
    config: ExecutionFilterConfig,
}

impl ExecutionFilter {
    pub fn new(config: ExecutionFilterConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, input: &GateInput, ctx: &TradeContext) -> Result<GateDecision, Vec<String>> {
        let mut failures = Vec::new();

        if input.guardrail_mode == GuardrailMode::Blocked {
            failures.push("global guardrail mode is blocked".to_string());
        }

        if input.session_minute_of_day < self.config.session_start_minute
            || input.session_minute_of_day > self.config.session_end_minute
        {
            failures.push("outside configured session window".to_string());
        }

        if input.spread_pips > self.config.max_spread_pips {
            failures.push(format!(
                "spread {} exceeds max {}",
                input.spread_pips, self.config.max_spread_pips
            ));
        }

        let key = (input.intent.symbol.clone(), input.strategy.to_string());
        if let Some(&last_ts) = ctx.last_trade_ts.get(&key) {
            let elapsed_minutes = (input.timestamp_ms - last_ts) / 60_000;
            if elapsed_minutes < self.config.min_minutes_between_trades {
                failures.push("minimum minutes since last trade not elapsed".to_string());
            }
        }

        let day_key = (
            input.intent.symbol.clone(),
            input.strategy.to_string(),
            input.date_ymd.to_string(),
        );
        let daily_count = ctx.daily_trade_count.get(&day_key).copied().unwrap_or(0);
        if daily_count >= self.config.max_daily_trades {
            failures.push("daily trade count exceeded".to_string());
        }

        let open_for_symbol = ctx
            .open_positions_per_symbol
            .get(&input.intent.symbol)
            .copied()
            .unwrap_or(0);
        if open_for_symbol >= self.config.max_concurrent_per_symbol {
            failures.push("concurrent positions for symbol exceeded".to_string());
        }

        if let Some(cap) = self.config.max_concurrent_per_direction {
            let dir_key = (
                input.intent.symbol.clone(),
                format!("{:?}", input.intent.direction),
            );
            let open_for_direction = ctx
                .open_positions_per_symbol_direction
                .get(&dir_key)
                .copied()
                .unwrap_or(0);
            if open_for_direction >= cap {
                failures.push("concurrent positions for direction exceeded".to_string());
            }
        }

        if ctx.open_positions_global >= self.config.max_concurrent_global {
            failures.push("global concurrent trade cap exceeded".to_string());
        }

        let symbol_key = (input.intent.symbol.clone(), input.date_ymd.to_string());
        let symbol_risk = ctx
            .daily_risk_dollars_per_symbol
            .get(&symbol_key)
            .copied()
            .unwrap_or(Decimal::ZERO)
            + input.candidate_risk_dollars;
        if symbol_risk > self.config.max_daily_risk_dollars_per_symbol {
            failures.push("per-symbol daily risk dollars exceeded".to_string());
        }
        if ctx.daily_risk_dollars_global + input.candidate_risk_dollars
            > self.config.max_daily_risk_dollars_global
        {
            failures.push("global daily risk dollars exceeded".to_string());
        }

        if input.news_blocked {
            failures.push("inside news avoid-window".to_string());
        }

        if input.intent.confluence_score < self.config.confluence_threshold {
            failures.push("confluence score below threshold".to_string());
        }

        if !failures.is_empty() {
            return Err(failures);
        }

        let multiplier = match input.guardrail_mode {
            GuardrailMode::Reduced => Decimal::new(5, 1), // 0.5
            _ => Decimal::ONE,
        };

        Ok(GateDecision {
            risk_percent_multiplier: multiplier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_config() -> ExecutionFilterConfig {
        ExecutionFilterConfig {
            session_start_minute: 0,
            session_end_minute: 1440,
            max_spread_pips: dec!(3),
            min_minutes_between_trades: 5,
            max_daily_trades: 10,
            max_concurrent_per_symbol: 2,
            max_concurrent_per_direction: None,
            max_concurrent_global: 5,
            max_daily_risk_dollars_per_symbol: dec!(1000),
            max_daily_risk_dollars_global: dec!(5000),
            confluence_threshold: 50,
        }
    }

    fn intent(score: u8) -> TradeIntent {
        TradeIntent {
            symbol: "EURUSD".to_string(),
            direction: crate::domain::swing::Direction::Bullish,
            entry: dec!(1.1),
            stop_loss: dec!(1.09),
            take_profit: dec!(1.12),
            htf_trend: crate::domain::swing::TrendBias::Bullish,
            confluence_score: score,
            reasons: vec![],
        }
    }

    #[test]
    fn blocked_guardrail_rejects_outright() {
        let filter = ExecutionFilter::new(base_config());
        let ctx = TradeContext::default();
        let i = intent(80);
        let input = GateInput {
            intent: &i,
            strategy: "smc",
            date_ymd: "2024-01-01",
            timestamp_ms: 0,
            spread_pips: dec!(1),
            session_minute_of_day: 600,
            news_blocked: false,
            guardrail_mode: GuardrailMode::Blocked,
            candidate_risk_dollars: dec!(10),
        };
        assert!(filter.evaluate(&input, &ctx).is_err());
    }

    #[test]
    fn reduced_guardrail_halves_risk_percent() {
        let filter = ExecutionFilter::new(base_config());
        let ctx = TradeContext::default();
        let i = intent(80);
        let input = GateInput {
            intent: &i,
            strategy: "smc",
            date_ymd: "2024-01-01",
            timestamp_ms: 0,
            spread_pips: dec!(1),
            session_minute_of_day: 600,
            news_blocked: false,
            guardrail_mode: GuardrailMode::Reduced,
            candidate_risk_dollars: dec!(10),
        };
        let decision = filter.evaluate(&input, &ctx).unwrap();
        assert_eq!(decision.risk_percent_multiplier, dec!(0.5));
    }

    #[test]
    fn low_confluence_is_rejected() {
        let filter = ExecutionFilter::new(base_config());
        let ctx = TradeContext::default();
        let i = intent(10);
        let input = GateInput {
            intent: &i,
            strategy: "smc",
            date_ymd: "2024-01-01",
            timestamp_ms: 0,
            spread_pips: dec!(1),
            session_minute_of_day: 600,
            news_blocked: false,
            guardrail_mode: GuardrailMode::Normal,
            candidate_risk_dollars: dec!(10),
        };
        assert!(filter.evaluate(&input, &ctx).is_err());
    }
}
