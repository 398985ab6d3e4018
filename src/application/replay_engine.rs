use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::analyzer::{AnalyzerConfig, StructuralAnalyzer};
use crate::application::candle_store::CandleStore;
use crate::application::execution_filter::{
    ExecutionFilter, ExecutionFilterConfig, GateInput, GuardrailMode, TradeContext,
};
use crate::application::fill_simulator::{FillSimulator, FillSimulatorConfig, StopHitReason};
use crate::application::metrics::compute_stats;
use crate::application::signal_synth::{MultiTimeframeView, SignalConfig, SignalSynthesizer};
use crate::domain::candle::Candle;
use crate::domain::equity::EquityTracker;
use crate::domain::errors::EngineResult;
use crate::domain::params::ParameterSet;
use crate::domain::position::{CloseReason, ClosedTrade};
use crate::domain::result::ReplayResult;
use crate::domain::swing::Direction;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub strategy: String,
    pub initial_balance: Decimal,
    pub risk_percent: Decimal,
    pub contract_size: Decimal,
    pub pip_size: Decimal,
    pub pip_value: Decimal,
    pub min_lot: Decimal,
    pub max_lot: Decimal,
    pub equity_snapshot_every_n_bars: u32,
    pub htf: Timeframe,
    pub itf: Timeframe,
    pub ltf: Timeframe,
    pub htf_bars: usize,
    pub itf_bars: usize,
    pub ltf_bars: usize,
}

/// Cooperative cancellation flag (§5). Checked once per bar; a replay
/// never suspends mid-bar.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct NewsGate {
    blocked_keys: HashMap<(String, String), bool>,
}

impl NewsGate {
    pub fn new() -> Self {
        Self {
            blocked_keys: HashMap::new(),
        }
    }

    pub fn set_blocked(&mut self, symbol: &str, date_ymd: &str, blocked: bool) {
        self.blocked_keys
            .insert((symbol.to_string(), date_ymd.to_string()), blocked);
    }

    pub fn is_blocked(&self, symbol: &str, date_ymd: &str) -> bool {
        self.blocked_keys
            .get(&(symbol.to_string(), date_ymd.to_string()))
            .copied()
            .unwrap_or(false)
    }
}

pub enum ReplayOutcome {
    Completed(ReplayResult),
    Cancelled(ReplayResult),
}

/// The hot loop: drives candle store -> structural analyzer -> signal
/// synthesizer -> execution filter -> fill simulator over a strictly
/// time-ordered `(symbol, candle)` stream (§4.6).
pub struct ReplayEngine {
    config: ReplayConfig,
    analyzer_config: AnalyzerConfig,
    signal_config: SignalConfig,
    filter_config: ExecutionFilterConfig,
}

impl ReplayEngine {
    pub fn new(
        config: ReplayConfig,
        analyzer_config: AnalyzerConfig,
        signal_config: SignalConfig,
        filter_config: ExecutionFilterConfig,
    ) -> Self {
        Self {
            config,
            analyzer_config,
            signal_config,
            filter_config,
        }
    }

    /// `bars` must already be merged and sorted by `(timestamp, symbol)`
    /// (§4.6 "Ordering guarantees"). `news_gate` carries per-(symbol,date)
    /// fault isolation owned by this invocation only (§9).
    pub fn run(
        &self,
        bars: &[(String, Candle)],
        params: &ParameterSet,
        news_gate: &NewsGate,
        cancel: &CancellationToken,
    ) -> EngineResult<ReplayOutcome> {
        let start = std::time::Instant::now();
        let run_id = Uuid::new_v4();

        let mut store = CandleStore::sized_for(self.config.htf, self.config.htf_bars.max(50));
        let mut sim = FillSimulator::new(
            self.config.initial_balance,
            FillSimulatorConfig {
                contract_size: self.config.contract_size,
                spread: Decimal::ZERO,
                slippage: Decimal::ZERO,
                fill_policy: Default::default(),
            },
        );
        let analyzer = StructuralAnalyzer::new(self.analyzer_config);
        let synth = SignalSynthesizer::new(self.signal_config.clone());
        let filter = ExecutionFilter::new(self.filter_config.clone());

        let mut ctx = TradeContext::default();
        let mut equity_tracker = EquityTracker::new();
        let mut equity_curve = Vec::new();
        let mut closed_trades: Vec<ClosedTrade> = Vec::new();
        let mut last_price: HashMap<String, Decimal> = HashMap::new();
        let mut bar_count: u32 = 0;
        let mut cancelled = false;

        for (symbol, candle) in bars {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            // 1. Append bar to candle store for its symbol.
            store.append(candle.clone())?;
            last_price.insert(symbol.clone(), candle.close);

            // 2. Check stops for this symbol; close hit positions.
            let hits = sim.check_stops(candle);
            for hit in hits {
                let reason = match hit.reason {
                    StopHitReason::StopLoss => CloseReason::StopLoss,
                    StopHitReason::TakeProfit => CloseReason::TakeProfit,
                };
                if let Some(pnl) = sim.close(hit.ticket, hit.exit_price, candle.timestamp_ms, reason) {
                    let _ = pnl;
                }
                let tickets_now_closed: Vec<ClosedTrade> = sim
                    .closed_positions()
                    .iter()
                    .filter(|p| p.ticket == hit.ticket)
                    .map(|p| ClosedTrade::from_position(p, self.config.pip_size))
                    .collect();
                closed_trades.extend(tickets_now_closed);
                decrement_open_counters(&mut ctx, symbol);
            }

            // 3. News-avoid gate.
            let date_ymd = date_key(candle.timestamp_ms);
            if news_gate.is_blocked(symbol, &date_ymd) {
                bar_count += 1;
                maybe_snapshot(
                    &self.config,
                    &mut equity_tracker,
                    &mut equity_curve,
                    &sim,
                    &last_price,
                    candle.timestamp_ms,
                    bar_count,
                );
                continue;
            }

            // 4-6. Evaluate strategy, gate, and open.
            let htf_view = store.recent(symbol, self.config.htf, self.config.htf_bars);
            let itf_view = store.recent(symbol, self.config.itf, self.config.itf_bars);
            let ltf_view = store.recent(symbol, self.config.ltf, self.config.ltf_bars);

            let htf_analysis = analyzer.analyze(&htf_view);
            let itf_analysis = analyzer.analyze(&itf_view);
            let ltf_analysis = analyzer.analyze(&ltf_view);

            for direction in [Direction::Bullish, Direction::Bearish] {
                let view = MultiTimeframeView {
                    htf: &htf_analysis,
                    itf: &itf_analysis,
                    ltf: &ltf_analysis,
                    ltf_candles: &ltf_view,
                    ltf_timeframe: self.config.ltf,
                };
                let outcome = synth.synthesize(symbol, direction, &view, candle.timestamp_ms);
                let crate::domain::signal::Outcome::Ok(intent) = outcome else {
                    continue;
                };

                let risk_amount = sim.balance() * self.config.risk_percent / Decimal::from(100);
                let risk_per_unit = intent.risk_per_unit();
                if risk_per_unit.is_zero() {
                    continue;
                }
                let candidate_risk_dollars = risk_amount;

                let gate_input = GateInput {
                    intent: &intent,
                    strategy: &self.config.strategy,
                    date_ymd: &date_ymd,
                    timestamp_ms: candle.timestamp_ms,
                    spread_pips: Decimal::ZERO,
                    session_minute_of_day: minute_of_day(candle.timestamp_ms),
                    news_blocked: false,
                    guardrail_mode: GuardrailMode::Normal,
                    candidate_risk_dollars,
                };
                let decision = match filter.evaluate(&gate_input, &ctx) {
                    Ok(d) => d,
                    Err(_reasons) => continue,
                };

                // 5. Size the position.
                let raw_lot = (risk_amount * decision.risk_percent_multiplier)
                    / (risk_per_unit * self.config.contract_size * self.config.pip_value);
                let lot = raw_lot
                    .max(self.config.min_lot)
                    .min(self.config.max_lot)
                    .round_dp(2);

                // 6. Open position, update counters.
                sim.open(&intent, candle, lot, &self.config.strategy);
                ctx.last_trade_ts
                    .insert((symbol.clone(), self.config.strategy.clone()), candle.timestamp_ms);
                *ctx.daily_trade_count
                    .entry((symbol.clone(), self.config.strategy.clone(), date_ymd.clone()))
                    .or_insert(0) += 1;
                *ctx.open_positions_per_symbol.entry(symbol.clone()).or_insert(0) += 1;
                *ctx.open_positions_per_symbol_direction
                    .entry((symbol.clone(), format!("{direction:?}")))
                    .or_insert(0) += 1;
                ctx.open_positions_global += 1;
                *ctx.daily_risk_dollars_per_symbol
                    .entry((symbol.clone(), date_ymd.clone()))
                    .or_insert(Decimal::ZERO) += candidate_risk_dollars;
                ctx.daily_risk_dollars_global += candidate_risk_dollars;
            }

            // 7. Periodic equity snapshot.
            bar_count += 1;
            maybe_snapshot(
                &self.config,
                &mut equity_tracker,
                &mut equity_curve,
                &sim,
                &last_price,
                candle.timestamp_ms,
                bar_count,
            );
        }

        let end_ts = bars.last().map(|(_, c)| c.timestamp_ms).unwrap_or(0);
        if cancelled {
            // Flush partial results as-is; open positions are left open.
        } else {
            sim.force_close_all(|sym| last_price.get(sym).copied().unwrap_or(Decimal::ZERO), end_ts);
            closed_trades = sim
                .closed_positions()
                .iter()
                .map(|p| ClosedTrade::from_position(p, self.config.pip_size))
                .collect();
            let point = equity_tracker.record(end_ts, sim.balance(), sim.balance());
            equity_curve.push(point);

            let stats = compute_stats(&closed_trades, &equity_curve);
            let result = ReplayResult {
                run_id,
                params: params.clone(),
                trades: closed_trades,
                equity_curve,
                stats,
                initial_balance: self.config.initial_balance,
                final_balance: sim.balance(),
                runtime_ms: start.elapsed().as_millis() as u64,
            };
            return Ok(ReplayOutcome::Completed(result));
        }

        let stats = compute_stats(&closed_trades, &equity_curve);
        let result = ReplayResult {
            run_id,
            params: params.clone(),
            trades: closed_trades,
            equity_curve,
            stats,
            initial_balance: self.config.initial_balance,
            final_balance: sim.balance(),
            runtime_ms: start.elapsed().as_millis() as u64,
        };
        Ok(ReplayOutcome::Cancelled(result))
    }
}

fn decrement_open_counters(ctx: &mut TradeContext, symbol: &str) {
    if let Some(v) = ctx.open_positions_per_symbol.get_mut(symbol) {
        *v = v.saturating_sub(1);
    }
    if ctx.open_positions_global > 0 {
        ctx.open_positions_global -= 1;
    }
}

fn maybe_snapshot(
    config: &ReplayConfig,
    tracker: &mut EquityTracker,
    curve: &mut Vec<crate::domain::equity::EquityPoint>,
    sim: &FillSimulator,
    last_price: &HashMap<String, Decimal>,
    timestamp_ms: i64,
    bar_count: u32,
) {
    if bar_count % config.equity_snapshot_every_n_bars.max(1) != 0 {
        return;
    }
    let equity = sim.equity(|symbol| last_price.get(symbol).copied());
    let point = tracker.record(timestamp_ms, sim.balance(), equity);
    curve.push(point);
}

fn minute_of_day(timestamp_ms: i64) -> u32 {
    let seconds_of_day = (timestamp_ms / 1000).rem_euclid(86_400);
    (seconds_of_day / 60) as u32
}

fn date_key(timestamp_ms: i64) -> String {
    let days_since_epoch = timestamp_ms.div_euclid(86_400_000);
    let datetime = chrono::DateTime::from_timestamp(days_since_epoch * 86_400, 0)
        .unwrap_or_default();
    datetime.format("%Y-%m-%d").to_string()
}
