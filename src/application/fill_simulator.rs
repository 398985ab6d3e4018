use rust_decimal::Decimal;

use crate::domain::candle::Candle;
use crate::domain::position::{CloseReason, SimulatedPosition};
use crate::domain::signal::TradeIntent;
use crate::domain::swing::Direction;

/// Stop/target tie-break when one bar's `[low, high]` contains both
/// levels. The source was inconsistent here; this engine defaults to the
/// conservative reading and exposes the alternative as an explicit,
/// documented toggle rather than guessing silently (§9 open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    StopWins,
    TargetWins,
}

impl Default for FillPolicy {
    fn default() -> Self {
        FillPolicy::StopWins
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FillSimulatorConfig {
    pub contract_size: Decimal,
    pub spread: Decimal,
    pub slippage: Decimal,
    pub fill_policy: FillPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopHitReason {
    StopLoss,
    TakeProfit,
}

#[derive(Debug, Clone, Copy)]
pub struct StopHit {
    pub ticket: u64,
    pub reason: StopHitReason,
    pub exit_price: Decimal,
}

/// Owns the open position book and realized balance for one replay
/// (§4.5). Deterministic: the same bar sequence and intents always
/// produce a byte-identical closed-trade ledger.
pub struct FillSimulator {
    config: FillSimulatorConfig,
    next_ticket: u64,
    open: Vec<SimulatedPosition>,
    closed: Vec<SimulatedPosition>,
    realized_pnl: Decimal,
    initial_balance: Decimal,
}

impl FillSimulator {
    pub fn new(initial_balance: Decimal, config: FillSimulatorConfig) -> Self {
        Self {
            config,
            next_ticket: 1,
            open: Vec::new(),
            closed: Vec::new(),
            realized_pnl: Decimal::ZERO,
            initial_balance,
        }
    }

    pub fn open_positions(&self) -> &[SimulatedPosition] {
        &self.open
    }

    pub fn closed_positions(&self) -> &[SimulatedPosition] {
        &self.closed
    }

    /// Assigns a ticket, applies spread/slippage to the fill price.
    /// `strategy` is the identifier recorded on the resulting
    /// `ClosedTrade` for per-strategy metric grouping (§4.9).
    pub fn open(&mut self, intent: &TradeIntent, bar: &Candle, volume: Decimal, strategy: &str) -> u64 {
        let half_spread = self.config.spread / Decimal::TWO;
        let fill_price = match intent.direction {
            Direction::Bullish => bar.open + half_spread + self.config.slippage,
            Direction::Bearish => bar.open - half_spread - self.config.slippage,
        };
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.open.push(SimulatedPosition {
            ticket,
            symbol: intent.symbol.clone(),
            strategy: strategy.to_string(),
            direction: intent.direction,
            volume,
            entry_price: fill_price,
            sl: intent.stop_loss,
            tp: intent.take_profit,
            open_time_ms: bar.timestamp_ms,
            close_time_ms: None,
            close_price: None,
            close_reason: None,
            realized_pnl: None,
        });
        ticket
    }

    /// Checks every open position on `bar.symbol` against `[bar.low,
    /// bar.high]`. When both SL and TP fall inside the bar, the
    /// configured `fill_policy` decides the winner (§8 P9 default).
    pub fn check_stops(&self, bar: &Candle) -> Vec<StopHit> {
        let mut hits = Vec::new();
        for pos in self.open.iter().filter(|p| p.symbol == bar.symbol) {
            let (sl_hit, tp_hit) = match pos.direction {
                Direction::Bullish => (bar.low <= pos.sl, bar.high >= pos.tp),
                Direction::Bearish => (bar.high >= pos.sl, bar.low <= pos.tp),
            };
            let reason = match (sl_hit, tp_hit) {
                (true, true) => Some(match self.config.fill_policy {
                    FillPolicy::StopWins => StopHitReason::StopLoss,
                    FillPolicy::TargetWins => StopHitReason::TakeProfit,
                }),
                (true, false) => Some(StopHitReason::StopLoss),
                (false, true) => Some(StopHitReason::TakeProfit),
                (false, false) => None,
            };
            if let Some(reason) = reason {
                let exit_price = match reason {
                    StopHitReason::StopLoss => pos.sl,
                    StopHitReason::TakeProfit => pos.tp,
                };
                hits.push(StopHit {
                    ticket: pos.ticket,
                    reason,
                    exit_price,
                });
            }
        }
        hits
    }

    /// Applies exit spread, computes realized PnL, moves the position to
    /// the closed list.
    pub fn close(
        &mut self,
        ticket: u64,
        raw_exit_price: Decimal,
        exit_time_ms: i64,
        close_reason: CloseReason,
    ) -> Option<Decimal> {
        let idx = self.open.iter().position(|p| p.ticket == ticket)?;
        let mut pos = self.open.remove(idx);

        let half_spread = self.config.spread / Decimal::TWO;
        let exit_price = match pos.direction {
            Direction::Bullish => raw_exit_price - half_spread,
            Direction::Bearish => raw_exit_price + half_spread,
        };
        let diff = match pos.direction {
            Direction::Bullish => exit_price - pos.entry_price,
            Direction::Bearish => pos.entry_price - exit_price,
        };
        let pnl = diff * pos.volume * self.config.contract_size;

        pos.close_time_ms = Some(exit_time_ms);
        pos.close_price = Some(exit_price);
        pos.close_reason = Some(close_reason);
        pos.realized_pnl = Some(pnl);

        self.realized_pnl += pnl;
        self.closed.push(pos);
        Some(pnl)
    }

    pub fn balance(&self) -> Decimal {
        self.initial_balance + self.realized_pnl
    }

    pub fn equity(&self, marks: impl Fn(&str) -> Option<Decimal>) -> Decimal {
        let unrealized: Decimal = self
            .open
            .iter()
            .filter_map(|p| marks(&p.symbol).map(|price| p.unrealized_pnl(price, self.config.contract_size)))
            .sum();
        self.balance() + unrealized
    }

    /// Forces every open position closed at its own symbol's last known
    /// price, used at replay termination (§4.6 "Termination").
    pub fn force_close_all(&mut self, last_price: impl Fn(&str) -> Decimal, at_ms: i64) {
        let tickets: Vec<u64> = self.open.iter().map(|p| p.ticket).collect();
        for ticket in tickets {
            if let Some(pos) = self.open.iter().find(|p| p.ticket == ticket) {
                let price = last_price(&pos.symbol);
                self.close(ticket, price, at_ms, CloseReason::ForcedClose);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn intent() -> TradeIntent {
        TradeIntent {
            symbol: "EURUSD".to_string(),
            direction: Direction::Bullish,
            entry: dec!(100),
            stop_loss: dec!(95),
            take_profit: dec!(115),
            htf_trend: crate::domain::swing::TrendBias::Bullish,
            confluence_score: 80,
            reasons: vec![],
        }
    }

    fn bar(ts: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Candle {
        Candle {
            symbol: "EURUSD".to_string(),
            timestamp_ms: ts,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: dec!(1),
            timeframe: crate::domain::timeframe::Timeframe::M1,
        }
    }

    fn config() -> FillSimulatorConfig {
        FillSimulatorConfig {
            contract_size: Decimal::ONE,
            spread: Decimal::ZERO,
            slippage: Decimal::ZERO,
            fill_policy: FillPolicy::StopWins,
        }
    }

    #[test]
    fn s1_single_bar_sl_hit() {
        let mut sim = FillSimulator::new(dec!(10000), config());
        let t0 = bar(0, dec!(100), dec!(101), dec!(99), dec!(100));
        let ticket = sim.open(&intent(), &t0, Decimal::ONE, "smc");

        let t1 = bar(60_000, dec!(99), dec!(100), dec!(94), dec!(96));
        let hits = sim.check_stops(&t1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].reason, StopHitReason::StopLoss);
        assert_eq!(hits[0].exit_price, dec!(95));

        let pnl = sim.close(ticket, hits[0].exit_price, t1.timestamp_ms, CloseReason::StopLoss);
        assert_eq!(pnl, Some(dec!(-5)));
        assert_eq!(sim.balance(), dec!(9995));
    }

    #[test]
    fn s2_stop_wins_tie_break() {
        let mut sim = FillSimulator::new(dec!(10000), config());
        let t0 = bar(0, dec!(100), dec!(101), dec!(99), dec!(100));
        let ticket = sim.open(&intent(), &t0, Decimal::ONE, "smc");

        // Both SL (95) and TP (115) fall inside [90, 120].
        let t1 = bar(60_000, dec!(99), dec!(120), dec!(90), dec!(118));
        let hits = sim.check_stops(&t1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].reason, StopHitReason::StopLoss);
        assert_eq!(hits[0].exit_price, dec!(95));

        let pnl = sim.close(ticket, hits[0].exit_price, t1.timestamp_ms, CloseReason::StopLoss);
        assert_eq!(pnl, Some(dec!(-5)));
    }

    #[test]
    fn pnl_identity_holds_across_multiple_trades() {
        let mut sim = FillSimulator::new(dec!(10000), config());
        for i in 0..3 {
            let open_bar = bar(
                i * 120_000,
                dec!(100),
                dec!(101),
                dec!(99),
                dec!(100),
            );
            let ticket = sim.open(&intent(), &open_bar, Decimal::ONE, "smc");
            let close_bar = bar(
                i * 120_000 + 60_000,
                dec!(99),
                dec!(100),
                dec!(94),
                dec!(96),
            );
            let hits = sim.check_stops(&close_bar);
            sim.close(ticket, hits[0].exit_price, close_bar.timestamp_ms, CloseReason::StopLoss);
        }
        let total_pnl: Decimal = sim.closed_positions().iter().filter_map(|p| p.realized_pnl).sum();
        assert_eq!(total_pnl, sim.balance() - dec!(10000));
    }

    #[test]
    fn open_records_the_strategy_identifier() {
        let mut sim = FillSimulator::new(dec!(10000), config());
        let t0 = bar(0, dec!(100), dec!(101), dec!(99), dec!(100));
        sim.open(&intent(), &t0, Decimal::ONE, "smc_breakout");
        assert_eq!(sim.open_positions()[0].strategy, "smc_breakout");
    }
}
