//! Combines HTF trend, ITF setup, and LTF entry refinement into at most
//! one trade intent per bar per symbol per strategy (§4.3).

mod risk;
mod zones;

pub use risk::RiskConfig;

use rust_decimal::Decimal;

use crate::domain::candle::Candle;
use crate::domain::signal::{Outcome, TradeIntent};
use crate::domain::swing::{AnalysisResult, Direction, SwingType, TrendBias};
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, Copy)]
pub struct SignalConfig {
    pub confluence_threshold: u8,
    pub ob_lookback: usize,
    pub fvg_min_size_pct: Decimal,
    pub volume_multiplier: Decimal,
    pub cluster_tolerance_pct: Decimal,
    pub risk: RiskConfig,
}

impl Default for SignalConfig {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            confluence_threshold: 60,
            ob_lookback: 20,
            fvg_min_size_pct: dec!(0.0005),
            volume_multiplier: dec!(1.5),
            cluster_tolerance_pct: zones::DEFAULT_CLUSTER_TOLERANCE_PCT,
            risk: RiskConfig::default(),
        }
    }
}

/// One analyzer output per working timeframe, already produced by the
/// structural analyzer for the current bar (§9: one analyzer type,
/// instantiated per timeframe rather than via inheritance).
pub struct MultiTimeframeView<'a> {
    pub htf: &'a AnalysisResult,
    pub itf: &'a AnalysisResult,
    pub ltf: &'a AnalysisResult,
    pub ltf_candles: &'a [Candle],
    pub ltf_timeframe: Timeframe,
}

pub struct SignalSynthesizer {
    config: SignalConfig,
}

impl SignalSynthesizer {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn synthesize(
        &self,
        symbol: &str,
        direction: Direction,
        view: &MultiTimeframeView,
        current_ts: i64,
    ) -> Outcome<TradeIntent> {
        let Some(htf_trend) = resolve_trend_at(view.htf, current_ts) else {
            return Outcome::Skip(vec!["no HTF trend snapshot available".to_string()]);
        };
        let required = match direction {
            Direction::Bullish => TrendBias::Bullish,
            Direction::Bearish => TrendBias::Bearish,
        };
        if htf_trend != required {
            return Outcome::Skip(vec!["HTF trend does not align".to_string()]);
        }

        let itf_trend = resolve_trend_at(view.itf, current_ts);
        let itf_recent_choch = view
            .itf
            .choch_events
            .iter()
            .any(|e| matches_direction(e.to_trend, direction));
        if itf_trend != Some(required) && !itf_recent_choch {
            return Outcome::Skip(vec!["ITF does not confirm HTF trend".to_string()]);
        }

        let mut reasons = Vec::new();
        let mut score: u32 = 0;

        let clusters = zones::cluster_levels(
            &view.ltf.swings,
            opposite_swing_type(direction),
            self.config.cluster_tolerance_pct,
        );
        let swept = zones::detect_liquidity_sweep(view.ltf_candles, &clusters, direction);
        if !swept {
            return Outcome::Skip(vec!["no liquidity sweep on LTF".to_string()]);
        }
        reasons.push("liquidity sweep confirmed".to_string());
        score += 30;

        let ob = zones::find_last_order_block(
            view.ltf_candles,
            direction,
            self.config.ob_lookback,
            self.config.volume_multiplier,
        );
        let Some(ob) = ob.filter(|o| !o.mitigated) else {
            return Outcome::Skip(vec!["no intact LTF order block".to_string()]);
        };
        reasons.push("order block intact".to_string());
        score += 25;

        let ltf_bos_in_direction = view
            .ltf
            .bos_events
            .iter()
            .any(|e| matches_direction_bos(e.direction, direction));
        if !ltf_bos_in_direction {
            return Outcome::Skip(vec!["no LTF BOS in trade direction".to_string()]);
        }
        reasons.push("LTF BOS confirms direction".to_string());
        score += 25;

        let fvgs = zones::detect_fair_value_gaps(
            view.ltf_candles,
            self.config.fvg_min_size_pct,
            view.ltf_timeframe,
        );
        let fvg = fvgs
            .iter()
            .find(|f| f.direction == direction && !f.filled && overlaps(f.low, f.high, ob.low, ob.high));
        if let Some(fvg) = fvg {
            reasons.push("FVG in order block region".to_string());
            score += 20;
            let _ = fvg;
        }

        let confluence_score = score.min(100) as u8;
        if confluence_score < self.config.confluence_threshold {
            return Outcome::Skip(vec![format!(
                "confluence score {confluence_score} below threshold {}",
                self.config.confluence_threshold
            )]);
        }

        let entry = match view.ltf_candles.last() {
            Some(c) => c.close,
            None => return Outcome::Skip(vec!["no LTF candle available".to_string()]),
        };
        let swing_extreme = most_recent_swing_extreme(&view.ltf.swings, opposite_swing_type(direction));
        let stop = risk::derive_stop(
            direction,
            entry,
            Some(&ob),
            fvg,
            swing_extreme,
            view.ltf_candles,
            &self.config.risk,
        );
        let target_clusters = zones::cluster_levels(
            &view.ltf.swings,
            same_swing_type(direction),
            self.config.cluster_tolerance_pct,
        );
        let take_profit = risk::derive_target(direction, entry, stop, &target_clusters, &self.config.risk);

        Outcome::Ok(TradeIntent {
            symbol: symbol.to_string(),
            direction,
            entry,
            stop_loss: stop,
            take_profit,
            htf_trend,
            confluence_score,
            reasons,
        })
    }
}

fn resolve_trend_at(analysis: &AnalysisResult, current_ts: i64) -> Option<TrendBias> {
    analysis
        .trend_snapshots
        .iter()
        .filter(|s| s.timestamp_ms <= current_ts)
        .last()
        .map(|s| s.bias)
}

fn matches_direction(bias: crate::domain::swing::Bias, direction: Direction) -> bool {
    matches!(
        (bias, direction),
        (crate::domain::swing::Bias::Bullish, Direction::Bullish)
            | (crate::domain::swing::Bias::Bearish, Direction::Bearish)
    )
}

fn matches_direction_bos(bos_dir: Direction, direction: Direction) -> bool {
    bos_dir == direction
}

fn opposite_swing_type(direction: Direction) -> SwingType {
    match direction {
        Direction::Bullish => SwingType::Low,
        Direction::Bearish => SwingType::High,
    }
}

fn same_swing_type(direction: Direction) -> SwingType {
    match direction {
        Direction::Bullish => SwingType::High,
        Direction::Bearish => SwingType::Low,
    }
}

fn most_recent_swing_extreme(
    swings: &[crate::domain::swing::SwingPoint],
    swing_type: SwingType,
) -> Option<Decimal> {
    swings
        .iter()
        .rev()
        .find(|s| s.swing_type == swing_type)
        .map(|s| s.price)
}

fn overlaps(a_low: Decimal, a_high: Decimal, b_low: Decimal, b_high: Decimal) -> bool {
    a_high >= b_low && a_low <= b_high
}
