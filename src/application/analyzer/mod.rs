//! Per-timeframe structural analyzer: swings, break-of-structure,
//! anchor-swing CHoCH/MSB, and per-bar trend bias (§4.2).
//!
//! One analyzer is parameterized by `{pivot_left, pivot_right, lookback,
//! min_swing_distance}` and instantiated once per timeframe a signal
//! evaluation needs (HTF/ITF/LTF), replacing what the source modeled as
//! three separate classes (§9).

mod bos;
mod choch;
mod legs;
mod swings;
mod trend;

pub use swings::SwingMode;

use crate::domain::candle::Candle;
use crate::domain::swing::AnalysisResult;

#[derive(Debug, Clone, Copy)]
pub struct AnalyzerConfig {
    pub pivot_left: usize,
    pub pivot_right: usize,
    pub lookback: usize,
    pub min_swing_distance: usize,
    pub swing_mode: SwingMode,
    pub strict_close: bool,
    pub min_swing_pairs: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            pivot_left: 2,
            pivot_right: 2,
            lookback: 100,
            min_swing_distance: 3,
            swing_mode: SwingMode::Fractal,
            strict_close: true,
            min_swing_pairs: 2,
        }
    }
}

pub struct StructuralAnalyzer {
    config: AnalyzerConfig,
}

impl StructuralAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Runs the full pipeline over a snapshot of one timeframe's candles.
    /// Returns empty event lists on insufficient data rather than failing
    /// (§4.2 "Failures").
    pub fn analyze(&self, candles: &[Candle]) -> AnalysisResult {
        let min_bars = self.config.pivot_left + self.config.pivot_right + 1;
        if candles.len() < min_bars {
            return AnalysisResult::default();
        }

        let mut swings = swings::detect_swings(
            candles,
            self.config.pivot_left,
            self.config.pivot_right,
            self.config.swing_mode,
        );
        let bos_events = bos::detect_bos(
            candles,
            &mut swings,
            self.config.min_swing_distance,
            self.config.strict_close,
        );
        let legs = legs::derive_legs(candles, &swings);
        let (choch_events, msb_events) = choch::run_state_machine(candles, &swings, &bos_events, &legs);
        let trend_snapshots =
            trend::trend_snapshots(candles, &swings, &bos_events, self.config.min_swing_pairs);

        AnalysisResult {
            swings,
            bos_events,
            choch_events,
            msb_events,
            trend_snapshots,
        }
    }
}
