use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingType {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
        }
    }
}

/// A detected pivot, indexed by position within the analyzer's local
/// timeframe view (§9: never by pointer).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwingPoint {
    pub candle_index: usize,
    pub swing_type: SwingType,
    pub price: rust_decimal::Decimal,
    pub timestamp_ms: i64,
    /// Set true once a BOS has consumed this swing; it is never reconsidered.
    pub broken: bool,
}

/// Emitted when a candle's close crosses a prior swing's price (§3 "BOS
/// event").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BosEvent {
    pub index: usize,
    pub direction: Direction,
    pub broken_swing_index: usize,
    pub broken_swing_type: SwingType,
    pub level: rust_decimal::Decimal,
    pub timestamp_ms: i64,
    pub strict_close: bool,
}

/// A BOS opposite the prevailing bias that also breaches the anchor swing
/// (§3 "CHoCH event").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChochEvent {
    pub index: usize,
    pub from_trend: Bias,
    pub to_trend: Bias,
    pub broken_swing_index: usize,
    pub broken_swing_type: SwingType,
    pub level: rust_decimal::Decimal,
    pub bos_index: usize,
}

/// A CHoCH whose broken swing also qualifies as major by leg-length or
/// price-range dominance (§3 "MSB event", §4.2 "MSB derivation").
pub type MsbEvent = ChochEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bias {
    Unknown,
    Bullish,
    Bearish,
}

/// A run of >= 3 impulse candles of the same direction (§3 "Structural
/// swing leg").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StructuralLeg {
    pub start_index: usize,
    pub end_index: usize,
    pub direction: Direction,
    pub swing_high: rust_decimal::Decimal,
    pub swing_low: rust_decimal::Decimal,
    pub high_index: usize,
    pub low_index: usize,
    pub candle_count: usize,
    pub is_major: bool,
}

/// Trend bias emitted for every bar in the analyzed window (§4.2 "Trend
/// bias snapshot").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendBias {
    Bullish,
    Bearish,
    Sideways,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub index: usize,
    pub timestamp_ms: i64,
    pub bias: TrendBias,
    /// `(close - last_swing_low) / (last_swing_high - last_swing_low)`,
    /// clamped to `[0, 1]`; `None` if the range is zero.
    pub pd_position: Option<f64>,
}

/// Output of one full pass of the structural analyzer over a snapshot of
/// one timeframe's candles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub swings: Vec<SwingPoint>,
    pub bos_events: Vec<BosEvent>,
    pub choch_events: Vec<ChochEvent>,
    pub msb_events: Vec<MsbEvent>,
    pub trend_snapshots: Vec<TrendSnapshot>,
}
