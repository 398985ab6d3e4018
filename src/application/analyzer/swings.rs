use crate::domain::candle::Candle;
use crate::domain::swing::{SwingPoint, SwingType};

/// Interchangeable pivot-detection modes (§4.2 "Swing detection").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingMode {
    /// Non-repainting: confirmed only `right` bars after the pivot.
    Fractal,
    /// Tracks the running argmax/argmin over a trailing window; emits
    /// when the argmax/argmin index changes.
    Rolling,
    /// Fractal for bars older than `right`, rolling to fill the tail.
    Hybrid,
}

pub fn detect_swings(
    candles: &[Candle],
    left: usize,
    right: usize,
    mode: SwingMode,
) -> Vec<SwingPoint> {
    match mode {
        SwingMode::Fractal => fractal_swings(candles, left, right),
        SwingMode::Rolling => rolling_swings(candles, left),
        SwingMode::Hybrid => {
            // Bars older than `right` bars from the tail can be confirmed
            // fractally; the unconfirmable tail is filled by rolling.
            let boundary = candles.len().saturating_sub(right);
            let mut out: Vec<SwingPoint> = fractal_swings(candles, left, right)
                .into_iter()
                .filter(|s| s.candle_index < boundary)
                .collect();
            if boundary < candles.len() {
                let tail_start = boundary.saturating_sub(left);
                let mut tail = rolling_swings(&candles[tail_start..], left);
                for s in &mut tail {
                    s.candle_index += tail_start;
                }
                tail.retain(|s| s.candle_index >= boundary);
                out.extend(tail);
            }
            out.sort_by_key(|s| s.candle_index);
            out
        }
    }
}

fn is_swing_high(candles: &[Candle], index: usize, left: usize, right: usize) -> bool {
    if index + right >= candles.len() {
        return false;
    }
    let high = candles[index].high;
    let left_span = left.min(index);
    for i in 1..=left_span {
        if candles[index - i].high >= high {
            return false;
        }
    }
    for i in 1..=right {
        if candles[index + i].high > high {
            return false;
        }
    }
    true
}

fn is_swing_low(candles: &[Candle], index: usize, left: usize, right: usize) -> bool {
    if index + right >= candles.len() {
        return false;
    }
    let low = candles[index].low;
    let left_span = left.min(index);
    for i in 1..=left_span {
        if candles[index - i].low <= low {
            return false;
        }
    }
    for i in 1..=right {
        if candles[index + i].low < low {
            return false;
        }
    }
    true
}

/// Index `i` is a swing high iff its high strictly exceeds all highs in
/// `[i-L, i+R] \ {i}`; symmetric for lows. Requires the full `R`-bar
/// right window (non-repainting delay) but clamps the left window to
/// whatever bars actually precede `i`, so a pivot at the very start of
/// the series can still qualify with fewer than `L` left neighbors; a
/// pivot within `R` bars of the end never qualifies. Ties break toward
/// the earlier index by construction (the strict `>=`/`<=` on the left
/// side rejects a later-equal candidate).
fn fractal_swings(candles: &[Candle], left: usize, right: usize) -> Vec<SwingPoint> {
    let mut out = Vec::new();
    for i in 0..candles.len() {
        if is_swing_high(candles, i, left, right) {
            out.push(SwingPoint {
                candle_index: i,
                swing_type: SwingType::High,
                price: candles[i].high,
                timestamp_ms: candles[i].timestamp_ms,
                broken: false,
            });
        }
        if is_swing_low(candles, i, left, right) {
            out.push(SwingPoint {
                candle_index: i,
                swing_type: SwingType::Low,
                price: candles[i].low,
                timestamp_ms: candles[i].timestamp_ms,
                broken: false,
            });
        }
    }
    out.sort_by_key(|s| s.candle_index);
    out
}

/// At each bar `i`, the index of the max high (min low) over `[i-W+1, i]`
/// is a candidate swing; emitted whenever that argmax/argmin changes.
fn rolling_swings(candles: &[Candle], window: usize) -> Vec<SwingPoint> {
    let window = window.max(1);
    let mut out = Vec::new();
    let mut last_high_idx: Option<usize> = None;
    let mut last_low_idx: Option<usize> = None;

    for i in 0..candles.len() {
        let start = i.saturating_sub(window - 1);
        let slice = &candles[start..=i];

        let (high_offset, _) = slice
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.high.cmp(&b.1.high).then(b.0.cmp(&a.0)))
            .unwrap();
        let high_idx = start + high_offset;

        let (low_offset, _) = slice
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.low.cmp(&b.1.low).then(a.0.cmp(&b.0)))
            .unwrap();
        let low_idx = start + low_offset;

        if last_high_idx != Some(high_idx) {
            out.push(SwingPoint {
                candle_index: high_idx,
                swing_type: SwingType::High,
                price: candles[high_idx].high,
                timestamp_ms: candles[high_idx].timestamp_ms,
                broken: false,
            });
            last_high_idx = Some(high_idx);
        }
        if last_low_idx != Some(low_idx) {
            out.push(SwingPoint {
                candle_index: low_idx,
                swing_type: SwingType::Low,
                price: candles[low_idx].low,
                timestamp_ms: candles[low_idx].timestamp_ms,
                broken: false,
            });
            last_low_idx = Some(low_idx);
        }
    }
    out.sort_by_key(|s| s.candle_index);
    out.dedup_by(|a, b| a.candle_index == b.candle_index && a.swing_type == b.swing_type);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn bars(highs: &[i64]) -> Vec<Candle> {
        highs
            .iter()
            .enumerate()
            .map(|(i, &h)| Candle {
                symbol: "EURUSD".to_string(),
                timestamp_ms: (i as i64 + 1) * 60_000,
                open: Decimal::from(h) - dec!(0.2),
                high: Decimal::from(h),
                low: Decimal::from(h) - dec!(1),
                close: Decimal::from(h) - dec!(0.1),
                volume: dec!(1),
                timeframe: crate::domain::timeframe::Timeframe::M1,
            })
            .collect()
    }

    #[test]
    fn fractal_swing_at_l2_r2() {
        // S3: highs [1,2,3,4,3,2,1,2,3]; swing high at index 3 (value 4),
        // swing low at indices 0 and 6 (value 1).
        let candles = bars(&[1, 2, 3, 4, 3, 2, 1, 2, 3]);
        let swings = detect_swings(&candles, 2, 2, SwingMode::Fractal);
        let highs: Vec<usize> = swings
            .iter()
            .filter(|s| s.swing_type == SwingType::High)
            .map(|s| s.candle_index)
            .collect();
        assert_eq!(highs, vec![3]);
        let lows: Vec<usize> = swings
            .iter()
            .filter(|s| s.swing_type == SwingType::Low)
            .map(|s| s.candle_index)
            .collect();
        assert_eq!(lows, vec![0, 6]);
    }

    #[test]
    fn fractal_symmetry_under_reversal() {
        let highs = vec![1, 5, 2, 6, 3, 7, 1, 8, 2];
        let candles = bars(&highs);
        // Negate and swap high/low: a local max of `high` in the mirror is
        // exactly a local min of `low` in the original, so swing types swap
        // at identical indices (§8 P5).
        let mirrored: Vec<Candle> = candles
            .iter()
            .map(|c| Candle {
                high: -c.low,
                low: -c.high,
                ..c.clone()
            })
            .collect();
        let original = detect_swings(&candles, 2, 2, SwingMode::Fractal);
        let swapped = detect_swings(&mirrored, 2, 2, SwingMode::Fractal);
        assert_eq!(original.len(), swapped.len());
        for (o, s) in original.iter().zip(swapped.iter()) {
            assert_eq!(o.candle_index, s.candle_index);
            assert_ne!(o.swing_type, s.swing_type);
        }
    }
}
