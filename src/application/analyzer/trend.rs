use crate::domain::candle::Candle;
use crate::domain::swing::{BosEvent, Direction, SwingPoint, SwingType, TrendBias, TrendSnapshot};

/// Emits one snapshot per bar (§4.2 "Trend bias snapshot"). Bullish iff
/// the last `min_swing_pairs` highs and lows both strictly increase (HH,
/// HL) and the most recent BOS at-or-before the bar is bullish; bearish
/// symmetric; else sideways.
pub fn trend_snapshots(
    candles: &[Candle],
    swings: &[SwingPoint],
    bos_events: &[BosEvent],
    min_swing_pairs: usize,
) -> Vec<TrendSnapshot> {
    let mut out = Vec::with_capacity(candles.len());
    let mut sorted_bos: Vec<&BosEvent> = bos_events.iter().collect();
    sorted_bos.sort_by_key(|b| b.index);

    for i in 0..candles.len() {
        let highs: Vec<rust_decimal::Decimal> = swings
            .iter()
            .filter(|s| s.swing_type == SwingType::High && s.candle_index <= i)
            .map(|s| s.price)
            .collect();
        let lows: Vec<rust_decimal::Decimal> = swings
            .iter()
            .filter(|s| s.swing_type == SwingType::Low && s.candle_index <= i)
            .map(|s| s.price)
            .collect();

        let last_bos_dir = sorted_bos
            .iter()
            .filter(|b| b.index <= i)
            .last()
            .map(|b| b.direction);

        let bias = if strictly_increasing_tail(&highs, min_swing_pairs)
            && strictly_increasing_tail(&lows, min_swing_pairs)
            && last_bos_dir == Some(Direction::Bullish)
        {
            TrendBias::Bullish
        } else if strictly_decreasing_tail(&highs, min_swing_pairs)
            && strictly_decreasing_tail(&lows, min_swing_pairs)
            && last_bos_dir == Some(Direction::Bearish)
        {
            TrendBias::Bearish
        } else {
            TrendBias::Sideways
        };

        let pd_position = match (lows.last(), highs.last()) {
            (Some(&low), Some(&high)) if high != low => {
                let raw = ((candles[i].close - low) / (high - low))
                    .to_string()
                    .parse::<f64>()
                    .unwrap_or(0.0);
                Some(raw.clamp(0.0, 1.0))
            }
            _ => None,
        };

        out.push(TrendSnapshot {
            index: i,
            timestamp_ms: candles[i].timestamp_ms,
            bias,
            pd_position,
        });
    }

    out
}

fn strictly_increasing_tail(values: &[rust_decimal::Decimal], min_pairs: usize) -> bool {
    if values.len() < min_pairs.max(2) {
        return false;
    }
    let tail = &values[values.len() - min_pairs.max(2)..];
    tail.windows(2).all(|w| w[1] > w[0])
}

fn strictly_decreasing_tail(values: &[rust_decimal::Decimal], min_pairs: usize) -> bool {
    if values.len() < min_pairs.max(2) {
        return false;
    }
    let tail = &values[values.len() - min_pairs.max(2)..];
    tail.windows(2).all(|w| w[1] < w[0])
}
