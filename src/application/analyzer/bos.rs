use crate::domain::candle::Candle;
use crate::domain::swing::{BosEvent, Direction, SwingPoint, SwingType};

/// Scans each candle against the `min_swing_distance` most recent unbroken
/// swings; a bullish BOS fires when the close crosses a swing high, bearish
/// symmetric (§4.2 "BOS detection"). Marks consumed swings `broken` in
/// place so they are never reconsidered.
pub fn detect_bos(
    candles: &[Candle],
    swings: &mut [SwingPoint],
    min_swing_distance: usize,
    strict_close: bool,
) -> Vec<BosEvent> {
    let k = min_swing_distance.max(1);
    let mut events = Vec::new();

    for i in 0..candles.len() {
        let close = candles[i].close;
        let high = candles[i].high;
        let low = candles[i].low;

        // Most recent K unbroken swings strictly before this candle.
        let candidates: Vec<usize> = swings
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.broken && s.candle_index < i)
            .map(|(idx, _)| idx)
            .rev()
            .take(k)
            .collect();

        for swing_idx in candidates {
            let swing = swings[swing_idx];
            let direction = match swing.swing_type {
                SwingType::High => Direction::Bullish,
                SwingType::Low => Direction::Bearish,
            };
            let crossed = match swing.swing_type {
                SwingType::High => {
                    if strict_close {
                        close > swing.price
                    } else {
                        high > swing.price
                    }
                }
                SwingType::Low => {
                    if strict_close {
                        close < swing.price
                    } else {
                        low < swing.price
                    }
                }
            };
            if crossed {
                swings[swing_idx].broken = true;
                events.push(BosEvent {
                    index: i,
                    direction,
                    broken_swing_index: swing_idx,
                    broken_swing_type: swing.swing_type,
                    level: swing.price,
                    timestamp_ms: candles[i].timestamp_ms,
                    strict_close,
                });
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(i: i64, close: Decimal, high: Decimal, low: Decimal) -> Candle {
        Candle {
            symbol: "EURUSD".to_string(),
            timestamp_ms: i * 60_000,
            open: close,
            high,
            low,
            close,
            volume: dec!(1),
            timeframe: crate::domain::timeframe::Timeframe::M1,
        }
    }

    #[test]
    fn bullish_close_crosses_swing_high() {
        let candles = vec![
            candle(1, dec!(100), dec!(101), dec!(99)),
            candle(2, dec!(102), dec!(103), dec!(101)),
        ];
        let mut swings = vec![SwingPoint {
            candle_index: 0,
            swing_type: SwingType::High,
            price: dec!(101),
            timestamp_ms: 60_000,
            broken: false,
        }];
        let events = detect_bos(&candles, &mut swings, 3, true);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::Bullish);
        assert!(swings[0].broken);
    }

    #[test]
    fn wick_only_break_rejected_in_strict_mode() {
        let candles = vec![
            candle(1, dec!(100), dec!(101), dec!(99)),
            candle(2, dec!(100), dec!(102), dec!(99)), // wick above 101, close back at 100
        ];
        let mut swings = vec![SwingPoint {
            candle_index: 0,
            swing_type: SwingType::High,
            price: dec!(101),
            timestamp_ms: 60_000,
            broken: false,
        }];
        let events = detect_bos(&candles, &mut swings, 3, true);
        assert!(events.is_empty());
    }

    #[test]
    fn broken_swing_is_not_reconsidered() {
        let candles = vec![
            candle(1, dec!(100), dec!(101), dec!(99)),
            candle(2, dec!(102), dec!(103), dec!(101)),
            candle(3, dec!(104), dec!(105), dec!(102)),
        ];
        let mut swings = vec![SwingPoint {
            candle_index: 0,
            swing_type: SwingType::High,
            price: dec!(101),
            timestamp_ms: 60_000,
            broken: false,
        }];
        let events = detect_bos(&candles, &mut swings, 3, true);
        assert_eq!(events.len(), 1, "swing must fire exactly once");
    }
}
