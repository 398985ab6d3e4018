use crate::domain::candle::Candle;
use crate::domain::swing::{Direction, StructuralLeg, SwingPoint};

/// Segments the candle window into structural legs: runs of >= 3 impulse
/// candles of the same direction, where an impulse strictly extends the
/// prior impulse's extreme; a pullback is admitted only if it does not
/// close past the leg's own anchor extreme (§3 "Structural swing leg").
///
/// `swings` is accepted for symmetry with the rest of the pipeline but
/// legs are derived purely from candle direction/extension; swing indices
/// are not consulted here.
pub fn derive_legs(candles: &[Candle], _swings: &[SwingPoint]) -> Vec<StructuralLeg> {
    let mut legs = Vec::new();
    let mut i = 0;

    while i < candles.len() {
        let Some(dir) = candle_direction(&candles[i]) else {
            i += 1;
            continue;
        };

        let start = i;
        let mut high = candles[i].high;
        let mut low = candles[i].low;
        let mut high_index = i;
        let mut low_index = i;
        let mut impulse_count = 1;
        let mut end = i;
        let mut j = i + 1;

        while j < candles.len() {
            let c = &candles[j];
            let extends = match dir {
                Direction::Bullish => c.high > high,
                Direction::Bearish => c.low < low,
            };
            if extends {
                if c.high > high {
                    high = c.high;
                    high_index = j;
                }
                if c.low < low {
                    low = c.low;
                    low_index = j;
                }
                impulse_count += 1;
                end = j;
                j += 1;
                continue;
            }

            // Pullback: admitted only if it doesn't close past the leg's
            // own anchor extreme (the opposite extreme formed so far).
            let anchor_violated = match dir {
                Direction::Bullish => c.close < low,
                Direction::Bearish => c.close > high,
            };
            if anchor_violated {
                break;
            }
            end = j;
            j += 1;
        }

        if impulse_count >= 3 {
            legs.push(StructuralLeg {
                start_index: start,
                end_index: end,
                direction: dir,
                swing_high: high,
                swing_low: low,
                high_index,
                low_index,
                candle_count: end - start + 1,
                is_major: false,
            });
        }
        i = end.max(start) + 1;
    }

    mark_major(&mut legs);
    legs
}

fn candle_direction(c: &Candle) -> Option<Direction> {
    if c.close > c.open {
        Some(Direction::Bullish)
    } else if c.close < c.open {
        Some(Direction::Bearish)
    } else {
        None
    }
}

/// A leg is major if its bar count is >= 1.5x the mean, or its price
/// range is >= 1.5x the mean range (§4.2 "MSB derivation").
fn mark_major(legs: &mut [StructuralLeg]) {
    if legs.is_empty() {
        return;
    }
    let mean_len: f64 =
        legs.iter().map(|l| l.candle_count as f64).sum::<f64>() / legs.len() as f64;
    let mean_range: f64 = legs
        .iter()
        .map(|l| (l.swing_high - l.swing_low).to_string().parse::<f64>().unwrap_or(0.0))
        .sum::<f64>()
        / legs.len() as f64;

    for leg in legs.iter_mut() {
        let range: f64 = (leg.swing_high - leg.swing_low)
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0);
        leg.is_major =
            leg.candle_count as f64 >= 1.5 * mean_len || range >= 1.5 * mean_range;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

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

    #[test]
    fn three_impulse_run_forms_a_leg() {
        let candles = vec![
            bar(60_000, dec!(100), dec!(101), dec!(99), dec!(100.8)),
            bar(120_000, dec!(100.8), dec!(102), dec!(100), dec!(101.8)),
            bar(180_000, dec!(101.8), dec!(103), dec!(101), dec!(102.8)),
        ];
        let legs = derive_legs(&candles, &[]);
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].candle_count, 3);
        assert_eq!(legs[0].direction, Direction::Bullish);
    }

    #[test]
    fn two_impulse_run_is_not_a_leg() {
        let candles = vec![
            bar(60_000, dec!(100), dec!(101), dec!(99), dec!(100.8)),
            bar(120_000, dec!(100.8), dec!(102), dec!(100), dec!(101.8)),
        ];
        let legs = derive_legs(&candles, &[]);
        assert!(legs.is_empty());
    }
}
