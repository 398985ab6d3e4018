use crate::domain::candle::Candle;
use crate::domain::swing::{Bias, BosEvent, ChochEvent, Direction, MsbEvent, StructuralLeg, SwingPoint, SwingType};

/// Anchor-swing bias register, run once over the chronological BOS
/// stream (§4.2 "Anchor-swing CHoCH state machine"). The hardest and
/// most error-prone algorithm in the analyzer; followed exhaustively
/// from the transition table.
struct State {
    bias: Bias,
    anchor: Option<SwingPoint>,
    last_confirmed_high: Option<SwingPoint>,
    last_confirmed_low: Option<SwingPoint>,
}

pub fn run_state_machine(
    candles: &[Candle],
    swings: &[SwingPoint],
    bos_events: &[BosEvent],
    legs: &[StructuralLeg],
) -> (Vec<ChochEvent>, Vec<MsbEvent>) {
    let mut ordered: Vec<&BosEvent> = bos_events.iter().collect();
    ordered.sort_by_key(|b| b.index);

    let mut state = State {
        bias: Bias::Unknown,
        anchor: None,
        last_confirmed_high: None,
        last_confirmed_low: None,
    };
    let mut choch_events = Vec::new();
    let mut swing_cursor = 0usize;

    for bos in ordered {
        // Fold in any swings confirmed strictly before this BOS index.
        while swing_cursor < swings.len() && swings[swing_cursor].candle_index < bos.index {
            let s = swings[swing_cursor];
            match s.swing_type {
                SwingType::High => state.last_confirmed_high = Some(s),
                SwingType::Low => state.last_confirmed_low = Some(s),
            }
            swing_cursor += 1;
        }

        match (state.bias, bos.direction) {
            (Bias::Unknown, Direction::Bullish) => {
                state.bias = Bias::Bullish;
                state.anchor = most_recent_swing_before(swings, bos.index, SwingType::Low);
            }
            (Bias::Unknown, Direction::Bearish) => {
                state.bias = Bias::Bearish;
                state.anchor = most_recent_swing_before(swings, bos.index, SwingType::High);
            }
            (Bias::Bullish, Direction::Bullish) => {
                if let Some(broken) = swings.get(bos.broken_swing_index) {
                    state.last_confirmed_high = Some(*broken);
                }
            }
            (Bias::Bearish, Direction::Bearish) => {
                if let Some(broken) = swings.get(bos.broken_swing_index) {
                    state.last_confirmed_low = Some(*broken);
                }
            }
            (Bias::Bullish, Direction::Bearish) => {
                let close = candles[bos.index].close;
                let broken = state.anchor.map(|a| close < a.price).unwrap_or(false);
                if broken {
                    choch_events.push(ChochEvent {
                        index: bos.index,
                        from_trend: Bias::Bullish,
                        to_trend: Bias::Bearish,
                        broken_swing_index: bos.broken_swing_index,
                        broken_swing_type: bos.broken_swing_type,
                        level: state.anchor.map(|a| a.price).unwrap_or(bos.level),
                        bos_index: bos.index,
                    });
                    state.bias = Bias::Bearish;
                    state.anchor = state.last_confirmed_high;
                }
            }
            (Bias::Bearish, Direction::Bullish) => {
                let close = candles[bos.index].close;
                let broken = state.anchor.map(|a| close > a.price).unwrap_or(false);
                if broken {
                    choch_events.push(ChochEvent {
                        index: bos.index,
                        from_trend: Bias::Bearish,
                        to_trend: Bias::Bullish,
                        broken_swing_index: bos.broken_swing_index,
                        broken_swing_type: bos.broken_swing_type,
                        level: state.anchor.map(|a| a.price).unwrap_or(bos.level),
                        bos_index: bos.index,
                    });
                    state.bias = Bias::Bullish;
                    state.anchor = state.last_confirmed_low;
                }
            }
        }
    }

    let msb_events = filter_major(swings, &choch_events, legs);
    (choch_events, msb_events)
}

fn most_recent_swing_before(
    swings: &[SwingPoint],
    index: usize,
    swing_type: SwingType,
) -> Option<SwingPoint> {
    swings
        .iter()
        .rev()
        .find(|s| s.candle_index < index && s.swing_type == swing_type)
        .copied()
}

/// MSB events are the subset of CHoCH events whose broken swing also
/// appears as the dominant extreme of a major structural leg (§8 P7).
fn filter_major(
    swings: &[SwingPoint],
    choch_events: &[ChochEvent],
    legs: &[StructuralLeg],
) -> Vec<MsbEvent> {
    choch_events
        .iter()
        .filter(|e| {
            let Some(swing) = swings.get(e.broken_swing_index) else {
                return false;
            };
            legs.iter().any(|leg| {
                leg.is_major
                    && match swing.swing_type {
                        SwingType::High => leg.high_index == swing.candle_index,
                        SwingType::Low => leg.low_index == swing.candle_index,
                    }
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn flat_candles(closes: &[(i64, &str)]) -> Vec<Candle> {
        closes
            .iter()
            .map(|(ts, close)| Candle {
                symbol: "EURUSD".to_string(),
                timestamp_ms: *ts,
                open: close.parse().unwrap(),
                high: close.parse().unwrap(),
                low: close.parse().unwrap(),
                close: close.parse().unwrap(),
                volume: dec!(1),
                timeframe: crate::domain::timeframe::Timeframe::M1,
            })
            .collect()
    }

    #[test]
    fn choch_fires_once_then_ignores_non_breaching_bos() {
        // Bullish BOS at i=2 establishes bias bullish, anchor = swing low
        // at i=0 (price 100). Bearish BOS at i=3 with close below 100
        // fires CHoCH. A later bearish BOS at i=4 that doesn't cross a
        // new anchor must not fire again.
        let candles = flat_candles(&[
            (60_000, "100"),
            (120_000, "105"),
            (180_000, "110"),
            (240_000, "99"),
            (300_000, "98"),
        ]);
        let swings = vec![SwingPoint {
            candle_index: 0,
            swing_type: SwingType::Low,
            price: dec!(100),
            timestamp_ms: 60_000,
            broken: false,
        }];
        let bos = vec![
            BosEvent {
                index: 2,
                direction: Direction::Bullish,
                broken_swing_index: 0,
                broken_swing_type: SwingType::Low,
                level: dec!(100),
                timestamp_ms: 180_000,
                strict_close: true,
            },
            BosEvent {
                index: 3,
                direction: Direction::Bearish,
                broken_swing_index: 0,
                broken_swing_type: SwingType::Low,
                level: dec!(100),
                timestamp_ms: 240_000,
                strict_close: true,
            },
            BosEvent {
                index: 4,
                direction: Direction::Bearish,
                broken_swing_index: 0,
                broken_swing_type: SwingType::Low,
                level: dec!(100),
                timestamp_ms: 300_000,
                strict_close: true,
            },
        ];
        let (choch, _msb) = run_state_machine(&candles, &swings, &bos, &[]);
        assert_eq!(choch.len(), 1);
        assert_eq!(choch[0].index, 3);
        assert_eq!(choch[0].from_trend, Bias::Bullish);
        assert_eq!(choch[0].to_trend, Bias::Bearish);
    }

    #[test]
    fn msb_is_subset_of_choch() {
        let candles = flat_candles(&[(60_000, "100"), (120_000, "99")]);
        let swings = vec![SwingPoint {
            candle_index: 0,
            swing_type: SwingType::Low,
            price: dec!(100),
            timestamp_ms: 60_000,
            broken: false,
        }];
        let bos = vec![BosEvent {
            index: 1,
            direction: Direction::Bearish,
            broken_swing_index: 0,
            broken_swing_type: SwingType::Low,
            level: dec!(100),
            timestamp_ms: 120_000,
            strict_close: true,
        }];
        // bias starts Unknown so first bearish BOS just sets bias, no CHoCH.
        let (choch, msb) = run_state_machine(&candles, &swings, &bos, &[]);
        assert!(choch.is_empty());
        assert!(msb.iter().all(|m| choch.iter().any(|c| c.index == m.index)));
    }
}
