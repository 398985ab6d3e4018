use rust_decimal::Decimal;

use crate::domain::candle::Candle;
use crate::domain::swing::Direction;
use crate::domain::zones::{FairValueGap, OrderBlock};

#[derive(Debug, Clone, Copy)]
pub struct RiskConfig {
    pub min_sl_distance: Decimal,
    pub min_reward_to_risk: Decimal,
    pub default_rr: Decimal,
    pub max_rr: Decimal,
    pub atr_period: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            min_sl_distance: dec!(0.0001),
            min_reward_to_risk: dec!(1.0),
            default_rr: dec!(2.0),
            max_rr: dec!(3.0),
            atr_period: 14,
        }
    }
}

fn atr(candles: &[Candle], period: usize) -> Decimal {
    if candles.is_empty() {
        return Decimal::ZERO;
    }
    let window = &candles[candles.len().saturating_sub(period)..];
    let mut prev_close: Option<Decimal> = None;
    let mut sum = Decimal::ZERO;
    let mut n = 0i64;
    for c in window {
        sum += c.true_range(prev_close);
        prev_close = Some(c.close);
        n += 1;
    }
    if n == 0 {
        Decimal::ZERO
    } else {
        sum / Decimal::from(n)
    }
}

/// Stop candidates in priority order: OB edge, FVG edge, most-recent LTF
/// swing extreme, else `entry +/- 1.5*ATR(14)` (§4.3 "Risk-level
/// derivation"). Returns the first candidate beyond entry by at least
/// `max(min_sl_distance, 0.01% * entry)`.
pub fn derive_stop(
    direction: Direction,
    entry: Decimal,
    ob: Option<&OrderBlock>,
    fvg: Option<&FairValueGap>,
    swing_extreme: Option<Decimal>,
    ltf_candles: &[Candle],
    config: &RiskConfig,
) -> Decimal {
    let min_distance = config
        .min_sl_distance
        .max(entry * Decimal::new(1, 4)); // 0.01% = entry * 0.0001

    let candidates: Vec<Decimal> = match direction {
        Direction::Bullish => vec![
            ob.map(|o| o.low),
            fvg.map(|f| f.low),
            swing_extreme,
        ]
        .into_iter()
        .flatten()
        .collect(),
        Direction::Bearish => vec![
            ob.map(|o| o.high),
            fvg.map(|f| f.high),
            swing_extreme,
        ]
        .into_iter()
        .flatten()
        .collect(),
    };

    for candidate in candidates {
        let distance = match direction {
            Direction::Bullish => entry - candidate,
            Direction::Bearish => candidate - entry,
        };
        if distance >= min_distance {
            return candidate;
        }
    }

    let fallback_distance = atr(ltf_candles, config.atr_period) * Decimal::new(15, 1); // 1.5x
    match direction {
        Direction::Bullish => entry - fallback_distance,
        Direction::Bearish => entry + fallback_distance,
    }
}

/// Nearest cluster beyond entry with reward-to-risk >= minimum, else
/// `risk * default_rr`, capped at `risk * max_rr` (§4.3 "Target candidate
/// set").
pub fn derive_target(
    direction: Direction,
    entry: Decimal,
    stop: Decimal,
    clusters: &[Decimal],
    config: &RiskConfig,
) -> Decimal {
    let risk = (entry - stop).abs();
    if risk.is_zero() {
        return entry;
    }
    let max_distance = risk * config.max_rr;

    let nearest = clusters
        .iter()
        .copied()
        .filter(|&level| match direction {
            Direction::Bullish => level > entry,
            Direction::Bearish => level < entry,
        })
        .min_by_key(|&level| (level - entry).abs());

    if let Some(level) = nearest {
        let reward = (level - entry).abs();
        let rr = reward / risk;
        if rr >= config.min_reward_to_risk {
            let capped_reward = reward.min(max_distance);
            return match direction {
                Direction::Bullish => entry + capped_reward,
                Direction::Bearish => entry - capped_reward,
            };
        }
    }

    let fallback_reward = (risk * config.default_rr).min(max_distance);
    match direction {
        Direction::Bullish => entry + fallback_reward,
        Direction::Bearish => entry - fallback_reward,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn stop_falls_back_to_atr_when_no_zones() {
        let candles: Vec<Candle> = (0..20)
            .map(|i| Candle {
                symbol: "EURUSD".to_string(),
                timestamp_ms: (i + 1) * 60_000,
                open: dec!(100),
                high: dec!(101),
                low: dec!(99),
                close: dec!(100),
                volume: dec!(1),
                timeframe: crate::domain::timeframe::Timeframe::M1,
            })
            .collect();
        let config = RiskConfig::default();
        let stop = derive_stop(
            Direction::Bullish,
            dec!(100),
            None,
            None,
            None,
            &candles,
            &config,
        );
        assert!(stop < dec!(100));
    }

    #[test]
    fn target_capped_at_max_rr() {
        let config = RiskConfig::default();
        let clusters = vec![dec!(200)]; // far beyond 3x risk
        let target = derive_target(Direction::Bullish, dec!(100), dec!(95), &clusters, &config);
        // risk = 5, max distance = 15
        assert_eq!(target, dec!(115));
    }
}
