use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::candle::Candle;
use crate::domain::swing::{Direction, SwingPoint, SwingType};
use crate::domain::timeframe::Timeframe;
use crate::domain::zones::{FairValueGap, FvgGrade, OrderBlock};

/// Last order block in `direction` within `lookback` bars of the tail
/// (GLOSSARY "Order block"): the candle immediately preceding a
/// directional displacement, found by scanning for an opposite-direction
/// candle followed by a run of same-direction candles on above-average
/// volume.
pub fn find_last_order_block(
    candles: &[Candle],
    direction: Direction,
    lookback: usize,
    volume_multiplier: Decimal,
) -> Option<OrderBlock> {
    if candles.len() < 3 {
        return None;
    }
    let start = candles.len().saturating_sub(lookback).max(1);
    let vol_window = &candles[candles.len().saturating_sub(50).max(1)..candles.len() - 1];
    let avg_vol = if vol_window.is_empty() {
        Decimal::ZERO
    } else {
        vol_window.iter().map(|c| c.volume).sum::<Decimal>() / Decimal::from(vol_window.len())
    };
    let threshold = avg_vol * volume_multiplier;

    for i in (start..candles.len() - 1).rev() {
        let candle = &candles[i];
        let is_opposite = match direction {
            Direction::Bullish => candle.close < candle.open,
            Direction::Bearish => candle.close > candle.open,
        };
        if !is_opposite {
            continue;
        }
        let next = &candles[i + 1];
        let displacement = match direction {
            Direction::Bullish => next.close > next.open && next.volume >= threshold,
            Direction::Bearish => next.close < next.open && next.volume >= threshold,
        };
        if displacement {
            return Some(OrderBlock {
                direction,
                high: candle.high,
                low: candle.low,
                timestamp_ms: candle.timestamp_ms,
                timeframe: candle.timeframe,
                mitigated: false,
            });
        }
    }
    None
}

/// Three-candle imbalance scan (GLOSSARY "FVG"). Grades by width relative
/// to the prevailing range: `Wide` when the gap exceeds twice the minimum
/// size, `Nested` when it sits fully inside a wider gap found earlier in
/// the scan, `Narrow` otherwise.
pub fn detect_fair_value_gaps(
    candles: &[Candle],
    min_size_pct: Decimal,
    tf: Timeframe,
) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();
    if candles.len() < 3 {
        return gaps;
    }
    for i in 0..candles.len() - 2 {
        let c1 = &candles[i];
        let c3 = &candles[i + 2];

        if c3.low > c1.high {
            push_gap(&mut gaps, Direction::Bullish, c1.high, c3.low, min_size_pct, tf);
        }
        if c1.low > c3.high {
            push_gap(&mut gaps, Direction::Bearish, c3.high, c1.low, min_size_pct, tf);
        }
    }
    gaps
}

fn push_gap(
    gaps: &mut Vec<FairValueGap>,
    direction: Direction,
    low: Decimal,
    high: Decimal,
    min_size_pct: Decimal,
    tf: Timeframe,
) {
    let midpoint = (low + high) / Decimal::TWO;
    if midpoint <= Decimal::ZERO {
        return;
    }
    let size_pct = (high - low) / midpoint;
    if size_pct < min_size_pct {
        return;
    }
    let grade = if gaps
        .iter()
        .any(|g: &FairValueGap| g.low <= low && g.high >= high)
    {
        FvgGrade::Nested
    } else if size_pct >= min_size_pct * Decimal::TWO {
        FvgGrade::Wide
    } else {
        FvgGrade::Narrow
    };
    gaps.push(FairValueGap {
        direction,
        grade,
        high,
        low,
        timeframe: tf,
        premium_discount: size_pct.to_string().parse().unwrap_or(0.0),
        filled: false,
    });
}

/// A cluster of swing extremes within `tolerance_pct` of each other
/// (§4.3 "Target candidate set").
pub fn cluster_levels(
    swings: &[SwingPoint],
    swing_type: SwingType,
    tolerance_pct: Decimal,
) -> Vec<Decimal> {
    let mut prices: Vec<Decimal> = swings
        .iter()
        .filter(|s| s.swing_type == swing_type)
        .map(|s| s.price)
        .collect();
    prices.sort();
    let mut clusters: Vec<Decimal> = Vec::new();
    for price in prices {
        match clusters.last() {
            Some(&last) if last > Decimal::ZERO && (price - last).abs() / last <= tolerance_pct => {}
            _ => clusters.push(price),
        }
    }
    clusters
}

/// A liquidity sweep: price briefly penetrates a prior equal-high/low
/// cluster and closes back through it, consuming resting stops
/// (GLOSSARY "Liquidity sweep").
pub fn detect_liquidity_sweep(
    candles: &[Candle],
    clusters: &[Decimal],
    direction: Direction,
) -> bool {
    let Some(last) = candles.last() else {
        return false;
    };
    match direction {
        Direction::Bullish => clusters
            .iter()
            .any(|&level| last.low < level && last.close > level),
        Direction::Bearish => clusters
            .iter()
            .any(|&level| last.high > level && last.close < level),
    }
}

pub const DEFAULT_CLUSTER_TOLERANCE_PCT: Decimal = dec!(0.001);
