use std::collections::{HashMap, VecDeque};

use rust_decimal::Decimal;

use crate::domain::candle::Candle;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::timeframe::Timeframe;

/// Bounded per-symbol M1 ring, default sized to hold 50 bars of the
/// longest timeframe it needs to serve (§3 "Candle store", §4.1).
/// Higher timeframes are never stored — `recent` derives them on demand
/// by boundary-aligned windowing over the M1 tail.
pub struct CandleStore {
    capacity: usize,
    bars: HashMap<String, VecDeque<Candle>>,
}

impl CandleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            bars: HashMap::new(),
        }
    }

    /// Sizes the ring to comfortably hold `n` bars of `tf` (plus slack for
    /// an in-progress tail group).
    pub fn sized_for(tf: Timeframe, n: usize) -> Self {
        Self::new(tf.m1_bars_needed(n) + tf.minutes() as usize)
    }

    /// O(1). Rejects out-of-order or duplicate timestamps for the symbol.
    pub fn append(&mut self, candle: Candle) -> EngineResult<()> {
        candle.validate()?;
        let ring = self.bars.entry(candle.symbol.clone()).or_default();
        if let Some(last) = ring.back() {
            if candle.timestamp_ms <= last.timestamp_ms {
                return Err(EngineError::InvariantViolation {
                    component: "candle_store".to_string(),
                    detail: format!(
                        "{}: timestamp {} is not strictly after last {}",
                        candle.symbol, candle.timestamp_ms, last.timestamp_ms
                    ),
                });
            }
        }
        ring.push_back(candle);
        if ring.len() > self.capacity {
            ring.pop_front();
        }
        Ok(())
    }

    pub fn clear(&mut self, symbol: &str) {
        self.bars.remove(symbol);
    }

    /// Returns the most recent `n` bars aggregated to `timeframe`. For
    /// `Timeframe::M1` this is a direct tail slice of the stored M1 ring.
    pub fn recent(&self, symbol: &str, timeframe: Timeframe, n: usize) -> Vec<Candle> {
        let Some(ring) = self.bars.get(symbol) else {
            return Vec::new();
        };
        if timeframe == Timeframe::M1 {
            return ring.iter().rev().take(n).rev().cloned().collect();
        }
        let groups = aggregate(ring, timeframe);
        let len = groups.len();
        groups.into_iter().skip(len.saturating_sub(n)).collect()
    }
}

/// Groups M1 bars by `floor(ts / tf_minutes) * tf_minutes` boundary
/// (§4.1). The tail group is emitted even if incomplete, representing
/// the in-progress bar.
fn aggregate(ring: &VecDeque<Candle>, tf: Timeframe) -> Vec<Candle> {
    let tf_ms = tf.minutes() * 60_000;
    let mut groups: Vec<Candle> = Vec::new();
    for candle in ring.iter() {
        let boundary = (candle.timestamp_ms / tf_ms) * tf_ms;
        match groups.last_mut() {
            Some(g) if g.timestamp_ms == boundary => {
                g.high = g.high.max(candle.high);
                g.low = g.low.min(candle.low);
                g.close = candle.close;
                g.volume += candle.volume;
            }
            _ => groups.push(Candle {
                symbol: candle.symbol.clone(),
                timestamp_ms: boundary,
                open: candle.open,
                high: candle.high,
                low: candle.low,
                close: candle.close,
                volume: candle.volume,
                timeframe: tf,
            }),
        }
    }
    groups
}

/// Sum of volume across a group; kept separate so callers needing only a
/// running total don't have to materialize a full `Candle`.
pub fn group_volume(candles: &[Candle]) -> Decimal {
    candles.iter().map(|c| c.volume).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn m1(symbol: &str, ts: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timestamp_ms: ts,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: dec!(10),
            timeframe: Timeframe::M1,
        }
    }

    #[test]
    fn append_rejects_out_of_order() {
        let mut store = CandleStore::new(100);
        store
            .append(m1("EURUSD", 60_000, dec!(1), dec!(1.1), dec!(0.9), dec!(1)))
            .unwrap();
        let err = store.append(m1("EURUSD", 60_000, dec!(1), dec!(1.1), dec!(0.9), dec!(1)));
        assert!(err.is_err());
    }

    #[test]
    fn recent_m1_returns_last_k_unchanged() {
        let mut store = CandleStore::new(100);
        let mut inserted = Vec::new();
        for i in 1..=10i64 {
            let c = m1(
                "EURUSD",
                i * 60_000,
                dec!(1),
                dec!(1.1),
                dec!(0.9),
                Decimal::from(i),
            );
            store.append(c.clone()).unwrap();
            inserted.push(c);
        }
        let last3 = store.recent("EURUSD", Timeframe::M1, 3);
        assert_eq!(last3, inserted[7..10]);
    }

    #[test]
    fn aggregation_groups_by_boundary() {
        let mut store = CandleStore::new(100);
        for i in 0..5i64 {
            store
                .append(m1(
                    "EURUSD",
                    i * 60_000,
                    Decimal::from(100 + i),
                    Decimal::from(101 + i),
                    Decimal::from(99 + i),
                    Decimal::from(100 + i),
                ))
                .unwrap();
        }
        let m5 = store.recent("EURUSD", Timeframe::M5, 1);
        assert_eq!(m5.len(), 1);
        assert_eq!(m5[0].open, dec!(100));
        assert_eq!(m5[0].close, dec!(104));
        assert_eq!(m5[0].high, dec!(105));
        assert_eq!(m5[0].low, dec!(99));
    }

    #[test]
    fn ring_evicts_oldest_past_capacity() {
        let mut store = CandleStore::new(3);
        for i in 1..=5i64 {
            store
                .append(m1(
                    "EURUSD",
                    i * 60_000,
                    dec!(1),
                    dec!(1.1),
                    dec!(0.9),
                    Decimal::from(i),
                ))
                .unwrap();
        }
        let all = store.recent("EURUSD", Timeframe::M1, 10);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].timestamp_ms, 3 * 60_000);
    }
}
