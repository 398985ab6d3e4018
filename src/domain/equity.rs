use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Appended periodically (every N bars) and at close events (§3 "Equity
/// point"). `peak[i] = max(peak[i-1], equity[i])` is the monotonic peak
/// invariant (§8 P10).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp_ms: i64,
    pub balance: Decimal,
    pub equity: Decimal,
    pub drawdown: Decimal,
    pub drawdown_pct: Decimal,
}

/// Tracks the running peak so each new point's drawdown is computed
/// correctly without re-scanning history.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquityTracker {
    peak: Option<Decimal>,
}

impl EquityTracker {
    pub fn new() -> Self {
        Self { peak: None }
    }

    pub fn record(&mut self, timestamp_ms: i64, balance: Decimal, equity: Decimal) -> EquityPoint {
        let peak = match self.peak {
            Some(p) if p >= equity => p,
            _ => equity,
        };
        self.peak = Some(peak);
        let drawdown = peak - equity;
        let drawdown_pct = if peak.is_zero() {
            Decimal::ZERO
        } else {
            drawdown / peak * Decimal::from(100)
        };
        EquityPoint {
            timestamp_ms,
            balance,
            equity,
            drawdown,
            drawdown_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn peak_is_monotonic_non_decreasing() {
        let mut tracker = EquityTracker::new();
        let mut peaks = Vec::new();
        for (ts, eq) in [
            (1, dec!(100)),
            (2, dec!(120)),
            (3, dec!(90)),
            (4, dec!(150)),
            (5, dec!(140)),
        ] {
            let point = tracker.record(ts, dec!(100), eq);
            peaks.push(point.equity + point.drawdown); // reconstructs the peak
        }
        for w in peaks.windows(2) {
            assert!(w[1] >= w[0], "peak decreased: {} -> {}", w[0], w[1]);
        }
    }

    #[test]
    fn drawdown_zero_at_new_high() {
        let mut tracker = EquityTracker::new();
        tracker.record(1, dec!(100), dec!(100));
        let point = tracker.record(2, dec!(100), dec!(110));
        assert_eq!(point.drawdown, Decimal::ZERO);
    }
}
