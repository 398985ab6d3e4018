use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::timeframe::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable OHLCV record. Once inserted into a `CandleStore` a candle is
/// never mutated — see §3 "Candle" lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timestamp_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timeframe: Timeframe,
}

impl Candle {
    /// Enforces `low <= min(open,close) <= max(open,close) <= high`,
    /// `low > 0`, and timestamp alignment to the timeframe boundary (§3,
    /// testable property P2).
    pub fn validate(&self) -> EngineResult<()> {
        if self.low <= Decimal::ZERO {
            return Err(EngineError::InvalidCandle {
                symbol: self.symbol.clone(),
                timestamp_ms: self.timestamp_ms,
                reason: "low must be > 0".to_string(),
            });
        }
        let body_lo = self.open.min(self.close);
        let body_hi = self.open.max(self.close);
        if !(self.low <= body_lo && body_lo <= body_hi && body_hi <= self.high) {
            return Err(EngineError::InvalidCandle {
                symbol: self.symbol.clone(),
                timestamp_ms: self.timestamp_ms,
                reason: format!(
                    "OHLC ordering violated: low={} open={} high={} close={}",
                    self.low, self.open, self.high, self.close
                ),
            });
        }
        let tf_ms = self.timeframe.minutes() * 60_000;
        if self.timestamp_ms % tf_ms != 0 {
            return Err(EngineError::InvalidCandle {
                symbol: self.symbol.clone(),
                timestamp_ms: self.timestamp_ms,
                reason: format!("timestamp not aligned to {} boundary", self.timeframe),
            });
        }
        Ok(())
    }

    /// True-range definition used by ATR: max of (high-low), |high-prev
    /// close|, |low-prev close|.
    pub fn true_range(&self, prev_close: Option<Decimal>) -> Decimal {
        let hl = self.high - self.low;
        match prev_close {
            Some(pc) => {
                let hc = (self.high - pc).abs();
                let lc = (self.low - pc).abs();
                hl.max(hc).max(lc)
            }
            None => hl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Candle {
        Candle {
            symbol: "EURUSD".to_string(),
            timestamp_ms: 60_000,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: dec!(100),
            timeframe: Timeframe::M1,
        }
    }

    #[test]
    fn valid_candle_passes() {
        let c = candle(dec!(1.1), dec!(1.2), dec!(1.0), dec!(1.15));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn low_above_body_rejected() {
        let c = candle(dec!(1.1), dec!(1.2), dec!(1.15), dec!(1.18));
        assert!(c.validate().is_err());
    }

    #[test]
    fn nonpositive_low_rejected() {
        let c = candle(dec!(1.1), dec!(1.2), dec!(0), dec!(1.15));
        assert!(c.validate().is_err());
    }

    #[test]
    fn misaligned_timestamp_rejected() {
        let mut c = candle(dec!(1.1), dec!(1.2), dec!(1.0), dec!(1.15));
        c.timeframe = Timeframe::M5;
        c.timestamp_ms = 60_000; // not a multiple of 300_000
        assert!(c.validate().is_err());
    }
}
