//! Unified `load(symbol, [from,to], timeframe) -> Vec<Candle>` contract
//! over file/database/remote/synthetic sources (§4.7).

mod file;
mod synthetic;

pub use file::FileCandleSource;
pub use synthetic::SyntheticCandleSource;

use crate::domain::candle::Candle;
use crate::domain::errors::{EngineError, EngineResult};

/// Output is always sorted ascending by timestamp, deduplicated by
/// timestamp (later row wins), and validated (§4.7).
pub fn finalize(mut candles: Vec<Candle>) -> EngineResult<Vec<Candle>> {
    candles.sort_by_key(|c| c.timestamp_ms);
    candles.dedup_by(|a, b| {
        if a.timestamp_ms == b.timestamp_ms {
            std::mem::swap(a, b);
            true
        } else {
            false
        }
    });
    let mut out = Vec::with_capacity(candles.len());
    for c in candles {
        match c.validate() {
            Ok(()) => out.push(c),
            Err(EngineError::InvalidCandle { reason, .. }) => {
                tracing::warn!(symbol = %c.symbol, ts = c.timestamp_ms, reason, "dropping invalid candle");
            }
            Err(other) => return Err(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(ts: i64, low: rust_decimal::Decimal) -> Candle {
        Candle {
            symbol: "EURUSD".to_string(),
            timestamp_ms: ts,
            open: dec!(1),
            high: dec!(1.2),
            low,
            close: dec!(1.05),
            volume: dec!(10),
            timeframe: Timeframe::M1,
        }
    }

    #[test]
    fn later_row_wins_on_duplicate_timestamp() {
        let candles = vec![candle(60_000, dec!(0.9)), candle(60_000, dec!(0.8))];
        let out = finalize(candles).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].low, dec!(0.8));
    }

    #[test]
    fn invalid_rows_are_dropped_not_fatal() {
        let candles = vec![candle(60_000, dec!(0)), candle(120_000, dec!(0.9))];
        let out = finalize(candles).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].timestamp_ms, 120_000);
    }
}
