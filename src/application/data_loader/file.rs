use async_trait::async_trait;
use chrono::DateTime;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::application::data_loader::finalize;
use crate::domain::candle::Candle;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::ports::CandleSource;
use crate::domain::timeframe::Timeframe;

/// Reads `timestamp, open, high, low, close, volume` rows from a CSV file,
/// header optional (§4.7 "Tabular file"). The timestamp column
/// auto-detects epoch seconds, epoch millis, or ISO-8601.
pub struct FileCandleSource {
    path: String,
    timeframe: Timeframe,
}

impl FileCandleSource {
    pub fn new(path: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            path: path.into(),
            timeframe,
        }
    }
}

#[async_trait]
impl CandleSource for FileCandleSource {
    async fn load(&self, symbol: &str, from_ms: i64, to_ms: i64) -> EngineResult<Vec<Candle>> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| EngineError::DataUnavailable {
            symbol: symbol.to_string(),
            from: from_ms,
            to: to_ms,
            reason: format!("failed to read {}: {e}", self.path),
        })?;

        let mut candles = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < 6 {
                continue;
            }
            let Some(ts) = parse_timestamp(fields[0]) else {
                continue; // header row or malformed line
            };
            if ts < from_ms || ts > to_ms {
                continue;
            }
            let (Ok(open), Ok(high), Ok(low), Ok(close), Ok(volume)) = (
                Decimal::from_str(fields[1]),
                Decimal::from_str(fields[2]),
                Decimal::from_str(fields[3]),
                Decimal::from_str(fields[4]),
                Decimal::from_str(fields[5]),
            ) else {
                continue;
            };
            candles.push(Candle {
                symbol: symbol.to_string(),
                timestamp_ms: ts,
                open,
                high,
                low,
                close,
                volume,
                timeframe: self.timeframe,
            });
        }

        if candles.is_empty() {
            return Err(EngineError::DataUnavailable {
                symbol: symbol.to_string(),
                from: from_ms,
                to: to_ms,
                reason: format!("no rows parsed from {}", self.path),
            });
        }

        finalize(candles)
    }
}

/// Epoch-seconds are 10 digits, epoch-millis 13; anything else is tried
/// as ISO-8601.
fn parse_timestamp(field: &str) -> Option<i64> {
    if let Ok(n) = field.parse::<i64>() {
        return Some(match field.len() {
            13 => n,
            10 => n * 1000,
            _ if n > 10_000_000_000 => n,
            _ => n * 1000,
        });
    }
    DateTime::parse_from_rfc3339(field)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_epoch_seconds_vs_millis() {
        assert_eq!(parse_timestamp("1700000000"), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp("1700000000000"), Some(1_700_000_000_000));
    }

    #[test]
    fn detects_iso8601() {
        assert_eq!(
            parse_timestamp("2023-11-14T22:13:20+00:00"),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn rejects_header_row() {
        assert_eq!(parse_timestamp("timestamp"), None);
    }
}
