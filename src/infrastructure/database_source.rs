use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use crate::application::data_loader::finalize;
use crate::domain::candle::Candle;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::ports::CandleSource;
use crate::domain::timeframe::Timeframe;

/// `CandleSource` backed by a `(symbol, timeframe, ts)`-keyed table
/// (§4.7 "Database"). Shares the result sink's connection pool type but
/// is a distinct collaborator: a replay's data source and its output
/// sink are never assumed to be the same database.
pub struct DatabaseCandleSource {
    pool: SqlitePool,
    timeframe: Timeframe,
}

impl DatabaseCandleSource {
    pub fn new(pool: SqlitePool, timeframe: Timeframe) -> Self {
        Self { pool, timeframe }
    }
}

#[async_trait]
impl CandleSource for DatabaseCandleSource {
    async fn load(&self, symbol: &str, from_ms: i64, to_ms: i64) -> EngineResult<Vec<Candle>> {
        let rows: Vec<(i64, String, String, String, String, String)> = sqlx::query_as(
            "SELECT timestamp, open, high, low, close, volume FROM candles \
             WHERE symbol = ? AND timeframe = ? AND timestamp >= ? AND timestamp <= ? \
             ORDER BY timestamp ASC",
        )
        .bind(symbol)
        .bind(self.timeframe.to_string())
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::DataUnavailable {
            symbol: symbol.to_string(),
            from: from_ms,
            to: to_ms,
            reason: format!("query failed: {e}"),
        })?;

        if rows.is_empty() {
            return Err(EngineError::DataUnavailable {
                symbol: symbol.to_string(),
                from: from_ms,
                to: to_ms,
                reason: "no rows returned for symbol/timeframe/range".to_string(),
            });
        }

        let candles = rows
            .into_iter()
            .filter_map(|(ts, open, high, low, close, volume)| {
                Some(Candle {
                    symbol: symbol.to_string(),
                    timestamp_ms: ts,
                    open: open.parse().ok()?,
                    high: high.parse().ok()?,
                    low: low.parse().ok()?,
                    close: close.parse().ok()?,
                    volume: volume.parse().ok()?,
                    timeframe: self.timeframe,
                })
            })
            .collect();

        finalize(candles)
    }
}
