use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::data_loader::finalize;
use crate::domain::candle::Candle;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::ports::CandleSource;
use crate::domain::timeframe::Timeframe;

const HISTORY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct RemoteCandleRow {
    #[serde(rename = "t")]
    timestamp_ms: i64,
    #[serde(rename = "o")]
    open: rust_decimal::Decimal,
    #[serde(rename = "h")]
    high: rust_decimal::Decimal,
    #[serde(rename = "l")]
    low: rust_decimal::Decimal,
    #[serde(rename = "c")]
    close: rust_decimal::Decimal,
    #[serde(rename = "v")]
    volume: rust_decimal::Decimal,
}

#[derive(Debug, Deserialize)]
struct RemoteCandlesResponse {
    candles: Vec<RemoteCandleRow>,
}

#[derive(Debug, Deserialize)]
struct RemoteRangeResponse {
    #[serde(default)]
    earliest_ms: Option<i64>,
    #[serde(default)]
    latest_ms: Option<i64>,
}

/// `CandleSource` backed by an HTTP history service (§4.7 "Remote history
/// service"). 60s request timeout; empty responses trigger a follow-up
/// range probe so the resulting error tells the caller what the service
/// actually has, rather than just "no data".
pub struct RemoteHistorySource {
    base_url: String,
    client: reqwest::Client,
    timeframe: Timeframe,
}

impl RemoteHistorySource {
    pub fn new(base_url: impl Into<String>, timeframe: Timeframe) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HISTORY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
            timeframe,
        }
    }

    fn classify_error(err: &reqwest::Error) -> &'static str {
        if err.is_timeout() || err.is_connect() {
            "unavailable"
        } else if err.status().map(|s| s.as_u16()) == Some(404) {
            "not_found"
        } else {
            "other"
        }
    }

    async fn probe_range(&self, symbol: &str) -> Option<(i64, i64)> {
        let url = format!("{}/range?symbol={symbol}", self.base_url);
        let resp = self.client.get(&url).send().await.ok()?;
        let parsed: RemoteRangeResponse = resp.json().await.ok()?;
        match (parsed.earliest_ms, parsed.latest_ms) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }
}

#[async_trait]
impl CandleSource for RemoteHistorySource {
    async fn load(&self, symbol: &str, from_ms: i64, to_ms: i64) -> EngineResult<Vec<Candle>> {
        let url = format!(
            "{}/candles?symbol={symbol}&timeframe={}&from={from_ms}&to={to_ms}",
            self.base_url, self.timeframe
        );

        let response = self.client.get(&url).send().await.map_err(|e| EngineError::DataUnavailable {
            symbol: symbol.to_string(),
            from: from_ms,
            to: to_ms,
            reason: format!("{}: {e}", Self::classify_error(&e)),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(EngineError::DataUnavailable {
                symbol: symbol.to_string(),
                from: from_ms,
                to: to_ms,
                reason: if status.as_u16() == 404 {
                    "not_found".to_string()
                } else {
                    format!("other: HTTP {status}")
                },
            });
        }

        let parsed: RemoteCandlesResponse = response.json().await.map_err(|e| EngineError::DataUnavailable {
            symbol: symbol.to_string(),
            from: from_ms,
            to: to_ms,
            reason: format!("other: malformed response body: {e}"),
        })?;

        if parsed.candles.is_empty() {
            let diagnostic = match self.probe_range(symbol).await {
                Some((earliest, latest)) => format!(
                    "unavailable: no data in requested range; service reports data for [{earliest}, {latest}]"
                ),
                None => "unavailable: no data in requested range and range probe failed".to_string(),
            };
            return Err(EngineError::DataUnavailable {
                symbol: symbol.to_string(),
                from: from_ms,
                to: to_ms,
                reason: diagnostic,
            });
        }

        let candles = parsed
            .candles
            .into_iter()
            .map(|row| Candle {
                symbol: symbol.to_string(),
                timestamp_ms: row.timestamp_ms,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                timeframe: self.timeframe,
            })
            .collect();

        finalize(candles)
    }
}
