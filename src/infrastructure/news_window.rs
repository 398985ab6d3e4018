use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::ports::{NewsWindow, NewsWindowSource};

const NEWS_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct NewsWindowRow {
    start_ms: i64,
    end_ms: i64,
}

#[derive(Debug, Deserialize)]
struct NewsWindowResponse {
    #[serde(default)]
    windows: Vec<NewsWindowRow>,
}

/// `NewsWindowSource` backed by an HTTP lookup keyed `(symbol, date)`
/// (§4.7, GLOSSARY). A single failed lookup returns an error for that
/// call only; this source carries no state across calls at all — fault
/// isolation per `(symbol, date)` is the caller's responsibility
/// (`NewsGate`, §9).
pub struct RemoteNewsWindowSource {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteNewsWindowSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(NEWS_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl NewsWindowSource for RemoteNewsWindowSource {
    async fn windows_for(&self, symbol: &str, date_ymd: &str) -> EngineResult<Vec<NewsWindow>> {
        let url = format!("{}/news-windows?symbol={symbol}&date={date_ymd}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::DataUnavailable {
                symbol: symbol.to_string(),
                from: 0,
                to: 0,
                reason: format!("news window lookup failed for {date_ymd}: {e}"),
            })?;

        let parsed: NewsWindowResponse = response.json().await.map_err(|e| EngineError::DataUnavailable {
            symbol: symbol.to_string(),
            from: 0,
            to: 0,
            reason: format!("malformed news window response for {date_ymd}: {e}"),
        })?;

        Ok(parsed
            .windows
            .into_iter()
            .map(|row| NewsWindow {
                start_ms: row.start_ms,
                end_ms: row.end_ms,
            })
            .collect())
    }
}

/// Always returns no windows; used when `NEWS_WINDOW_SERVICE_URL` is
/// unset so the gate degrades to "never blocked" rather than failing
/// every bar.
pub struct NullNewsWindowSource;

#[async_trait]
impl NewsWindowSource for NullNewsWindowSource {
    async fn windows_for(&self, _symbol: &str, _date_ymd: &str) -> EngineResult<Vec<NewsWindow>> {
        Ok(Vec::new())
    }
}
