//! Process-wide configuration, loaded once at startup and passed
//! explicitly from there on (§9 "Replacing process-wide module state").
//! No component reads the environment after `EngineConfig::from_env`
//! returns.

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use crate::domain::timeframe::Timeframe;

/// Everything a replay or optimizer run needs from the environment,
/// resolved once (§6 "Environment").
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: Option<String>,
    pub history_service_url: Option<String>,
    pub news_window_service_url: Option<String>,
    pub timezone: String,
}

impl EngineConfig {
    /// Reads `DATABASE_URL`, `HISTORY_SERVICE_URL`,
    /// `NEWS_WINDOW_SERVICE_URL`, `ENGINE_TIMEZONE` (default
    /// `America/New_York`). A `.env` file, if present, is loaded first via
    /// `dotenvy`, matching the convention the rest of the stack uses for
    /// local development.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            history_service_url: env::var("HISTORY_SERVICE_URL").ok(),
            news_window_service_url: env::var("NEWS_WINDOW_SERVICE_URL").ok(),
            timezone: env::var("ENGINE_TIMEZONE").unwrap_or_else(|_| "America/New_York".to_string()),
        })
    }
}

/// Sizing/contract constants the replay loop needs per symbol; not
/// strategy-specific (those live in the parameter set schema), but also
/// not worth threading through the environment (§9).
#[derive(Debug, Clone, Copy)]
pub struct InstrumentConfig {
    pub contract_size: Decimal,
    pub pip_size: Decimal,
    pub pip_value: Decimal,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            contract_size: dec!(100_000),
            pip_size: dec!(0.0001),
            pip_value: dec!(10),
        }
    }
}

/// Parses a `name=value` strategy/instrument override pair from a CLI
/// flag or config file line, e.g. `--set htf=H4`. Kept narrow: this is a
/// convenience for the two binaries in §6, not a general config DSL.
pub fn parse_timeframe_flag(value: &str) -> Result<Timeframe> {
    Timeframe::from_str(value).map_err(anyhow::Error::msg).context("parsing timeframe flag")
}
