//! `replay` — runs one deterministic candle replay over a configured
//! symbol/date window and writes `summary.json` / `trades.csv` /
//! `equity.json` (§6 "CLI (replay)").

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use replaylab::application::analyzer::AnalyzerConfig;
use replaylab::application::execution_filter::ExecutionFilterConfig;
use replaylab::application::replay_engine::{CancellationToken, NewsGate, ReplayConfig, ReplayEngine, ReplayOutcome};
use replaylab::application::signal_synth::SignalConfig;
use replaylab::config::{EngineConfig, InstrumentConfig};
use replaylab::domain::candle::Candle;
use replaylab::domain::params::ParameterSet;
use replaylab::domain::ports::{CandleSource, DataSource};
use replaylab::domain::timeframe::Timeframe;
use replaylab::infrastructure::artifacts::write_replay_artifacts;
use replaylab::infrastructure::{DatabaseCandleSource, RemoteHistorySource};
use replaylab::application::data_loader::{FileCandleSource, SyntheticCandleSource};

#[derive(Parser, Debug)]
#[command(name = "replay", about = "Replay historical candles through the SMC strategy pipeline")]
struct Args {
    /// Single symbol or comma-separated list.
    #[arg(long)]
    symbol: String,

    /// Strategy identifier; accepted for CLI parity but the replay core
    /// carries a single parameterized strategy pipeline (§4.3/§9).
    #[arg(long, default_value = "smc")]
    strategy: String,

    #[arg(long)]
    from: String,

    #[arg(long)]
    to: String,

    #[arg(long = "data-source", default_value = "synthetic")]
    data_source: String,

    #[arg(long = "data-path")]
    data_path: Option<String>,

    #[arg(long = "initial-balance", default_value_t = 10_000.0)]
    initial_balance: f64,

    #[arg(long = "output-dir", default_value = "./out")]
    output_dir: PathBuf,
}

fn parse_ymd_ms(s: &str) -> Result<i64> {
    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").context("parsing --from/--to as YYYY-MM-DD")?;
    let datetime = date.and_hms_opt(0, 0, 0).unwrap();
    Ok(datetime.and_utc().timestamp_millis())
}

async fn build_source(config: &EngineConfig, args: &Args, tf: Timeframe) -> Result<Arc<dyn CandleSource>> {
    let source = match args.data_source.as_str() {
        "file" => {
            let path = args.data_path.clone().context("--data-path is required for --data-source file")?;
            DataSource::File(path)
        }
        "db" | "database" => {
            let url = config.database_url.clone().context("DATABASE_URL is required for --data-source db")?;
            DataSource::Database(url)
        }
        "remote" => {
            let url = config
                .history_service_url
                .clone()
                .context("HISTORY_SERVICE_URL is required for --data-source remote")?;
            DataSource::Remote(url)
        }
        "synthetic" => DataSource::Synthetic(42),
        other => anyhow::bail!("unknown --data-source: {other}"),
    };

    Ok(match source {
        DataSource::File(path) => Arc::new(FileCandleSource::new(path, tf)),
        DataSource::Database(url) => {
            let pool = sqlx::sqlite::SqlitePoolOptions::new().connect(&url).await?;
            Arc::new(DatabaseCandleSource::new(pool, tf))
        }
        DataSource::Remote(url) => Arc::new(RemoteHistorySource::new(url, tf)),
        DataSource::Synthetic(seed) => Arc::new(SyntheticCandleSource::new(seed, tf)),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = EngineConfig::from_env()?;
    let instrument = InstrumentConfig::default();

    let symbols: Vec<String> = args.symbol.split(',').map(|s| s.trim().to_string()).collect();
    let from_ms = parse_ymd_ms(&args.from)?;
    let to_ms = parse_ymd_ms(&args.to)?;

    let source = build_source(&config, &args, Timeframe::M1).await?;

    let mut bars: Vec<(String, Candle)> = Vec::new();
    for symbol in &symbols {
        match source.load(symbol, from_ms, to_ms).await {
            Ok(candles) => bars.extend(candles.into_iter().map(|c| (symbol.clone(), c))),
            Err(e) => {
                error!(symbol, error = %e, "failed to load candle history");
                return Ok(std::process::exit(1));
            }
        }
    }
    // Merged, strictly time-ordered by (timestamp, symbol) (§4.6 "Ordering
    // guarantees").
    bars.sort_by(|a, b| (a.1.timestamp_ms, &a.0).cmp(&(b.1.timestamp_ms, &b.0)));

    if bars.is_empty() {
        error!("no candles loaded for requested symbols/range");
        std::process::exit(1);
    }

    let replay_config = ReplayConfig {
        strategy: args.strategy.clone(),
        initial_balance: Decimal::try_from(args.initial_balance).unwrap_or(Decimal::from(10_000)),
        risk_percent: Decimal::ONE,
        contract_size: instrument.contract_size,
        pip_size: instrument.pip_size,
        pip_value: instrument.pip_value,
        min_lot: Decimal::new(1, 2),
        max_lot: Decimal::from(10),
        equity_snapshot_every_n_bars: 60,
        htf: Timeframe::H4,
        itf: Timeframe::H1,
        ltf: Timeframe::M15,
        htf_bars: 100,
        itf_bars: 100,
        ltf_bars: 100,
    };

    let engine = ReplayEngine::new(
        replay_config,
        AnalyzerConfig::default(),
        SignalConfig::default(),
        ExecutionFilterConfig {
            session_start_minute: 0,
            session_end_minute: 1440,
            max_spread_pips: Decimal::from(3),
            min_minutes_between_trades: 15,
            max_daily_trades: 10,
            max_concurrent_per_symbol: 2,
            max_concurrent_per_direction: None,
            max_concurrent_global: 10,
            max_daily_risk_dollars_per_symbol: Decimal::from(1000),
            max_daily_risk_dollars_global: Decimal::from(5000),
            confluence_threshold: 60,
        },
    );

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancellation requested, flushing partial results at next bar boundary");
            cancel_for_signal.cancel();
        }
    });

    let news_gate = NewsGate::new();
    let params = ParameterSet::default();

    info!(symbols = ?symbols, from = args.from, to = args.to, bars = bars.len(), "starting replay");

    let outcome = engine.run(&bars, &params, &news_gate, &cancel);
    match outcome {
        Ok(ReplayOutcome::Completed(result)) => {
            write_replay_artifacts(&args.output_dir, &result, "COMPLETED")?;
            info!(run_id = %result.run_id, trades = result.trades.len(), "replay completed");
            Ok(())
        }
        Ok(ReplayOutcome::Cancelled(result)) => {
            write_replay_artifacts(&args.output_dir, &result, "PARTIAL")?;
            info!(run_id = %result.run_id, "replay cancelled; partial results flushed");
            std::process::exit(130);
        }
        Err(e) => {
            error!(error = %e, "replay aborted");
            std::process::exit(1);
        }
    }
}
