//! `optimize` — enumerates a parameter space (grid/random/TPE/walk
//! forward), fans replays out across it, and writes a ranked results CSV
//! (§6 "CLI (optimizer)").

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use replaylab::application::analyzer::AnalyzerConfig;
use replaylab::application::data_loader::SyntheticCandleSource;
use replaylab::application::execution_filter::ExecutionFilterConfig;
use replaylab::application::optimizer::{optimize, OptimizeOutcome, OptimizeRequest, SearchSpace};
use replaylab::application::replay_engine::{NewsGate, ReplayConfig};
use replaylab::application::signal_synth::SignalConfig;
use replaylab::config::{EngineConfig, InstrumentConfig};
use replaylab::domain::candle::Candle;
use replaylab::domain::optimization::{OptimizationStatus, ScoreWeights, SearchMethod};
use replaylab::domain::params::{ParamGrid, ParamRange, ParamRanges, ParamValue};
use replaylab::domain::ports::CandleSource;
use replaylab::domain::timeframe::Timeframe;
use replaylab::infrastructure::artifacts::write_optimization_csv;

#[derive(Parser, Debug)]
#[command(name = "optimize", about = "Search strategy parameter space via replay sweeps")]
struct Args {
    #[arg(long, value_enum, default_value = "grid")]
    method: MethodArg,

    #[arg(long)]
    symbol: String,

    #[arg(long)]
    from: String,

    #[arg(long)]
    to: String,

    #[arg(long = "out-of-sample-from")]
    out_of_sample_from: Option<String>,

    #[arg(long = "out-of-sample-to")]
    out_of_sample_to: Option<String>,

    #[arg(long = "param-grid")]
    param_grid: Option<PathBuf>,

    #[arg(long = "param-ranges")]
    param_ranges: Option<PathBuf>,

    #[arg(long, default_value_t = 50)]
    trials: usize,

    #[arg(long = "walk-forward-windows", default_value_t = 5)]
    walk_forward_windows: usize,

    #[arg(long = "walk-forward-step", default_value_t = 30)]
    walk_forward_step: i64,

    #[arg(long = "parallel-runs", default_value_t = 4)]
    parallel_runs: usize,

    #[arg(long = "export-csv", default_value = "./out/optimize_results.csv")]
    export_csv: PathBuf,

    #[arg(long = "save-db", default_value_t = false)]
    save_db: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum MethodArg {
    Grid,
    Random,
    Bayes,
    Walkforward,
}

impl From<MethodArg> for SearchMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Grid => SearchMethod::Grid,
            MethodArg::Random => SearchMethod::Random,
            MethodArg::Bayes => SearchMethod::Tpe,
            MethodArg::Walkforward => SearchMethod::WalkForward,
        }
    }
}

fn parse_ymd_ms(s: &str) -> Result<i64> {
    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").context("parsing date as YYYY-MM-DD")?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp_millis())
}

/// Parses a grid file of the shape `name = [v1, v2, ...]` per parameter.
fn load_grid_from_toml(path: &PathBuf) -> Result<ParamGrid> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading param grid {path:?}"))?;
    let table: toml::Table = toml::from_str(&text).context("parsing param grid TOML")?;
    let mut grid = ParamGrid::default();
    for (key, value) in table {
        let values = value
            .as_array()
            .with_context(|| format!("parameter {key} must be an array of values"))?;
        let parsed: Vec<ParamValue> = values.iter().map(toml_value_to_param).collect();
        grid.0.insert(key, parsed);
    }
    Ok(grid)
}

/// Parses a ranges file of the shape `[name]\ntype = "int"\nmin = 1\nmax
/// = 10` (or `type = "float"` / `"bool"` / `"enum"` with `values = [..]`).
fn load_ranges_from_toml(path: &PathBuf) -> Result<ParamRanges> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading param ranges {path:?}"))?;
    let table: toml::Table = toml::from_str(&text).context("parsing param ranges TOML")?;
    let mut ranges = ParamRanges::default();
    for (key, value) in table {
        let entry = value
            .as_table()
            .with_context(|| format!("parameter {key} must be a table with type/min/max"))?;
        let kind = entry.get("type").and_then(|v| v.as_str()).unwrap_or("float");
        let range = match kind {
            "int" => ParamRange::Int {
                min: entry.get("min").and_then(|v| v.as_integer()).unwrap_or(0),
                max: entry.get("max").and_then(|v| v.as_integer()).unwrap_or(0),
            },
            "bool" => ParamRange::Bool,
            "enum" => ParamRange::Enum(
                entry
                    .get("values")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default(),
            ),
            _ => ParamRange::Float {
                min: entry.get("min").and_then(|v| v.as_float()).unwrap_or(0.0),
                max: entry.get("max").and_then(|v| v.as_float()).unwrap_or(0.0),
            },
        };
        ranges.0.insert(key, range);
    }
    Ok(ranges)
}

fn toml_value_to_param(value: &toml::Value) -> ParamValue {
    match value {
        toml::Value::Integer(i) => ParamValue::Int(*i),
        toml::Value::Float(f) => ParamValue::Float(*f),
        toml::Value::Boolean(b) => ParamValue::Bool(*b),
        other => ParamValue::Enum(other.to_string()),
    }
}

/// Prints the ranked results table to stdout in addition to the CSV
/// artifact.
fn print_results_table(records: &[replaylab::domain::optimization::OptimizationResultRecord]) {
    println!("{:>4}  {:>10}  {:>8}  {:>6}", "rank", "score", "win%", "trades");
    for (idx, r) in records.iter().take(20).enumerate() {
        println!(
            "{:>4}  {:>10}  {:>8.2}  {:>6}",
            idx + 1,
            r.ranked_score.map(|s| format!("{s:.4}")).unwrap_or_else(|| "-".to_string()),
            rust_decimal::prelude::ToPrimitive::to_f64(&r.stats.win_rate_pct).unwrap_or(0.0),
            r.stats.total_trades,
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = EngineConfig::from_env()?;
    let instrument = InstrumentConfig::default();

    let from_ms = parse_ymd_ms(&args.from)?;
    let to_ms = parse_ymd_ms(&args.to)?;

    let source = SyntheticCandleSource::new(42, Timeframe::M1);
    let candles: Vec<Candle> = source.load(&args.symbol, from_ms, to_ms).await?;
    let bars: Vec<(String, Candle)> = candles.into_iter().map(|c| (args.symbol.clone(), c)).collect();

    let search_space = match (&args.param_grid, &args.param_ranges) {
        (Some(path), _) => SearchSpace::Grid(load_grid_from_toml(path)?),
        (None, Some(path)) => SearchSpace::Ranges(load_ranges_from_toml(path)?),
        (None, None) => SearchSpace::Grid(ParamGrid::default()),
    };

    let replay_config = ReplayConfig {
        strategy: "smc".to_string(),
        initial_balance: Decimal::from(10_000),
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

    let news_gate = NewsGate::new();
    let env = replaylab::application::optimizer::ReplayEnvironment {
        replay_config,
        analyzer_config: AnalyzerConfig::default(),
        signal_config: SignalConfig::default(),
        filter_config: ExecutionFilterConfig {
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
        news_gate: &news_gate,
    };

    let request = OptimizeRequest {
        run_id: Uuid::new_v4(),
        method: args.method.into(),
        search_space,
        trials: args.trials,
        parallel_runs: args.parallel_runs,
        walk_forward_windows: args.walk_forward_windows,
        walk_forward_step_days: args.walk_forward_step,
        seed: 42,
        score_weights: ScoreWeights::default(),
    };

    info!(method = ?request.method, symbol = args.symbol, "starting optimization sweep");

    let mut run = replaylab::domain::optimization::OptimizationRun {
        run_id: request.run_id,
        method: request.method,
        symbols: vec![args.symbol.clone()],
        in_sample_start_ms: from_ms,
        in_sample_end_ms: to_ms,
        out_sample_start_ms: args.out_of_sample_from.as_deref().map(parse_ymd_ms).transpose()?,
        out_sample_end_ms: args.out_of_sample_to.as_deref().map(parse_ymd_ms).transpose()?,
        status: OptimizationStatus::Running,
        created_at: chrono::Utc::now(),
        completed_at: None,
        error: None,
    };

    let sink = if args.save_db {
        match &config.database_url {
            Some(url) => Some(replaylab::infrastructure::SqliteResultSink::connect(url).await?),
            None => {
                anyhow::bail!("--save-db requires DATABASE_URL to be set");
            }
        }
    } else {
        None
    };

    if let Some(sink) = &sink {
        use replaylab::domain::ports::ResultSink;
        sink.save_optimization_run(&run).await?;
    }

    let outcome = optimize(&request, &bars, &env);

    match outcome {
        Ok(OptimizeOutcome::Swept(records)) => {
            std::fs::create_dir_all(args.export_csv.parent().unwrap_or(&PathBuf::from(".")))?;
            write_optimization_csv(&args.export_csv, &records)?;
            print_results_table(&records);

            if let Some(sink) = &sink {
                use replaylab::domain::ports::ResultSink;
                for record in &records {
                    sink.save_optimization_result(record).await?;
                }
                run.status = OptimizationStatus::Completed;
                run.completed_at = Some(chrono::Utc::now());
                sink.update_optimization_status(&run).await?;
            }
            info!(results = records.len(), "optimization sweep completed");
            Ok(())
        }
        Ok(OptimizeOutcome::WalkForward(wf)) => {
            info!(
                windows = wf.windows.len(),
                average_oos_win_rate = wf.average_oos_win_rate,
                "walk-forward optimization completed"
            );
            let mut summary: HashMap<&str, String> = HashMap::new();
            summary.insert("windows", wf.windows.len().to_string());
            summary.insert("average_oos_win_rate", format!("{:.2}", wf.average_oos_win_rate));
            for (key, value) in &summary {
                println!("{key}: {value}");
            }

            if let Some(sink) = &sink {
                use replaylab::domain::ports::ResultSink;
                run.status = OptimizationStatus::Completed;
                run.completed_at = Some(chrono::Utc::now());
                sink.update_optimization_status(&run).await?;
            }
            Ok(())
        }
        Err(e) => {
            if let Some(sink) = &sink {
                use replaylab::domain::ports::ResultSink;
                run.status = OptimizationStatus::Failed;
                run.error = Some(e.to_string());
                sink.update_optimization_status(&run).await?;
            }
            Err(anyhow::anyhow!(e))
        }
    }
}
