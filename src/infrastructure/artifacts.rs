use std::path::Path;

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::optimization::OptimizationResultRecord;
use crate::domain::params::ParamValue;
use crate::domain::result::ReplayResult;

/// `summary.json` / `trades.csv` / `equity.json`, matching the flat shape
/// of the relational `backtest_runs`/`backtest_trades`/`backtest_equity`
/// tables (§6 "Output artifacts per replay").
#[derive(Debug, Serialize)]
struct ReplaySummary<'a> {
    run_id: String,
    status: &'a str,
    start_time: i64,
    end_time: i64,
    runtime_ms: u64,
    stats: &'a crate::domain::result::ReplayStats,
    initial_balance: String,
    final_balance: String,
    total_return: String,
    total_return_percent: String,
}

fn io_err(context: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::PersistenceError(format!("{context}: {e}"))
}

/// Writes all three replay artifacts under `output_dir`, creating the
/// directory if needed. `status` is `"COMPLETED"` or `"PARTIAL"` (§6 "On
/// cancellation, identical layout but `summary.status = \"PARTIAL\"`").
pub fn write_replay_artifacts(output_dir: &Path, result: &ReplayResult, status: &str) -> EngineResult<()> {
    std::fs::create_dir_all(output_dir).map_err(|e| io_err("creating output directory", e))?;

    let start_time = result
        .equity_curve
        .first()
        .map(|p| p.timestamp_ms)
        .unwrap_or(0);
    let end_time = result
        .equity_curve
        .last()
        .map(|p| p.timestamp_ms)
        .unwrap_or(0);
    let total_return = result.final_balance - result.initial_balance;
    let total_return_percent = if result.initial_balance.is_zero() {
        rust_decimal::Decimal::ZERO
    } else {
        total_return / result.initial_balance * rust_decimal::Decimal::from(100)
    };

    let summary = ReplaySummary {
        run_id: result.run_id.to_string(),
        status,
        start_time,
        end_time,
        runtime_ms: result.runtime_ms,
        stats: &result.stats,
        initial_balance: result.initial_balance.to_string(),
        final_balance: result.final_balance.to_string(),
        total_return: total_return.to_string(),
        total_return_percent: total_return_percent.to_string(),
    };
    let summary_json = serde_json::to_string_pretty(&summary).map_err(|e| io_err("serializing summary.json", e))?;
    std::fs::write(output_dir.join("summary.json"), summary_json)
        .map_err(|e| io_err("writing summary.json", e))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(output_dir.join("trades.csv"))
        .map_err(|e| io_err("opening trades.csv", e))?;
    writer
        .write_record([
            "ticket",
            "symbol",
            "direction",
            "strategy",
            "entry_price",
            "exit_price",
            "entry_time",
            "exit_time",
            "sl",
            "tp",
            "volume",
            "profit",
            "duration_minutes",
            "pips",
            "risk_reward",
        ])
        .map_err(|e| io_err("writing trades.csv header", e))?;
    for trade in &result.trades {
        writer
            .write_record([
                trade.ticket.to_string(),
                trade.symbol.clone(),
                format!("{:?}", trade.direction),
                trade.strategy.clone(),
                format_price(trade.entry_price),
                format_price(trade.exit_price),
                trade.entry_time_ms.to_string(),
                trade.exit_time_ms.to_string(),
                format_price(trade.sl),
                format_price(trade.tp),
                format_money(trade.volume),
                format_money(trade.pnl),
                trade.duration_minutes.to_string(),
                format_price(trade.pips),
                format_price(trade.risk_reward),
            ])
            .map_err(|e| io_err("writing trades.csv row", e))?;
    }
    writer.flush().map_err(|e| io_err("flushing trades.csv", e))?;

    let equity_json = serde_json::to_string_pretty(&result.equity_curve)
        .map_err(|e| io_err("serializing equity.json", e))?;
    std::fs::write(output_dir.join("equity.json"), equity_json)
        .map_err(|e| io_err("writing equity.json", e))?;

    Ok(())
}

fn format_price(value: rust_decimal::Decimal) -> String {
    format!("{:.5}", value.to_f64().unwrap_or(0.0))
}

fn format_money(value: rust_decimal::Decimal) -> String {
    format!("{:.2}", value.to_f64().unwrap_or(0.0))
}

/// One sweep's results as a single CSV, `rank, score, <metrics>,
/// <params...>` sorted by score descending (§6 "Output artifacts per
/// optimization"). Assumes `records` is already rank-sorted by the
/// caller (`optimizer::rank_descending`).
pub fn write_optimization_csv(
    path: &Path,
    records: &[OptimizationResultRecord],
) -> EngineResult<()> {
    let mut param_keys: Vec<String> = records
        .iter()
        .flat_map(|r| r.params.0.keys().cloned())
        .collect();
    param_keys.sort();
    param_keys.dedup();

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| io_err("opening optimization csv", e))?;

    let mut header = vec![
        "rank".to_string(),
        "score".to_string(),
        "win_rate".to_string(),
        "profit_factor".to_string(),
        "sharpe_ratio".to_string(),
        "max_dd_pct".to_string(),
        "total_net_profit".to_string(),
    ];
    header.extend(param_keys.iter().cloned());
    writer.write_record(&header).map_err(|e| io_err("writing csv header", e))?;

    for (idx, record) in records.iter().enumerate() {
        let mut row = vec![
            (idx + 1).to_string(),
            record
                .ranked_score
                .map(|s| format!("{s:.6}"))
                .unwrap_or_else(|| "".to_string()),
            format!("{:.2}", record.stats.win_rate_pct.to_f64().unwrap_or(0.0)),
            record
                .stats
                .profit_factor
                .map(|pf| format!("{:.4}", pf.to_f64().unwrap_or(0.0)))
                .unwrap_or_else(|| "".to_string()),
            record
                .stats
                .sharpe_ratio
                .map(|s| format!("{s:.4}"))
                .unwrap_or_else(|| "".to_string()),
            format!("{:.2}", record.stats.max_drawdown_pct.to_f64().unwrap_or(0.0)),
            format_money(record.stats.net_profit),
        ];
        for key in &param_keys {
            row.push(match record.params.get(key) {
                Some(ParamValue::Float(v)) => v.to_string(),
                Some(ParamValue::Int(v)) => v.to_string(),
                Some(ParamValue::Bool(v)) => v.to_string(),
                Some(ParamValue::Enum(v)) => v.clone(),
                None => String::new(),
            });
        }
        writer.write_record(&row).map_err(|e| io_err("writing csv row", e))?;
    }

    writer.flush().map_err(|e| io_err("flushing optimization csv", e))?;
    Ok(())
}
