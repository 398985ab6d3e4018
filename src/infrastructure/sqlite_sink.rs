use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::optimization::{OptimizationResultRecord, OptimizationRun, OptimizationStatus};
use crate::domain::ports::ResultSink;
use crate::domain::result::ReplayResult;

/// Persistence deadline beyond which a save is logged and abandoned
/// rather than blocking the caller (§5 "Timeouts": result-sink
/// persistence carries a hard 10s overall deadline).
const PERSISTENCE_DEADLINE: Duration = Duration::from_secs(10);

/// Append-only SQLite-backed result sink (§3 "Result sink", §6
/// "Persistence schema"). Failures never abort the replay that produced
/// the data — the caller already has the computed result in memory; this
/// sink only affects whether it also lands on disk (§7 `PersistenceError`).
#[derive(Clone)]
pub struct SqliteResultSink {
    pool: SqlitePool,
}

impl SqliteResultSink {
    pub async fn connect(db_url: &str) -> EngineResult<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).await.map_err(|e| EngineError::PersistenceError(
                        format!("failed to create database directory: {e}"),
                    ))?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)
            .map_err(|e| EngineError::PersistenceError(format!("invalid DATABASE_URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| EngineError::PersistenceError(format!("failed to connect to sqlite: {e}")))?;

        info!(db_url, "connected to result sink database");
        let sink = Self { pool };
        sink.init().await?;
        Ok(sink)
    }

    async fn init(&self) -> EngineResult<()> {
        let ddl = [
            r#"CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                method TEXT NOT NULL,
                symbol TEXT NOT NULL,
                param_set TEXT,
                in_sample_range TEXT NOT NULL,
                out_sample_range TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                error TEXT
            )"#,
            r#"CREATE TABLE IF NOT EXISTS results (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL REFERENCES runs(id),
                param_set TEXT NOT NULL,
                metrics TEXT NOT NULL,
                equity_curve TEXT NOT NULL,
                trades TEXT NOT NULL,
                ranked_score REAL
            )"#,
            r#"CREATE INDEX IF NOT EXISTS idx_results_run_id ON results (run_id)"#,
            r#"CREATE TABLE IF NOT EXISTS backtest_runs (
                id TEXT PRIMARY KEY,
                param_set TEXT NOT NULL,
                initial_balance TEXT NOT NULL,
                final_balance TEXT NOT NULL,
                runtime_ms INTEGER NOT NULL,
                stats TEXT NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS backtest_trades (
                run_id TEXT NOT NULL REFERENCES backtest_runs(id),
                ticket INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                exit_price TEXT NOT NULL,
                entry_time INTEGER NOT NULL,
                exit_time INTEGER NOT NULL,
                pnl TEXT NOT NULL,
                PRIMARY KEY (run_id, ticket)
            )"#,
            r#"CREATE TABLE IF NOT EXISTS backtest_equity (
                run_id TEXT NOT NULL REFERENCES backtest_runs(id),
                timestamp INTEGER NOT NULL,
                balance TEXT NOT NULL,
                equity TEXT NOT NULL,
                drawdown TEXT NOT NULL,
                drawdown_pct TEXT NOT NULL,
                PRIMARY KEY (run_id, timestamp)
            )"#,
        ];
        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| EngineError::PersistenceError(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

fn status_str(status: OptimizationStatus) -> &'static str {
    match status {
        OptimizationStatus::Pending => "pending",
        OptimizationStatus::Running => "running",
        OptimizationStatus::Completed => "completed",
        OptimizationStatus::Failed => "failed",
        OptimizationStatus::Cancelled => "cancelled",
    }
}

#[async_trait]
impl ResultSink for SqliteResultSink {
    async fn save_replay(&self, result: &ReplayResult) -> EngineResult<()> {
        let outcome = tokio::time::timeout(PERSISTENCE_DEADLINE, async {
            let params = serde_json::to_string(&result.params)
                .map_err(|e| EngineError::PersistenceError(e.to_string()))?;
            let stats = serde_json::to_string(&result.stats)
                .map_err(|e| EngineError::PersistenceError(e.to_string()))?;

            sqlx::query(
                "INSERT OR REPLACE INTO backtest_runs \
                 (id, param_set, initial_balance, final_balance, runtime_ms, stats) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(result.run_id.to_string())
            .bind(params)
            .bind(result.initial_balance.to_string())
            .bind(result.final_balance.to_string())
            .bind(result.runtime_ms as i64)
            .bind(stats)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::PersistenceError(e.to_string()))?;

            for trade in &result.trades {
                sqlx::query(
                    "INSERT OR REPLACE INTO backtest_trades \
                     (run_id, ticket, symbol, direction, entry_price, exit_price, entry_time, exit_time, pnl) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(result.run_id.to_string())
                .bind(trade.ticket as i64)
                .bind(&trade.symbol)
                .bind(format!("{:?}", trade.direction))
                .bind(trade.entry_price.to_string())
                .bind(trade.exit_price.to_string())
                .bind(trade.entry_time_ms)
                .bind(trade.exit_time_ms)
                .bind(trade.pnl.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| EngineError::PersistenceError(e.to_string()))?;
            }

            for point in &result.equity_curve {
                sqlx::query(
                    "INSERT OR REPLACE INTO backtest_equity \
                     (run_id, timestamp, balance, equity, drawdown, drawdown_pct) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(result.run_id.to_string())
                .bind(point.timestamp_ms)
                .bind(point.balance.to_string())
                .bind(point.equity.to_string())
                .bind(point.drawdown.to_string())
                .bind(point.drawdown_pct.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| EngineError::PersistenceError(e.to_string()))?;
            }
            Ok::<(), EngineError>(())
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(error = %e, "persisting replay result failed");
                Ok(())
            }
            Err(_) => {
                warn!(run_id = %result.run_id, "persisting replay result timed out after 10s");
                Ok(())
            }
        }
    }

    async fn save_optimization_run(&self, run: &OptimizationRun) -> EngineResult<()> {
        let param_set: Option<String> = None;
        let in_sample = serde_json::json!({
            "start_ms": run.in_sample_start_ms,
            "end_ms": run.in_sample_end_ms,
        })
        .to_string();
        let out_sample = run.out_sample_start_ms.map(|start| {
            serde_json::json!({"start_ms": start, "end_ms": run.out_sample_end_ms}).to_string()
        });

        let result = sqlx::query(
            "INSERT OR REPLACE INTO runs \
             (id, method, symbol, param_set, in_sample_range, out_sample_range, status, created_at, completed_at, error) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(run.run_id.to_string())
        .bind(format!("{:?}", run.method))
        .bind(run.symbols.join(","))
        .bind(param_set)
        .bind(in_sample)
        .bind(out_sample)
        .bind(status_str(run.status))
        .bind(run.created_at.to_rfc3339())
        .bind(run.completed_at.map(|t| t.to_rfc3339()))
        .bind(run.error.clone())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(error = %e, "persisting optimization run failed");
        }
        Ok(())
    }

    async fn update_optimization_status(&self, run: &OptimizationRun) -> EngineResult<()> {
        let result = sqlx::query(
            "UPDATE runs SET status = ?, completed_at = ?, error = ? WHERE id = ?",
        )
        .bind(status_str(run.status))
        .bind(run.completed_at.map(|t| t.to_rfc3339()))
        .bind(run.error.clone())
        .bind(run.run_id.to_string())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(error = %e, "updating optimization run status failed");
        }
        Ok(())
    }

    async fn save_optimization_result(&self, record: &OptimizationResultRecord) -> EngineResult<()> {
        let params = serde_json::to_string(&record.params).unwrap_or_default();
        let metrics = serde_json::to_string(&record.stats).unwrap_or_default();
        let equity_curve = serde_json::to_string(&record.equity_curve).unwrap_or_default();
        let trades = serde_json::to_string(&record.trades).unwrap_or_default();

        let result = sqlx::query(
            "INSERT INTO results (id, run_id, param_set, metrics, equity_curve, trades, ranked_score) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(record.run_id.to_string())
        .bind(params)
        .bind(metrics)
        .bind(equity_curve)
        .bind(trades)
        .bind(record.ranked_score)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(error = %e, "persisting optimization result failed");
        }
        Ok(())
    }

    async fn load_replay(&self, run_id: uuid::Uuid) -> EngineResult<Option<ReplayResult>> {
        let row: Option<(String, String, String, String, i64, String)> = sqlx::query_as(
            "SELECT param_set, initial_balance, final_balance, id, runtime_ms, stats \
             FROM backtest_runs WHERE id = ?",
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::PersistenceError(e.to_string()))?;

        let Some((params_json, initial_balance, final_balance, _id, runtime_ms, stats_json)) = row else {
            return Ok(None);
        };

        let params = serde_json::from_str(&params_json)
            .map_err(|e| EngineError::PersistenceError(e.to_string()))?;
        let stats = serde_json::from_str(&stats_json)
            .map_err(|e| EngineError::PersistenceError(e.to_string()))?;

        let trade_rows: Vec<(i64, String, String, String, String, i64, i64, String)> = sqlx::query_as(
            "SELECT ticket, symbol, direction, entry_price, exit_price, entry_time, exit_time, pnl \
             FROM backtest_trades WHERE run_id = ? ORDER BY ticket",
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::PersistenceError(e.to_string()))?;

        let trades = trade_rows
            .into_iter()
            .map(|(ticket, symbol, direction, entry_price, exit_price, entry_time, exit_time, pnl)| {
                crate::domain::position::ClosedTrade {
                    ticket: ticket as u64,
                    symbol,
                    direction: if direction == "Bullish" {
                        crate::domain::swing::Direction::Bullish
                    } else {
                        crate::domain::swing::Direction::Bearish
                    },
                    strategy: String::new(),
                    entry_price: entry_price.parse().unwrap_or_default(),
                    exit_price: exit_price.parse().unwrap_or_default(),
                    entry_time_ms: entry_time,
                    exit_time_ms: exit_time,
                    sl: Default::default(),
                    tp: Default::default(),
                    volume: Default::default(),
                    pnl: pnl.parse().unwrap_or_default(),
                    duration_minutes: (exit_time - entry_time) / 60_000,
                    pips: Default::default(),
                    risk_reward: Default::default(),
                    close_reason: crate::domain::position::CloseReason::ForcedClose,
                }
            })
            .collect();

        let equity_rows: Vec<(i64, String, String, String, String)> = sqlx::query_as(
            "SELECT timestamp, balance, equity, drawdown, drawdown_pct \
             FROM backtest_equity WHERE run_id = ? ORDER BY timestamp",
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::PersistenceError(e.to_string()))?;

        let equity_curve = equity_rows
            .into_iter()
            .map(|(timestamp_ms, balance, equity, drawdown, drawdown_pct)| {
                crate::domain::equity::EquityPoint {
                    timestamp_ms,
                    balance: balance.parse().unwrap_or_default(),
                    equity: equity.parse().unwrap_or_default(),
                    drawdown: drawdown.parse().unwrap_or_default(),
                    drawdown_pct: drawdown_pct.parse().unwrap_or_default(),
                }
            })
            .collect();

        Ok(Some(ReplayResult {
            run_id,
            params,
            trades,
            equity_curve,
            stats,
            initial_balance: initial_balance.parse().unwrap_or_default(),
            final_balance: final_balance.parse().unwrap_or_default(),
            runtime_ms: runtime_ms as u64,
        }))
    }
}
