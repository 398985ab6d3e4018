//! Exercises the grid-search path of `optimizer::optimize`, the way
//! `bin/optimize.rs` drives it for `--method grid`.

use std::collections::HashMap;

use rust_decimal_macros::dec;
use uuid::Uuid;

use replaylab::application::analyzer::AnalyzerConfig;
use replaylab::application::data_loader::SyntheticCandleSource;
use replaylab::application::execution_filter::ExecutionFilterConfig;
use replaylab::application::optimizer::{optimize, OptimizeOutcome, OptimizeRequest, ReplayEnvironment, SearchSpace};
use replaylab::application::replay_engine::{NewsGate, ReplayConfig};
use replaylab::application::signal_synth::SignalConfig;
use replaylab::domain::candle::Candle;
use replaylab::domain::optimization::{ScoreWeights, SearchMethod};
use replaylab::domain::params::{ParamGrid, ParamValue};
use replaylab::domain::ports::CandleSource;
use replaylab::domain::timeframe::Timeframe;

fn filter_config() -> ExecutionFilterConfig {
    ExecutionFilterConfig {
        session_start_minute: 0,
        session_end_minute: 1440,
        max_spread_pips: dec!(3),
        min_minutes_between_trades: 15,
        max_daily_trades: 10,
        max_concurrent_per_symbol: 2,
        max_concurrent_per_direction: None,
        max_concurrent_global: 10,
        max_daily_risk_dollars_per_symbol: dec!(1000),
        max_daily_risk_dollars_global: dec!(5000),
        confluence_threshold: 60,
    }
}

fn replay_config() -> ReplayConfig {
    ReplayConfig {
        strategy: "smc".to_string(),
        initial_balance: dec!(10_000),
        risk_percent: rust_decimal::Decimal::ONE,
        contract_size: dec!(100_000),
        pip_size: dec!(0.0001),
        pip_value: dec!(10),
        min_lot: dec!(0.01),
        max_lot: dec!(10),
        equity_snapshot_every_n_bars: 60,
        htf: Timeframe::H4,
        itf: Timeframe::H1,
        ltf: Timeframe::M15,
        htf_bars: 100,
        itf_bars: 100,
        ltf_bars: 100,
    }
}

#[tokio::test]
async fn grid_sweep_ranks_every_combination() {
    let source = SyntheticCandleSource::new(11, Timeframe::M1);
    let candles: Vec<Candle> = source.load("EURUSD", 0, 2 * 24 * 60 * 60_000).await.unwrap();
    let bars: Vec<(String, Candle)> = candles.into_iter().map(|c| ("EURUSD".to_string(), c)).collect();

    let mut fields = HashMap::new();
    fields.insert(
        "confluence_threshold".to_string(),
        vec![ParamValue::Int(50), ParamValue::Int(65), ParamValue::Int(80)],
    );
    let grid = ParamGrid(fields);

    let news_gate = NewsGate::new();
    let env = ReplayEnvironment {
        replay_config: replay_config(),
        analyzer_config: AnalyzerConfig::default(),
        signal_config: SignalConfig::default(),
        filter_config: filter_config(),
        news_gate: &news_gate,
    };
    let request = OptimizeRequest {
        run_id: Uuid::new_v4(),
        method: SearchMethod::Grid,
        search_space: SearchSpace::Grid(grid),
        trials: 0,
        parallel_runs: 2,
        walk_forward_windows: 0,
        walk_forward_step_days: 0,
        seed: 99,
        score_weights: ScoreWeights::default(),
    };

    let outcome = optimize(&request, &bars, &env).expect("grid sweep should not error");
    match outcome {
        OptimizeOutcome::Swept(records) => {
            assert_eq!(records.len(), 3, "one result per grid combination");
            // Ranked descending by score.
            for window in records.windows(2) {
                let a = window[0].ranked_score.unwrap_or(f64::NEG_INFINITY);
                let b = window[1].ranked_score.unwrap_or(f64::NEG_INFINITY);
                assert!(a >= b, "results must be sorted by descending score");
            }
        }
        OptimizeOutcome::WalkForward(_) => panic!("grid method must not produce a walk-forward outcome"),
    }
}
