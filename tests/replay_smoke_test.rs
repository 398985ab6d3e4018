//! End-to-end smoke test driving the full `ReplayEngine` hot loop over
//! synthetic candles, the way `bin/replay.rs` drives it.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use replaylab::application::analyzer::AnalyzerConfig;
use replaylab::application::execution_filter::ExecutionFilterConfig;
use replaylab::application::replay_engine::{CancellationToken, NewsGate, ReplayConfig, ReplayEngine, ReplayOutcome};
use replaylab::application::signal_synth::SignalConfig;
use replaylab::domain::candle::Candle;
use replaylab::domain::params::ParameterSet;
use replaylab::domain::ports::CandleSource;
use replaylab::domain::timeframe::Timeframe;
use replaylab::application::data_loader::SyntheticCandleSource;

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
        risk_percent: Decimal::ONE,
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
async fn replay_completes_over_synthetic_history() {
    let source = SyntheticCandleSource::new(7, Timeframe::M1);
    // Three trading days of M1 bars, enough for the analyzer to build
    // HTF/ITF/LTF context and for the execution filter's daily windows
    // to roll over at least twice.
    let from_ms = 0;
    let to_ms = 3 * 24 * 60 * 60_000;
    let candles: Vec<Candle> = source.load("EURUSD", from_ms, to_ms).await.unwrap();
    assert!(candles.len() > 1000, "expected a few days of M1 bars");

    let bars: Vec<(String, Candle)> = candles.into_iter().map(|c| ("EURUSD".to_string(), c)).collect();

    let engine = ReplayEngine::new(replay_config(), AnalyzerConfig::default(), SignalConfig::default(), filter_config());
    let news_gate = NewsGate::new();
    let cancel = CancellationToken::new();
    let params = ParameterSet::default();

    let outcome = engine.run(&bars, &params, &news_gate, &cancel).expect("replay should not error");

    match outcome {
        ReplayOutcome::Completed(result) => {
            assert_eq!(result.initial_balance, dec!(10_000));
            assert!(!result.equity_curve.is_empty());
            // Equity must never retreat above its own running peak.
            let mut peak = result.equity_curve[0].balance;
            for point in &result.equity_curve {
                peak = peak.max(point.balance);
                assert!(point.drawdown_pct >= Decimal::ZERO);
            }
            // Every closed trade's exit must not precede its entry.
            for trade in &result.trades {
                assert!(trade.exit_time_ms >= trade.entry_time_ms);
            }
        }
        ReplayOutcome::Cancelled(_) => panic!("replay should not self-cancel"),
    }
}

#[tokio::test]
async fn cancellation_token_stops_the_loop_early() {
    let source = SyntheticCandleSource::new(7, Timeframe::M1);
    let candles = source.load("EURUSD", 0, 3 * 24 * 60 * 60_000).await.unwrap();
    let bars: Vec<(String, Candle)> = candles.into_iter().map(|c| ("EURUSD".to_string(), c)).collect();

    let engine = ReplayEngine::new(replay_config(), AnalyzerConfig::default(), SignalConfig::default(), filter_config());
    let news_gate = NewsGate::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let params = ParameterSet::default();

    let outcome = engine.run(&bars, &params, &news_gate, &cancel).expect("cancelled replay should not error");
    match outcome {
        ReplayOutcome::Cancelled(result) => {
            assert!(result.equity_curve.len() <= bars.len());
        }
        ReplayOutcome::Completed(_) => panic!("a pre-cancelled token must short-circuit the loop"),
    }
}
