use rayon::prelude::*;
use uuid::Uuid;

use crate::application::analyzer::AnalyzerConfig;
use crate::application::execution_filter::ExecutionFilterConfig;
use crate::application::replay_engine::{CancellationToken, NewsGate, ReplayConfig, ReplayEngine, ReplayOutcome};
use crate::application::signal_synth::SignalConfig;
use crate::domain::candle::Candle;
use crate::domain::optimization::{OptimizationResultRecord, ScoreWeights};
use crate::domain::params::ParameterSet;

/// Everything a replay needs that is constant across one sweep; only the
/// parameter set varies between dispatched replays (§4.8 "Dispatch").
#[derive(Clone)]
pub struct SweepContext<'a> {
    pub run_id: Uuid,
    pub bars: &'a [(String, Candle)],
    pub replay_config: ReplayConfig,
    pub analyzer_config: AnalyzerConfig,
    pub signal_config: SignalConfig,
    pub filter_config: ExecutionFilterConfig,
    pub news_gate: &'a NewsGate,
    pub score_weights: ScoreWeights,
}

/// Runs one replay per parameter set, up to `parallelism` at a time.
/// Each replay owns disjoint state (§5 "Across replays"); a replay that
/// errors is recorded as a `-inf`-scored result rather than aborting the
/// sweep (§4.8 "Dispatch", §7 `DataUnavailable` recovery).
pub fn evaluate_batch(
    ctx: &SweepContext,
    param_sets: Vec<ParameterSet>,
    parallelism: usize,
) -> Vec<OptimizationResultRecord> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism.max(1))
        .build();
    let run = |params: ParameterSet| evaluate_one(ctx, params);

    match pool {
        Ok(pool) => pool.install(|| param_sets.into_par_iter().map(run).collect()),
        Err(_) => param_sets.into_iter().map(run).collect(),
    }
}

fn evaluate_one(ctx: &SweepContext, params: ParameterSet) -> OptimizationResultRecord {
    let engine = ReplayEngine::new(
        ctx.replay_config.clone(),
        ctx.analyzer_config,
        ctx.signal_config.clone(),
        ctx.filter_config.clone(),
    );
    let cancel = CancellationToken::new();
    match engine.run(ctx.bars, &params, ctx.news_gate, &cancel) {
        Ok(ReplayOutcome::Completed(result)) | Ok(ReplayOutcome::Cancelled(result)) => {
            let score = ctx.score_weights.score(&result.stats);
            OptimizationResultRecord {
                run_id: ctx.run_id,
                params,
                stats: result.stats,
                equity_curve: result.equity_curve,
                trades: result.trades,
                ranked_score: Some(score),
                out_of_sample_score: None,
            }
        }
        Err(_) => OptimizationResultRecord {
            run_id: ctx.run_id,
            params,
            stats: Default::default(),
            equity_curve: Vec::new(),
            trades: Vec::new(),
            ranked_score: Some(f64::NEG_INFINITY),
            out_of_sample_score: None,
        },
    }
}

/// Sorts descending by `ranked_score`, treating a missing score as worse
/// than any real one (§5 "callers must sort by ranked_score explicitly").
pub fn rank_descending(mut results: Vec<OptimizationResultRecord>) -> Vec<OptimizationResultRecord> {
    results.sort_by(|a, b| {
        let a_score = a.ranked_score.unwrap_or(f64::NEG_INFINITY);
        let b_score = b.ranked_score.unwrap_or(f64::NEG_INFINITY);
        b_score.partial_cmp(&a_score).unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}
