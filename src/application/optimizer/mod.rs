//! Parameter-space enumeration, parallel replay fan-out, scoring and
//! walk-forward orchestration (C8). Wraps the replay engine as a pure
//! function `run(params, data_window) -> metrics` and composes many
//! such calls (§3 "Data flow").

mod dispatch;
pub mod grid;
pub mod random;
pub mod tpe;
pub mod walk_forward;

pub use dispatch::{evaluate_batch, rank_descending, SweepContext};
pub use walk_forward::{Window, WindowResult};

use rand::SeedableRng;
use rand::rngs::StdRng;
use uuid::Uuid;

use crate::application::analyzer::AnalyzerConfig;
use crate::application::execution_filter::ExecutionFilterConfig;
use crate::application::replay_engine::{
    CancellationToken, NewsGate, ReplayConfig, ReplayEngine, ReplayOutcome,
};
use crate::application::signal_synth::SignalConfig;
use crate::domain::candle::Candle;
use crate::domain::errors::EngineResult;
use crate::domain::optimization::{OptimizationResultRecord, ScoreWeights, SearchMethod};
use crate::domain::params::{ParamGrid, ParamRanges, ParameterSet};

/// Either a fixed grid or a continuous range space; which one is present
/// constrains the usable `SearchMethod`s (§4.8).
pub enum SearchSpace {
    Grid(ParamGrid),
    Ranges(ParamRanges),
}

pub struct OptimizeRequest {
    pub run_id: Uuid,
    pub method: SearchMethod,
    pub search_space: SearchSpace,
    pub trials: usize,
    pub parallel_runs: usize,
    pub walk_forward_windows: usize,
    pub walk_forward_step_days: i64,
    pub seed: u64,
    pub score_weights: ScoreWeights,
}

pub struct WalkForwardOutcome {
    pub windows: Vec<WindowResult>,
    pub aggregated_params: ParameterSet,
    pub average_oos_win_rate: f64,
}

pub enum OptimizeOutcome {
    Swept(Vec<OptimizationResultRecord>),
    WalkForward(WalkForwardOutcome),
}

/// Everything a replay needs besides the parameter set and the bar
/// window it runs over.
pub struct ReplayEnvironment<'a> {
    pub replay_config: ReplayConfig,
    pub analyzer_config: AnalyzerConfig,
    pub signal_config: SignalConfig,
    pub filter_config: ExecutionFilterConfig,
    pub news_gate: &'a NewsGate,
}

/// Public entry point: `optimize(request) -> results | walkforward_result`
/// (§4.8). `bars` must already be merged and sorted the way
/// `ReplayEngine::run` expects.
pub fn optimize(
    request: &OptimizeRequest,
    bars: &[(String, Candle)],
    env: &ReplayEnvironment,
) -> EngineResult<OptimizeOutcome> {
    if request.method == SearchMethod::WalkForward {
        return Ok(OptimizeOutcome::WalkForward(run_walk_forward(request, bars, env)));
    }
    let ctx = sweep_context(request, bars, env);
    let results = if request.method == SearchMethod::Tpe {
        run_tpe_trials(request, &ctx)
    } else {
        let param_sets = generate_param_sets(request);
        evaluate_batch(&ctx, param_sets, request.parallel_runs.max(1))
    };
    Ok(OptimizeOutcome::Swept(rank_descending(results)))
}

/// TPE is inherently sequential: each proposal is conditioned on the
/// scores of every prior trial, so replays are evaluated one at a time
/// rather than dispatched in parallel batches of `P` (§4.8).
fn run_tpe_trials(request: &OptimizeRequest, ctx: &SweepContext) -> Vec<OptimizationResultRecord> {
    let SearchSpace::Ranges(ranges) = &request.search_space else {
        return Vec::new();
    };
    let trials = request.trials.max(1);
    let mut rng = StdRng::seed_from_u64(request.seed);
    let mut history: Vec<(ParameterSet, f64)> = Vec::with_capacity(trials);
    let mut results = Vec::with_capacity(trials);
    for trial_idx in 0..trials {
        let candidate = tpe::suggest_next(ranges, &history, trial_idx, trials, &mut rng);
        let record = evaluate_batch(ctx, vec![candidate.clone()], 1)
            .into_iter()
            .next()
            .expect("evaluate_batch always returns one record per input set");
        history.push((candidate, record.ranked_score.unwrap_or(f64::NEG_INFINITY)));
        results.push(record);
    }
    results
}

fn sweep_context<'a>(
    request: &OptimizeRequest,
    bars: &'a [(String, Candle)],
    env: &ReplayEnvironment<'a>,
) -> SweepContext<'a> {
    SweepContext {
        run_id: request.run_id,
        bars,
        replay_config: env.replay_config.clone(),
        analyzer_config: env.analyzer_config,
        signal_config: env.signal_config.clone(),
        filter_config: env.filter_config.clone(),
        news_gate: env.news_gate,
        score_weights: request.score_weights,
    }
}

fn generate_param_sets(request: &OptimizeRequest) -> Vec<ParameterSet> {
    let mut rng = StdRng::seed_from_u64(request.seed);
    match (&request.method, &request.search_space) {
        (SearchMethod::Grid, SearchSpace::Grid(grid)) => grid::generate_combinations(grid),
        (SearchMethod::Random, SearchSpace::Ranges(ranges)) => {
            random::sample_many(ranges, request.trials.max(1), &mut rng)
        }
        // A grid handed to Random, or a range space handed to Grid, is a
        // caller error upstream of this module; degrade to enumerating the
        // grid (if any) rather than producing zero candidates.
        (_, SearchSpace::Grid(grid)) => grid::generate_combinations(grid),
        (_, SearchSpace::Ranges(ranges)) => random::sample_many(ranges, request.trials.max(1), &mut rng),
    }
}

fn slice_bars(bars: &[(String, Candle)], start_ms: i64, end_ms: i64) -> Vec<(String, Candle)> {
    bars.iter()
        .filter(|(_, c)| c.timestamp_ms >= start_ms && c.timestamp_ms < end_ms)
        .cloned()
        .collect()
}

fn run_walk_forward(
    request: &OptimizeRequest,
    bars: &[(String, Candle)],
    env: &ReplayEnvironment,
) -> WalkForwardOutcome {
    let (total_start, total_end) = match (bars.first(), bars.last()) {
        (Some((_, first)), Some((_, last))) => (first.timestamp_ms, last.timestamp_ms + 1),
        _ => (0, 0),
    };
    let windows = walk_forward::generate_windows(
        total_start,
        total_end,
        request.walk_forward_windows.max(1),
        request.walk_forward_step_days,
    );

    let mut window_results = Vec::with_capacity(windows.len());
    for window in windows {
        let is_bars = slice_bars(bars, window.is_start_ms, window.is_end_ms);
        let oos_bars = slice_bars(bars, window.oos_start_ms, window.oos_end_ms);
        if is_bars.is_empty() || oos_bars.is_empty() {
            continue;
        }

        // Sub-optimizer over in-sample: grid if one was supplied, else a
        // small random search (§4.8 "run a sub-optimizer").
        let sub_param_sets = match &request.search_space {
            SearchSpace::Grid(grid) => grid::generate_combinations(grid),
            SearchSpace::Ranges(ranges) => {
                let mut rng = StdRng::seed_from_u64(request.seed);
                random::sample_many(ranges, 20, &mut rng)
            }
        };
        let is_ctx = sweep_context(request, &is_bars, env);
        let is_results = rank_descending(evaluate_batch(
            &is_ctx,
            sub_param_sets,
            request.parallel_runs.max(1),
        ));
        let Some(best) = is_results.into_iter().next() else {
            continue;
        };

        let oos_engine = ReplayEngine::new(
            env.replay_config.clone(),
            env.analyzer_config,
            env.signal_config.clone(),
            env.filter_config.clone(),
        );
        let cancel = CancellationToken::new();
        let oos_stats = match oos_engine.run(&oos_bars, &best.params, env.news_gate, &cancel) {
            Ok(ReplayOutcome::Completed(result)) | Ok(ReplayOutcome::Cancelled(result)) => result.stats,
            Err(_) => continue,
        };

        let stability = walk_forward::stability_score(&best.stats, &oos_stats);
        window_results.push(WindowResult {
            window,
            best_params: best.params,
            in_sample_stats: best.stats,
            out_of_sample_stats: oos_stats,
            stability,
        });
    }

    let aggregated_params = walk_forward::aggregate_by_vote(&window_results);
    let average_oos_win_rate = walk_forward::average_oos_win_rate(&window_results);
    WalkForwardOutcome {
        windows: window_results,
        aggregated_params,
        average_oos_win_rate,
    }
}
