use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;

use crate::domain::params::{ParamValue, ParameterSet};
use crate::domain::result::ReplayStats;

/// One in-sample/out-of-sample pair (§4.8 "Walk-forward").
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub is_start_ms: i64,
    pub is_end_ms: i64,
    pub oos_start_ms: i64,
    pub oos_end_ms: i64,
}

/// Divides `[total_start_ms, total_end_ms]` into `windows` overlapping
/// slices of size `total/windows`, stepped by `step_days`, each split
/// 70% in-sample / 30% out-of-sample.
pub fn generate_windows(
    total_start_ms: i64,
    total_end_ms: i64,
    windows: usize,
    step_days: i64,
) -> Vec<Window> {
    if windows == 0 || total_end_ms <= total_start_ms {
        return Vec::new();
    }
    let total_ms = total_end_ms - total_start_ms;
    let window_size_ms = total_ms / windows as i64;
    let step_ms = step_days.max(1) * 86_400_000;

    let mut out = Vec::with_capacity(windows);
    for w in 0..windows {
        let start = total_start_ms + step_ms * w as i64;
        let end = (start + window_size_ms).min(total_end_ms);
        if start >= end {
            break;
        }
        let is_len = ((end - start) as f64 * 0.7) as i64;
        let is_end = start + is_len;
        out.push(Window {
            is_start_ms: start,
            is_end_ms: is_end,
            oos_start_ms: is_end,
            oos_end_ms: end,
        });
    }
    out
}

/// `0.4*(1-|Δwin_rate|) + 0.4*max(0,1-|Δpf|/2) + 0.2*max(0,1-|Δsharpe|/2)`
/// (§4.8 "Walk-forward"). Deltas are in-sample minus out-of-sample.
pub fn stability_score(is_stats: &ReplayStats, oos_stats: &ReplayStats) -> f64 {
    let is_win_rate = is_stats.win_rate_pct.to_f64().unwrap_or(0.0) / 100.0;
    let oos_win_rate = oos_stats.win_rate_pct.to_f64().unwrap_or(0.0) / 100.0;
    let delta_win_rate = (is_win_rate - oos_win_rate).abs();

    let is_pf = is_stats.profit_factor.and_then(|v| v.to_f64()).unwrap_or(0.0);
    let oos_pf = oos_stats.profit_factor.and_then(|v| v.to_f64()).unwrap_or(0.0);
    let delta_pf = (is_pf - oos_pf).abs();

    let is_sharpe = is_stats.sharpe_ratio.unwrap_or(0.0);
    let oos_sharpe = oos_stats.sharpe_ratio.unwrap_or(0.0);
    let delta_sharpe = (is_sharpe - oos_sharpe).abs();

    0.4 * (1.0 - delta_win_rate)
        + 0.4 * (1.0 - delta_pf / 2.0).max(0.0)
        + 0.2 * (1.0 - delta_sharpe / 2.0).max(0.0)
}

/// One evaluated walk-forward window: the best in-sample parameter set,
/// its out-of-sample replay, and the resulting stability score.
#[derive(Debug, Clone)]
pub struct WindowResult {
    pub window: Window,
    pub best_params: ParameterSet,
    pub in_sample_stats: ReplayStats,
    pub out_of_sample_stats: ReplayStats,
    pub stability: f64,
}

/// Aggregates across windows: per-parameter mode (most frequently chosen
/// value), and plain-mean out-of-sample win rate / profit factor / sharpe
/// (§4.8 "After all windows: aggregate by voting").
pub fn aggregate_by_vote(windows: &[WindowResult]) -> ParameterSet {
    let mut counts: HashMap<String, HashMap<String, (ParamValue, u32)>> = HashMap::new();
    for w in windows {
        for (key, value) in &w.best_params.0 {
            let bucket = counts.entry(key.clone()).or_default();
            let repr = format!("{value:?}");
            bucket
                .entry(repr)
                .and_modify(|(_, n)| *n += 1)
                .or_insert((value.clone(), 1));
        }
    }
    let mut out = ParameterSet::default();
    for (key, bucket) in counts {
        if let Some((value, _)) = bucket.into_values().max_by_key(|(_, n)| *n) {
            out.insert(key, value);
        }
    }
    out
}

pub fn average_oos_win_rate(windows: &[WindowResult]) -> f64 {
    if windows.is_empty() {
        return 0.0;
    }
    let sum: f64 = windows
        .iter()
        .map(|w| w.out_of_sample_stats.win_rate_pct.to_f64().unwrap_or(0.0))
        .sum();
    sum / windows.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_windows_over_a_year_with_thirty_day_step() {
        let start = 1_704_067_200_000; // 2024-01-01
        let end = 1_735_603_200_000; // 2024-12-31
        let windows = generate_windows(start, end, 5, 30);
        assert_eq!(windows.len(), 5);
        for w in &windows {
            assert!(w.is_start_ms < w.is_end_ms);
            assert!(w.is_end_ms < w.oos_end_ms);
        }
    }

    #[test]
    fn stability_score_is_one_when_metrics_match_exactly() {
        let stats = ReplayStats {
            win_rate_pct: rust_decimal_macros::dec!(50),
            profit_factor: Some(rust_decimal_macros::dec!(2)),
            sharpe_ratio: Some(1.0),
            ..Default::default()
        };
        assert_eq!(stability_score(&stats, &stats), 1.0);
    }

    #[test]
    fn mode_picks_most_frequent_value_per_parameter() {
        let mut a = ParameterSet::default();
        a.insert("period", ParamValue::Int(10));
        let mut b = ParameterSet::default();
        b.insert("period", ParamValue::Int(10));
        let mut c = ParameterSet::default();
        c.insert("period", ParamValue::Int(20));

        let windows = vec![
            WindowResult {
                window: Window { is_start_ms: 0, is_end_ms: 1, oos_start_ms: 1, oos_end_ms: 2 },
                best_params: a,
                in_sample_stats: ReplayStats::default(),
                out_of_sample_stats: ReplayStats::default(),
                stability: 1.0,
            },
            WindowResult {
                window: Window { is_start_ms: 0, is_end_ms: 1, oos_start_ms: 1, oos_end_ms: 2 },
                best_params: b,
                in_sample_stats: ReplayStats::default(),
                out_of_sample_stats: ReplayStats::default(),
                stability: 1.0,
            },
            WindowResult {
                window: Window { is_start_ms: 0, is_end_ms: 1, oos_start_ms: 1, oos_end_ms: 2 },
                best_params: c,
                in_sample_stats: ReplayStats::default(),
                out_of_sample_stats: ReplayStats::default(),
                stability: 1.0,
            },
        ];
        let aggregated = aggregate_by_vote(&windows);
        assert_eq!(aggregated.get("period").unwrap().as_usize(), Some(10));
    }
}
