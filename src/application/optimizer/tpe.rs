use rand::Rng;

use crate::application::optimizer::random::{sample_one, sample_value};
use crate::domain::params::{ParamRange, ParamRanges, ParamValue, ParameterSet};

/// Tree-structured-Parzen-like proposal: the first 20% of trials explore
/// uniformly; afterwards, each parameter is resampled from a random
/// above-median ("good") observation and perturbed by ±10% of its range
/// (§4.8 "Tree-structured Parzen-like search"). Falls back to a uniform
/// draw whenever the good/bad split is degenerate.
pub fn suggest_next(
    ranges: &ParamRanges,
    history: &[(ParameterSet, f64)],
    trial_idx: usize,
    total_trials: usize,
    rng: &mut impl Rng,
) -> ParameterSet {
    let exploration_trials = ((total_trials as f64) * 0.2).ceil() as usize;
    if trial_idx < exploration_trials || history.is_empty() {
        return sample_one(ranges, rng);
    }

    let mut by_score = history.to_vec();
    by_score.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let split = (by_score.len() / 2).max(1).min(by_score.len());
    let (good, bad) = by_score.split_at(split);
    if good.is_empty() || bad.is_empty() {
        return sample_one(ranges, rng);
    }

    let mut keys: Vec<&String> = ranges.0.keys().collect();
    keys.sort();
    let mut next = ParameterSet::default();
    for key in keys {
        let range = &ranges.0[key];
        let donor = &good[rng.gen_range(0..good.len())].0;
        let base = donor
            .get(key)
            .cloned()
            .unwrap_or_else(|| sample_value(range, rng));
        next.insert(key.clone(), perturb(range, &base, rng));
    }
    next
}

fn perturb(range: &ParamRange, base: &ParamValue, rng: &mut impl Rng) -> ParamValue {
    let delta = range.width() * 0.1;
    match range {
        ParamRange::Float { min, max } => {
            let base_v = base.as_f64().unwrap_or(*min);
            let offset = if delta > 0.0 { rng.gen_range(-delta..=delta) } else { 0.0 };
            ParamValue::Float((base_v + offset).clamp(*min, *max))
        }
        ParamRange::Int { min, max } => {
            let base_v = base.as_f64().unwrap_or(*min as f64);
            let offset = if delta > 0.0 { rng.gen_range(-delta..=delta) } else { 0.0 };
            let clipped = (base_v + offset).round().clamp(*min as f64, *max as f64);
            ParamValue::Int(clipped as i64)
        }
        ParamRange::Bool => ParamValue::Bool(base.as_bool().unwrap_or_else(|| rng.gen_bool(0.5))),
        ParamRange::Enum(values) => base
            .clone()
            .as_f64()
            .map(|_| base.clone())
            .or_else(|| values.first().cloned().map(ParamValue::Enum))
            .unwrap_or_else(|| base.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ranges() -> ParamRanges {
        let mut r = ParamRanges::default();
        r.0.insert("x".to_string(), ParamRange::Float { min: 0.0, max: 100.0 });
        r
    }

    #[test]
    fn early_trials_are_pure_exploration() {
        let ranges = ranges();
        let mut rng = StdRng::seed_from_u64(3);
        // total_trials=10 -> exploration_trials=2; trial 0 and 1 ignore history.
        let history = vec![(ParameterSet::default(), 0.9)];
        let next = suggest_next(&ranges, &history, 0, 10, &mut rng);
        assert!(next.get("x").unwrap().as_f64().unwrap() >= 0.0);
    }

    #[test]
    fn falls_back_to_random_with_single_observation() {
        let ranges = ranges();
        let mut rng = StdRng::seed_from_u64(3);
        let history = vec![(ParameterSet::default(), 0.5)];
        // trial_idx=5 >= exploration_trials, but good/bad split is degenerate.
        let next = suggest_next(&ranges, &history, 5, 10, &mut rng);
        let v = next.get("x").unwrap().as_f64().unwrap();
        assert!((0.0..=100.0).contains(&v));
    }

    #[test]
    fn exploitation_stays_within_range_bounds() {
        let ranges = ranges();
        let mut rng = StdRng::seed_from_u64(9);
        let history: Vec<(ParameterSet, f64)> = (0..20)
            .map(|i| {
                let mut p = ParameterSet::default();
                p.insert("x", ParamValue::Float(i as f64 * 5.0));
                (p, i as f64)
            })
            .collect();
        for trial in 5..20 {
            let next = suggest_next(&ranges, &history, trial, 20, &mut rng);
            let v = next.get("x").unwrap().as_f64().unwrap();
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
