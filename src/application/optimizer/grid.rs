use crate::domain::params::{ParamGrid, ParameterSet};

/// Cartesian product of the grid's per-parameter value lists, in a
/// deterministic key order so repeated calls over the same grid always
/// enumerate combinations identically (§4.8 "Grid").
pub fn generate_combinations(grid: &ParamGrid) -> Vec<ParameterSet> {
    let mut keys: Vec<&String> = grid.0.keys().collect();
    keys.sort();

    let mut combos = vec![ParameterSet::default()];
    for key in keys {
        let values = &grid.0[key];
        let mut next = Vec::with_capacity(combos.len() * values.len().max(1));
        for combo in &combos {
            for value in values {
                let mut extended = combo.clone();
                extended.insert(key.clone(), value.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::params::ParamValue;

    #[test]
    fn six_point_grid_yields_six_sets() {
        let mut grid = ParamGrid::default();
        grid.0.insert(
            "a".to_string(),
            vec![ParamValue::Int(1), ParamValue::Int(2), ParamValue::Int(3)],
        );
        grid.0.insert(
            "b".to_string(),
            vec![ParamValue::Int(10), ParamValue::Int(20)],
        );
        let combos = generate_combinations(&grid);
        assert_eq!(combos.len(), 6);
        let unique: std::collections::HashSet<String> = combos
            .iter()
            .map(|c| format!("{:?},{:?}", c.get("a"), c.get("b")))
            .collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn empty_grid_yields_one_empty_set() {
        let grid = ParamGrid::default();
        let combos = generate_combinations(&grid);
        assert_eq!(combos.len(), 1);
        assert!(combos[0].0.is_empty());
    }
}
