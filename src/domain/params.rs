use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A scalar parameter value: numeric, boolean, or a small enumeration
/// (§3 "Parameter set", §9 "Replacing runtime-typed configuration").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Enum(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Some(*v as usize),
            ParamValue::Float(v) if *v >= 0.0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Flat map `name -> scalar`, exact keys defined by the strategy it
/// parameterizes (§3 "Parameter set").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet(pub HashMap<String, ParamValue>);

impl ParameterSet {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        self.0.insert(key.into(), value);
    }

    /// Validates that every key the schema names is present (or has a
    /// documented default applied here), and that no unknown key was
    /// supplied. Unknown keys are a load-time error per §9.
    pub fn validate_against(&self, schema: &ParameterSchema) -> Result<ParameterSet, String> {
        let mut resolved = ParameterSet::default();
        for field in &schema.fields {
            match self.0.get(&field.name) {
                Some(v) => resolved.insert(field.name.clone(), v.clone()),
                None => match &field.default {
                    Some(d) => resolved.insert(field.name.clone(), d.clone()),
                    None => return Err(format!("missing required parameter: {}", field.name)),
                },
            }
        }
        for key in self.0.keys() {
            if !schema.fields.iter().any(|f| &f.name == key) {
                return Err(format!("unknown parameter key: {key}"));
            }
        }
        Ok(resolved)
    }
}

#[derive(Debug, Clone)]
pub struct ParameterField {
    pub name: String,
    pub default: Option<ParamValue>,
}

/// The fixed enumerated key space a strategy requires (§9).
#[derive(Debug, Clone, Default)]
pub struct ParameterSchema {
    pub fields: Vec<ParameterField>,
}

impl ParameterSchema {
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.fields.push(ParameterField {
            name: name.into(),
            default: None,
        });
        self
    }

    pub fn with_default(mut self, name: impl Into<String>, default: ParamValue) -> Self {
        self.fields.push(ParameterField {
            name: name.into(),
            default: Some(default),
        });
        self
    }
}

/// One parameter's admissible domain for random/TPE sampling (§4.8).
#[derive(Debug, Clone)]
pub enum ParamRange {
    Float { min: f64, max: f64 },
    Int { min: i64, max: i64 },
    Bool,
    Enum(Vec<String>),
}

impl ParamRange {
    pub fn width(&self) -> f64 {
        match self {
            ParamRange::Float { min, max } => (max - min).abs(),
            ParamRange::Int { min, max } => (*max - *min).abs() as f64,
            ParamRange::Bool => 1.0,
            ParamRange::Enum(values) => values.len().max(1) as f64,
        }
    }
}

/// Per-parameter ranges driving random/TPE search (§4.8).
#[derive(Debug, Clone, Default)]
pub struct ParamRanges(pub HashMap<String, ParamRange>);

/// Per-parameter enumerated values driving grid search (§4.8).
#[derive(Debug, Clone, Default)]
pub struct ParamGrid(pub HashMap<String, Vec<ParamValue>>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_is_rejected() {
        let schema = ParameterSchema::default().required("a");
        let mut set = ParameterSet::default();
        set.insert("a", ParamValue::Int(1));
        set.insert("b", ParamValue::Int(2));
        assert!(set.validate_against(&schema).is_err());
    }

    #[test]
    fn missing_required_is_rejected() {
        let schema = ParameterSchema::default().required("a");
        let set = ParameterSet::default();
        assert!(set.validate_against(&schema).is_err());
    }

    #[test]
    fn default_is_applied_when_absent() {
        let schema = ParameterSchema::default().with_default("a", ParamValue::Int(7));
        let set = ParameterSet::default();
        let resolved = set.validate_against(&schema).unwrap();
        assert_eq!(resolved.get("a").unwrap().as_f64(), Some(7.0));
    }
}
