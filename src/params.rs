//! Named parameter values passed between the config layer, models and
//! samplers.
//!
//! A [`ParameterSet`] is the unit of exchange in the model contract: the
//! sampler builds one from a proposed position, hands it to
//! [`Model::update`](crate::Model::update), and the model evaluates its
//! likelihood against the stored values. It is replaced wholesale on every
//! update and read-only during an evaluation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::ModelError;

/// A single parameter value.
///
/// Config files carry strings; anything that lexes as a float becomes
/// [`ParamValue::Float`], everything else stays a string (labels such as
/// waveform or detector names that some likelihoods take verbatim).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Parses a raw config string, preferring a numeric interpretation.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(value) => ParamValue::Float(value),
            Err(_) => ParamValue::Str(raw.trim().to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(value) => Some(*value),
            ParamValue::Str(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

/// Ordered mapping from parameter name to current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    values: IndexMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Looks up a numeric parameter, reporting the missing key by name.
    ///
    /// This is the explicit check the model contract requires: a likelihood
    /// that needs `k` must fail with an error naming `k`, not with a bare
    /// lookup panic.
    pub fn require_f64(&self, name: &str) -> Result<f64, ModelError> {
        match self.values.get(name) {
            Some(value) => value.as_f64().ok_or_else(|| ModelError::NotNumeric {
                name: name.to_string(),
            }),
            None => Err(ModelError::MissingParameter {
                name: name.to_string(),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    /// Returns a new set containing `self` overlaid with `other`.
    ///
    /// Used by `Model::update` to combine static parameters with the
    /// proposed variable values; `other` wins on shared names.
    pub fn merged_with(&self, other: &ParameterSet) -> ParameterSet {
        let mut merged = self.clone();
        for (name, value) in other.iter() {
            merged.insert(name, value.clone());
        }
        merged
    }
}

impl FromIterator<(String, ParamValue)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        ParameterSet {
            values: iter.into_iter().collect(),
        }
    }
}
