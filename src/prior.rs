//! Prior distributions over variable parameters.
//!
//! Each variable parameter declared in `[variable_params]` must have a
//! matching `[prior-<name>]` block. The prior supplies three things to the
//! rest of the system: a log-density for the posterior, bounds for proposal
//! strategies, and samples for initial chain positions.

use indexmap::IndexMap;
use rand::Rng;

use crate::config::{ConfigError, ConfigTree};
use crate::params::ParameterSet;

/// A one-dimensional prior distribution.
///
/// A closed variant table rather than a trait object: the config layer maps
/// the `name =` option onto one of these tags.
#[derive(Debug, Clone, PartialEq)]
pub enum Prior {
    /// Uniform density on `[min, max)`.
    Uniform { min: f64, max: f64 },
}

impl Prior {
    /// Builds a prior from its `[prior-<param>]` section.
    pub fn from_config(tree: &ConfigTree, param: &str) -> Result<Self, ConfigError> {
        let section = format!("prior-{param}");
        let name = tree.get(&section, "name")?;
        match name {
            "uniform" => {
                let min = tree.get_f64(&section, &format!("min-{param}"))?;
                let max = tree.get_f64(&section, &format!("max-{param}"))?;
                if !(min < max) {
                    return Err(ConfigError::InvalidValue {
                        section,
                        key: format!("min-{param}"),
                        value: format!("{min} >= {max}"),
                        expected: "min < max",
                    });
                }
                Ok(Prior::Uniform { min, max })
            }
            other => Err(ConfigError::InvalidValue {
                section,
                key: "name".to_string(),
                value: other.to_string(),
                expected: "a known distribution (uniform)",
            }),
        }
    }

    pub fn logpdf(&self, x: f64) -> f64 {
        match self {
            Prior::Uniform { min, max } => {
                if x >= *min && x < *max {
                    -(max - min).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Prior::Uniform { min, max } => rng.random_range(*min..*max),
        }
    }

    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Prior::Uniform { min, max } => (*min, *max),
        }
    }
}

/// The joint (independent) prior over all variable parameters of a model.
#[derive(Debug, Clone, Default)]
pub struct PriorSet {
    priors: IndexMap<String, Prior>,
}

impl PriorSet {
    /// Reads one `[prior-<name>]` block per variable parameter.
    ///
    /// A declared variable parameter without a prior section is a
    /// configuration error, reported before any sampling starts.
    pub fn from_config(tree: &ConfigTree, variable_params: &[String]) -> Result<Self, ConfigError> {
        let mut priors = IndexMap::new();
        for param in variable_params {
            let section = format!("prior-{param}");
            if !tree.has_section(&section) {
                return Err(ConfigError::MissingSection { section });
            }
            priors.insert(param.clone(), Prior::from_config(tree, param)?);
        }
        Ok(PriorSet { priors })
    }

    pub fn get(&self, param: &str) -> Option<&Prior> {
        self.priors.get(param)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.priors.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.priors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priors.is_empty()
    }

    /// Joint log-density of the variable parameters in `params`.
    ///
    /// Parameters absent from `params` contribute nothing; the model's
    /// likelihood is responsible for reporting missing keys.
    pub fn logpdf(&self, params: &ParameterSet) -> f64 {
        let mut total = 0.0;
        for (name, prior) in &self.priors {
            if let Some(value) = params.get(name).and_then(|v| v.as_f64()) {
                total += prior.logpdf(value);
                if total == f64::NEG_INFINITY {
                    break;
                }
            }
        }
        total
    }

    /// Draws one value per variable parameter, for initial chain positions.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterSet {
        let mut params = ParameterSet::new();
        for (name, prior) in &self.priors {
            params.insert(name.clone(), prior.sample(rng));
        }
        params
    }
}
