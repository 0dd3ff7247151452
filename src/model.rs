//! The model contract every likelihood plugs into.
//!
//! A [`Model`] is one statistical hypothesis: a set of inferred
//! (`variable_params`) and fixed (`static_params`) parameters, a prior over
//! the variable ones, and a log-likelihood that is a pure function of
//! [`Model::current_params`] plus whatever immutable data the model was
//! constructed with. Samplers drive the binding protocol in a fixed rhythm:
//! `update` a proposed position, then read `loglikelihood`/`logprior`.
//!
//! There is no runtime notion of an "incomplete" model: a type that does not
//! implement every operation of the trait simply does not compile against it.

use thiserror::Error;

use crate::config::{ConfigError, ConfigTree};
use crate::params::{ParamValue, ParameterSet};
use crate::prior::PriorSet;

/// Evaluation-time model failure.
///
/// [`ModelError::MissingParameter`] indicates a structural mismatch between
/// the configured parameters and what the likelihood needs; runs abort on it
/// rather than skipping the sample.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model likelihood requires parameter `{name}`, which is not in current_params")]
    MissingParameter { name: String },
    #[error("parameter `{name}` is not numeric")]
    NotNumeric { name: String },
}

/// A statistical model usable by any registered sampler.
///
/// Implementations are object safe so the registry can hand out
/// `Box<dyn Model>`; `boxed_clone` exists so a sampler can give every chain
/// its own instance and keep `update` + evaluate atomic per chain.
pub trait Model: Send {
    /// Names of the parameters being inferred, in declaration order.
    fn variable_params(&self) -> &[String];

    /// Fixed auxiliary parameters bound at construction.
    fn static_params(&self) -> &ParameterSet;

    /// The parameter values the next evaluation will see.
    fn current_params(&self) -> &ParameterSet;

    /// Rebinds the variable parameters.
    ///
    /// The current set is replaced wholesale with `static_params ∪ values`;
    /// values for undeclared names are stored but unused.
    fn update(&mut self, values: &ParameterSet);

    /// Log-likelihood at `current_params`.
    fn loglikelihood(&self) -> Result<f64, ModelError>;

    /// Log-density of the prior at `current_params`.
    fn logprior(&self) -> f64;

    fn prior(&self) -> &PriorSet;

    fn boxed_clone(&self) -> Box<dyn Model>;

    /// Log-posterior up to normalization.
    ///
    /// A `-inf` prior short-circuits: the likelihood is not evaluated
    /// outside the prior support.
    fn logposterior(&self) -> Result<f64, ModelError> {
        let lp = self.logprior();
        if lp == f64::NEG_INFINITY {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(lp + self.loglikelihood()?)
    }
}

impl Clone for Box<dyn Model> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// The reusable core concrete models embed: parameter bookkeeping plus the
/// owned prior.
#[derive(Debug, Clone)]
pub struct ModelBase {
    variable_params: Vec<String>,
    static_params: ParameterSet,
    prior: PriorSet,
    current: ParameterSet,
}

impl ModelBase {
    /// Validates that every variable parameter has a prior entry.
    pub fn new(
        variable_params: Vec<String>,
        static_params: ParameterSet,
        prior: PriorSet,
    ) -> Result<Self, ConfigError> {
        for param in &variable_params {
            if prior.get(param).is_none() {
                return Err(ConfigError::MissingSection {
                    section: format!("prior-{param}"),
                });
            }
        }
        let current = static_params.clone();
        Ok(ModelBase {
            variable_params,
            static_params,
            prior,
            current,
        })
    }

    /// Reads the standard model sections of a config tree:
    /// `[variable_params]` keys in order, `[static_params]` values, and one
    /// `[prior-<name>]` block per variable parameter.
    pub fn from_config(tree: &ConfigTree) -> Result<Self, ConfigError> {
        let variable_params: Vec<String> = tree
            .section("variable_params")?
            .keys()
            .cloned()
            .collect();
        let static_params: ParameterSet = tree
            .section_opt("static_params")
            .map(|section| {
                section
                    .iter()
                    .map(|(k, v)| (k.clone(), ParamValue::parse(v)))
                    .collect()
            })
            .unwrap_or_default();
        let prior = PriorSet::from_config(tree, &variable_params)?;
        Self::new(variable_params, static_params, prior)
    }

    pub fn variable_params(&self) -> &[String] {
        &self.variable_params
    }

    pub fn static_params(&self) -> &ParameterSet {
        &self.static_params
    }

    pub fn current_params(&self) -> &ParameterSet {
        &self.current
    }

    pub fn prior(&self) -> &PriorSet {
        &self.prior
    }

    pub fn update(&mut self, values: &ParameterSet) {
        self.current = self.static_params.merged_with(values);
    }

    pub fn logprior(&self) -> f64 {
        self.prior.logpdf(&self.current)
    }
}
