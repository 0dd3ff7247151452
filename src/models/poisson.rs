//! A model with a Poisson distribution for the likelihood.

use anyhow::Result;

use crate::config::ConfigTree;
use crate::math::poisson_logpmf;
use crate::model::{Model, ModelBase, ModelError};
use crate::params::ParameterSet;
use crate::prior::PriorSet;

/// Single Poisson count: `loglikelihood = logpmf(⌊k⌋, μ)`.
///
/// Needs `mu` and `k` in `current_params`; `k` is truncated to an integer
/// before evaluation.
#[derive(Debug, Clone)]
pub struct TestPoisson {
    base: ModelBase,
}

impl TestPoisson {
    pub const NAME: &'static str = "test_poisson";

    /// Registered [`crate::registry::ModelFactory`].
    pub fn from_config(tree: &ConfigTree) -> Result<Box<dyn Model>> {
        let base = ModelBase::from_config(tree)?;
        Ok(Box::new(TestPoisson { base }))
    }
}

impl Model for TestPoisson {
    fn variable_params(&self) -> &[String] {
        self.base.variable_params()
    }

    fn static_params(&self) -> &ParameterSet {
        self.base.static_params()
    }

    fn current_params(&self) -> &ParameterSet {
        self.base.current_params()
    }

    fn update(&mut self, values: &ParameterSet) {
        self.base.update(values);
    }

    fn loglikelihood(&self) -> Result<f64, ModelError> {
        let params = self.base.current_params();
        let mu = params.require_f64("mu")?;
        let k = params.require_f64("k")?;
        Ok(poisson_logpmf(k.trunc(), mu))
    }

    fn logprior(&self) -> f64 {
        self.base.logprior()
    }

    fn prior(&self) -> &PriorSet {
        self.base.prior()
    }

    fn boxed_clone(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }
}
