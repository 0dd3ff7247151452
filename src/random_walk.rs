//! Ensemble of Gaussian random-walk chains.
//!
//! The workhorse continuous sampler: `nwalkers` independent chains, each
//! proposing Gaussian perturbations with a per-parameter scale derived from
//! the prior width. Registered as `random_walk`.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use itertools::izip;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::chain::ProposalStrategy;
use crate::config::ConfigTree;
use crate::model::Model;
use crate::prior::PriorSet;
use crate::sampler::{EngineSettings, RunState, Sampler, SamplerEngine};

/// Fraction of the prior width used as the walk scale.
const SCALE_FRACTION: f64 = 0.1;

/// Symmetric Gaussian perturbation per parameter.
#[derive(Debug, Clone)]
pub struct GaussianWalk {
    scales: Vec<f64>,
}

impl GaussianWalk {
    /// One scale per variable parameter, a tenth of its prior width.
    pub fn from_prior(prior: &PriorSet) -> Self {
        let scales = prior
            .names()
            .map(|name| {
                let (min, max) = prior.get(name).expect("name from this set").bounds();
                (max - min) * SCALE_FRACTION
            })
            .collect();
        GaussianWalk { scales }
    }
}

impl ProposalStrategy for GaussianWalk {
    fn propose(&self, rng: &mut ChaCha8Rng, current: &[f64], out: &mut [f64]) {
        for (out, &x, &scale) in izip!(out.iter_mut(), current, &self.scales) {
            let z: f64 = StandardNormal.sample(rng);
            *out = x + scale * z;
        }
    }
}

/// The `random_walk` sampler variant.
pub struct RandomWalkSampler {
    engine: SamplerEngine<GaussianWalk>,
}

impl RandomWalkSampler {
    pub const NAME: &'static str = "random_walk";

    /// Registered [`crate::registry::SamplerFactory`]. Reads `nwalkers`,
    /// `niterations` and the common engine options from `[sampler]`.
    pub fn from_config(
        tree: &ConfigTree,
        model: Box<dyn Model>,
        output_file: &Path,
    ) -> Result<Box<dyn Sampler>> {
        let settings = EngineSettings::from_config(tree, "nwalkers")?;
        let strategy = GaussianWalk::from_prior(model.prior());
        Ok(Box::new(RandomWalkSampler {
            engine: SamplerEngine::new(model, strategy, settings, output_file),
        }))
    }
}

impl Sampler for RandomWalkSampler {
    fn run(&mut self) -> Result<()> {
        self.engine.run()
    }

    fn finalize(&mut self) -> Result<()> {
        self.engine.finalize()
    }

    fn state(&self) -> RunState {
        self.engine.state()
    }

    fn output_file(&self) -> &Path {
        self.engine.output_file()
    }

    fn checkpoint_file(&self) -> &Path {
        self.engine.store().checkpoint_file()
    }

    fn backup_file(&self) -> &Path {
        self.engine.store().backup_file()
    }

    fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.engine.interrupt_handle()
    }
}
