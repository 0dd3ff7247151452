//! Bounded discrete-jump sampler with optional parallel tempering.
//!
//! Proposes integer values drawn uniformly from a closed per-parameter
//! window, configured through `[jump_proposal-<name>]` sections (falling
//! back to the prior bounds). With `ntemps > 1` it runs a geometric
//! temperature ladder and exchanges positions between adjacent rungs at
//! iteration boundaries. Registered as `discrete_jump`.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::chain::ProposalStrategy;
use crate::config::{ConfigError, ConfigTree};
use crate::model::Model;
use crate::sampler::{EngineSettings, RunState, Sampler, SamplerEngine};

/// Per-parameter inclusive integer window.
#[derive(Debug, Clone)]
pub struct BoundedDiscreteJump {
    bounds: Vec<(i64, i64)>,
}

impl BoundedDiscreteJump {
    /// Reads one `[jump_proposal-<name>]` block per variable parameter,
    /// defaulting to the parameter's prior bounds when the block is absent.
    pub fn from_config(tree: &ConfigTree, model: &dyn Model) -> Result<Self, ConfigError> {
        let mut bounds = Vec::new();
        for param in model.variable_params() {
            let section = format!("jump_proposal-{param}");
            let window = if tree.has_section(&section) {
                let name = tree.get(&section, "name")?;
                if name != "bounded_discrete" {
                    return Err(ConfigError::InvalidValue {
                        section,
                        key: "name".to_string(),
                        value: name.to_string(),
                        expected: "a known jump proposal (bounded_discrete)",
                    });
                }
                let min = tree.get_f64(&section, &format!("min-{param}"))?;
                let max = tree.get_f64(&section, &format!("max-{param}"))?;
                (min.ceil() as i64, max.floor() as i64)
            } else {
                let (min, max) = model
                    .prior()
                    .get(param)
                    .expect("model validated its priors")
                    .bounds();
                (min.ceil() as i64, max.floor() as i64)
            };
            if window.0 > window.1 {
                return Err(ConfigError::InvalidValue {
                    section,
                    key: format!("min-{param}"),
                    value: format!("{} > {}", window.0, window.1),
                    expected: "a non-empty integer window",
                });
            }
            bounds.push(window);
        }
        Ok(BoundedDiscreteJump { bounds })
    }
}

impl ProposalStrategy for BoundedDiscreteJump {
    /// Uniform over the window, independent of the current position, so the
    /// proposal density cancels in the acceptance ratio.
    fn propose(&self, rng: &mut ChaCha8Rng, _current: &[f64], out: &mut [f64]) {
        for (out, &(min, max)) in out.iter_mut().zip(&self.bounds) {
            *out = rng.random_range(min..=max) as f64;
        }
    }
}

/// The `discrete_jump` sampler variant.
pub struct DiscreteJumpSampler {
    engine: SamplerEngine<BoundedDiscreteJump>,
}

impl DiscreteJumpSampler {
    pub const NAME: &'static str = "discrete_jump";

    /// Registered [`crate::registry::SamplerFactory`]. Reads `nchains`,
    /// `ntemps`, `niterations` and the common engine options from
    /// `[sampler]`, plus the per-parameter jump windows.
    pub fn from_config(
        tree: &ConfigTree,
        model: Box<dyn Model>,
        output_file: &Path,
    ) -> Result<Box<dyn Sampler>> {
        let settings = EngineSettings::from_config(tree, "nchains")?;
        let strategy = BoundedDiscreteJump::from_config(tree, model.as_ref())?;
        Ok(Box::new(DiscreteJumpSampler {
            engine: SamplerEngine::new(model, strategy, settings, output_file),
        }))
    }
}

impl Sampler for DiscreteJumpSampler {
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
