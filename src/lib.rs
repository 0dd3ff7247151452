//! Config-driven Bayesian parameter inference with checkpointed MCMC
//! samplers.
//!
//! The crate wires three things together from a declarative configuration:
//! a [`Model`] (a likelihood plus a prior over its variable parameters), a
//! [`Sampler`] that explores the model's posterior, and a
//! [`CheckpointStore`] that makes long runs resumable and crash-safe.
//!
//! ```no_run
//! use bayesmc::{model_from_config, promote_output, sampler_from_config, ConfigTree};
//!
//! # fn main() -> anyhow::Result<()> {
//! let tree = ConfigTree::from_file("poisson.ini")?;
//! let model = model_from_config(&tree)?;
//! let mut sampler = sampler_from_config(&tree, model, "poisson.bin".as_ref())?;
//! sampler.run()?;
//! sampler.finalize()?;
//! promote_output(sampler.as_ref())?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod assemble;
pub(crate) mod burn_in;
pub(crate) mod chain;
pub(crate) mod checkpoint;
pub(crate) mod config;
pub(crate) mod math;
pub(crate) mod model;
pub mod models;
pub(crate) mod params;
pub(crate) mod prior;
pub mod registry;
pub(crate) mod sampler;

pub mod discrete;
pub mod random_walk;

pub use assemble::{model_from_config, sampler_from_config};
pub use burn_in::BurnInTest;
pub use chain::{ChainHistory, MetropolisChain, ProposalStrategy};
pub use checkpoint::{
    ChainState, CheckpointError, CheckpointStore, Snapshot, SNAPSHOT_VERSION,
};
pub use config::{ConfigError, ConfigTree, InterpolationError};
pub use discrete::DiscreteJumpSampler;
pub use math::{ln_gamma, poisson_logpmf};
pub use model::{Model, ModelBase, ModelError};
pub use params::{ParamValue, ParameterSet};
pub use prior::{Prior, PriorSet};
pub use random_walk::RandomWalkSampler;
pub use registry::{
    ensure_builtins, lookup_model, lookup_sampler, register_model, register_sampler,
    ModelFactory, SamplerFactory, UnknownNameError,
};
pub use sampler::{
    promote_output, EngineSettings, RunState, Sampler, SamplerEngine, SamplerError,
};
