//! Sampler lifecycle: `CREATED → RUNNING → FINALIZED`, with periodic
//! checkpointing and caller-driven output promotion.
//!
//! Concrete sampler variants (see [`crate::random_walk`] and
//! [`crate::discrete`]) wrap a [`SamplerEngine`], which owns the chains, the
//! run loop, the checkpoint store and the interrupt flag. The engine is
//! generic over the variant's [`ProposalStrategy`]; everything else about
//! the lifecycle is shared.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use thiserror::Error;

use crate::burn_in::BurnInTest;
use crate::chain::{MetropolisChain, ProposalStrategy};
use crate::checkpoint::{ChainState, CheckpointError, CheckpointStore, Snapshot, SNAPSHOT_VERSION};
use crate::config::{ConfigError, ConfigTree};
use crate::model::Model;

/// Lifecycle state of a sampler instance. No transition leaves `Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Finalized,
}

/// Lifecycle misuse by the caller.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("sampler lifecycle violation: {message} (current state: {state:?})")]
    InvalidState {
        message: &'static str,
        state: RunState,
    },
}

/// The uniform lifecycle contract all sampler variants satisfy.
///
/// After `run()` has completed its configured iterations, the checkpoint
/// holds, for every chain, the full history of accept/reject decisions whose
/// stationary distribution approximates the model's posterior.
pub trait Sampler: Send {
    /// Explores the parameter space up to the configured iteration target.
    ///
    /// First call: `CREATED → RUNNING`, allocating initial chain positions
    /// (from the prior, or from an existing checkpoint when resuming) and
    /// creating the checkpoint file. Subsequent calls continue toward the
    /// target. The interrupt flag is honored at iteration boundaries,
    /// leaving a consistent, promotable checkpoint behind.
    fn run(&mut self) -> Result<()>;

    /// `RUNNING → FINALIZED`: terminal checkpoint write with summary state
    /// (burn-in index, completion flag). Calling before `run()`, or twice,
    /// is a caller error.
    fn finalize(&mut self) -> Result<()>;

    fn state(&self) -> RunState;

    fn output_file(&self) -> &Path;

    fn checkpoint_file(&self) -> &Path;

    fn backup_file(&self) -> &Path;

    /// Shared flag checked at every iteration boundary; set it to make the
    /// run stop early as though it had reached its target.
    fn interrupt_handle(&self) -> Arc<AtomicBool>;
}

/// Promotes a finalized run's checkpoint to the declared output artifact and
/// discards the now-redundant backup.
///
/// Deliberately two separate steps: if the process dies between them, the
/// checkpoint file still holds a complete, valid result.
pub fn promote_output(sampler: &dyn Sampler) -> Result<PathBuf> {
    if sampler.state() != RunState::Finalized {
        return Err(SamplerError::InvalidState {
            message: "output promotion requires a finalized run",
            state: sampler.state(),
        }
        .into());
    }
    let output = sampler.output_file().to_path_buf();
    fs::rename(sampler.checkpoint_file(), &output)
        .with_context(|| format!("promoting checkpoint to {}", output.display()))?;
    if sampler.backup_file().exists() {
        fs::remove_file(sampler.backup_file())
            .with_context(|| format!("removing backup {}", sampler.backup_file().display()))?;
    }
    Ok(output)
}

/// Numeric settings shared by all engine-based samplers.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Chains per temperature rung.
    pub nchains: usize,
    /// Temperature rungs; 1 disables tempering.
    pub ntemps: usize,
    /// Total iteration target.
    pub niterations: u64,
    /// Iterations between checkpoint swaps.
    pub checkpoint_interval: u64,
    pub seed: u64,
    pub burn_in: Option<BurnInTest>,
}

impl EngineSettings {
    /// Reads the `[sampler]` section. `chains_key` is the variant's name for
    /// its chain count (`nwalkers` for the ensemble walker, `nchains` for
    /// the discrete sampler).
    pub fn from_config(tree: &ConfigTree, chains_key: &str) -> Result<Self, ConfigError> {
        let nchains = tree.get_u64("sampler", chains_key)? as usize;
        if nchains == 0 {
            return Err(ConfigError::InvalidValue {
                section: "sampler".to_string(),
                key: chains_key.to_string(),
                value: "0".to_string(),
                expected: "at least one chain",
            });
        }
        let ntemps = tree.get_u64_or("sampler", "ntemps", 1)? as usize;
        if ntemps == 0 {
            return Err(ConfigError::InvalidValue {
                section: "sampler".to_string(),
                key: "ntemps".to_string(),
                value: "0".to_string(),
                expected: "at least one temperature",
            });
        }
        Ok(EngineSettings {
            nchains,
            ntemps,
            niterations: tree.get_u64("sampler", "niterations")?,
            checkpoint_interval: tree.get_u64_or("sampler", "checkpoint-interval", 100)?.max(1),
            seed: tree.get_u64_or("sampler", "seed", 0)?,
            burn_in: BurnInTest::from_config(tree)?,
        })
    }
}

/// Shared run machinery: chains, run loop, checkpointing, interrupts.
///
/// Chains are laid out rung-major: chain `t * nchains + w` is walker `w` at
/// temperature rung `t`, rung 0 being the posterior (`β = 1`). Within an
/// iteration all chains advance independently in parallel; tempering swaps
/// run between iterations on the current thread.
pub struct SamplerEngine<S: ProposalStrategy> {
    model: Box<dyn Model>,
    strategy: S,
    settings: EngineSettings,
    param_names: Vec<String>,
    output_file: PathBuf,
    store: CheckpointStore,
    chains: Vec<MetropolisChain>,
    swap_rng: Option<ChaCha8Rng>,
    completed: u64,
    burn_in_iteration: Option<u64>,
    state: RunState,
    interrupt: Arc<AtomicBool>,
}

impl<S: ProposalStrategy> SamplerEngine<S> {
    pub fn new(
        model: Box<dyn Model>,
        strategy: S,
        settings: EngineSettings,
        output_file: &Path,
    ) -> Self {
        let param_names = model.variable_params().to_vec();
        SamplerEngine {
            store: CheckpointStore::new(output_file),
            output_file: output_file.to_path_buf(),
            model,
            strategy,
            settings,
            param_names,
            chains: Vec::new(),
            swap_rng: None,
            completed: 0,
            burn_in_iteration: None,
            state: RunState::Created,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn output_file(&self) -> &Path {
        &self.output_file
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Iterations completed so far across all `run()` calls.
    pub fn iterations_done(&self) -> u64 {
        self.completed
    }

    /// Inverse temperature of rung `t` in a geometric ladder.
    fn beta(&self, rung: usize) -> f64 {
        0.5f64.powi(rung as i32)
    }

    fn start(&mut self) -> Result<()> {
        if self.store.exists() {
            self.resume().context("resuming from existing checkpoint")?;
            return Ok(());
        }
        let total = self.settings.nchains * self.settings.ntemps;
        let mut chains = Vec::with_capacity(total);
        for idx in 0..total {
            let mut rng = ChaCha8Rng::seed_from_u64(self.settings.seed);
            // stream 0 is reserved for tempering swaps
            rng.set_stream(idx as u64 + 1);
            let beta = self.beta(idx / self.settings.nchains);
            chains.push(MetropolisChain::from_prior(
                self.model.boxed_clone(),
                rng,
                beta,
            )?);
        }
        self.chains = chains;
        if self.settings.ntemps > 1 {
            let mut rng = ChaCha8Rng::seed_from_u64(self.settings.seed);
            rng.set_stream(0);
            self.swap_rng = Some(rng);
        }
        // creates the checkpoint file at iteration zero
        self.write_checkpoint(false)
            .context("writing initial checkpoint")?;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let snapshot = self.store.load()?;
        if snapshot.param_names != self.param_names {
            return Err(CheckpointError::Mismatch {
                reason: format!(
                    "checkpoint has parameters [{}], this run has [{}]",
                    snapshot.param_names.join(", "),
                    self.param_names.join(", ")
                ),
            }
            .into());
        }
        let total = self.settings.nchains * self.settings.ntemps;
        if snapshot.chains.len() != total {
            return Err(CheckpointError::Mismatch {
                reason: format!(
                    "checkpoint has {} chains, this run is configured for {total}",
                    snapshot.chains.len()
                ),
            }
            .into());
        }
        if snapshot.complete {
            return Err(CheckpointError::Mismatch {
                reason: "checkpoint belongs to a finalized run".to_string(),
            }
            .into());
        }

        let mut chains = Vec::with_capacity(total);
        for state in snapshot.chains {
            let mut chain = MetropolisChain::from_prior(
                self.model.boxed_clone(),
                ChaCha8Rng::seed_from_u64(self.settings.seed),
                state.inverse_temperature,
            )?;
            chain.restore(
                state.position,
                state.loglikelihood,
                state.logprior,
                state.rng,
                state.accepted,
                state.history,
            );
            chains.push(chain);
        }
        self.chains = chains;
        self.completed = snapshot.iterations_done;
        self.burn_in_iteration = snapshot.burn_in_iteration;
        self.swap_rng = snapshot.swap_rng;
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        match self.state {
            RunState::Finalized => {
                return Err(SamplerError::InvalidState {
                    message: "run() called after finalize()",
                    state: self.state,
                }
                .into());
            }
            RunState::Created => {
                self.start()?;
                self.state = RunState::Running;
            }
            RunState::Running => {}
        }

        let mut did_work = false;
        while self.completed < self.settings.niterations {
            if self.interrupt.load(Ordering::Relaxed) {
                break;
            }

            let strategy = &self.strategy;
            self.chains
                .par_iter_mut()
                .map(|chain| chain.step(strategy).map(|_| ()))
                .collect::<Result<Vec<()>, _>>()
                .with_context(|| {
                    format!("model evaluation failed during iteration {}", self.completed)
                })?;
            self.completed += 1;
            did_work = true;

            // cross-chain communication only at iteration boundaries
            self.tempering_swap();

            if self.completed % self.settings.checkpoint_interval == 0 {
                self.write_checkpoint(false)
                    .with_context(|| format!("checkpoint at iteration {}", self.completed))?;
            }
        }

        if did_work {
            self.write_checkpoint(false).context("final run checkpoint")?;
        }
        Ok(())
    }

    /// One pass of adjacent-rung replica exchanges.
    fn tempering_swap(&mut self) {
        let Some(rng) = self.swap_rng.as_mut() else {
            return;
        };
        let nchains = self.settings.nchains;
        for rung in (1..self.settings.ntemps).rev() {
            for walker in 0..nchains {
                let hot = rung * nchains + walker;
                let cold = (rung - 1) * nchains + walker;
                let (head, tail) = self.chains.split_at_mut(hot);
                let cold_chain = &mut head[cold];
                let hot_chain = &mut tail[0];
                let delta_beta =
                    cold_chain.inverse_temperature() - hot_chain.inverse_temperature();
                let log_alpha =
                    delta_beta * (hot_chain.loglikelihood() - cold_chain.loglikelihood());
                if log_alpha >= 0.0 || rng.random::<f64>().ln() < log_alpha {
                    cold_chain.swap_position_with(hot_chain);
                }
            }
        }
    }

    pub fn finalize(&mut self) -> Result<()> {
        match self.state {
            RunState::Created => {
                return Err(SamplerError::InvalidState {
                    message: "finalize() called before run()",
                    state: self.state,
                }
                .into());
            }
            RunState::Finalized => {
                return Err(SamplerError::InvalidState {
                    message: "finalize() called twice",
                    state: self.state,
                }
                .into());
            }
            RunState::Running => {}
        }
        self.burn_in_iteration = self
            .settings
            .burn_in
            .map(|test| test.burn_in_iteration(self.completed));
        self.write_checkpoint(true).context("finalize checkpoint")?;
        self.state = RunState::Finalized;
        Ok(())
    }

    fn write_checkpoint(&self, complete: bool) -> Result<(), CheckpointError> {
        let chains = self
            .chains
            .iter()
            .map(|chain| ChainState {
                inverse_temperature: chain.inverse_temperature(),
                position: chain.position().to_vec(),
                loglikelihood: chain.loglikelihood(),
                logprior: chain.logprior(),
                accepted: chain.accepted(),
                rng: chain.rng().clone(),
                history: chain.history().clone(),
            })
            .collect();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            param_names: self.param_names.clone(),
            iterations_done: self.completed,
            burn_in_iteration: self.burn_in_iteration,
            complete,
            chains,
            swap_rng: self.swap_rng.clone(),
        };
        self.store.write(&snapshot)
    }
}
