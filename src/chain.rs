//! Per-chain Metropolis-Hastings state.
//!
//! Every chain owns its own clone of the model, so an `update` followed by a
//! likelihood evaluation is atomic per chain and chains can advance in
//! parallel. Cross-chain coordination (tempering swaps) happens between
//! iterations, never inside [`MetropolisChain::step`].

use itertools::zip_eq;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::model::{Model, ModelError};
use crate::params::ParameterSet;

/// How many prior draws to try before giving up on finding a starting point
/// with finite posterior density.
const MAX_INIT_TRIES: usize = 500;

/// A pluggable mechanism for generating candidate positions.
///
/// Implementations must be symmetric or report their asymmetry through
/// [`ProposalStrategy::log_hastings_ratio`].
pub trait ProposalStrategy: Send + Sync {
    /// Writes a candidate position into `out`.
    fn propose(&self, rng: &mut ChaCha8Rng, current: &[f64], out: &mut [f64]);

    /// `ln q(from | to) − ln q(to | from)`; zero for symmetric proposals.
    fn log_hastings_ratio(&self, _from: &[f64], _to: &[f64]) -> f64 {
        0.0
    }
}

/// Accepted-sample history of one chain, as stored in checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainHistory {
    /// Position after each iteration's accept/reject decision.
    pub positions: Vec<Vec<f64>>,
    pub loglikelihood: Vec<f64>,
    pub logposterior: Vec<f64>,
    pub accepted: Vec<bool>,
}

impl ChainHistory {
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    fn record(&mut self, position: &[f64], loglikelihood: f64, logposterior: f64, accepted: bool) {
        self.positions.push(position.to_vec());
        self.loglikelihood.push(loglikelihood);
        self.logposterior.push(logposterior);
        self.accepted.push(accepted);
    }
}

/// One Markov chain exploring the model's posterior.
pub struct MetropolisChain {
    model: Box<dyn Model>,
    param_names: Vec<String>,
    position: Vec<f64>,
    loglikelihood: f64,
    logprior: f64,
    rng: ChaCha8Rng,
    /// `1/T`; tempered chains flatten the likelihood, the prior is shared.
    inverse_temperature: f64,
    accepted: u64,
    history: ChainHistory,
    scratch: Vec<f64>,
}

impl MetropolisChain {
    /// Creates a chain with a starting position drawn from the prior.
    ///
    /// Redraws until the posterior density is finite, as a misconfigured
    /// model may have zero-density regions inside the prior bounds.
    pub fn from_prior(
        mut model: Box<dyn Model>,
        mut rng: ChaCha8Rng,
        inverse_temperature: f64,
    ) -> Result<Self, ModelError> {
        let param_names: Vec<String> = model.variable_params().to_vec();
        let mut last = None;
        for _ in 0..MAX_INIT_TRIES {
            let start = model.prior().sample(&mut rng);
            let position: Vec<f64> = param_names
                .iter()
                .map(|name| start.require_f64(name))
                .collect::<Result<_, _>>()?;
            let (loglikelihood, logprior) =
                evaluate(model.as_mut(), &param_names, &position)?;
            if (logprior + loglikelihood).is_finite() {
                return Ok(MetropolisChain {
                    model,
                    scratch: vec![0.0; position.len()],
                    param_names,
                    position,
                    loglikelihood,
                    logprior,
                    rng,
                    inverse_temperature,
                    accepted: 0,
                    history: ChainHistory::default(),
                });
            }
            last = Some((position, loglikelihood, logprior));
        }
        // fall back to the last draw; the chain can still move off it
        let (position, loglikelihood, logprior) =
            last.expect("at least one initialization attempt");
        Ok(MetropolisChain {
            model,
            scratch: vec![0.0; position.len()],
            param_names,
            position,
            loglikelihood,
            logprior,
            rng,
            inverse_temperature,
            accepted: 0,
            history: ChainHistory::default(),
        })
    }

    /// Advances the chain by one Metropolis-Hastings step.
    ///
    /// Returns whether the proposal was accepted. Model evaluation failures
    /// abort the step; nothing is recorded in that case.
    pub fn step<S: ProposalStrategy + ?Sized>(&mut self, strategy: &S) -> Result<bool, ModelError> {
        let mut proposal = std::mem::take(&mut self.scratch);
        strategy.propose(&mut self.rng, &self.position, &mut proposal);
        let (loglikelihood, logprior) =
            evaluate(self.model.as_mut(), &self.param_names, &proposal)?;

        let beta = self.inverse_temperature;
        let log_alpha = beta * (loglikelihood - self.loglikelihood)
            + (logprior - self.logprior)
            + strategy.log_hastings_ratio(&self.position, &proposal);

        let accept = log_alpha >= 0.0 || self.rng.random::<f64>().ln() < log_alpha;
        if accept {
            std::mem::swap(&mut self.position, &mut proposal);
            self.loglikelihood = loglikelihood;
            self.logprior = logprior;
            self.accepted += 1;
        }
        self.scratch = proposal;

        self.history.record(
            &self.position,
            self.loglikelihood,
            self.logprior + self.loglikelihood,
            accept,
        );
        Ok(accept)
    }

    pub fn position(&self) -> &[f64] {
        &self.position
    }

    pub fn loglikelihood(&self) -> f64 {
        self.loglikelihood
    }

    pub fn logprior(&self) -> f64 {
        self.logprior
    }

    pub fn inverse_temperature(&self) -> f64 {
        self.inverse_temperature
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn history(&self) -> &ChainHistory {
        &self.history
    }

    pub fn rng(&self) -> &ChaCha8Rng {
        &self.rng
    }

    /// Exchanges positions and cached densities with another chain.
    ///
    /// Used by tempering swaps at iteration boundaries; histories and RNGs
    /// stay with their temperature slot.
    pub fn swap_position_with(&mut self, other: &mut MetropolisChain) {
        std::mem::swap(&mut self.position, &mut other.position);
        std::mem::swap(&mut self.loglikelihood, &mut other.loglikelihood);
        std::mem::swap(&mut self.logprior, &mut other.logprior);
    }

    /// Restores exploration state from a checkpoint.
    pub(crate) fn restore(
        &mut self,
        position: Vec<f64>,
        loglikelihood: f64,
        logprior: f64,
        rng: ChaCha8Rng,
        accepted: u64,
        history: ChainHistory,
    ) {
        self.position = position;
        self.loglikelihood = loglikelihood;
        self.logprior = logprior;
        self.rng = rng;
        self.accepted = accepted;
        self.history = history;
    }
}

/// Binds `position` to the model and evaluates both densities.
///
/// This is the atomic `update` + evaluate unit of the model contract. A
/// position outside the prior support skips the likelihood call entirely.
fn evaluate(
    model: &mut dyn Model,
    param_names: &[String],
    position: &[f64],
) -> Result<(f64, f64), ModelError> {
    let values: ParameterSet = zip_eq(param_names, position)
        .map(|(name, &value)| (name.clone(), value.into()))
        .collect();
    model.update(&values);
    let logprior = model.logprior();
    if logprior == f64::NEG_INFINITY {
        return Ok((f64::NEG_INFINITY, f64::NEG_INFINITY));
    }
    let loglikelihood = model.loglikelihood()?;
    Ok((loglikelihood, logprior))
}
