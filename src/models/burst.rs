//! Poisson noise with an exponentially decaying burst signal.
//!
//! The observed data is a count series; the signal model is an exponential
//! decay switched on at `t0`, truncated to whole counts. The residual
//! (counts minus signal) is clamped at zero before the Poisson mass is
//! evaluated: a clamped sample contributes exactly `-μ`. That clamp is part
//! of the likelihood definition, not a numerical guard.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::config::ConfigTree;
use crate::math::poisson_logpmf;
use crate::model::{Model, ModelBase, ModelError};
use crate::params::ParameterSet;
use crate::prior::PriorSet;

/// Reads a two-column whitespace-separated text file: column 0 the ordered
/// time values, column 1 the observed counts.
pub fn load_counts_data(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading counts data from {}", path.display()))?;
    let mut times = Vec::new();
    let mut counts = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let parse = |field: Option<&str>| -> Result<f64> {
            field
                .ok_or_else(|| anyhow::anyhow!("expected two columns"))?
                .parse::<f64>()
                .map_err(|err| anyhow::anyhow!("{err}"))
        };
        let time = parse(fields.next())
            .with_context(|| format!("{}:{}", path.display(), idx + 1))?;
        let count = parse(fields.next())
            .with_context(|| format!("{}:{}", path.display(), idx + 1))?;
        times.push(time);
        counts.push(count);
    }
    Ok((times, counts))
}

/// The burst-signal model. Registered as `poisson_burst`.
///
/// Requires `amp`, `tau`, `t0`, `finalmass`, `mass1`, `mass2` and `mu` in
/// `current_params` (the mass parameters are part of the hypothesis even
/// though the toy signal shape does not use them).
#[derive(Debug, Clone)]
pub struct PoissonBurst {
    base: ModelBase,
    times: Arc<[f64]>,
    counts: Arc<[f64]>,
}

impl PoissonBurst {
    pub const NAME: &'static str = "poisson_burst";

    /// Registered [`crate::registry::ModelFactory`].
    ///
    /// Loads the count series named by `[data] counts-data` in addition to
    /// the standard model sections.
    pub fn from_config(tree: &ConfigTree) -> Result<Box<dyn Model>> {
        let data_file = tree.get("data", "counts-data")?;
        let (times, counts) = load_counts_data(Path::new(data_file))?;
        let base = ModelBase::from_config(tree)?;
        Ok(Box::new(PoissonBurst {
            base,
            times: times.into(),
            counts: counts.into(),
        }))
    }

    /// Constructs the model directly from in-memory data.
    pub fn new(base: ModelBase, times: Vec<f64>, counts: Vec<f64>) -> Self {
        PoissonBurst {
            base,
            times: times.into(),
            counts: counts.into(),
        }
    }

    /// The deterministic signal: `⌊amp · exp(−(t − t0)/τ)⌋` for `t ≥ t0`.
    pub fn signal(times: &[f64], amp: f64, tau: f64, t0: f64) -> Vec<f64> {
        times
            .iter()
            .map(|&t| {
                if t >= t0 {
                    (amp * (-(t - t0) / tau).exp()).trunc()
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Signal plus Poisson-distributed background noise, for building
    /// simulated data sets.
    pub fn simulate<R: Rng + ?Sized>(
        times: &[f64],
        amp: f64,
        tau: f64,
        t0: f64,
        mu: f64,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        let noise = Poisson::new(mu).context("noise rate must be positive")?;
        Ok(Self::signal(times, amp, tau, t0)
            .into_iter()
            .map(|s| s + noise.sample(rng))
            .collect())
    }
}

impl Model for PoissonBurst {
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
        let amp = params.require_f64("amp")?;
        let tau = params.require_f64("tau")?;
        let t0 = params.require_f64("t0")?;
        // part of the hypothesis; presence is required even though the toy
        // signal shape ignores them
        params.require_f64("finalmass")?;
        params.require_f64("mass1")?;
        params.require_f64("mass2")?;
        let mu = params.require_f64("mu")?;

        let signal = Self::signal(&self.times, amp, tau, t0);
        let total = self
            .counts
            .iter()
            .zip(&signal)
            .map(|(&count, &s)| {
                let residual = (count - s).max(0.0);
                poisson_logpmf(residual, mu)
            })
            .sum();
        Ok(total)
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn burst_base(mu: f64) -> ModelBase {
        let tree = ConfigTree::parse(&format!(
            "[variable_params]\namp =\ntau =\nfinalmass =\n\
             [static_params]\nmu = {mu}\nt0 = 8\nmass1 = 5.9\nmass2 = 1.4\n\
             [prior-amp]\nname = uniform\nmin-amp = 10\nmax-amp = 30\n\
             [prior-tau]\nname = uniform\nmin-tau = 1\nmax-tau = 10\n\
             [prior-finalmass]\nname = uniform\nmin-finalmass = 5.5\nmax-finalmass = 9.0\n"
        ))
        .unwrap();
        ModelBase::from_config(&tree).unwrap()
    }

    fn bind(model: &mut PoissonBurst, amp: f64, tau: f64, finalmass: f64) {
        let mut values = ParameterSet::new();
        values.insert("amp", amp);
        values.insert("tau", tau);
        values.insert("finalmass", finalmass);
        model.update(&values);
    }

    #[test]
    fn signal_switches_on_at_t0() {
        let times = [6.0, 7.0, 8.0, 9.0];
        let signal = PoissonBurst::signal(&times, 10.0, 2.0, 8.0);
        assert_eq!(signal[0], 0.0);
        assert_eq!(signal[1], 0.0);
        assert_eq!(signal[2], 10.0);
        // 10 e^-1/2 = 6.06…, truncated toward zero
        assert_eq!(signal[3], 6.0);
    }

    #[test]
    fn overshooting_signal_clamps_residual_to_zero() {
        // counts are all zero but the signal is large: every residual clamps
        // to 0 and each sample contributes exactly -mu
        let times: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let counts = vec![0.0; 8];
        let mut model = PoissonBurst::new(burst_base(4.0), times, counts);
        bind(&mut model, 20.0, 5.0, 7.0);
        assert_abs_diff_eq!(model.loglikelihood().unwrap(), -4.0 * 8.0, epsilon = 1e-10);
    }

    #[test]
    fn pure_noise_matches_direct_sum() {
        let times: Vec<f64> = (0..4).map(|i| i as f64).collect();
        let counts = vec![3.0, 5.0, 4.0, 2.0];
        // t0 = 8 is past the end: signal contributes nothing
        let mut model = PoissonBurst::new(burst_base(4.0), times, counts.clone());
        bind(&mut model, 20.0, 5.0, 7.0);
        let expected: f64 = counts.iter().map(|&c| poisson_logpmf(c, 4.0)).sum();
        assert_abs_diff_eq!(model.loglikelihood().unwrap(), expected, epsilon = 1e-10);
    }

    #[test]
    fn missing_variable_binding_names_the_parameter() {
        let times = vec![0.0, 1.0];
        let counts = vec![1.0, 2.0];
        let model = PoissonBurst::new(burst_base(4.0), times, counts);
        let err = model.loglikelihood().unwrap_err();
        assert!(matches!(err, ModelError::MissingParameter { ref name } if name == "amp"));
    }

    #[test]
    fn counts_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simulated_data.txt");
        fs::write(&path, "0 3\n1 5\n# comment\n2 4\n").unwrap();
        let (times, counts) = load_counts_data(&path).unwrap();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
        assert_eq!(counts, vec![3.0, 5.0, 4.0]);
    }

    #[test]
    fn malformed_counts_file_names_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, "0 3\n1\n").unwrap();
        let err = load_counts_data(&path).unwrap_err();
        assert!(format!("{err:#}").contains(":2"));
    }
}
