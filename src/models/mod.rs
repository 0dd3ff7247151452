//! Built-in model variants.
//!
//! Two Poisson-family likelihoods ship with the crate: a single-count toy
//! model used throughout the tests and a burst-signal model over an observed
//! count series. Both are ordinary [`crate::Model`] implementations wired
//! into the model registry by [`crate::registry::ensure_builtins`]; external
//! models register themselves the same way.

mod burst;
mod poisson;

pub use burst::{load_counts_data, PoissonBurst};
pub use poisson::TestPoisson;
