//! Burn-in tests: deciding how much early chain history to discard.
//!
//! Configured through the optional `[sampler-burn_in]` section. The test is
//! evaluated against the accumulated iteration count when a run finalizes,
//! and the resulting index is recorded in the checkpoint for downstream
//! analysis.

use crate::config::{ConfigError, ConfigTree};

const SECTION: &str = "sampler-burn_in";

/// A convergence heuristic over accumulated chain history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnInTest {
    /// Discard the first half of every chain.
    HalfChain,
    /// Discard a fixed number of iterations.
    MinIterations(u64),
}

impl BurnInTest {
    /// Reads `[sampler-burn_in] burn-in-test`, if the section is present.
    pub fn from_config(tree: &ConfigTree) -> Result<Option<Self>, ConfigError> {
        if !tree.has_section(SECTION) {
            return Ok(None);
        }
        let name = tree.get(SECTION, "burn-in-test")?;
        match name {
            "halfchain" => Ok(Some(BurnInTest::HalfChain)),
            "min_iterations" => {
                let n = tree.get_u64(SECTION, "min-iterations")?;
                Ok(Some(BurnInTest::MinIterations(n)))
            }
            other => Err(ConfigError::InvalidValue {
                section: SECTION.to_string(),
                key: "burn-in-test".to_string(),
                value: other.to_string(),
                expected: "a known burn-in test (halfchain, min_iterations)",
            }),
        }
    }

    /// Iteration index at which the chains are considered burned in.
    pub fn burn_in_iteration(&self, completed: u64) -> u64 {
        match self {
            BurnInTest::HalfChain => completed / 2,
            BurnInTest::MinIterations(n) => (*n).min(completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halfchain_from_config() {
        let tree =
            ConfigTree::parse("[sampler-burn_in]\nburn-in-test = halfchain\n").unwrap();
        let test = BurnInTest::from_config(&tree).unwrap().unwrap();
        assert_eq!(test, BurnInTest::HalfChain);
        assert_eq!(test.burn_in_iteration(1000), 500);
        assert_eq!(test.burn_in_iteration(1), 0);
    }

    #[test]
    fn min_iterations_clamps_to_completed() {
        let tree = ConfigTree::parse(
            "[sampler-burn_in]\nburn-in-test = min_iterations\nmin-iterations = 300\n",
        )
        .unwrap();
        let test = BurnInTest::from_config(&tree).unwrap().unwrap();
        assert_eq!(test.burn_in_iteration(1000), 300);
        assert_eq!(test.burn_in_iteration(200), 200);
    }

    #[test]
    fn absent_section_means_no_test() {
        let tree = ConfigTree::parse("[sampler]\nname = random_walk\n").unwrap();
        assert_eq!(BurnInTest::from_config(&tree).unwrap(), None);
    }

    #[test]
    fn unknown_test_name_is_rejected() {
        let tree = ConfigTree::parse("[sampler-burn_in]\nburn-in-test = psychic\n").unwrap();
        assert!(BurnInTest::from_config(&tree).is_err());
    }
}
