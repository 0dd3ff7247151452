//! Process-wide name → constructor tables for models and samplers.
//!
//! Config files refer to implementations by string (`[model] name = …`,
//! `[sampler] name = …`); these tables are the only indirection between
//! those names and concrete types. The tables are populated during an
//! explicit startup phase ([`ensure_builtins`], run at most once) or by the
//! embedding application before assembly, and are read-only for the duration
//! of a sampling run.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{LazyLock, Once, RwLock};

use thiserror::Error;

use crate::config::ConfigTree;
use crate::model::Model;
use crate::sampler::Sampler;

/// Builds a model from a parsed config tree.
pub type ModelFactory = fn(&ConfigTree) -> anyhow::Result<Box<dyn Model>>;

/// Builds a sampler bound to a model and an output path.
pub type SamplerFactory =
    fn(&ConfigTree, Box<dyn Model>, &Path) -> anyhow::Result<Box<dyn Sampler>>;

/// The operator-visible error for a misspelled or unregistered name.
#[derive(Debug, Error)]
#[error("no {kind} named `{name}` is registered (known: {})", known.join(", "))]
pub struct UnknownNameError {
    pub kind: &'static str,
    pub name: String,
    pub known: Vec<String>,
}

static MODELS: LazyLock<RwLock<HashMap<String, ModelFactory>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));
static SAMPLERS: LazyLock<RwLock<HashMap<String, SamplerFactory>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Registers a model constructor under `name`.
///
/// Re-registering an existing name overwrites the previous entry; the return
/// value is `true` when that happened, so callers can decide whether an
/// override was intentional. Registering the same factory twice is
/// idempotent apart from that signal.
pub fn register_model(name: impl Into<String>, factory: ModelFactory) -> bool {
    MODELS
        .write()
        .expect("model registry poisoned")
        .insert(name.into(), factory)
        .is_some()
}

/// Registers a sampler constructor under `name`. Same overwrite contract as
/// [`register_model`].
pub fn register_sampler(name: impl Into<String>, factory: SamplerFactory) -> bool {
    SAMPLERS
        .write()
        .expect("sampler registry poisoned")
        .insert(name.into(), factory)
        .is_some()
}

pub fn lookup_model(name: &str) -> Result<ModelFactory, UnknownNameError> {
    let table = MODELS.read().expect("model registry poisoned");
    table.get(name).copied().ok_or_else(|| UnknownNameError {
        kind: "model",
        name: name.to_string(),
        known: sorted_names(&table),
    })
}

pub fn lookup_sampler(name: &str) -> Result<SamplerFactory, UnknownNameError> {
    let table = SAMPLERS.read().expect("sampler registry poisoned");
    table.get(name).copied().ok_or_else(|| UnknownNameError {
        kind: "sampler",
        name: name.to_string(),
        known: sorted_names(&table),
    })
}

fn sorted_names<V>(table: &HashMap<String, V>) -> Vec<String> {
    let mut names: Vec<String> = table.keys().cloned().collect();
    names.sort();
    names
}

static BUILTINS: Once = Once::new();

/// Installs the built-in models and samplers.
///
/// Called by the assembly entry points, so embedders that only ever go
/// through [`crate::model_from_config`] never need to call it themselves.
/// Safe to call any number of times; the registration itself runs once.
pub fn ensure_builtins() {
    BUILTINS.call_once(|| {
        register_model(crate::models::TestPoisson::NAME, crate::models::TestPoisson::from_config);
        register_model(
            crate::models::PoissonBurst::NAME,
            crate::models::PoissonBurst::from_config,
        );
        register_sampler(
            crate::random_walk::RandomWalkSampler::NAME,
            crate::random_walk::RandomWalkSampler::from_config,
        );
        register_sampler(
            crate::discrete::DiscreteJumpSampler::NAME,
            crate::discrete::DiscreteJumpSampler::from_config,
        );
    });
}
