//! Config-driven assembly: from a parsed [`ConfigTree`] to a fully wired
//! model and a sampler bound to it.
//!
//! This is the only place the string names in a config file meet the
//! registries. Both entry points install the built-in variants first, so
//! embedders only need to touch the registry when adding their own.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::ConfigTree;
use crate::model::Model;
use crate::registry;
use crate::sampler::Sampler;

/// Builds the model a config describes: `[model] name = …` resolved through
/// the model registry, with the factory reading the rest of the tree
/// (variable/static params, priors, variant-specific sections such as
/// `[data]`).
pub fn model_from_config(tree: &ConfigTree) -> Result<Box<dyn Model>> {
    registry::ensure_builtins();
    let name = tree.get("model", "name")?;
    let factory = registry::lookup_model(name)?;
    factory(tree).with_context(|| format!("building model `{name}`"))
}

/// Builds the sampler a config describes and binds it to `model` and the
/// declared output path. The checkpoint and backup files are derived from
/// `output_file`.
pub fn sampler_from_config(
    tree: &ConfigTree,
    model: Box<dyn Model>,
    output_file: &Path,
) -> Result<Box<dyn Sampler>> {
    registry::ensure_builtins();
    let name = tree.get("sampler", "name")?;
    let factory = registry::lookup_sampler(name)?;
    factory(tree, model, output_file).with_context(|| format!("building sampler `{name}`"))
}
