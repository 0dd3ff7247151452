//! Sampler state-machine behavior: finalize ordering, interrupts, and
//! resuming from checkpoints.

use bayesmc::{
    model_from_config, promote_output, sampler_from_config, CheckpointStore, ConfigTree,
};
use std::path::Path;
use std::sync::atomic::Ordering;

fn config(niterations: u64) -> ConfigTree {
    ConfigTree::parse(&format!(
        "[model]\nname = test_poisson\n\
         [variable_params]\nk =\n\
         [static_params]\nmu = 3\n\
         [prior-k]\nname = uniform\nmin-k = 0\nmax-k = 20\n\
         [sampler]\nname = discrete_jump\nnchains = 3\nniterations = {niterations}\n\
         checkpoint-interval = 10\nseed = 7\n"
    ))
    .unwrap()
}

fn build(tree: &ConfigTree, output: &Path) -> Box<dyn bayesmc::Sampler> {
    let model = model_from_config(tree).unwrap();
    sampler_from_config(tree, model, output).unwrap()
}

#[test]
fn finalize_before_run_is_a_caller_error() {
    let dir = tempfile::tempdir().unwrap();
    let tree = config(20);
    let mut sampler = build(&tree, &dir.path().join("run.bin"));
    let err = sampler.finalize().unwrap_err();
    assert!(err.to_string().contains("before run()"));
}

#[test]
fn double_finalize_fails_but_keeps_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run.bin");
    let tree = config(20);
    let mut sampler = build(&tree, &output);

    sampler.run().unwrap();
    sampler.finalize().unwrap();
    let err = sampler.finalize().unwrap_err();
    assert!(err.to_string().contains("twice"));

    // the checkpoint written by the first finalize is untouched
    let snapshot = CheckpointStore::new(&output).load().unwrap();
    assert!(snapshot.complete);
    assert_eq!(snapshot.iterations_done, 20);
}

#[test]
fn run_after_finalize_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let tree = config(20);
    let mut sampler = build(&tree, &dir.path().join("run.bin"));
    sampler.run().unwrap();
    sampler.finalize().unwrap();
    assert!(sampler.run().is_err());
}

#[test]
fn promotion_requires_a_finalized_run() {
    let dir = tempfile::tempdir().unwrap();
    let tree = config(20);
    let mut sampler = build(&tree, &dir.path().join("run.bin"));
    assert!(promote_output(sampler.as_ref()).is_err());
    sampler.run().unwrap();
    assert!(promote_output(sampler.as_ref()).is_err());
    sampler.finalize().unwrap();
    assert!(promote_output(sampler.as_ref()).is_ok());
}

#[test]
fn interrupt_leaves_a_consistent_promotable_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run.bin");
    let tree = config(1_000_000);
    let mut sampler = build(&tree, &output);

    // flag checked at iteration boundaries; raised before the run starts,
    // so no iterations execute at all
    sampler.interrupt_handle().store(true, Ordering::Relaxed);
    sampler.run().unwrap();

    let snapshot = CheckpointStore::new(&output).load().unwrap();
    assert_eq!(snapshot.iterations_done, 0);
    assert!(!snapshot.complete);

    // an early stop is still finalize-able and promotable
    sampler.finalize().unwrap();
    let promoted = promote_output(sampler.as_ref()).unwrap();
    assert!(promoted.exists());
}

#[test]
fn run_resumes_from_an_existing_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run.bin");

    {
        let tree = config(50);
        let mut sampler = build(&tree, &output);
        sampler.run().unwrap();
        // dropped without finalize, as after a crash
    }

    let tree = config(120);
    let mut sampler = build(&tree, &output);
    sampler.run().unwrap();
    sampler.finalize().unwrap();

    let snapshot = CheckpointStore::new(&output).load().unwrap();
    assert!(snapshot.complete);
    assert_eq!(snapshot.iterations_done, 120);
    for chain in &snapshot.chains {
        // the first run's 50 iterations are part of the history
        assert_eq!(chain.history.len(), 120);
    }
}

#[test]
fn resume_rejects_a_mismatched_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run.bin");

    let tree = config(30);
    let mut sampler = build(&tree, &output);
    sampler.run().unwrap();

    // same output path, different chain count
    let tree = ConfigTree::parse(
        "[model]\nname = test_poisson\n\
         [variable_params]\nk =\n\
         [static_params]\nmu = 3\n\
         [prior-k]\nname = uniform\nmin-k = 0\nmax-k = 20\n\
         [sampler]\nname = discrete_jump\nnchains = 9\nniterations = 30\n",
    )
    .unwrap();
    let mut sampler = build(&tree, &output);
    let err = sampler.run().unwrap_err();
    assert!(format!("{err:#}").contains("chains"));
}
