//! Recovery behavior when a run dies at the worst possible instants of the
//! checkpoint swap.

use bayesmc::{model_from_config, sampler_from_config, CheckpointStore, ConfigTree};
use std::fs;
use std::path::Path;

fn config(niterations: u64) -> ConfigTree {
    ConfigTree::parse(&format!(
        "[model]\nname = test_poisson\n\
         [variable_params]\nk =\n\
         [static_params]\nmu = 3\n\
         [prior-k]\nname = uniform\nmin-k = 0\nmax-k = 20\n\
         [sampler]\nname = discrete_jump\nnchains = 2\nniterations = {niterations}\n\
         checkpoint-interval = 5\nseed = 11\n"
    ))
    .unwrap()
}

fn run_to(niterations: u64, output: &Path) {
    let tree = config(niterations);
    let model = model_from_config(&tree).unwrap();
    let mut sampler = sampler_from_config(&tree, model, output).unwrap();
    sampler.run().unwrap();
}

#[test]
fn death_between_demote_and_promote_recovers_from_backup() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run.bin");
    run_to(20, &output);

    // simulate dying after the checkpoint was renamed to the backup slot
    // but before the staged replacement was renamed into place
    let store = CheckpointStore::new(&output);
    fs::rename(store.checkpoint_file(), store.backup_file()).unwrap();
    assert!(!store.checkpoint_file().exists());

    let recovered = store.load().unwrap();
    assert_eq!(recovered.iterations_done, 20);
    assert!(!recovered.complete);

    // a fresh process resumes from the backup and carries the run forward
    let tree = config(40);
    let model = model_from_config(&tree).unwrap();
    let mut sampler = sampler_from_config(&tree, model, &output).unwrap();
    sampler.run().unwrap();
    sampler.finalize().unwrap();

    let finished = store.load().unwrap();
    assert!(finished.complete);
    assert_eq!(finished.iterations_done, 40);
    assert_eq!(finished.chains[0].history.len(), 40);
}

#[test]
fn stale_staging_file_from_a_previous_crash_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run.bin");
    run_to(20, &output);

    let staging = dir.path().join("run.bin.checkpoint.tmp");
    fs::write(&staging, b"interrupted mid-serialization").unwrap();

    let tree = config(40);
    let model = model_from_config(&tree).unwrap();
    let mut sampler = sampler_from_config(&tree, model, &output).unwrap();
    sampler.run().unwrap();
    sampler.finalize().unwrap();

    let snapshot = CheckpointStore::new(&output).load().unwrap();
    assert!(snapshot.complete);
    assert_eq!(snapshot.iterations_done, 40);
}

#[test]
fn corrupted_checkpoint_resumes_from_the_demoted_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run.bin");
    run_to(20, &output);

    let store = CheckpointStore::new(&output);
    fs::write(store.checkpoint_file(), b"scrambled by a bad disk").unwrap();

    let tree = config(40);
    let model = model_from_config(&tree).unwrap();
    let mut sampler = sampler_from_config(&tree, model, &output).unwrap();
    sampler.run().unwrap();

    // resume fell back to the demoted snapshot in the backup slot
    let snapshot = store.load().unwrap();
    assert_eq!(snapshot.iterations_done, 40);
    assert_eq!(snapshot.chains[0].history.len(), 40);
}
