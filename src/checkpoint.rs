//! Durable on-disk sampler state with a backup-then-promote discipline.
//!
//! The store maintains two sibling files next to the declared output path:
//! `<output>.checkpoint` (the authoritative snapshot) and `<output>.bkup`
//! (the previously promoted snapshot). Every write goes to a temporary file
//! first, the current checkpoint is renamed to the backup slot, and the
//! temporary file is renamed into place. Whatever instant the process dies,
//! a complete snapshot is recoverable from one of the two slots — the
//! contract holds on any filesystem with atomic rename, independent of the
//! serialization format.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::ChainHistory;
use rand_chacha::ChaCha8Rng;

/// Bumped whenever the snapshot layout changes incompatibly.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint at {path} is unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("checkpoint does not match this run: {reason}")]
    Mismatch { reason: String },
    #[error("no checkpoint found at {checkpoint} (or backup {backup})")]
    NotFound { checkpoint: PathBuf, backup: PathBuf },
}

/// Exploration state of one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainState {
    pub inverse_temperature: f64,
    pub position: Vec<f64>,
    pub loglikelihood: f64,
    pub logprior: f64,
    pub accepted: u64,
    pub rng: ChaCha8Rng,
    pub history: ChainHistory,
}

impl ChainState {
    /// Fraction of recorded decisions that were acceptances.
    pub fn acceptance_rate(&self) -> f64 {
        if self.history.is_empty() {
            0.0
        } else {
            self.accepted as f64 / self.history.len() as f64
        }
    }
}

/// Everything needed to resume or analyze a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub param_names: Vec<String>,
    /// Iterations fully completed when this snapshot was taken.
    pub iterations_done: u64,
    pub burn_in_iteration: Option<u64>,
    /// Set by `finalize`; a complete snapshot is the run's result.
    pub complete: bool,
    pub chains: Vec<ChainState>,
    /// RNG driving cross-chain tempering swaps, if the sampler uses any.
    pub swap_rng: Option<ChaCha8Rng>,
}

/// Handle on the checkpoint/backup file pair for one run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    checkpoint: PathBuf,
    backup: PathBuf,
    staging: PathBuf,
}

impl CheckpointStore {
    /// Derives the file pair from the declared output path.
    pub fn new(output_file: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = output_file.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        };
        CheckpointStore {
            checkpoint: with_suffix(".checkpoint"),
            backup: with_suffix(".bkup"),
            staging: with_suffix(".checkpoint.tmp"),
        }
    }

    pub fn checkpoint_file(&self) -> &Path {
        &self.checkpoint
    }

    pub fn backup_file(&self) -> &Path {
        &self.backup
    }

    /// Whether any snapshot (checkpoint or backup) is present on disk.
    pub fn exists(&self) -> bool {
        self.checkpoint.exists() || self.backup.exists()
    }

    /// Persists a snapshot with the backup-then-promote swap.
    ///
    /// A failed attempt is retried once (transient disk contention) before
    /// surfacing; the previously promoted snapshot is never touched until
    /// its replacement is fully on disk.
    pub fn write(&self, snapshot: &Snapshot) -> Result<(), CheckpointError> {
        match self.write_once(snapshot) {
            Ok(()) => Ok(()),
            Err(_) => self.write_once(snapshot),
        }
    }

    fn write_once(&self, snapshot: &Snapshot) -> Result<(), CheckpointError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| CheckpointError::Io { path, source }
        };

        let file = File::create(&self.staging).map_err(io_err(&self.staging))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, snapshot).map_err(|err| CheckpointError::Corrupt {
            path: self.staging.clone(),
            reason: err.to_string(),
        })?;
        writer.flush().map_err(io_err(&self.staging))?;
        writer
            .into_inner()
            .map_err(|err| CheckpointError::Io {
                path: self.staging.clone(),
                source: err.into_error(),
            })?
            .sync_all()
            .map_err(io_err(&self.staging))?;

        // demote the current checkpoint, then promote the staged one
        if self.checkpoint.exists() {
            fs::rename(&self.checkpoint, &self.backup).map_err(io_err(&self.checkpoint))?;
        }
        fs::rename(&self.staging, &self.checkpoint).map_err(io_err(&self.staging))?;
        Ok(())
    }

    /// Loads the newest recoverable snapshot, falling back to the backup
    /// slot if the checkpoint file is missing or unreadable.
    pub fn load(&self) -> Result<Snapshot, CheckpointError> {
        match self.load_from(&self.checkpoint) {
            Ok(snapshot) => Ok(snapshot),
            Err(primary) => match self.load_from(&self.backup) {
                Ok(snapshot) => Ok(snapshot),
                Err(CheckpointError::NotFound { .. }) => {
                    if matches!(primary, CheckpointError::NotFound { .. }) {
                        Err(CheckpointError::NotFound {
                            checkpoint: self.checkpoint.clone(),
                            backup: self.backup.clone(),
                        })
                    } else {
                        Err(primary)
                    }
                }
                Err(err) => Err(err),
            },
        }
    }

    fn load_from(&self, path: &Path) -> Result<Snapshot, CheckpointError> {
        if !path.exists() {
            return Err(CheckpointError::NotFound {
                checkpoint: self.checkpoint.clone(),
                backup: self.backup.clone(),
            });
        }
        let io_err = |source: std::io::Error| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let len = file.metadata().map_err(io_err)?.len();
        // a rotted length prefix must surface as Corrupt, not as a
        // multi-gigabyte allocation attempt; nothing in a valid snapshot
        // can claim more bytes than the file holds
        let snapshot: Snapshot = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(len)
            .deserialize_from(BufReader::new(file))
            .map_err(|err| CheckpointError::Corrupt {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CheckpointError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "snapshot version {} (this build reads {})",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            });
        }
        Ok(snapshot)
    }

    /// Deletes the backup slot; safe once a run has been finalized.
    pub fn remove_backup(&self) -> Result<(), CheckpointError> {
        if self.backup.exists() {
            fs::remove_file(&self.backup).map_err(|source| CheckpointError::Io {
                path: self.backup.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn snapshot(iterations: u64) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            param_names: vec!["k".to_string()],
            iterations_done: iterations,
            burn_in_iteration: None,
            complete: false,
            chains: vec![ChainState {
                inverse_temperature: 1.0,
                position: vec![2.0],
                loglikelihood: -1.5,
                logprior: -3.0,
                accepted: iterations / 2,
                rng: ChaCha8Rng::seed_from_u64(9),
                history: ChainHistory::default(),
            }],
            swap_rng: None,
        }
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(&dir.path().join("run.bin"));
        store.write(&snapshot(10)).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.iterations_done, 10);
        assert_eq!(loaded.chains[0].position, vec![2.0]);
        // the RNG state survives the round trip bit for bit
        assert_eq!(loaded.chains[0].rng, ChaCha8Rng::seed_from_u64(9));
    }

    #[test]
    fn second_write_demotes_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(&dir.path().join("run.bin"));
        store.write(&snapshot(10)).unwrap();
        store.write(&snapshot(20)).unwrap();
        assert!(store.backup_file().exists());
        assert_eq!(store.load().unwrap().iterations_done, 20);
        // the backup still holds the previous snapshot
        fs::remove_file(store.checkpoint_file()).unwrap();
        assert_eq!(store.load().unwrap().iterations_done, 10);
    }

    #[test]
    fn torn_staging_write_does_not_corrupt_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run.bin");
        let store = CheckpointStore::new(&output);
        store.write(&snapshot(10)).unwrap();
        // process dies mid-write: garbage in the staging file only
        fs::write(output.with_extension("bin.checkpoint.tmp"), b"torn").unwrap();
        assert_eq!(store.load().unwrap().iterations_done, 10);
    }

    #[test]
    fn huge_bogus_length_prefix_reads_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(&dir.path().join("run.bin"));
        store.write(&snapshot(10)).unwrap();
        store.write(&snapshot(20)).unwrap();
        // all-ones bytes decode as absurd vector lengths; the load must
        // reject them and fall back, not try to allocate
        fs::write(store.checkpoint_file(), [0xffu8; 64]).unwrap();
        assert_eq!(store.load().unwrap().iterations_done, 10);

        // with the backup gone too, the corruption itself is reported
        fs::write(store.backup_file(), [0xffu8; 64]).unwrap();
        assert!(matches!(
            store.load().unwrap_err(),
            CheckpointError::Corrupt { .. }
        ));
    }

    #[test]
    fn unreadable_checkpoint_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(&dir.path().join("run.bin"));
        store.write(&snapshot(10)).unwrap();
        store.write(&snapshot(20)).unwrap();
        fs::write(store.checkpoint_file(), b"truncated").unwrap();
        assert_eq!(store.load().unwrap().iterations_done, 10);
    }

    #[test]
    fn missing_everything_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(&dir.path().join("run.bin"));
        assert!(!store.exists());
        assert!(matches!(
            store.load().unwrap_err(),
            CheckpointError::NotFound { .. }
        ));
    }

    #[test]
    fn remove_backup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(&dir.path().join("run.bin"));
        store.write(&snapshot(10)).unwrap();
        store.write(&snapshot(20)).unwrap();
        store.remove_backup().unwrap();
        store.remove_backup().unwrap();
        assert!(!store.backup_file().exists());
    }
}
