// crates/zonal-trainer/src/trainer.rs
// ============================================================================
// Module: Training Loop
// Description: Single-writer retraining pipeline producing checkpoints.
// Purpose: Run LOAD_ORACLE -> LOAD_FEEDBACK -> MERGE -> TRAIN -> CHECKPOINT.
// Dependencies: rand, zonal-core, zonal-policy, crate::{dataset, reward}
// ============================================================================

//! ## Overview
//! One retraining run loads the oracle file and the feedback ledger, merges
//! them with provenance intact, runs single-step episodes (sample a case
//! uniformly, sample an action from the current distribution, apply the
//! provenance reward), and writes a fresh checkpoint artifact. The run is
//! guarded by an exclusive lock file next to the checkpoint directory and
//! refuses to start while another writer holds it. Prior checkpoints are
//! never deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use zonal_core::Policy;
use zonal_core::PolicyError;
use zonal_core::Timestamp;
use zonal_policy::LinearSoftmaxPolicy;
use zonal_policy::load_checkpoint;
use zonal_policy::save_checkpoint;

use crate::dataset::DatasetError;
use crate::dataset::LedgerStats;
use crate::dataset::TrainingCase;
use crate::dataset::load_oracle_cases;
use crate::dataset::project_ledger;
use crate::reward::reward;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors aborting a retraining run.
#[derive(Debug, Error)]
pub enum TrainerError {
    /// Another trainer process holds the lock file.
    #[error("trainer lock is held at {0}; another retraining run is active")]
    LockHeld(String),
    /// Lock file or checkpoint directory I/O failed.
    #[error("trainer io error: {0}")]
    Io(String),
    /// Neither oracle nor ledger produced any training case.
    #[error("training set is empty; nothing to train on")]
    EmptyDataset,
    /// Dataset assembly failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    /// Policy evaluation or checkpointing failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

// ============================================================================
// SECTION: Observer
// ============================================================================

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerPhase {
    /// Loading the oracle case file.
    LoadOracle,
    /// Projecting the feedback ledger.
    LoadFeedback,
    /// Merging provenance-tagged cases.
    Merge,
    /// Running training episodes.
    Train,
    /// Writing the checkpoint artifact.
    Checkpoint,
}

/// Observer hooks for trainer events.
///
/// All methods default to no-ops.
pub trait TrainerObserver: Send + Sync {
    /// Called when a phase begins.
    fn phase_started(&self, _phase: TrainerPhase) {}

    /// Called when the ledger skip fraction exceeds the warning threshold.
    fn ledger_quality_warning(&self, _stats: LedgerStats, _threshold: f64) {}

    /// Called after training with the episode count and mean reward.
    fn training_finished(&self, _episodes: usize, _mean_reward: f64) {}

    /// Called after the checkpoint has been written.
    fn checkpoint_written(&self, _path: &Path) {}
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrainerObserver;

impl TrainerObserver for NoopTrainerObserver {}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for one retraining run.
///
/// # Invariants
/// - `action_count` matches the live decision configuration; a resumed
///   checkpoint disagreeing with it fails before any episode runs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    /// Oracle case file, when oracle cases participate.
    pub oracle_path: Option<PathBuf>,
    /// Feedback ledger file, when human cases participate.
    pub ledger_path: Option<PathBuf>,
    /// Directory receiving checkpoint artifacts and the lock file.
    pub checkpoint_dir: PathBuf,
    /// Checkpoint to resume from; a fresh uniform policy otherwise.
    pub resume_from: Option<PathBuf>,
    /// Number of discrete actions.
    pub action_count: u32,
    /// Number of single-step episodes.
    pub episodes: usize,
    /// Policy-gradient learning rate.
    pub learning_rate: f64,
    /// Seed for case and action sampling.
    pub seed: u64,
    /// Skipped-ledger-line fraction above which a warning is emitted.
    pub skip_warn_threshold: f64,
}

impl TrainerConfig {
    /// Creates a configuration with the documented defaults.
    #[must_use]
    pub fn new(checkpoint_dir: PathBuf, action_count: u32) -> Self {
        Self {
            oracle_path: None,
            ledger_path: None,
            checkpoint_dir,
            resume_from: None,
            action_count,
            episodes: 5000,
            learning_rate: 0.05,
            seed: 0,
            skip_warn_threshold: 0.05,
        }
    }
}

// ============================================================================
// SECTION: Lock File
// ============================================================================

/// Exclusive lock file removed on drop.
struct TrainerLock {
    /// Lock file path.
    path: PathBuf,
}

impl TrainerLock {
    /// Lock file name inside the checkpoint directory.
    const FILE_NAME: &'static str = "trainer.lock";

    /// Creates the lock file, failing when another run holds it.
    fn acquire(checkpoint_dir: &Path) -> Result<Self, TrainerError> {
        fs::create_dir_all(checkpoint_dir)
            .map_err(|error| TrainerError::Io(format!("create checkpoint dir: {error}")))?;
        let path = checkpoint_dir.join(Self::FILE_NAME);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self {
                path,
            }),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                Err(TrainerError::LockHeld(path.display().to_string()))
            }
            Err(error) => Err(TrainerError::Io(format!("create lock file: {error}"))),
        }
    }
}

impl Drop for TrainerLock {
    fn drop(&mut self) {
        // Best effort; a leftover lock is surfaced by the next run's error.
        let _ = fs::remove_file(&self.path);
    }
}

// ============================================================================
// SECTION: Training Run
// ============================================================================

/// Summary of one completed retraining run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    /// Path of the written checkpoint.
    pub checkpoint_path: PathBuf,
    /// Oracle cases in the merged set.
    pub oracle_cases: usize,
    /// Human cases in the merged set.
    pub human_cases: usize,
    /// Ledger line statistics, when a ledger participated.
    pub ledger_stats: Option<LedgerStats>,
    /// Episodes run.
    pub episodes: usize,
    /// Mean reward across episodes.
    pub mean_reward: f64,
}

/// Runs one retraining pipeline and returns the new checkpoint path.
///
/// # Errors
///
/// Returns [`TrainerError`] when the lock is held, the dataset is empty or
/// unreadable, or policy loading or checkpointing fails.
pub fn retrain(
    config: &TrainerConfig,
    observer: &dyn TrainerObserver,
) -> Result<TrainingSummary, TrainerError> {
    let _lock = TrainerLock::acquire(&config.checkpoint_dir)?;

    observer.phase_started(TrainerPhase::LoadOracle);
    let oracle_cases = match &config.oracle_path {
        Some(path) => load_oracle_cases(path)?,
        None => Vec::new(),
    };

    observer.phase_started(TrainerPhase::LoadFeedback);
    let (human_cases, ledger_stats) = match &config.ledger_path {
        Some(path) => {
            let (cases, stats) = project_ledger(path)?;
            if stats.skipped_fraction() > config.skip_warn_threshold {
                observer.ledger_quality_warning(stats, config.skip_warn_threshold);
            }
            (cases, Some(stats))
        }
        None => (Vec::new(), None),
    };

    observer.phase_started(TrainerPhase::Merge);
    let oracle_count = oracle_cases.len();
    let human_count = human_cases.len();
    let mut dataset: Vec<TrainingCase> = oracle_cases;
    dataset.extend(human_cases);
    if dataset.is_empty() {
        return Err(TrainerError::EmptyDataset);
    }

    let mut policy = match &config.resume_from {
        Some(path) => load_checkpoint(path, config.action_count)?,
        None => LinearSoftmaxPolicy::zeroed(config.action_count),
    };

    observer.phase_started(TrainerPhase::Train);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut reward_total = 0.0;
    for _ in 0..config.episodes {
        let case = &dataset[rng.gen_range(0..dataset.len())];
        let distribution = policy.predict(case.state())?;
        let action = sample_action(distribution.as_slice(), &mut rng);
        let episode_reward = reward(case, action);
        reward_total += episode_reward;
        policy.reinforce(case.state(), action, episode_reward, config.learning_rate);
    }
    #[allow(clippy::cast_precision_loss, reason = "Episode counts stay far below f64 mantissa range.")]
    let mean_reward =
        if config.episodes == 0 { 0.0 } else { reward_total / config.episodes as f64 };
    observer.training_finished(config.episodes, mean_reward);

    observer.phase_started(TrainerPhase::Checkpoint);
    let checkpoint_path = reserve_checkpoint_path(&config.checkpoint_dir)?;
    save_checkpoint(&policy, &checkpoint_path)?;
    observer.checkpoint_written(&checkpoint_path);

    Ok(TrainingSummary {
        checkpoint_path,
        oracle_cases: oracle_count,
        human_cases: human_count,
        ledger_stats,
        episodes: config.episodes,
        mean_reward,
    })
}

/// Reserves a fresh checkpoint path under `dir`.
///
/// The timestamp has one-second resolution, so runs landing in the same
/// second get a numeric suffix. The path is claimed with `create_new` so an
/// existing checkpoint is never reused or truncated.
fn reserve_checkpoint_path(dir: &Path) -> Result<PathBuf, TrainerError> {
    let stamp = Timestamp::now().to_compact();
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("policy-{stamp}.json")
        } else {
            format!("policy-{stamp}-{attempt}.json")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(error) => {
                return Err(TrainerError::Io(format!(
                    "reserve checkpoint {}: {error}",
                    path.display()
                )));
            }
        }
    }
}

/// Samples an action index from a probability distribution.
fn sample_action(probs: &[f64], rng: &mut StdRng) -> u32 {
    let draw: f64 = rng.r#gen();
    let mut cumulative = 0.0;
    for (index, prob) in probs.iter().enumerate() {
        cumulative += prob;
        if draw < cumulative {
            return u32::try_from(index).unwrap_or(u32::MAX);
        }
    }
    // Floating residue; fall back to the last action.
    u32::try_from(probs.len().saturating_sub(1)).unwrap_or(u32::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::oracle::OracleVariant;
    use crate::oracle::generate_grid;

    fn oracle_file(dir: &Path) -> PathBuf {
        let path = dir.join("oracle.json");
        let cases = generate_grid(OracleVariant::Full);
        std::fs::write(&path, serde_json::to_string(&cases).unwrap()).unwrap();
        path
    }

    fn config(dir: &Path) -> TrainerConfig {
        let mut config = TrainerConfig::new(dir.join("checkpoints"), 5);
        config.oracle_path = Some(oracle_file(dir));
        config.episodes = 3000;
        config.learning_rate = 0.1;
        config.seed = 7;
        config
    }

    #[test]
    fn retrain_writes_a_loadable_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let summary = retrain(&config(dir.path()), &NoopTrainerObserver).unwrap();

        assert!(summary.checkpoint_path.exists());
        assert_eq!(summary.oracle_cases, 8 * 3 * 9);
        assert_eq!(summary.human_cases, 0);
        let policy = load_checkpoint(&summary.checkpoint_path, 5).unwrap();
        assert_eq!(policy.action_count(), 5);
    }

    #[test]
    fn training_beats_uniform_on_the_oracle_grid() {
        let dir = tempfile::tempdir().unwrap();
        let summary = retrain(&config(dir.path()), &NoopTrainerObserver).unwrap();
        let policy = load_checkpoint(&summary.checkpoint_path, 5).unwrap();

        let grid = generate_grid(OracleVariant::Full);
        let correct = grid
            .iter()
            .filter(|case| {
                policy.predict(&case.state()).unwrap().argmax() == case.correct_action
            })
            .count();
        // Uniform guessing over five actions lands near 20 percent.
        assert!(correct * 2 > grid.len(), "only {correct}/{} correct", grid.len());
    }

    #[test]
    fn identical_seed_produces_identical_checkpoints() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let summary_a = retrain(&config(dir_a.path()), &NoopTrainerObserver).unwrap();
        let summary_b = retrain(&config(dir_b.path()), &NoopTrainerObserver).unwrap();

        let policy_a = load_checkpoint(&summary_a.checkpoint_path, 5).unwrap();
        let policy_b = load_checkpoint(&summary_b.checkpoint_path, 5).unwrap();
        assert_eq!(policy_a, policy_b);
    }

    #[test]
    fn back_to_back_runs_keep_every_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let first = retrain(&config, &NoopTrainerObserver).unwrap();
        let second = retrain(&config, &NoopTrainerObserver).unwrap();

        // Runs landing in the same second still get distinct artifacts.
        assert_ne!(first.checkpoint_path, second.checkpoint_path);
        assert!(first.checkpoint_path.exists());
        assert!(second.checkpoint_path.exists());
        load_checkpoint(&first.checkpoint_path, 5).unwrap();
        load_checkpoint(&second.checkpoint_path, 5).unwrap();
    }

    #[test]
    fn held_lock_refuses_a_second_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::create_dir_all(&config.checkpoint_dir).unwrap();
        std::fs::write(config.checkpoint_dir.join("trainer.lock"), "").unwrap();

        assert!(matches!(retrain(&config, &NoopTrainerObserver), Err(TrainerError::LockHeld(_))));
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig::new(dir.path().join("checkpoints"), 5);
        assert!(matches!(retrain(&config, &NoopTrainerObserver), Err(TrainerError::EmptyDataset)));
    }

    #[test]
    fn lock_is_released_after_a_completed_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        retrain(&config, &NoopTrainerObserver).unwrap();
        assert!(!config.checkpoint_dir.join("trainer.lock").exists());
        // A second run starts cleanly and keeps the first checkpoint.
        retrain(&config, &NoopTrainerObserver).unwrap();
    }

    #[derive(Default)]
    struct RecordingObserver {
        warnings: Mutex<Vec<LedgerStats>>,
    }

    impl TrainerObserver for RecordingObserver {
        fn ledger_quality_warning(&self, stats: LedgerStats, _threshold: f64) {
            self.warnings.lock().unwrap().push(stats);
        }
    }

    #[test]
    fn excessive_ledger_skips_emit_a_warning_event() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("feedback.jsonl");
        std::fs::write(&ledger, "not json\nalso not json\n").unwrap();
        let mut config = config(dir.path());
        config.ledger_path = Some(ledger);

        let observer = RecordingObserver::default();
        let summary = retrain(&config, &observer).unwrap();

        let warnings = observer.warnings.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].skipped, 2);
        assert_eq!(summary.human_cases, 0);
    }
}
