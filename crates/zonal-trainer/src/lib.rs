// crates/zonal-trainer/src/lib.rs
// ============================================================================
// Module: Zonal Trainer
// Description: Provenance-aware offline training loop for the decision policy.
// Purpose: Blend oracle cases with human feedback into policy checkpoints.
// Dependencies: rand, serde, serde_json, thiserror, zonal-core, zonal-policy
// ============================================================================

//! ## Overview
//! The trainer is an offline, single-writer pipeline:
//! `LOAD_ORACLE -> LOAD_FEEDBACK -> MERGE -> TRAIN -> CHECKPOINT`. Oracle
//! cases come from a deterministic grid labeled by a rule-derived function;
//! human cases are projected from the append-only feedback ledger, with
//! unparsable lines skipped and counted rather than failing the run. The
//! reward function is provenance-aware: oracle labels are trusted exactly,
//! human votes are weighted by whether the policy agrees with the action the
//! vote judged.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod dataset;
pub mod oracle;
pub mod reward;
pub mod trainer;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use dataset::DatasetError;
pub use dataset::LedgerStats;
pub use dataset::OracleCase;
pub use dataset::TrainingCase;
pub use dataset::load_oracle_cases;
pub use dataset::project_ledger;
pub use oracle::OracleVariant;
pub use oracle::generate_grid;
pub use reward::reward;
pub use trainer::NoopTrainerObserver;
pub use trainer::TrainerConfig;
pub use trainer::TrainerError;
pub use trainer::TrainerObserver;
pub use trainer::TrainerPhase;
pub use trainer::TrainingSummary;
pub use trainer::retrain;
