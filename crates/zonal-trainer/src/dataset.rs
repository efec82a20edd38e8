// crates/zonal-trainer/src/dataset.rs
// ============================================================================
// Module: Training Dataset
// Description: Training cases from oracle files and the feedback ledger.
// Purpose: Build the provenance-tagged training set for one trainer run.
// Dependencies: serde, serde_json, zonal-core
// ============================================================================

//! ## Overview
//! A training case carries its provenance in the type: oracle cases hold the
//! labeled correct action, human cases hold the action the report actually
//! took and the vote it received. The ledger projection tolerates torn or
//! malformed lines (concurrent appenders take no lock) by skipping them
//! individually; the caller decides whether the skip fraction warrants a
//! warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use zonal_core::FeedbackRecord;
use zonal_core::LocationCategory;
use zonal_core::StateVector;
use zonal_core::Vote;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while assembling the training set.
///
/// # Invariants
/// - Individual malformed ledger lines never surface here; they are skipped
///   and counted in [`LedgerStats`].
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Dataset file could not be read.
    #[error("dataset io error at {path}: {message}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Oracle file failed to parse as a whole.
    #[error("oracle file {path} is malformed: {message}")]
    MalformedOracle {
        /// Offending path.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

// ============================================================================
// SECTION: Training Cases
// ============================================================================

/// One training case with its provenance.
///
/// # Invariants
/// - Provenance is part of the type; merge never erases it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provenance", rename_all = "snake_case")]
pub enum TrainingCase {
    /// Synthetic case with a trusted label.
    Oracle {
        /// Encoded case state.
        state: StateVector,
        /// Labeled correct action.
        correct_action: u32,
    },
    /// Real case judged by a human vote.
    HumanFeedback {
        /// Encoded case state.
        state: StateVector,
        /// Action the compiled report took.
        action_taken: u32,
        /// Vote the report received.
        vote: Vote,
    },
}

impl TrainingCase {
    /// Returns the encoded state of the case.
    #[must_use]
    pub const fn state(&self) -> &StateVector {
        match self {
            Self::Oracle {
                state, ..
            }
            | Self::HumanFeedback {
                state, ..
            } => state,
        }
    }
}

// ============================================================================
// SECTION: Oracle Files
// ============================================================================

/// One labeled oracle case as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleCase {
    /// Plot area in square metres.
    pub plot_area: f64,
    /// Location category.
    pub location: LocationCategory,
    /// Abutting road width in metres.
    pub road_width: f64,
    /// Labeled correct action.
    pub correct_action: u32,
}

impl OracleCase {
    /// Encodes the case into the fixed state order.
    #[must_use]
    pub fn state(&self) -> StateVector {
        StateVector::from_features([self.plot_area, self.location.index(), self.road_width])
    }
}

impl From<&OracleCase> for TrainingCase {
    fn from(case: &OracleCase) -> Self {
        Self::Oracle {
            state: case.state(),
            correct_action: case.correct_action,
        }
    }
}

/// Loads a JSON array of oracle cases.
///
/// # Errors
///
/// Returns [`DatasetError`] when the file cannot be read or is not a valid
/// oracle case array. Oracle files are written by tooling, not appended
/// concurrently, so malformation is a hard failure here.
pub fn load_oracle_cases(path: &Path) -> Result<Vec<TrainingCase>, DatasetError> {
    let payload = fs::read_to_string(path).map_err(|error| DatasetError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;
    let cases: Vec<OracleCase> =
        serde_json::from_str(&payload).map_err(|error| DatasetError::MalformedOracle {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
    Ok(cases.iter().map(TrainingCase::from).collect())
}

// ============================================================================
// SECTION: Ledger Projection
// ============================================================================

/// Line quality statistics from one ledger projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerStats {
    /// Non-blank lines inspected.
    pub total: usize,
    /// Lines projected into training cases.
    pub parsed: usize,
    /// Lines skipped as unparsable.
    pub skipped: usize,
}

impl LedgerStats {
    /// Fraction of inspected lines that were skipped.
    #[must_use]
    pub fn skipped_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss, reason = "Counts stay far below f64 mantissa range.")]
            {
                self.skipped as f64 / self.total as f64
            }
        }
    }
}

/// Projects the feedback ledger into human training cases.
///
/// Blank lines are ignored. Lines that fail to parse as a feedback record
/// are skipped and counted; a torn tail line from a concurrent appender
/// must never fail the whole run.
///
/// # Errors
///
/// Returns [`DatasetError::Io`] only when the ledger file itself cannot be
/// read.
pub fn project_ledger(path: &Path) -> Result<(Vec<TrainingCase>, LedgerStats), DatasetError> {
    let payload = fs::read_to_string(path).map_err(|error| DatasetError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;
    let mut cases = Vec::new();
    let mut stats = LedgerStats::default();
    for line in payload.lines() {
        if line.trim().is_empty() {
            continue;
        }
        stats.total += 1;
        match serde_json::from_str::<FeedbackRecord>(line) {
            Ok(record) => {
                stats.parsed += 1;
                cases.push(TrainingCase::HumanFeedback {
                    state: StateVector::encode(&record.parameters),
                    action_taken: record.action_taken,
                    vote: record.vote,
                });
            }
            Err(_) => {
                stats.skipped += 1;
            }
        }
    }
    Ok((cases, stats))
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
    use std::io::Write as _;

    use serde_json::json;
    use zonal_core::CaseId;
    use zonal_core::CaseParameters;
    use zonal_core::ProjectId;
    use zonal_core::Timestamp;

    use super::*;

    fn ledger_line(action: u32, vote: &str) -> String {
        let record = FeedbackRecord {
            project_id: ProjectId::from("p"),
            case_id: CaseId::from("c"),
            parameters: CaseParameters::from_json(&json!({
                "plot_area": 1200.0,
                "location": "urban",
                "road_width": 15.0,
            }))
            .unwrap(),
            action_taken: action,
            vote: serde_json::from_value(json!(vote)).unwrap(),
            timestamp: Timestamp::now(),
        };
        serde_json::to_string(&record).unwrap()
    }

    #[test]
    fn ledger_projection_keeps_provenance_and_vote() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.jsonl");
        std::fs::write(&path, format!("{}\n{}\n", ledger_line(2, "up"), ledger_line(0, "down")))
            .unwrap();

        let (cases, stats) = project_ledger(&path).unwrap();
        assert_eq!(stats.parsed, 2);
        assert_eq!(stats.skipped, 0);
        assert!(matches!(
            cases[0],
            TrainingCase::HumanFeedback {
                action_taken: 2,
                vote: Vote::Up,
                ..
            }
        ));
    }

    #[test]
    fn one_corrupt_line_in_a_hundred_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        for index in 0..100 {
            if index == 57 {
                writeln!(file, "{{\"torn\": tru").unwrap();
            } else {
                writeln!(file, "{}", ledger_line(1, "up")).unwrap();
            }
        }
        drop(file);

        let (cases, stats) = project_ledger(&path).unwrap();
        assert_eq!(cases.len(), 99);
        assert_eq!(stats.total, 100);
        assert_eq!(stats.skipped, 1);
        assert!((stats.skipped_fraction() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn blank_lines_are_ignored_without_counting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.jsonl");
        std::fs::write(&path, format!("{}\n\n\n", ledger_line(1, "down"))).unwrap();

        let (cases, stats) = project_ledger(&path).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn oracle_file_round_trips_into_oracle_cases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oracle.json");
        let cases = vec![OracleCase {
            plot_area: 600.0,
            location: LocationCategory::Rural,
            road_width: 6.0,
            correct_action: 1,
        }];
        std::fs::write(&path, serde_json::to_string(&cases).unwrap()).unwrap();

        let loaded = load_oracle_cases(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(matches!(
            loaded[0],
            TrainingCase::Oracle {
                correct_action: 1,
                ..
            }
        ));
    }

    #[test]
    fn malformed_oracle_file_is_a_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oracle.json");
        std::fs::write(&path, "[{\"plot_area\": }]").unwrap();
        assert!(matches!(
            load_oracle_cases(&path),
            Err(DatasetError::MalformedOracle { .. })
        ));
    }
}
