// crates/zonal-providers/src/ledger.rs
// ============================================================================
// Module: JSONL Feedback Ledger
// Description: Append-only feedback ledger on the filesystem.
// Purpose: Record human votes as single JSONL lines for the trainer.
// Dependencies: serde_json, zonal-core
// ============================================================================

//! ## Overview
//! Each vote is one JSON line appended with a single O_APPEND write, so
//! concurrent appenders interleave at line granularity on local
//! filesystems. Readers sit in the trainer and skip torn lines; the ledger
//! itself takes no lock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use zonal_core::FeedbackLedger;
use zonal_core::FeedbackRecord;
use zonal_core::LedgerError;

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Append-only JSONL ledger at a fixed path.
#[derive(Debug)]
pub struct FsFeedbackLedger {
    /// Ledger file path.
    path: PathBuf,
    /// Serializes appends within this process; cross-process interleaving
    /// relies on O_APPEND single-write semantics.
    write_guard: Mutex<()>,
}

impl FsFeedbackLedger {
    /// Creates a ledger at `path`; the file appears on first append.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_guard: Mutex::new(()),
        }
    }

    /// Returns the ledger path.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl FeedbackLedger for FsFeedbackLedger {
    fn append(&self, record: &FeedbackRecord) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(record)
            .map_err(|error| LedgerError::Serialization(error.to_string()))?;
        line.push('\n');
        let _guard = self
            .write_guard
            .lock()
            .map_err(|_| LedgerError::Io("ledger write guard poisoned".to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|error| LedgerError::Io(format!("open {}: {error}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .map_err(|error| LedgerError::Io(format!("append {}: {error}", self.path.display())))
    }
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
    use serde_json::json;
    use zonal_core::CaseId;
    use zonal_core::CaseParameters;
    use zonal_core::ProjectId;
    use zonal_core::Timestamp;
    use zonal_core::Vote;

    use super::*;

    fn record(action: u32) -> FeedbackRecord {
        FeedbackRecord {
            project_id: ProjectId::from("p"),
            case_id: CaseId::from("c"),
            parameters: CaseParameters::from_json(&json!({
                "plot_area": 900.0,
                "location": "suburban",
                "road_width": 9.0,
            }))
            .unwrap(),
            action_taken: action,
            vote: Vote::Down,
            timestamp: Timestamp::now(),
        }
    }

    #[test]
    fn appends_accumulate_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FsFeedbackLedger::new(dir.path().join("feedback.jsonl"));
        ledger.append(&record(0)).unwrap();
        ledger.append(&record(3)).unwrap();

        let payload = std::fs::read_to_string(ledger.path()).unwrap();
        let lines: Vec<&str> = payload.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: FeedbackRecord = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.project_id.as_str(), "p");
        }
    }
}
