// crates/zonal-core/src/core/feedback.rs
// ============================================================================
// Module: Zonal Feedback Records
// Description: Append-only feedback ledger record schema.
// Purpose: Define the wire form shared by live appenders and the trainer.
// Dependencies: crate::core::{case, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Feedback records capture a human verdict on a decision the policy made.
//! The ledger is an append-only JSONL file: records are never mutated or
//! deleted, and the trainer re-reads the full ledger on every run. Readers
//! must tolerate torn or corrupt lines by skipping them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::case::CaseParameters;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::ProjectId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Votes
// ============================================================================

/// Human verdict on a policy decision.
///
/// # Invariants
/// - Variants are stable for serialization and reward computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    /// The decision was helpful.
    Up,
    /// The decision was wrong or unhelpful.
    Down,
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

// ============================================================================
// SECTION: Ledger Records
// ============================================================================

/// One feedback ledger line.
///
/// # Invariants
/// - `parameters` are the case parameters the decision was made on; the
///   trainer re-encodes them into a state vector under the current schema.
/// - Records are append-only and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Project identifier of the decided case.
    pub project_id: ProjectId,
    /// Case identifier of the decided case.
    pub case_id: CaseId,
    /// Case parameters the decision was made on.
    pub parameters: CaseParameters,
    /// Action the policy took for the case.
    pub action_taken: u32,
    /// Human verdict on the action.
    pub vote: Vote,
    /// Time the feedback was recorded.
    pub timestamp: Timestamp,
}
