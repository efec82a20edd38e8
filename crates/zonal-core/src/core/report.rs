// crates/zonal-core/src/core/report.rs
// ============================================================================
// Module: Zonal Report Model
// Description: Compiled compliance report and derived calculations.
// Purpose: Capture one immutable decision run keyed by project and case.
// Dependencies: crate::core::{case, identifiers, rules, time}, serde
// ============================================================================

//! ## Overview
//! A report is the single output of one decision run: matched entitlements,
//! the narrative text (possibly a degraded placeholder), the policy action
//! with its confidence, and the derived secondary calculations. Reports are
//! written once per run keyed by `(project_id, case_id)`; a re-run overwrites
//! the record at that key (last-write-wins, no versioning).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::case::CaseParameters;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::City;
use crate::core::identifiers::ProjectId;
use crate::core::identifiers::RuleId;
use crate::core::rules::Rule;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Matched Entitlements
// ============================================================================

/// Entitlement payload of one matched rule, carried into the report.
///
/// # Invariants
/// - `entitlements` is the rule's payload verbatim; no interpretation is
///   applied during fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedEntitlement {
    /// Identifier of the matched rule.
    pub rule_id: RuleId,
    /// Rule classification label.
    pub rule_type: String,
    /// Entitlement payload granted by the rule.
    pub entitlements: Map<String, Value>,
    /// Free-form rule notes.
    pub notes: String,
}

impl From<&Rule> for MatchedEntitlement {
    fn from(rule: &Rule) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule_type: rule.rule_type.clone(),
            entitlements: rule.entitlements.clone(),
            notes: rule.notes.clone(),
        }
    }
}

// ============================================================================
// SECTION: Policy Decisions
// ============================================================================

/// Action and calibrated confidence reported by the decision policy.
///
/// # Invariants
/// - `confidence` is exactly the probability mass the policy assigned to
///   `action`, in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Chosen discrete action.
    pub action: u32,
    /// Probability mass of the chosen action under the policy distribution.
    pub confidence: f64,
}

// ============================================================================
// SECTION: Derived Outputs
// ============================================================================

/// Envelope block dimensions for the geometry artifact.
///
/// # Invariants
/// - Dimensions are finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeDims {
    /// Block width in metres.
    pub width: f64,
    /// Block depth in metres.
    pub depth: f64,
    /// Block height in metres.
    pub height: f64,
}

/// Secondary calculations derived from the matched entitlements.
///
/// # Invariants
/// - `total_fsi` falls back to the documented default (1.0) when no matched
///   rule supplies one; `fsi_rule` records the source rule when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedOutputs {
    /// Effective floor-space index applied to the plot.
    pub total_fsi: f64,
    /// Rule that supplied the FSI, when one did.
    pub fsi_rule: Option<RuleId>,
    /// Total permissible built-up area in square metres.
    pub total_bua: f64,
    /// Estimated carpet area in square metres.
    pub carpet_area: f64,
    /// Allowable envelope area after setbacks, in square metres.
    pub allowable_envelope: f64,
    /// Envelope block dimensions for the geometry artifact.
    pub envelope: EnvelopeDims,
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Compiled compliance report for one decision run.
///
/// # Invariants
/// - Created once per run; persisted keyed by `(project_id, case_id)`.
/// - `narrative_degraded` is true when the narrative generator failed or
///   timed out and `narrative_text` holds the placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Project identifier.
    pub project_id: ProjectId,
    /// Case identifier.
    pub case_id: CaseId,
    /// City whose rulebook was applied.
    pub city: City,
    /// Case parameters the run was decided on.
    pub inputs: CaseParameters,
    /// Entitlements of every matched rule, deduplicated by rule id.
    pub matched_entitlements: Vec<MatchedEntitlement>,
    /// Narrative text from the external generator, or the placeholder.
    pub narrative_text: String,
    /// True when the narrative is a local placeholder.
    pub narrative_degraded: bool,
    /// Policy action and confidence.
    pub decision: PolicyDecision,
    /// Derived secondary calculations.
    pub derived: DerivedOutputs,
    /// Path of the generated envelope geometry artifact.
    pub geometry_path: String,
    /// Time the report was compiled.
    pub generated_at: Timestamp,
}
