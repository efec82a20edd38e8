// crates/zonal-core/src/interfaces/mod.rs
// ============================================================================
// Module: Zonal Interfaces
// Description: Backend-agnostic interfaces for rules, policy, and collaborators.
// Purpose: Define the contract surfaces used by the Zonal decision runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how Zonal integrates with its collaborators without
//! embedding backend-specific details: the rule store, the trained decision
//! policy, the external narrative generator, report persistence, the
//! envelope geometry writer, and the feedback ledger. Implementations must
//! be deterministic where the contract requires it and fail closed on
//! invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::case::CaseParameters;
use crate::core::case::FieldValue;
use crate::core::case::StateVector;
use crate::core::feedback::FeedbackRecord;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::City;
use crate::core::identifiers::ProjectId;
use crate::core::report::MatchedEntitlement;
use crate::core::report::Report;
use crate::core::rules::Rule;

// ============================================================================
// SECTION: Rule Store
// ============================================================================

/// Rule store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RuleStoreError {
    /// Store I/O error.
    #[error("rule store io error: {0}")]
    Io(String),
    /// Store row failed to decode into a typed rule.
    #[error("rule store corruption: {0}")]
    Corrupt(String),
    /// Store schema version is incompatible.
    #[error("rule store version mismatch: {0}")]
    VersionMismatch(String),
    /// Rejected rule payload (for example a missing id).
    #[error("rule store rejected rule: {0}")]
    Rejected(String),
}

/// Outcome of an idempotent rule upsert.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new rule was inserted.
    Inserted,
    /// An existing rule with the same id was replaced.
    Updated,
}

/// Mutable catalogue of regulatory rules keyed by city and rule id.
///
/// The store is read-only from the decisioning path; upserts come from the
/// administrative load process.
pub trait RuleStore: Send + Sync {
    /// Upserts a rule keyed by its id.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when persistence fails.
    fn upsert_rule(&self, rule: Rule) -> Result<UpsertOutcome, RuleStoreError>;

    /// Returns rules for the city whose condition on `field` admits `value`.
    ///
    /// Rules without a condition on `field` are not returned here; see
    /// [`RuleStore::unconditional_rules`] for city-wide defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when the query fails.
    fn query_field(
        &self,
        city: &City,
        field: &str,
        value: &FieldValue,
    ) -> Result<Vec<Rule>, RuleStoreError>;

    /// Returns the city's unconditional rules (city-wide defaults).
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when the query fails.
    fn unconditional_rules(&self, city: &City) -> Result<Vec<Rule>, RuleStoreError>;

    /// Returns all rules for a city.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when the query fails.
    fn rules_for_city(&self, city: &City) -> Result<Vec<Rule>, RuleStoreError>;

    /// Reports store readiness for liveness probes.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), RuleStoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Decision Policy
// ============================================================================

/// Policy errors.
///
/// # Invariants
/// - `ConfigMismatch` is fatal and must abort before any decision is
///   attempted; it is never recovered at runtime.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Checkpoint and caller disagree on action space or encoding schema.
    #[error("policy configuration mismatch: {0}")]
    ConfigMismatch(String),
    /// Checkpoint artifact could not be read or parsed.
    #[error("policy checkpoint error: {0}")]
    Checkpoint(String),
}

/// Probability distribution over the discrete action space.
///
/// # Invariants
/// - Probabilities are non-negative and sum to 1 within floating tolerance.
/// - The distribution is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDistribution(Vec<f64>);

impl ActionDistribution {
    /// Creates a distribution from raw probabilities.
    #[must_use]
    pub const fn new(probs: Vec<f64>) -> Self {
        Self(probs)
    }

    /// Returns the probabilities as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Returns the index of the most probable action.
    ///
    /// Ties break deterministically to the lowest index.
    #[must_use]
    pub fn argmax(&self) -> u32 {
        let mut best = 0usize;
        for (index, prob) in self.0.iter().enumerate() {
            if *prob > self.0[best] {
                best = index;
            }
        }
        u32::try_from(best).unwrap_or(u32::MAX)
    }

    /// Returns the probability mass of an action, or 0.0 out of range.
    #[must_use]
    pub fn prob(&self, action: u32) -> f64 {
        self.0.get(usize::try_from(action).unwrap_or(usize::MAX)).copied().unwrap_or(0.0)
    }
}

/// Narrow interface over a trained decision policy.
///
/// Any trained backend can be swapped in without touching fusion logic, as
/// long as it reports the same distribution it selects from.
pub trait Policy: Send + Sync {
    /// Number of discrete actions the policy selects among.
    fn action_count(&self) -> u32;

    /// Evaluates the action distribution for a state.
    ///
    /// Must be deterministic: identical state and identical checkpoint
    /// produce an identical distribution.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when evaluation fails.
    fn predict(&self, state: &StateVector) -> Result<ActionDistribution, PolicyError>;
}

// ============================================================================
// SECTION: Narrative Generator
// ============================================================================

/// Narrative generator errors.
///
/// # Invariants
/// - All variants are recovered locally by the runtime with a placeholder
///   narrative; they never abort report compilation.
#[derive(Debug, Error)]
pub enum NarrativeError {
    /// Generator did not respond within the bounded timeout.
    #[error("narrative generator timed out")]
    UpstreamTimeout,
    /// Generator responded with an error or unusable payload.
    #[error("narrative generator failure: {0}")]
    Upstream(String),
}

/// Structured context handed to the narrative generator.
///
/// # Invariants
/// - `rules_found` is false exactly when `matched` is empty, and `summary`
///   then states explicitly that no rules were found so the generator prompt
///   contract stays satisfiable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeContext {
    /// City whose rulebook was applied.
    pub city: City,
    /// Case parameters under analysis.
    pub parameters: CaseParameters,
    /// Matched entitlements, deduplicated by rule id.
    pub matched: Vec<MatchedEntitlement>,
    /// True when at least one rule matched.
    pub rules_found: bool,
    /// Short textual framing of the match outcome.
    pub summary: String,
}

/// External narrative generator consumed as an opaque string.
pub trait NarrativeGenerator: Send + Sync {
    /// Generates the narrative text for a decision run.
    ///
    /// Implementations must tolerate an empty rule list.
    ///
    /// # Errors
    ///
    /// Returns [`NarrativeError`] on timeout or upstream failure.
    fn generate(&self, context: &NarrativeContext) -> Result<String, NarrativeError>;
}

// ============================================================================
// SECTION: Report Store
// ============================================================================

/// Report store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ReportStoreError {
    /// Store I/O error.
    #[error("report store io error: {0}")]
    Io(String),
    /// Report failed to serialize.
    #[error("report serialization failure: {0}")]
    Serialization(String),
}

/// Durable report persistence keyed by `(project_id, case_id)`.
pub trait ReportStore: Send + Sync {
    /// Persists a report, overwriting any prior report at the same key.
    ///
    /// # Errors
    ///
    /// Returns [`ReportStoreError`] when the write fails.
    fn save(&self, report: &Report) -> Result<(), ReportStoreError>;

    /// Loads the report at a key, when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ReportStoreError`] when the read fails.
    fn load(&self, project_id: &ProjectId, case_id: &CaseId)
    -> Result<Option<Report>, ReportStoreError>;
}

// ============================================================================
// SECTION: Geometry Writer
// ============================================================================

/// Geometry writer errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// Artifact write failure.
    #[error("geometry artifact error: {0}")]
    Io(String),
    /// Dimensions are non-finite or negative.
    #[error("invalid geometry dimensions: {0}")]
    InvalidDims(String),
}

/// Envelope block dimensions handed to the geometry writer.
///
/// # Invariants
/// - Values are finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryDims {
    /// Block width in metres.
    pub width: f64,
    /// Block depth in metres.
    pub depth: f64,
    /// Block height in metres.
    pub height: f64,
}

/// Mesh artifact generator for the allowable envelope.
pub trait GeometryWriter: Send + Sync {
    /// Writes the envelope mesh and returns the artifact path.
    ///
    /// The path must be derivable from `(project_id, case_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] when validation or the write fails.
    fn write_envelope(
        &self,
        project_id: &ProjectId,
        case_id: &CaseId,
        dims: GeometryDims,
    ) -> Result<String, GeometryError>;
}

// ============================================================================
// SECTION: Feedback Ledger
// ============================================================================

/// Feedback ledger errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Ledger append failure.
    #[error("feedback ledger io error: {0}")]
    Io(String),
    /// Record failed to serialize into a ledger line.
    #[error("feedback record serialization failure: {0}")]
    Serialization(String),
}

/// Append-only feedback ledger written by live requests.
///
/// Many writers may append concurrently; readers tolerate torn lines by
/// skipping them rather than taking a lock.
pub trait FeedbackLedger: Send + Sync {
    /// Appends one feedback record as a single JSONL line.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the append fails.
    fn append(&self, record: &FeedbackRecord) -> Result<(), LedgerError>;
}
