// crates/zonal-core/src/lib.rs
// ============================================================================
// Module: Zonal Core
// Description: Data model, rule matching, and decision fusion for Zonal.
// Purpose: Provide the backend-agnostic compliance decisioning core.
// Dependencies: serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! Zonal Core fuses three signal sources into one compliance report for a
//! real-estate development case: deterministic rule matching against a rule
//! store, a learned decision policy with calibrated confidence, and an
//! external narrative generator consumed as an opaque string. The live path
//! is request-scoped and stateless aside from the read-only rule store and
//! the loaded policy; collaborators are reached through the traits in
//! [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod matcher;
pub mod runtime;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use core::case::Case;
pub use core::case::CaseParameters;
pub use core::case::FieldValue;
pub use core::case::LocationCategory;
pub use core::case::STATE_DIM;
pub use core::case::STATE_ENCODING_VERSION;
pub use core::case::StateVector;
pub use core::case::ValidationError;
pub use core::feedback::FeedbackRecord;
pub use core::feedback::Vote;
pub use core::identifiers::CaseId;
pub use core::identifiers::City;
pub use core::identifiers::ProjectId;
pub use core::identifiers::RuleId;
pub use core::report::DerivedOutputs;
pub use core::report::EnvelopeDims;
pub use core::report::MatchedEntitlement;
pub use core::report::PolicyDecision;
pub use core::report::Report;
pub use core::rules::BoundKind;
pub use core::rules::Condition;
pub use core::rules::RawRule;
pub use core::rules::Rule;
pub use core::rules::RuleParseError;
pub use core::time::Timestamp;
pub use interfaces::ActionDistribution;
pub use interfaces::FeedbackLedger;
pub use interfaces::GeometryDims;
pub use interfaces::GeometryError;
pub use interfaces::GeometryWriter;
pub use interfaces::LedgerError;
pub use interfaces::NarrativeContext;
pub use interfaces::NarrativeError;
pub use interfaces::NarrativeGenerator;
pub use interfaces::Policy;
pub use interfaces::PolicyError;
pub use interfaces::ReportStore;
pub use interfaces::ReportStoreError;
pub use interfaces::RuleStore;
pub use interfaces::RuleStoreError;
pub use interfaces::UpsertOutcome;
pub use matcher::match_case;
pub use runtime::DecisionError;
pub use runtime::DecisionRuntime;
pub use runtime::NoopObserver;
pub use runtime::RuntimeConfig;
pub use runtime::RuntimeObserver;
pub use runtime::memory::InMemoryRuleStore;
