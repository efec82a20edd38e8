// crates/zonal-core/src/runtime/mod.rs
// ============================================================================
// Module: Decision Runtime
// Description: Request-scoped fusion of rules, policy, and narrative.
// Purpose: Drive one decision run from validated case to persisted report.
// Dependencies: crate::core, crate::interfaces, crate::matcher
// ============================================================================

//! ## Overview
//! The runtime owns the collaborators for the live path and threads them
//! through each request explicitly; there is no ambient global state. One
//! call to [`DecisionRuntime::decide_case`] performs validation, rule
//! matching, policy evaluation, derived calculations, narrative generation
//! (degrading to a placeholder on upstream failure), geometry artifact
//! generation, and report persistence. A narrative failure degrades the
//! report; every other collaborator failure aborts the run.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod derive;
pub mod memory;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::case::Case;
use crate::core::case::CaseParameters;
use crate::core::case::StateVector;
use crate::core::case::ValidationError;
use crate::core::feedback::FeedbackRecord;
use crate::core::feedback::Vote;
use crate::core::identifiers::CaseId;
use crate::core::identifiers::City;
use crate::core::identifiers::ProjectId;
use crate::core::report::MatchedEntitlement;
use crate::core::report::PolicyDecision;
use crate::core::report::Report;
use crate::core::rules::Rule;
use crate::core::time::Timestamp;
use crate::interfaces::FeedbackLedger;
use crate::interfaces::GeometryDims;
use crate::interfaces::GeometryError;
use crate::interfaces::GeometryWriter;
use crate::interfaces::LedgerError;
use crate::interfaces::NarrativeContext;
use crate::interfaces::NarrativeGenerator;
use crate::interfaces::Policy;
use crate::interfaces::PolicyError;
use crate::interfaces::ReportStore;
use crate::interfaces::ReportStoreError;
use crate::interfaces::RuleStore;
use crate::interfaces::RuleStoreError;
use crate::matcher::match_case;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors aborting a decision run.
///
/// Narrative failures are absent on purpose: they degrade the report
/// instead of aborting the run.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// Case input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Rule store query failed.
    #[error(transparent)]
    RuleStore(#[from] RuleStoreError),
    /// Policy evaluation failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// Geometry artifact generation failed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// Report persistence failed.
    #[error(transparent)]
    ReportStore(#[from] ReportStoreError),
    /// Feedback ledger append failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ============================================================================
// SECTION: Observer
// ============================================================================

/// Observer hooks for decision-run events.
///
/// All methods default to no-ops so integrations opt in per event.
pub trait RuntimeObserver: Send + Sync {
    /// Called after matching with the number of matched rules.
    fn rules_matched(&self, _city: &City, _count: usize) {}

    /// Called after policy evaluation.
    fn policy_decided(&self, _action: u32, _confidence: f64) {}

    /// Called when narrative generation fails and the placeholder is used.
    fn narrative_degraded(&self, _reason: &str) {}

    /// Called after the report has been persisted.
    fn report_saved(&self, _project_id: &ProjectId, _case_id: &CaseId) {}
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RuntimeObserver for NoopObserver {}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Tunable constants for the decision runtime.
///
/// # Invariants
/// - Ratios and defaults are finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// FSI applied when no matched rule supplies one.
    pub default_fsi: f64,
    /// Setback area in square metres applied when the case supplies none.
    pub default_setback_area: f64,
    /// Carpet area as a fraction of built-up area.
    pub carpet_ratio: f64,
    /// Envelope block height in metres per unit of FSI.
    pub height_per_fsi: f64,
    /// Narrative text used when the generator fails.
    pub narrative_placeholder: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_fsi: 1.0,
            default_setback_area: 150.0,
            carpet_ratio: 0.70,
            height_per_fsi: 10.0,
            narrative_placeholder:
                "Narrative generation was unavailable for this run; entitlements and derived \
                 calculations are complete."
                    .to_string(),
        }
    }
}

// ============================================================================
// SECTION: Runtime
// ============================================================================

/// Request-scoped decision runtime wiring all collaborators.
pub struct DecisionRuntime {
    /// Durable rule store backing the matcher.
    store: Arc<dyn RuleStore>,
    /// Trained decision policy.
    policy: Arc<dyn Policy>,
    /// External narrative generator.
    narrative: Arc<dyn NarrativeGenerator>,
    /// Durable report store.
    reports: Arc<dyn ReportStore>,
    /// Geometry artifact writer.
    geometry: Arc<dyn GeometryWriter>,
    /// Append-only feedback ledger.
    ledger: Arc<dyn FeedbackLedger>,
    /// Pipeline lifecycle observer.
    observer: Arc<dyn RuntimeObserver>,
    /// Derivation defaults and placeholder text.
    config: RuntimeConfig,
}

impl DecisionRuntime {
    /// Creates a runtime over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RuleStore>,
        policy: Arc<dyn Policy>,
        narrative: Arc<dyn NarrativeGenerator>,
        reports: Arc<dyn ReportStore>,
        geometry: Arc<dyn GeometryWriter>,
        ledger: Arc<dyn FeedbackLedger>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            store,
            policy,
            narrative,
            reports,
            geometry,
            ledger,
            observer: Arc::new(NoopObserver),
            config,
        }
    }

    /// Replaces the no-op observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RuntimeObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the matched rules for a city and parameter set without
    /// running the full decision pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] on validation or store failure.
    pub fn match_rules(
        &self,
        city: &City,
        parameters: &CaseParameters,
    ) -> Result<Vec<Rule>, DecisionError> {
        parameters.validate()?;
        Ok(match_case(self.store.as_ref(), city, parameters)?)
    }

    /// Runs the full decision pipeline for one case and persists the report.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] when validation, matching, policy
    /// evaluation, derivation, geometry generation, or persistence fails.
    /// Narrative failures do not abort; they produce a degraded report.
    pub fn decide_case(&self, case: &Case) -> Result<Report, DecisionError> {
        case.parameters.validate()?;

        let matched = match_case(self.store.as_ref(), &case.city, &case.parameters)?;
        self.observer.rules_matched(&case.city, matched.len());
        let entitlements: Vec<MatchedEntitlement> =
            matched.iter().map(MatchedEntitlement::from).collect();

        let state = StateVector::encode(&case.parameters);
        let distribution = self.policy.predict(&state)?;
        let action = distribution.argmax();
        let decision = PolicyDecision {
            action,
            confidence: distribution.prob(action),
        };
        self.observer.policy_decided(decision.action, decision.confidence);

        let derived = derive::derive_outputs(&case.parameters, &entitlements, &self.config);

        let (narrative_text, narrative_degraded) = self.narrative_or_placeholder(case, &entitlements);

        let geometry_path = self.geometry.write_envelope(
            &case.project_id,
            &case.case_id,
            GeometryDims {
                width: derived.envelope.width,
                depth: derived.envelope.depth,
                height: derived.envelope.height,
            },
        )?;

        let report = Report {
            project_id: case.project_id.clone(),
            case_id: case.case_id.clone(),
            city: case.city.clone(),
            inputs: case.parameters.clone(),
            matched_entitlements: entitlements,
            narrative_text,
            narrative_degraded,
            decision,
            derived,
            geometry_path,
            generated_at: Timestamp::now(),
        };
        self.reports.save(&report)?;
        self.observer.report_saved(&report.project_id, &report.case_id);
        Ok(report)
    }

    /// Appends one human feedback vote to the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] when validation or the append fails.
    pub fn record_feedback(
        &self,
        project_id: ProjectId,
        case_id: CaseId,
        parameters: CaseParameters,
        action_taken: u32,
        vote: Vote,
    ) -> Result<(), DecisionError> {
        parameters.validate()?;
        let record = FeedbackRecord {
            project_id,
            case_id,
            parameters,
            action_taken,
            vote,
            timestamp: Timestamp::now(),
        };
        self.ledger.append(&record)?;
        Ok(())
    }

    /// Fetches the narrative, degrading to the placeholder on failure.
    fn narrative_or_placeholder(
        &self,
        case: &Case,
        entitlements: &[MatchedEntitlement],
    ) -> (String, bool) {
        let rules_found = !entitlements.is_empty();
        let summary = if rules_found {
            format!(
                "{count} regulatory rule(s) matched for {city}.",
                count = entitlements.len(),
                city = case.city
            )
        } else {
            format!("No regulatory rules were found for {city}.", city = case.city)
        };
        let context = NarrativeContext {
            city: case.city.clone(),
            parameters: case.parameters.clone(),
            matched: entitlements.to_vec(),
            rules_found,
            summary,
        };
        match self.narrative.generate(&context) {
            Ok(text) => (text, false),
            Err(error) => {
                self.observer.narrative_degraded(&error.to_string());
                (self.config.narrative_placeholder.clone(), true)
            }
        }
    }
}
