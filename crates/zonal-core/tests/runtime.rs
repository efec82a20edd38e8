// crates/zonal-core/tests/runtime.rs
// ============================================================================
// Module: Decision Runtime Tests
// Description: End-to-end pipeline tests over in-process test doubles.
// Purpose: Verify fusion, degradation, and persistence semantics.
// Dependencies: zonal-core, serde_json
// ============================================================================

//! ## Overview
//! Exercises the full decision pipeline with in-process doubles: a fixed
//! policy, scripted narrative generators, and memory-backed report, geometry,
//! and ledger sinks.

#![allow(
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

use std::sync::Arc;
use std::sync::Mutex;

use serde_json::json;
use zonal_core::ActionDistribution;
use zonal_core::Case;
use zonal_core::CaseId;
use zonal_core::CaseParameters;
use zonal_core::City;
use zonal_core::DecisionRuntime;
use zonal_core::FeedbackLedger;
use zonal_core::FeedbackRecord;
use zonal_core::GeometryDims;
use zonal_core::GeometryError;
use zonal_core::GeometryWriter;
use zonal_core::InMemoryRuleStore;
use zonal_core::LedgerError;
use zonal_core::NarrativeContext;
use zonal_core::NarrativeError;
use zonal_core::NarrativeGenerator;
use zonal_core::Policy;
use zonal_core::PolicyError;
use zonal_core::ProjectId;
use zonal_core::RawRule;
use zonal_core::Report;
use zonal_core::ReportStore;
use zonal_core::ReportStoreError;
use zonal_core::Rule;
use zonal_core::RuntimeConfig;
use zonal_core::StateVector;
use zonal_core::Vote;

// ==== SECTION: Test Doubles ====

struct FixedPolicy {
    probs: Vec<f64>,
}

impl Policy for FixedPolicy {
    fn action_count(&self) -> u32 {
        u32::try_from(self.probs.len()).unwrap()
    }

    fn predict(&self, _state: &StateVector) -> Result<ActionDistribution, PolicyError> {
        Ok(ActionDistribution::new(self.probs.clone()))
    }
}

struct EchoNarrative;

impl NarrativeGenerator for EchoNarrative {
    fn generate(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        Ok(context.summary.clone())
    }
}

struct FailingNarrative;

impl NarrativeGenerator for FailingNarrative {
    fn generate(&self, _context: &NarrativeContext) -> Result<String, NarrativeError> {
        Err(NarrativeError::UpstreamTimeout)
    }
}

#[derive(Default)]
struct MemReportStore {
    reports: Mutex<Vec<Report>>,
}

impl ReportStore for MemReportStore {
    fn save(&self, report: &Report) -> Result<(), ReportStoreError> {
        let mut reports = self.reports.lock().unwrap();
        reports.retain(|existing| {
            !(existing.project_id == report.project_id && existing.case_id == report.case_id)
        });
        reports.push(report.clone());
        Ok(())
    }

    fn load(
        &self,
        project_id: &ProjectId,
        case_id: &CaseId,
    ) -> Result<Option<Report>, ReportStoreError> {
        Ok(self
            .reports
            .lock()
            .unwrap()
            .iter()
            .find(|report| &report.project_id == project_id && &report.case_id == case_id)
            .cloned())
    }
}

#[derive(Default)]
struct MemGeometry {
    dims: Mutex<Vec<GeometryDims>>,
}

impl GeometryWriter for MemGeometry {
    fn write_envelope(
        &self,
        project_id: &ProjectId,
        case_id: &CaseId,
        dims: GeometryDims,
    ) -> Result<String, GeometryError> {
        self.dims.lock().unwrap().push(dims);
        Ok(format!("{}/{}_envelope.stl", project_id, case_id))
    }
}

#[derive(Default)]
struct MemLedger {
    records: Mutex<Vec<FeedbackRecord>>,
}

impl FeedbackLedger for MemLedger {
    fn append(&self, record: &FeedbackRecord) -> Result<(), LedgerError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ==== SECTION: Fixtures ====

fn pune_rule(id: &str, conditions: serde_json::Value, entitlements: serde_json::Value) -> Rule {
    let raw: RawRule = serde_json::from_value(json!({
        "id": id,
        "city": "Pune",
        "rule_type": "band",
        "conditions": conditions,
        "entitlements": entitlements,
    }))
    .unwrap();
    Rule::resolve(raw).unwrap()
}

fn pune_case(plot_area: f64, road_width: f64) -> Case {
    Case {
        project_id: ProjectId::from("proj-1"),
        case_id: CaseId::from("case-1"),
        city: City::from("Pune"),
        parameters: CaseParameters::from_json(&json!({
            "plot_area": plot_area,
            "location": "urban",
            "road_width": road_width,
        }))
        .unwrap(),
    }
}

struct Harness {
    runtime: DecisionRuntime,
    reports: Arc<MemReportStore>,
    geometry: Arc<MemGeometry>,
    ledger: Arc<MemLedger>,
}

fn harness(rules: Vec<Rule>, probs: Vec<f64>, narrative_fails: bool) -> Harness {
    let store = Arc::new(InMemoryRuleStore::with_rules(rules).unwrap());
    let reports = Arc::new(MemReportStore::default());
    let geometry = Arc::new(MemGeometry::default());
    let ledger = Arc::new(MemLedger::default());
    let narrative: Arc<dyn NarrativeGenerator> = if narrative_fails {
        Arc::new(FailingNarrative)
    } else {
        Arc::new(EchoNarrative)
    };
    let runtime = DecisionRuntime::new(
        store,
        Arc::new(FixedPolicy {
            probs,
        }),
        narrative,
        Arc::clone(&reports) as Arc<dyn ReportStore>,
        Arc::clone(&geometry) as Arc<dyn GeometryWriter>,
        Arc::clone(&ledger) as Arc<dyn FeedbackLedger>,
        RuntimeConfig::default(),
    );
    Harness {
        runtime,
        reports,
        geometry,
        ledger,
    }
}

// ==== SECTION: Tests ====

#[test]
fn decide_case_fuses_rules_policy_and_narrative() {
    let harness = harness(
        vec![pune_rule(
            "band-1",
            json!({"road_width": {"min": 9.0, "max": 12.0}}),
            json!({"fsi": 1.5}),
        )],
        vec![0.2, 0.7, 0.1],
        false,
    );
    let report = harness.runtime.decide_case(&pune_case(1000.0, 10.0)).unwrap();

    assert_eq!(report.matched_entitlements.len(), 1);
    assert_eq!(report.matched_entitlements[0].rule_id.as_str(), "band-1");
    assert_eq!(report.decision.action, 1);
    assert!((report.decision.confidence - 0.7).abs() < 1e-12);
    assert!(!report.narrative_degraded);
    assert_eq!(report.narrative_text, "1 regulatory rule(s) matched for Pune.");
    assert!((report.derived.total_fsi - 1.5).abs() < f64::EPSILON);
    assert!((report.derived.total_bua - 1500.0).abs() < 1e-9);
    assert_eq!(report.geometry_path, "proj-1/case-1_envelope.stl");
}

#[test]
fn confidence_is_the_chosen_action_mass() {
    let harness = harness(Vec::new(), vec![0.55, 0.25, 0.20], false);
    let report = harness.runtime.decide_case(&pune_case(500.0, 8.0)).unwrap();
    assert_eq!(report.decision.action, 0);
    assert!((report.decision.confidence - 0.55).abs() < 1e-12);
}

#[test]
fn argmax_ties_break_to_lowest_index() {
    let harness = harness(Vec::new(), vec![0.5, 0.5], false);
    let report = harness.runtime.decide_case(&pune_case(500.0, 8.0)).unwrap();
    assert_eq!(report.decision.action, 0);
}

#[test]
fn narrative_failure_degrades_but_completes_the_report() {
    let harness = harness(
        vec![pune_rule("band-1", json!({}), json!({"fsi": 1.2}))],
        vec![0.9, 0.1],
        true,
    );
    let report = harness.runtime.decide_case(&pune_case(1000.0, 10.0)).unwrap();

    assert!(report.narrative_degraded);
    assert_eq!(report.narrative_text, RuntimeConfig::default().narrative_placeholder);
    // Ruling data is still complete.
    assert_eq!(report.matched_entitlements.len(), 1);
    assert!((report.derived.total_fsi - 1.2).abs() < f64::EPSILON);
    assert!(
        harness
            .reports
            .load(&ProjectId::from("proj-1"), &CaseId::from("case-1"))
            .unwrap()
            .is_some()
    );
}

#[test]
fn empty_match_produces_explicit_no_rules_narrative_context() {
    let harness = harness(Vec::new(), vec![1.0], false);
    let report = harness.runtime.decide_case(&pune_case(500.0, 8.0)).unwrap();
    assert!(report.matched_entitlements.is_empty());
    assert_eq!(report.narrative_text, "No regulatory rules were found for Pune.");
    assert!((report.derived.total_fsi - 1.0).abs() < f64::EPSILON);
}

#[test]
fn rerun_overwrites_the_report_at_the_same_key() {
    let harness = harness(Vec::new(), vec![1.0], false);
    harness.runtime.decide_case(&pune_case(500.0, 8.0)).unwrap();
    harness.runtime.decide_case(&pune_case(900.0, 8.0)).unwrap();

    let stored = harness
        .reports
        .load(&ProjectId::from("proj-1"), &CaseId::from("case-1"))
        .unwrap()
        .unwrap();
    assert!((stored.inputs.plot_area - 900.0).abs() < f64::EPSILON);
    assert_eq!(harness.reports.reports.lock().unwrap().len(), 1);
}

#[test]
fn geometry_dims_follow_derived_envelope() {
    let harness = harness(
        vec![pune_rule("fsi-2", json!({}), json!({"fsi": 2.0}))],
        vec![1.0],
        false,
    );
    harness.runtime.decide_case(&pune_case(900.0, 8.0)).unwrap();

    let dims = harness.geometry.dims.lock().unwrap();
    assert_eq!(dims.len(), 1);
    assert!((dims[0].width - 30.0).abs() < 1e-9);
    assert!((dims[0].depth - 30.0).abs() < 1e-9);
    assert!((dims[0].height - 20.0).abs() < 1e-9);
}

#[test]
fn identical_input_yields_identical_decision() {
    let harness = harness(
        vec![pune_rule(
            "band-1",
            json!({"road_width": {"min": 9.0, "max": 12.0}}),
            json!({"fsi": 1.5}),
        )],
        vec![0.3, 0.6, 0.1],
        false,
    );
    let first = harness.runtime.decide_case(&pune_case(1000.0, 10.0)).unwrap();
    let second = harness.runtime.decide_case(&pune_case(1000.0, 10.0)).unwrap();

    assert_eq!(first.decision, second.decision);
    assert_eq!(first.matched_entitlements, second.matched_entitlements);
    assert_eq!(first.derived, second.derived);
}

#[test]
fn invalid_numeric_input_is_rejected_before_matching() {
    let harness = harness(Vec::new(), vec![1.0], false);
    let mut case = pune_case(500.0, 8.0);
    case.parameters.plot_area = f64::NAN;
    assert!(harness.runtime.decide_case(&case).is_err());
    assert!(harness.reports.reports.lock().unwrap().is_empty());
}

#[test]
fn record_feedback_appends_one_ledger_record() {
    let harness = harness(Vec::new(), vec![1.0], false);
    let case = pune_case(500.0, 8.0);
    harness
        .runtime
        .record_feedback(
            case.project_id.clone(),
            case.case_id.clone(),
            case.parameters.clone(),
            2,
            Vote::Up,
        )
        .unwrap();

    let records = harness.ledger.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action_taken, 2);
    assert_eq!(records[0].vote, Vote::Up);
}
