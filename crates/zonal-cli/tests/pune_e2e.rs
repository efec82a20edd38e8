// crates/zonal-cli/tests/pune_e2e.rs
// ============================================================================
// Module: Pune End-to-End Test
// Description: Full pipeline over real backends for the Pune scenario.
// Purpose: Verify store, matcher, policy, derivation, and artifacts together.
// Dependencies: zonal-core, zonal-policy, zonal-providers, zonal-store-sqlite,
//               zonal-trainer, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Seeds a durable Pune rulebook, trains a checkpoint from the oracle grid,
//! and runs a decision end to end: the half-open road-width band matches, a
//! rule demanding an absent `building_use` parameter does not, the city
//! default contributes, and the report plus geometry artifact land on disk.

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

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use zonal_core::Case;
use zonal_core::CaseId;
use zonal_core::CaseParameters;
use zonal_core::City;
use zonal_core::DecisionRuntime;
use zonal_core::ProjectId;
use zonal_core::RawRule;
use zonal_core::ReportStore;
use zonal_core::Rule;
use zonal_core::RuleStore;
use zonal_core::RuntimeConfig;
use zonal_policy::load_checkpoint;
use zonal_providers::FixedNarrative;
use zonal_providers::FsFeedbackLedger;
use zonal_providers::FsReportStore;
use zonal_providers::StlGeometryWriter;
use zonal_store_sqlite::SqliteRuleStore;
use zonal_store_sqlite::SqliteStoreConfig;
use zonal_trainer::NoopTrainerObserver;
use zonal_trainer::OracleVariant;
use zonal_trainer::TrainerConfig;
use zonal_trainer::generate_grid;
use zonal_trainer::retrain;

fn pune_rulebook() -> Vec<Rule> {
    let raw: Vec<RawRule> = serde_json::from_value(json!([
        {
            "id": "pune-road-band-9-12",
            "city": "Pune",
            "rule_type": "road_width_band",
            "conditions": {"road_width": {"min": 9.0, "max": 12.0}},
            "entitlements": {"fsi": 1.5},
            "notes": "Mid-width abutting road band."
        },
        {
            "id": "pune-commercial-corridor",
            "city": "Pune",
            "rule_type": "use_overlay",
            "conditions": {
                "road_width": {"min": 9.0, "max": 18.0},
                "building_use": ["commercial"]
            },
            "entitlements": {"fsi": 2.5}
        },
        {
            "id": "pune-city-default",
            "city": "Pune",
            "rule_type": "default",
            "conditions": {},
            "entitlements": {"parking": "one_per_70sqm"}
        }
    ]))
    .unwrap();
    raw.into_iter().map(|rule| Rule::resolve(rule).unwrap()).collect()
}

fn train_checkpoint(dir: &Path) -> std::path::PathBuf {
    let oracle = dir.join("oracle.json");
    std::fs::write(&oracle, serde_json::to_string(&generate_grid(OracleVariant::Full)).unwrap())
        .unwrap();
    let mut config = TrainerConfig::new(dir.join("checkpoints"), 5);
    config.oracle_path = Some(oracle);
    config.episodes = 2000;
    config.learning_rate = 0.1;
    config.seed = 11;
    retrain(&config, &NoopTrainerObserver).unwrap().checkpoint_path
}

#[test]
fn pune_case_flows_from_store_to_report_and_artifact() {
    let dir = tempfile::tempdir().unwrap();

    let store = SqliteRuleStore::open(&dir.path().join("rules.db"), SqliteStoreConfig::default())
        .unwrap();
    for rule in pune_rulebook() {
        store.upsert_rule(rule).unwrap();
    }

    let checkpoint = train_checkpoint(dir.path());
    let policy = load_checkpoint(&checkpoint, 5).unwrap();

    let artifacts = dir.path().to_path_buf();
    let reports = Arc::new(FsReportStore::new(artifacts.clone()));
    let runtime = DecisionRuntime::new(
        Arc::new(store),
        Arc::new(policy),
        Arc::new(FixedNarrative::new("Entitlements summarized for the Pune plot.")),
        Arc::clone(&reports) as Arc<dyn ReportStore>,
        Arc::new(StlGeometryWriter::new(artifacts.clone())),
        Arc::new(FsFeedbackLedger::new(artifacts.join("feedback.jsonl"))),
        RuntimeConfig::default(),
    );

    let case = Case {
        project_id: ProjectId::from("pune-project"),
        case_id: CaseId::from("case-001"),
        city: City::from("pune"),
        parameters: CaseParameters::from_json(&json!({
            "plot_area": 1000.0,
            "location": "urban",
            "road_width": 10.0,
        }))
        .unwrap(),
    };
    let report = runtime.decide_case(&case).unwrap();

    // The band matches, the default matches, the commercial overlay does
    // not: building_use was never supplied.
    let matched: Vec<&str> =
        report.matched_entitlements.iter().map(|e| e.rule_id.as_str()).collect();
    assert!(matched.contains(&"pune-road-band-9-12"));
    assert!(matched.contains(&"pune-city-default"));
    assert!(!matched.contains(&"pune-commercial-corridor"));

    assert!((report.derived.total_fsi - 1.5).abs() < f64::EPSILON);
    assert_eq!(report.derived.fsi_rule.as_ref().map(|id| id.as_str()), Some("pune-road-band-9-12"));
    assert!((report.derived.total_bua - 1500.0).abs() < 1e-9);
    assert!((report.derived.carpet_area - 1050.0).abs() < 1e-9);
    assert!((report.derived.allowable_envelope - 700.0).abs() < 1e-9);
    assert!(!report.narrative_degraded);
    assert!(report.decision.confidence > 0.0 && report.decision.confidence <= 1.0);
    assert!(u64::from(report.decision.action) < 5);

    // Durable artifacts: the report record and the STL envelope.
    let stored = reports
        .load(&ProjectId::from("pune-project"), &CaseId::from("case-001"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.decision, report.decision);
    assert!(Path::new(&report.geometry_path).exists());

    // The exact same case decides identically against the same checkpoint.
    let again = runtime.decide_case(&case).unwrap();
    assert_eq!(again.decision, report.decision);
    assert_eq!(again.matched_entitlements, report.matched_entitlements);
}

#[test]
fn road_width_at_the_band_upper_bound_does_not_match() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteRuleStore::open(&dir.path().join("rules.db"), SqliteStoreConfig::default())
        .unwrap();
    for rule in pune_rulebook() {
        store.upsert_rule(rule).unwrap();
    }

    let parameters = CaseParameters::from_json(&json!({
        "plot_area": 1000.0,
        "location": "urban",
        "road_width": 12.0,
    }))
    .unwrap();
    let matched = zonal_core::match_case(&store, &City::from("Pune"), &parameters).unwrap();
    let ids: Vec<&str> = matched.iter().map(|rule| rule.id.as_str()).collect();
    assert!(!ids.contains(&"pune-road-band-9-12"));
    assert!(ids.contains(&"pune-city-default"));
}
