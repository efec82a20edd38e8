// crates/zonal-providers/tests/report_fs.rs
// ============================================================================
// Module: Report Store Tests
// Description: Filesystem report store round-trip and overwrite tests.
// Purpose: Verify keying, overwrite semantics, and identifier validation.
// Dependencies: zonal-providers, zonal-core, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Exercises the filesystem report store: save/load round-trips,
//! overwrite semantics, and identifier validation.

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

use serde_json::json;
use zonal_core::CaseId;
use zonal_core::CaseParameters;
use zonal_core::City;
use zonal_core::DerivedOutputs;
use zonal_core::EnvelopeDims;
use zonal_core::PolicyDecision;
use zonal_core::ProjectId;
use zonal_core::Report;
use zonal_core::ReportStore;
use zonal_core::Timestamp;
use zonal_providers::FsReportStore;

fn report(project: &str, case: &str, confidence: f64) -> Report {
    Report {
        project_id: ProjectId::from(project),
        case_id: CaseId::from(case),
        city: City::from("Pune"),
        inputs: CaseParameters::from_json(&json!({
            "plot_area": 1000.0,
            "location": "urban",
            "road_width": 10.0,
        }))
        .unwrap(),
        matched_entitlements: Vec::new(),
        narrative_text: "text".to_string(),
        narrative_degraded: false,
        decision: PolicyDecision {
            action: 1,
            confidence,
        },
        derived: DerivedOutputs {
            total_fsi: 1.0,
            fsi_rule: None,
            total_bua: 1000.0,
            carpet_area: 700.0,
            allowable_envelope: 700.0,
            envelope: EnvelopeDims {
                width: 31.6,
                depth: 31.6,
                height: 10.0,
            },
        },
        geometry_path: "projects/p/c_envelope.stl".to_string(),
        generated_at: Timestamp::now(),
    }
}

#[test]
fn save_then_load_round_trips_by_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsReportStore::new(dir.path().to_path_buf());
    store.save(&report("proj-1", "case-1", 0.8)).unwrap();

    let loaded = store
        .load(&ProjectId::from("proj-1"), &CaseId::from("case-1"))
        .unwrap()
        .unwrap();
    assert!((loaded.decision.confidence - 0.8).abs() < 1e-12);
    assert!(dir.path().join("projects/proj-1/case-1_report.json").exists());
}

#[test]
fn missing_report_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsReportStore::new(dir.path().to_path_buf());
    assert!(store.load(&ProjectId::from("p"), &CaseId::from("c")).unwrap().is_none());
}

#[test]
fn rerun_overwrites_at_the_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsReportStore::new(dir.path().to_path_buf());
    store.save(&report("proj-1", "case-1", 0.4)).unwrap();
    store.save(&report("proj-1", "case-1", 0.9)).unwrap();

    let loaded = store
        .load(&ProjectId::from("proj-1"), &CaseId::from("case-1"))
        .unwrap()
        .unwrap();
    assert!((loaded.decision.confidence - 0.9).abs() < 1e-12);
}

#[test]
fn traversal_identifiers_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsReportStore::new(dir.path().to_path_buf());
    assert!(store.save(&report("..", "case-1", 0.5)).is_err());
    assert!(store.load(&ProjectId::from("a/b"), &CaseId::from("c")).is_err());
}
