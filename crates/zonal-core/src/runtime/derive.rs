// crates/zonal-core/src/runtime/derive.rs
// ============================================================================
// Module: Derived Calculations
// Description: Secondary outputs computed from matched entitlements.
// Purpose: Turn entitlements and plot parameters into report figures.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Derivation is pure arithmetic over the matched entitlements: the
//! effective FSI (first matched rule that supplies one, else the configured
//! default), built-up area, carpet area, the setback-reduced allowable
//! envelope, and the envelope block dimensions handed to the geometry
//! writer. All outputs are clamped non-negative.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::case::CaseParameters;
use crate::core::identifiers::RuleId;
use crate::core::report::DerivedOutputs;
use crate::core::report::EnvelopeDims;
use crate::core::report::MatchedEntitlement;
use crate::runtime::RuntimeConfig;

/// Entitlement key carrying the floor-space index.
const KEY_FSI: &str = "fsi";

/// Key carrying the FSI cap inside an object-valued `fsi` entitlement.
const KEY_FSI_MAX: &str = "max";

// ============================================================================
// SECTION: Derivation
// ============================================================================

/// Computes the derived outputs for one decision run.
///
/// The FSI comes from the first matched entitlement that supplies one, in
/// match order; `fsi` may be a plain number or an object carrying a `max`
/// cap. Otherwise the configured default applies and `fsi_rule` stays
/// empty. Match order is deterministic, so the derivation is too.
#[must_use]
pub fn derive_outputs(
    parameters: &CaseParameters,
    matched: &[MatchedEntitlement],
    config: &RuntimeConfig,
) -> DerivedOutputs {
    let (total_fsi, fsi_rule) = effective_fsi(matched, config.default_fsi);
    let total_bua = parameters.plot_area * total_fsi;
    let carpet_area = config.carpet_ratio * total_bua;
    let setback = parameters.setback_area.unwrap_or(config.default_setback_area);
    let allowable_envelope = (parameters.plot_area - 2.0 * setback).max(0.0);
    let side = parameters.plot_area.max(0.0).sqrt();
    let envelope = EnvelopeDims {
        width: side,
        depth: side,
        height: config.height_per_fsi * total_fsi,
    };
    DerivedOutputs {
        total_fsi,
        fsi_rule,
        total_bua,
        carpet_area,
        allowable_envelope,
        envelope,
    }
}

/// Returns the effective FSI and the rule that supplied it.
fn effective_fsi(matched: &[MatchedEntitlement], default_fsi: f64) -> (f64, Option<RuleId>) {
    for entitlement in matched {
        if let Some(fsi) = entitlement.entitlements.get(KEY_FSI).and_then(fsi_value)
            && fsi.is_finite()
            && fsi > 0.0
        {
            return (fsi, Some(entitlement.rule_id.clone()));
        }
    }
    (default_fsi, None)
}

/// Extracts the FSI from an entitlement value.
///
/// Plain numbers are used as-is; object-valued entitlements like
/// `{"max": 2.5}` contribute their cap.
fn fsi_value(value: &Value) -> Option<f64> {
    match value {
        Value::Object(band) => band.get(KEY_FSI_MAX).and_then(Value::as_f64),
        _ => value.as_f64(),
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

    use super::*;
    use crate::core::identifiers::RuleId;

    fn params(plot_area: f64, setback_area: Option<f64>) -> CaseParameters {
        let mut payload = json!({
            "plot_area": plot_area,
            "location": "urban",
            "road_width": 12.0,
        });
        if let Some(setback) = setback_area {
            payload["setback_area"] = json!(setback);
        }
        CaseParameters::from_json(&payload).unwrap()
    }

    fn entitlement(rule_id: &str, payload: serde_json::Value) -> MatchedEntitlement {
        MatchedEntitlement {
            rule_id: RuleId::from(rule_id),
            rule_type: "band".to_string(),
            entitlements: payload.as_object().cloned().unwrap_or_default(),
            notes: String::new(),
        }
    }

    #[test]
    fn fsi_comes_from_first_matching_entitlement() {
        let matched = vec![
            entitlement("no-fsi", json!({"parking": "basement"})),
            entitlement("fsi-a", json!({"fsi": 1.5})),
            entitlement("fsi-b", json!({"fsi": 2.5})),
        ];
        let derived = derive_outputs(&params(1000.0, None), &matched, &RuntimeConfig::default());
        assert!((derived.total_fsi - 1.5).abs() < f64::EPSILON);
        assert_eq!(derived.fsi_rule.as_ref().map(RuleId::as_str), Some("fsi-a"));
        assert!((derived.total_bua - 1500.0).abs() < 1e-9);
        assert!((derived.carpet_area - 1050.0).abs() < 1e-9);
    }

    #[test]
    fn fsi_defaults_when_no_entitlement_supplies_one() {
        let derived = derive_outputs(&params(800.0, None), &[], &RuntimeConfig::default());
        assert!((derived.total_fsi - 1.0).abs() < f64::EPSILON);
        assert!(derived.fsi_rule.is_none());
        assert!((derived.total_bua - 800.0).abs() < 1e-9);
    }

    #[test]
    fn envelope_uses_case_setback_when_present() {
        let derived = derive_outputs(&params(1000.0, Some(100.0)), &[], &RuntimeConfig::default());
        assert!((derived.allowable_envelope - 800.0).abs() < 1e-9);
    }

    #[test]
    fn envelope_clamps_to_zero_for_small_plots() {
        // Default setback of 150 would drive a 200 sqm plot negative.
        let derived = derive_outputs(&params(200.0, None), &[], &RuntimeConfig::default());
        assert!((derived.allowable_envelope - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn block_dimensions_scale_with_plot_and_fsi() {
        let matched = vec![entitlement("fsi-a", json!({"fsi": 2.0}))];
        let derived = derive_outputs(&params(900.0, None), &matched, &RuntimeConfig::default());
        assert!((derived.envelope.width - 30.0).abs() < 1e-9);
        assert!((derived.envelope.depth - 30.0).abs() < 1e-9);
        assert!((derived.envelope.height - 20.0).abs() < 1e-9);
    }

    #[test]
    fn object_valued_fsi_contributes_its_max_cap() {
        let matched = vec![entitlement("capped-fsi", json!({"fsi": {"max": 2.5}}))];
        let derived = derive_outputs(&params(1000.0, None), &matched, &RuntimeConfig::default());
        assert!((derived.total_fsi - 2.5).abs() < f64::EPSILON);
        assert_eq!(derived.fsi_rule.as_ref().map(RuleId::as_str), Some("capped-fsi"));
        assert!((derived.total_bua - 2500.0).abs() < 1e-9);
    }

    #[test]
    fn non_numeric_fsi_entitlement_is_ignored() {
        let matched = vec![entitlement("bad-fsi", json!({"fsi": "high"}))];
        let derived = derive_outputs(&params(500.0, None), &matched, &RuntimeConfig::default());
        assert!((derived.total_fsi - 1.0).abs() < f64::EPSILON);
        assert!(derived.fsi_rule.is_none());
    }

    #[test]
    fn object_fsi_without_a_max_falls_back_to_default() {
        let matched = vec![entitlement("odd-fsi", json!({"fsi": {"min": 0.5}}))];
        let derived = derive_outputs(&params(500.0, None), &matched, &RuntimeConfig::default());
        assert!((derived.total_fsi - 1.0).abs() < f64::EPSILON);
        assert!(derived.fsi_rule.is_none());
    }
}
