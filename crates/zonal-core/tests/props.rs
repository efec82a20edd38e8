// crates/zonal-core/tests/props.rs
// ============================================================================
// Module: Core Property Tests
// Description: Property-based checks over conditions, encoding, and matching.
// Purpose: Verify invariants across randomized inputs.
// Dependencies: zonal-core, proptest, serde_json
// ============================================================================

//! ## Overview
//! Randomized checks of the bound semantics, state-encoding determinism,
//! and matcher dedup invariants.

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

use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::json;
use zonal_core::BoundKind;
use zonal_core::CaseParameters;
use zonal_core::City;
use zonal_core::Condition;
use zonal_core::FieldValue;
use zonal_core::InMemoryRuleStore;
use zonal_core::RawRule;
use zonal_core::Rule;
use zonal_core::RuleId;
use zonal_core::StateVector;
use zonal_core::match_case;

fn band(min: f64, max: f64, bound: BoundKind) -> Condition {
    Condition::NumericRange {
        min,
        max,
        bound,
    }
}

proptest! {
    #[test]
    fn half_open_band_never_admits_its_upper_bound(
        min in 0.0f64..100.0,
        span in 0.1f64..100.0,
    ) {
        let max = min + span;
        let condition = band(min, max, BoundKind::HalfOpen);
        prop_assert!(!condition.admits(&FieldValue::Numeric(max)));
        prop_assert!(condition.admits(&FieldValue::Numeric(min)));
    }

    #[test]
    fn closed_band_admits_both_bounds(
        min in 0.0f64..100.0,
        span in 0.1f64..100.0,
    ) {
        let max = min + span;
        let condition = band(min, max, BoundKind::Closed);
        prop_assert!(condition.admits(&FieldValue::Numeric(min)));
        prop_assert!(condition.admits(&FieldValue::Numeric(max)));
    }

    #[test]
    fn bands_never_admit_values_outside(
        min in 0.0f64..100.0,
        span in 0.1f64..100.0,
        offset in 0.001f64..50.0,
    ) {
        let max = min + span;
        for bound in [BoundKind::HalfOpen, BoundKind::Closed] {
            let condition = band(min, max, bound);
            prop_assert!(!condition.admits(&FieldValue::Numeric(min - offset)));
            prop_assert!(!condition.admits(&FieldValue::Numeric(max + offset)));
        }
    }

    #[test]
    fn numeric_bands_never_admit_categorical_values(
        min in 0.0f64..100.0,
        span in 0.1f64..100.0,
        label in "[a-z]{1,12}",
    ) {
        let condition = band(min, min + span, BoundKind::Closed);
        prop_assert!(!condition.admits(&FieldValue::Categorical(label)));
    }

    #[test]
    fn state_encoding_is_deterministic(
        plot_area in 0.0f64..100_000.0,
        road_width in 0.0f64..60.0,
        location_index in 0usize..3,
    ) {
        let location = ["urban", "suburban", "rural"][location_index];
        let parameters = CaseParameters::from_json(&json!({
            "plot_area": plot_area,
            "location": location,
            "road_width": road_width,
        })).unwrap();
        let first = StateVector::encode(&parameters);
        let second = StateVector::encode(&parameters);
        prop_assert_eq!(first.as_slice(), second.as_slice());
        prop_assert_eq!(
            first.as_slice(),
            &[plot_area, location_index as f64, road_width][..]
        );
    }

    #[test]
    fn matched_rules_have_unique_ids(
        plot_area in 1.0f64..10_000.0,
        road_width in 0.0f64..60.0,
        band_count in 1usize..8,
    ) {
        // Overlapping bands that all constrain both queried numeric fields,
        // so each rule is a candidate from two independent queries.
        let mut rules = Vec::new();
        for index in 0..band_count {
            let raw: RawRule = serde_json::from_value(json!({
                "id": format!("band-{index}"),
                "city": "Pune",
                "rule_type": "band",
                "conditions": {
                    "plot_area": {"min": 0.0, "max": 100_000.0},
                    "road_width": {"min": 0.0, "max": 100.0},
                },
                "entitlements": {"fsi": 1.0 + index as f64 / 10.0},
            })).unwrap();
            rules.push(Rule::resolve(raw).unwrap());
        }
        let store = InMemoryRuleStore::with_rules(rules).unwrap();
        let parameters = CaseParameters::from_json(&json!({
            "plot_area": plot_area,
            "location": "urban",
            "road_width": road_width,
        })).unwrap();

        let matched = match_case(&store, &City::from("Pune"), &parameters).unwrap();
        let ids: HashSet<&RuleId> = matched.iter().map(|rule| &rule.id).collect();
        prop_assert_eq!(ids.len(), matched.len());
        prop_assert_eq!(matched.len(), band_count);
    }
}
