// crates/zonal-core/src/matcher.rs
// ============================================================================
// Module: Rule Matcher
// Description: Deterministic candidate retrieval and conjunctive filtering.
// Purpose: Select the city rules applicable to a concrete set of case
//          parameters.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Matching runs in two phases. First, every present case parameter issues
//! an independent store query returning the rules whose condition on that
//! field admits the value; the city's unconditional rules join the pool
//! last. Candidates are deduplicated by rule id in first-seen order.
//! Second, a conjunctive filter retains only candidates whose every
//! condition is satisfied by some present parameter, so a rule that also
//! constrains a field the case never supplied is excluded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::core::case::CaseParameters;
use crate::core::case::FieldValue;
use crate::core::identifiers::City;
use crate::core::identifiers::RuleId;
use crate::core::rules::Rule;
use crate::interfaces::RuleStore;
use crate::interfaces::RuleStoreError;

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Returns the rules applicable to `parameters` in `city`.
///
/// The result is deterministic for a fixed store state: candidate order
/// follows the order queries are issued (required fields first, extras in
/// field-name order) and dedup keeps the first occurrence of each rule id.
///
/// An empty parameter set issues no queries and matches nothing, even when
/// the city has unconditional rules.
///
/// # Errors
///
/// Returns [`RuleStoreError`] when any store query fails.
pub fn match_case(
    store: &dyn RuleStore,
    city: &City,
    parameters: &CaseParameters,
) -> Result<Vec<Rule>, RuleStoreError> {
    let fields = parameters.query_fields();
    if fields.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen: HashSet<RuleId> = HashSet::new();
    let mut candidates: Vec<Rule> = Vec::new();
    for (field, value) in &fields {
        for rule in store.query_field(city, field, value)? {
            if seen.insert(rule.id.clone()) {
                candidates.push(rule);
            }
        }
    }
    for rule in store.unconditional_rules(city)? {
        if seen.insert(rule.id.clone()) {
            candidates.push(rule);
        }
    }

    let present: BTreeMap<&str, &FieldValue> =
        fields.iter().map(|(field, value)| (field.as_str(), value)).collect();
    candidates.retain(|rule| conditions_satisfied(rule, &present));
    Ok(candidates)
}

/// True when every condition on the rule is satisfied by a present parameter.
///
/// Unconditional rules are vacuously satisfied.
fn conditions_satisfied(rule: &Rule, present: &BTreeMap<&str, &FieldValue>) -> bool {
    rule.conditions
        .iter()
        .all(|(field, condition)| present.get(field.as_str()).is_some_and(|value| condition.admits(value)))
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
    use crate::core::rules::RawRule;
    use crate::runtime::memory::InMemoryRuleStore;

    fn rule(id: &str, conditions: serde_json::Value, entitlements: serde_json::Value) -> Rule {
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

    fn params(plot_area: f64, location: &str, road_width: f64) -> CaseParameters {
        serde_json::from_value(json!({
            "plot_area": plot_area,
            "location": location,
            "road_width": road_width,
        }))
        .unwrap()
    }

    fn store_with(rules: Vec<Rule>) -> InMemoryRuleStore {
        let store = InMemoryRuleStore::default();
        for rule in rules {
            store.upsert_rule(rule).unwrap();
        }
        store
    }

    #[test]
    fn band_rule_matches_inside_band() {
        let store = store_with(vec![rule(
            "pune-band-1",
            json!({"road_width": {"min": 9.0, "max": 12.0}}),
            json!({"fsi": 1.1}),
        )]);
        let matched =
            match_case(&store, &City::from("Pune"), &params(500.0, "urban", 10.0)).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id.as_str(), "pune-band-1");
    }

    #[test]
    fn half_open_upper_bound_excludes_road_width_max() {
        let store = store_with(vec![rule(
            "band",
            json!({"road_width": {"min": 9.0, "max": 12.0}}),
            json!({"fsi": 1.1}),
        )]);
        let matched =
            match_case(&store, &City::from("Pune"), &params(500.0, "urban", 12.0)).unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn closed_upper_bound_includes_plot_area_max() {
        let store = store_with(vec![rule(
            "band",
            json!({"plot_area": {"min": 100.0, "max": 500.0}}),
            json!({"fsi": 1.1}),
        )]);
        let matched =
            match_case(&store, &City::from("Pune"), &params(500.0, "urban", 10.0)).unwrap();
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn unconditional_rule_matches_any_nonempty_case() {
        let store = store_with(vec![rule("city-default", json!({}), json!({"fsi": 1.0}))]);
        let matched =
            match_case(&store, &City::from("Pune"), &params(42.0, "rural", 3.0)).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id.as_str(), "city-default");
    }

    #[test]
    fn rule_requiring_absent_field_is_excluded() {
        // Matches on road_width alone, but also constrains building_use,
        // which the case never supplies.
        let store = store_with(vec![rule(
            "commercial-only",
            json!({
                "road_width": {"min": 9.0, "max": 12.0},
                "building_use": ["commercial"],
            }),
            json!({"fsi": 2.0}),
        )]);
        let matched =
            match_case(&store, &City::from("Pune"), &params(500.0, "urban", 10.0)).unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn categorical_condition_matches_extra_parameter() {
        let store = store_with(vec![rule(
            "commercial-only",
            json!({"building_use": ["commercial", "mixed"]}),
            json!({"fsi": 2.0}),
        )]);
        let mut parameters = params(500.0, "urban", 10.0);
        parameters
            .extra
            .insert("building_use".to_owned(), json!("commercial"));
        let matched = match_case(&store, &City::from("Pune"), &parameters).unwrap();
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn duplicate_candidates_dedup_by_rule_id() {
        // A rule conditioned on two present fields is returned by both
        // per-field queries but appears once in the match set.
        let store = store_with(vec![rule(
            "two-fields",
            json!({
                "plot_area": {"min": 100.0, "max": 1000.0},
                "road_width": {"min": 5.0, "max": 20.0},
            }),
            json!({"fsi": 1.5}),
        )]);
        let matched =
            match_case(&store, &City::from("Pune"), &params(500.0, "urban", 10.0)).unwrap();
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn city_isolation_excludes_other_cities() {
        let store = store_with(vec![rule("pune-rule", json!({}), json!({"fsi": 1.0}))]);
        let matched =
            match_case(&store, &City::from("Mumbai"), &params(500.0, "urban", 10.0)).unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn city_lookup_is_case_insensitive() {
        let store = store_with(vec![rule("pune-rule", json!({}), json!({"fsi": 1.0}))]);
        let matched =
            match_case(&store, &City::from("PUNE"), &params(500.0, "urban", 10.0)).unwrap();
        assert_eq!(matched.len(), 1);
    }
}
