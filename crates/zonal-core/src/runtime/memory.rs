// crates/zonal-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Rule Store
// Description: Deterministic in-process rule store for tests and tooling.
// Purpose: Provide a RuleStore backend without external persistence.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The in-memory store keeps rules in a `BTreeMap` keyed by rule id, so
//! query order is deterministic (id order) across runs. It backs the core
//! test suites and one-shot CLI invocations where durable storage is not
//! wanted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::core::case::FieldValue;
use crate::core::identifiers::City;
use crate::core::identifiers::RuleId;
use crate::core::rules::Rule;
use crate::interfaces::RuleStore;
use crate::interfaces::RuleStoreError;
use crate::interfaces::UpsertOutcome;

// ============================================================================
// SECTION: Store
// ============================================================================

/// In-process rule store keyed by rule id.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    /// Rule map keyed by identifier.
    rules: RwLock<BTreeMap<RuleId, Rule>>,
}

impl InMemoryRuleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with rules.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when an upsert fails.
    pub fn with_rules(rules: Vec<Rule>) -> Result<Self, RuleStoreError> {
        let store = Self::new();
        for rule in rules {
            store.upsert_rule(rule)?;
        }
        Ok(store)
    }

    /// Returns the number of stored rules.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError::Io`] when the lock is poisoned.
    pub fn len(&self) -> Result<usize, RuleStoreError> {
        Ok(self.read()?.len())
    }

    /// Returns true when the store holds no rules.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError::Io`] when the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, RuleStoreError> {
        Ok(self.read()?.is_empty())
    }

    /// Acquires the shared read guard over the rule map.
    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<RuleId, Rule>>, RuleStoreError> {
        self.rules
            .read()
            .map_err(|_| RuleStoreError::Io("rule store lock poisoned".to_string()))
    }
}

impl RuleStore for InMemoryRuleStore {
    fn upsert_rule(&self, rule: Rule) -> Result<UpsertOutcome, RuleStoreError> {
        let mut rules = self
            .rules
            .write()
            .map_err(|_| RuleStoreError::Io("rule store lock poisoned".to_string()))?;
        let outcome = if rules.contains_key(&rule.id) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        rules.insert(rule.id.clone(), rule);
        Ok(outcome)
    }

    fn query_field(
        &self,
        city: &City,
        field: &str,
        value: &FieldValue,
    ) -> Result<Vec<Rule>, RuleStoreError> {
        let rules = self.read()?;
        Ok(rules
            .values()
            .filter(|rule| &rule.city == city)
            .filter(|rule| {
                rule.conditions.get(field).is_some_and(|condition| condition.admits(value))
            })
            .cloned()
            .collect())
    }

    fn unconditional_rules(&self, city: &City) -> Result<Vec<Rule>, RuleStoreError> {
        let rules = self.read()?;
        Ok(rules
            .values()
            .filter(|rule| &rule.city == city && rule.is_unconditional())
            .cloned()
            .collect())
    }

    fn rules_for_city(&self, city: &City) -> Result<Vec<Rule>, RuleStoreError> {
        let rules = self.read()?;
        Ok(rules.values().filter(|rule| &rule.city == city).cloned().collect())
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
    use crate::core::rules::RawRule;

    fn rule(id: &str, city: &str) -> Rule {
        let raw: RawRule = serde_json::from_value(json!({
            "id": id,
            "city": city,
            "rule_type": "band",
            "conditions": {"road_width": {"min": 9.0, "max": 12.0}},
            "entitlements": {"fsi": 1.1},
        }))
        .unwrap();
        Rule::resolve(raw).unwrap()
    }

    #[test]
    fn upsert_is_idempotent_by_id() {
        let store = InMemoryRuleStore::new();
        assert_eq!(store.upsert_rule(rule("r1", "Pune")).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_rule(rule("r1", "Pune")).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn query_field_respects_city_and_band() {
        let store =
            InMemoryRuleStore::with_rules(vec![rule("r1", "Pune"), rule("r2", "Mumbai")]).unwrap();
        let hits = store
            .query_field(&City::from("pune"), "road_width", &FieldValue::Numeric(10.0))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_str(), "r1");
        let misses = store
            .query_field(&City::from("Pune"), "road_width", &FieldValue::Numeric(20.0))
            .unwrap();
        assert!(misses.is_empty());
    }
}
