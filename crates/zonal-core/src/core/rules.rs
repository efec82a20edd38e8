// crates/zonal-core/src/core/rules.rs
// ============================================================================
// Module: Zonal Rule Model
// Description: Regulatory rules with resolved condition predicates.
// Purpose: Parse untyped rule payloads once into typed, queryable conditions.
// Dependencies: crate::core::identifiers, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Rules arrive from the ingestion pipeline as untyped JSON. This module
//! resolves each condition into a tagged variant exactly once at load time so
//! the matcher never re-interprets nested JSON per query. Numeric bands carry
//! their bound kind: the source regulation defines width bands half-open
//! (`min <= v < max`) but area bands closed (`min <= v <= max`), and that
//! asymmetry is preserved per field rather than globalized.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::case::FieldValue;
use crate::core::identifiers::City;
use crate::core::identifiers::RuleId;

// ============================================================================
// SECTION: Parse Errors
// ============================================================================

/// Errors raised while resolving raw rule payloads.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RuleParseError {
    /// Rule payload is missing its identifier.
    #[error("rule has no id and was rejected")]
    MissingId,
    /// Numeric band is missing `min` or `max`.
    #[error("rule {rule_id}: condition {field} has an incomplete numeric band")]
    IncompleteBand {
        /// Rule identifier.
        rule_id: RuleId,
        /// Condition field name.
        field: String,
    },
    /// Numeric band has `min` greater than `max`.
    #[error("rule {rule_id}: condition {field} has min > max")]
    InvertedBand {
        /// Rule identifier.
        rule_id: RuleId,
        /// Condition field name.
        field: String,
    },
    /// Condition payload is neither a numeric band nor a value list.
    #[error("rule {rule_id}: condition {field} is not a band or value list")]
    UnsupportedCondition {
        /// Rule identifier.
        rule_id: RuleId,
        /// Condition field name.
        field: String,
    },
}

// ============================================================================
// SECTION: Bound Kinds
// ============================================================================

/// Upper-bound semantics for a numeric band.
///
/// # Invariants
/// - `HalfOpen` admits `min <= v < max`; `Closed` admits `min <= v <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    /// Half-open band, used for width-type fields.
    HalfOpen,
    /// Closed band, used for area-type fields.
    Closed,
}

impl BoundKind {
    /// Returns the bound kind the source regulation uses for a field.
    ///
    /// Width bands are half-open; every other numeric band is closed. The
    /// inconsistency comes from the regulatory source and is preserved here
    /// per field (see DESIGN.md Open Questions).
    #[must_use]
    pub fn for_field(field: &str) -> Self {
        if field.ends_with("width") || field.ends_with("width_m") {
            Self::HalfOpen
        } else {
            Self::Closed
        }
    }
}

// ============================================================================
// SECTION: Conditions
// ============================================================================

/// Resolved condition predicate for one rule field.
///
/// # Invariants
/// - `NumericRange` satisfies `min <= max`.
/// - `CategoricalSet` values are compared verbatim against input values.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Numeric band with per-field bound semantics.
    NumericRange {
        /// Inclusive lower bound.
        min: f64,
        /// Upper bound; inclusivity depends on `bound`.
        max: f64,
        /// Upper-bound semantics for this field.
        bound: BoundKind,
    },
    /// Accepted categorical values.
    CategoricalSet(Vec<String>),
}

impl Condition {
    /// Resolves a raw JSON condition payload for the named field.
    ///
    /// # Errors
    ///
    /// Returns [`RuleParseError`] when the payload is not a `{min, max}`
    /// object or a list of strings, or when the band is malformed.
    pub fn resolve(rule_id: &RuleId, field: &str, raw: &Value) -> Result<Self, RuleParseError> {
        match raw {
            Value::Object(band) => {
                let min = band.get("min").and_then(Value::as_f64);
                let max = band.get("max").and_then(Value::as_f64);
                let (Some(min), Some(max)) = (min, max) else {
                    return Err(RuleParseError::IncompleteBand {
                        rule_id: rule_id.clone(),
                        field: field.to_string(),
                    });
                };
                if min > max {
                    return Err(RuleParseError::InvertedBand {
                        rule_id: rule_id.clone(),
                        field: field.to_string(),
                    });
                }
                Ok(Self::NumericRange {
                    min,
                    max,
                    bound: BoundKind::for_field(field),
                })
            }
            Value::Array(values) => {
                let mut accepted = Vec::with_capacity(values.len());
                for value in values {
                    let Value::String(text) = value else {
                        return Err(RuleParseError::UnsupportedCondition {
                            rule_id: rule_id.clone(),
                            field: field.to_string(),
                        });
                    };
                    accepted.push(text.clone());
                }
                Ok(Self::CategoricalSet(accepted))
            }
            _ => Err(RuleParseError::UnsupportedCondition {
                rule_id: rule_id.clone(),
                field: field.to_string(),
            }),
        }
    }

    /// Returns true when the condition admits the input value.
    ///
    /// A type mismatch between the condition and the value never admits.
    #[must_use]
    pub fn admits(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (
                Self::NumericRange {
                    min,
                    max,
                    bound,
                },
                FieldValue::Numeric(v),
            ) => {
                let upper_ok = match bound {
                    BoundKind::HalfOpen => v < max,
                    BoundKind::Closed => v <= max,
                };
                *min <= *v && upper_ok
            }
            (Self::CategoricalSet(accepted), FieldValue::Categorical(v)) => {
                accepted.iter().any(|candidate| candidate == v)
            }
            _ => false,
        }
    }

    /// Renders the condition back into its raw JSON payload.
    #[must_use]
    pub fn to_raw(&self) -> Value {
        match self {
            Self::NumericRange {
                min,
                max,
                ..
            } => {
                let mut band = Map::new();
                band.insert("min".to_string(), json_number(*min));
                band.insert("max".to_string(), json_number(*max));
                Value::Object(band)
            }
            Self::CategoricalSet(values) => {
                Value::Array(values.iter().map(|v| Value::String(v.clone())).collect())
            }
        }
    }
}

/// Converts an `f64` into a JSON number, mapping non-finite values to null.
fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Raw rule payload as produced by the ingestion pipeline.
///
/// # Invariants
/// - `conditions` and `entitlements` are untyped JSON maps; resolution into
///   typed conditions happens exactly once via [`Rule::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRule {
    /// Globally unique rule identifier; empty means the rule is rejected.
    #[serde(default)]
    pub id: Option<RuleId>,
    /// City the rule applies to.
    pub city: City,
    /// Rule classification label.
    #[serde(default)]
    pub rule_type: String,
    /// Untyped condition payloads keyed by field name.
    #[serde(default)]
    pub conditions: Map<String, Value>,
    /// Entitlement payload granted when the rule matches.
    #[serde(default)]
    pub entitlements: Map<String, Value>,
    /// Free-form notes carried through to reports.
    #[serde(default)]
    pub notes: String,
}

/// Regulatory rule with conditions resolved at load time.
///
/// # Invariants
/// - `id` is globally unique; upserts are keyed by it.
/// - An empty `conditions` map means the rule matches every query for its
///   city unconditionally (city-wide default).
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Globally unique rule identifier.
    pub id: RuleId,
    /// City the rule applies to.
    pub city: City,
    /// Rule classification label.
    pub rule_type: String,
    /// Resolved condition predicates keyed by field name.
    pub conditions: BTreeMap<String, Condition>,
    /// Entitlement payload granted when the rule matches.
    pub entitlements: Map<String, Value>,
    /// Free-form notes carried through to reports.
    pub notes: String,
}

impl Rule {
    /// Resolves a raw rule payload into a typed rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleParseError::MissingId`] when the payload has no
    /// identifier, or a condition error when any predicate is malformed.
    pub fn resolve(raw: RawRule) -> Result<Self, RuleParseError> {
        let id = raw.id.ok_or(RuleParseError::MissingId)?;
        let mut conditions = BTreeMap::new();
        for (field, payload) in &raw.conditions {
            let condition = Condition::resolve(&id, field, payload)?;
            conditions.insert(field.clone(), condition);
        }
        Ok(Self {
            id,
            city: raw.city,
            rule_type: raw.rule_type,
            conditions,
            entitlements: raw.entitlements,
            notes: raw.notes,
        })
    }

    /// Returns true when the rule has no conditions (city-wide default).
    #[must_use]
    pub fn is_unconditional(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Renders the rule back into its raw wire form.
    #[must_use]
    pub fn to_raw(&self) -> RawRule {
        let mut conditions = Map::new();
        for (field, condition) in &self.conditions {
            conditions.insert(field.clone(), condition.to_raw());
        }
        RawRule {
            id: Some(self.id.clone()),
            city: self.city.clone(),
            rule_type: self.rule_type.clone(),
            conditions,
            entitlements: self.entitlements.clone(),
            notes: self.notes.clone(),
        }
    }
}
