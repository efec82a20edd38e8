// crates/zonal-core/src/core/case.rs
// ============================================================================
// Module: Zonal Case Model
// Description: Development cases, validation, and state-vector encoding.
// Purpose: Validate case input once and encode it deterministically for policies.
// Dependencies: crate::core::identifiers, serde, thiserror
// ============================================================================

//! ## Overview
//! A case is the immutable input to one decision run. Validation happens
//! before any matching begins; a missing required parameter is rejected, not
//! silently defaulted. The state-vector encoding is fixed-order and carries
//! [`STATE_ENCODING_VERSION`] so checkpoints trained under one schema can
//! never be evaluated under another.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::CaseId;
use crate::core::identifiers::City;
use crate::core::identifiers::ProjectId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version of the state-vector encoding schema.
///
/// Bump whenever the feature order, feature set, or category mapping
/// changes. Checkpoints embed this value and refuse to load on mismatch.
pub const STATE_ENCODING_VERSION: u32 = 1;

/// Number of features in the state vector.
pub const STATE_DIM: usize = 3;

/// Parameter field name for plot area in square metres.
pub const FIELD_PLOT_AREA: &str = "plot_area";

/// Parameter field name for location category.
pub const FIELD_LOCATION: &str = "location";

/// Parameter field name for abutting road width in metres.
pub const FIELD_ROAD_WIDTH: &str = "road_width";

// ============================================================================
// SECTION: Validation Errors
// ============================================================================

/// Errors raised while validating case input.
///
/// # Invariants
/// - Validation failures reject the case before matching begins.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required parameter is missing from the case input.
    #[error("case is missing required parameter: {0}")]
    MissingParameter(&'static str),
    /// A numeric parameter is not a finite, non-negative number.
    #[error("case parameter {field} is not a finite non-negative number: {value}")]
    InvalidNumeric {
        /// Parameter field name.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
    /// The location category is not part of the closed enumeration.
    #[error("unknown location category: {0}")]
    UnknownLocation(String),
}

// ============================================================================
// SECTION: Location Categories
// ============================================================================

/// Closed enumeration of location categories.
///
/// # Invariants
/// - Index mapping (urban=0, suburban=1, rural=2) is part of the state
///   encoding schema and must never change without a version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationCategory {
    /// Urban plot.
    Urban,
    /// Suburban plot.
    Suburban,
    /// Rural plot.
    Rural,
}

impl LocationCategory {
    /// Returns the fixed encoding index for the category.
    #[must_use]
    pub const fn index(self) -> f64 {
        match self {
            Self::Urban => 0.0,
            Self::Suburban => 1.0,
            Self::Rural => 2.0,
        }
    }

    /// Returns the stable lowercase label for the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Urban => "urban",
            Self::Suburban => "suburban",
            Self::Rural => "rural",
        }
    }

    /// Parses a label into a category.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownLocation`] for labels outside the
    /// closed enumeration.
    pub fn parse(label: &str) -> Result<Self, ValidationError> {
        match label {
            "urban" => Ok(Self::Urban),
            "suburban" => Ok(Self::Suburban),
            "rural" => Ok(Self::Rural),
            other => Err(ValidationError::UnknownLocation(other.to_string())),
        }
    }
}

impl fmt::Display for LocationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Field Values
// ============================================================================

/// Typed query value for one case parameter.
///
/// # Invariants
/// - Numeric values are finite once the owning case has been validated.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Numeric parameter value.
    Numeric(f64),
    /// Categorical parameter value.
    Categorical(String),
}

// ============================================================================
// SECTION: Case Parameters
// ============================================================================

/// Validated parameters for a development case.
///
/// # Invariants
/// - `plot_area` and `road_width` are finite and non-negative.
/// - `extra` holds optional categorical or numeric parameters (for example
///   `building_use`); absent extras contribute no matching constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseParameters {
    /// Plot area in square metres.
    pub plot_area: f64,
    /// Location category.
    pub location: LocationCategory,
    /// Abutting road width in metres.
    pub road_width: f64,
    /// Setback area in square metres used by the envelope calculation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setback_area: Option<f64>,
    /// Additional optional parameters keyed by field name.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CaseParameters {
    /// Validates numeric sanity of the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a numeric parameter is non-finite or
    /// negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            (FIELD_PLOT_AREA, self.plot_area),
            (FIELD_ROAD_WIDTH, self.road_width),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidNumeric {
                    field,
                    value,
                });
            }
        }
        if let Some(setback) = self.setback_area
            && (!setback.is_finite() || setback < 0.0)
        {
            return Err(ValidationError::InvalidNumeric {
                field: "setback_area",
                value: setback,
            });
        }
        Ok(())
    }

    /// Returns the query fields present in the input, in stable order.
    ///
    /// Required fields come first; extras follow in map order. Extras that
    /// are neither numbers nor strings are ignored rather than matched.
    #[must_use]
    pub fn query_fields(&self) -> Vec<(String, FieldValue)> {
        let mut fields = vec![
            (FIELD_PLOT_AREA.to_string(), FieldValue::Numeric(self.plot_area)),
            (
                FIELD_LOCATION.to_string(),
                FieldValue::Categorical(self.location.as_str().to_string()),
            ),
            (FIELD_ROAD_WIDTH.to_string(), FieldValue::Numeric(self.road_width)),
        ];
        for (field, value) in &self.extra {
            match value {
                Value::Number(number) => {
                    if let Some(v) = number.as_f64() {
                        fields.push((field.clone(), FieldValue::Numeric(v)));
                    }
                }
                Value::String(text) => {
                    fields.push((field.clone(), FieldValue::Categorical(text.clone())));
                }
                _ => {}
            }
        }
        fields
    }
}

// ============================================================================
// SECTION: Cases
// ============================================================================

/// Development case submitted for one decision run.
///
/// # Invariants
/// - Immutable once submitted; each run produces exactly one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Project identifier grouping related cases.
    pub project_id: ProjectId,
    /// Case identifier within the project.
    pub case_id: CaseId,
    /// City whose rulebook applies.
    pub city: City,
    /// Case parameters.
    pub parameters: CaseParameters,
}

impl CaseParameters {
    /// Builds validated parameters from a loose JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingParameter`] for absent required
    /// fields, and numeric or location errors per [`Self::validate`].
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::MissingParameter(FIELD_PLOT_AREA))?;
        let plot_area = object
            .get(FIELD_PLOT_AREA)
            .and_then(Value::as_f64)
            .ok_or(ValidationError::MissingParameter(FIELD_PLOT_AREA))?;
        let location_label = object
            .get(FIELD_LOCATION)
            .and_then(Value::as_str)
            .ok_or(ValidationError::MissingParameter(FIELD_LOCATION))?;
        let road_width = object
            .get(FIELD_ROAD_WIDTH)
            .and_then(Value::as_f64)
            .ok_or(ValidationError::MissingParameter(FIELD_ROAD_WIDTH))?;
        let setback_area = object.get("setback_area").and_then(Value::as_f64);
        let mut extra = BTreeMap::new();
        for (field, payload) in object {
            if matches!(
                field.as_str(),
                FIELD_PLOT_AREA | FIELD_LOCATION | FIELD_ROAD_WIDTH | "setback_area"
            ) {
                continue;
            }
            extra.insert(field.clone(), payload.clone());
        }
        let parameters = Self {
            plot_area,
            location: LocationCategory::parse(location_label)?,
            road_width,
            setback_area,
            extra,
        };
        parameters.validate()?;
        Ok(parameters)
    }
}

// ============================================================================
// SECTION: State Vector
// ============================================================================

/// Fixed-order numeric encoding of case parameters.
///
/// # Invariants
/// - Feature order is `[plot_area, location_index, road_width]` under
///   [`STATE_ENCODING_VERSION`]; training and inference must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateVector([f64; STATE_DIM]);

impl StateVector {
    /// Encodes validated case parameters into the fixed feature order.
    #[must_use]
    pub fn encode(parameters: &CaseParameters) -> Self {
        Self([parameters.plot_area, parameters.location.index(), parameters.road_width])
    }

    /// Creates a state vector directly from raw features.
    #[must_use]
    pub const fn from_features(features: [f64; STATE_DIM]) -> Self {
        Self(features)
    }

    /// Returns the features as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}
