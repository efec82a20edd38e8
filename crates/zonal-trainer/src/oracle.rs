// crates/zonal-trainer/src/oracle.rs
// ============================================================================
// Module: Oracle Generation
// Description: Deterministic labeled grid of synthetic training cases.
// Purpose: Bootstrap training before real feedback accumulates.
// Dependencies: zonal-core
// ============================================================================

//! ## Overview
//! The oracle grid walks representative parameter combinations and labels
//! each one with a rule-derived function. Two action-space variants exist:
//! the binary variant (approve-style, k=2) and the full variant (k=5)
//! matching the live action space. Generation is fully deterministic, so
//! two runs over the same variant produce identical files.

// ============================================================================
// SECTION: Imports
// ============================================================================

use zonal_core::LocationCategory;

use crate::dataset::OracleCase;

// ============================================================================
// SECTION: Variants
// ============================================================================

/// Action-space variant the oracle labels for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleVariant {
    /// Two-action variant.
    Binary,
    /// Five-action variant matching the live action space.
    Full,
}

impl OracleVariant {
    /// Number of actions in the variant's space.
    #[must_use]
    pub const fn action_count(self) -> u32 {
        match self {
            Self::Binary => 2,
            Self::Full => 5,
        }
    }

    /// Labels one parameter combination.
    ///
    /// Full variant: wide-road urban plots escalate to the top action,
    /// small plots on narrow roads to action 1, everything else to 0.
    /// Binary variant: the road width alone splits the two actions.
    #[must_use]
    pub fn label(self, plot_area: f64, location: LocationCategory, road_width: f64) -> u32 {
        match self {
            Self::Binary => u32::from(road_width > 12.0),
            Self::Full => {
                if road_width > 25.0 && location == LocationCategory::Urban {
                    4
                } else if plot_area < 1000.0 && road_width < 10.0 {
                    1
                } else {
                    0
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Grid Generation
// ============================================================================

/// Plot areas sampled by the grid, in square metres.
const GRID_PLOT_AREAS: [f64; 8] = [200.0, 500.0, 800.0, 1200.0, 2000.0, 3500.0, 6000.0, 10_000.0];

/// Road widths sampled by the grid, in metres.
const GRID_ROAD_WIDTHS: [f64; 9] = [3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 22.0, 26.0, 30.0];

/// Location categories sampled by the grid.
const GRID_LOCATIONS: [LocationCategory; 3] =
    [LocationCategory::Urban, LocationCategory::Suburban, LocationCategory::Rural];

/// Generates the deterministic labeled grid for a variant.
#[must_use]
pub fn generate_grid(variant: OracleVariant) -> Vec<OracleCase> {
    let mut cases =
        Vec::with_capacity(GRID_PLOT_AREAS.len() * GRID_LOCATIONS.len() * GRID_ROAD_WIDTHS.len());
    for plot_area in GRID_PLOT_AREAS {
        for location in GRID_LOCATIONS {
            for road_width in GRID_ROAD_WIDTHS {
                cases.push(OracleCase {
                    plot_area,
                    location,
                    road_width,
                    correct_action: variant.label(plot_area, location, road_width),
                });
            }
        }
    }
    cases
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
    use super::*;

    #[test]
    fn full_labeler_escalates_wide_road_urban_plots() {
        let variant = OracleVariant::Full;
        assert_eq!(variant.label(5000.0, LocationCategory::Urban, 30.0), 4);
        assert_eq!(variant.label(5000.0, LocationCategory::Rural, 30.0), 0);
        assert_eq!(variant.label(800.0, LocationCategory::Rural, 6.0), 1);
        assert_eq!(variant.label(2000.0, LocationCategory::Suburban, 15.0), 0);
    }

    #[test]
    fn binary_labeler_splits_on_road_width() {
        let variant = OracleVariant::Binary;
        assert_eq!(variant.label(500.0, LocationCategory::Urban, 13.0), 1);
        assert_eq!(variant.label(500.0, LocationCategory::Urban, 12.0), 0);
    }

    #[test]
    fn grid_is_deterministic_and_labels_stay_in_range() {
        let first = generate_grid(OracleVariant::Full);
        let second = generate_grid(OracleVariant::Full);
        assert_eq!(first, second);
        assert_eq!(first.len(), 8 * 3 * 9);
        assert!(first.iter().all(|case| case.correct_action < 5));
        let binary = generate_grid(OracleVariant::Binary);
        assert!(binary.iter().all(|case| case.correct_action < 2));
    }
}
