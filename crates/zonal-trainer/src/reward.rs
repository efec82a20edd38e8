// crates/zonal-trainer/src/reward.rs
// ============================================================================
// Module: Reward Function
// Description: Provenance-aware reward for one training episode.
// Purpose: Score a proposed action against a provenance-tagged case.
// Dependencies: zonal-core
// ============================================================================

//! ## Overview
//! Oracle labels are trusted exactly: agreement earns +1, disagreement −1.
//! A human vote judged a concrete report, so its reward depends on whether
//! the policy reproduces the judged action: reproducing an upvoted action
//! is the strongest signal (+2), reproducing a downvoted one the strongest
//! penalty (−2), diverging from a downvoted action is mildly right (+1),
//! and diverging from an upvoted action is merely uninformative (0).

// ============================================================================
// SECTION: Imports
// ============================================================================

use zonal_core::Vote;

use crate::dataset::TrainingCase;

// ============================================================================
// SECTION: Reward
// ============================================================================

/// Returns the reward for proposing `action` on a training case.
///
/// Total over the case type: every provenance and vote combination maps to
/// exactly one reward.
#[must_use]
pub fn reward(case: &TrainingCase, action: u32) -> f64 {
    match case {
        TrainingCase::Oracle {
            correct_action, ..
        } => {
            if action == *correct_action {
                1.0
            } else {
                -1.0
            }
        }
        TrainingCase::HumanFeedback {
            action_taken,
            vote,
            ..
        } => match (action == *action_taken, vote) {
            (true, Vote::Up) => 2.0,
            (true, Vote::Down) => -2.0,
            (false, Vote::Down) => 1.0,
            (false, Vote::Up) => 0.0,
        },
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
    use zonal_core::StateVector;

    use super::*;

    fn state() -> StateVector {
        StateVector::from_features([1000.0, 0.0, 12.0])
    }

    #[test]
    fn oracle_reward_is_symmetric_around_the_label() {
        let case = TrainingCase::Oracle {
            state: state(),
            correct_action: 3,
        };
        assert!((reward(&case, 3) - 1.0).abs() < f64::EPSILON);
        assert!((reward(&case, 0) - -1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reproducing_an_upvoted_action_earns_the_strongest_reward() {
        let case = TrainingCase::HumanFeedback {
            state: state(),
            action_taken: 2,
            vote: Vote::Up,
        };
        assert!((reward(&case, 2) - 2.0).abs() < f64::EPSILON);
        assert!((reward(&case, 1) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reproducing_a_downvoted_action_earns_the_strongest_penalty() {
        let case = TrainingCase::HumanFeedback {
            state: state(),
            action_taken: 2,
            vote: Vote::Down,
        };
        assert!((reward(&case, 2) - -2.0).abs() < f64::EPSILON);
        assert!((reward(&case, 4) - 1.0).abs() < f64::EPSILON);
    }
}
