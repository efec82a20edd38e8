// crates/zonal-policy/src/softmax.rs
// ============================================================================
// Module: Linear-Softmax Policy
// Description: Deterministic softmax policy over the fixed state encoding.
// Purpose: Evaluate action distributions and apply single-step updates.
// Dependencies: zonal-core
// ============================================================================

//! ## Overview
//! One weight row and bias per action over the scaled feature vector.
//! Prediction is deterministic: identical state and identical weights yield
//! an identical distribution, and ties break to the lowest action index via
//! [`zonal_core::ActionDistribution::argmax`]. Training applies single-step
//! policy-gradient updates: the log-probability gradient of the taken
//! action, scaled by the reward.

// ============================================================================
// SECTION: Imports
// ============================================================================

use zonal_core::ActionDistribution;
use zonal_core::Policy;
use zonal_core::PolicyError;
use zonal_core::STATE_DIM;
use zonal_core::StateVector;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Linear-softmax policy over the fixed state encoding.
///
/// # Invariants
/// - `weights` has one row per action, each of length [`STATE_DIM`].
/// - `feature_scale` entries are strictly positive.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSoftmaxPolicy {
    /// One weight row per action.
    weights: Vec<[f64; STATE_DIM]>,
    /// One bias per action.
    biases: Vec<f64>,
    /// Per-feature divisors applied before the linear pass.
    feature_scale: [f64; STATE_DIM],
}

impl LinearSoftmaxPolicy {
    /// Feature scale dividing raw features into comparable ranges.
    ///
    /// Plot areas run to tens of thousands of square metres while location
    /// indexes stop at two; without scaling the area term drowns the rest.
    pub const DEFAULT_FEATURE_SCALE: [f64; STATE_DIM] = [10_000.0, 2.0, 30.0];

    /// Creates a zero-initialized policy with `action_count` actions.
    ///
    /// A zero policy is uniform over actions, so an untrained checkpoint
    /// reports calibrated indifference rather than false confidence.
    #[must_use]
    pub fn zeroed(action_count: u32) -> Self {
        let actions = usize::try_from(action_count).unwrap_or(usize::MAX);
        Self {
            weights: vec![[0.0; STATE_DIM]; actions],
            biases: vec![0.0; actions],
            feature_scale: Self::DEFAULT_FEATURE_SCALE,
        }
    }

    /// Creates a policy from explicit parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Checkpoint`] when shapes disagree or any
    /// scale entry is not strictly positive and finite.
    pub fn from_parameters(
        weights: Vec<[f64; STATE_DIM]>,
        biases: Vec<f64>,
        feature_scale: [f64; STATE_DIM],
    ) -> Result<Self, PolicyError> {
        if weights.len() != biases.len() {
            return Err(PolicyError::Checkpoint(format!(
                "weight rows ({}) and biases ({}) disagree",
                weights.len(),
                biases.len()
            )));
        }
        if weights.is_empty() {
            return Err(PolicyError::Checkpoint("policy has no actions".to_string()));
        }
        if feature_scale.iter().any(|scale| !scale.is_finite() || *scale <= 0.0) {
            return Err(PolicyError::Checkpoint(
                "feature scale entries must be finite and positive".to_string(),
            ));
        }
        Ok(Self {
            weights,
            biases,
            feature_scale,
        })
    }

    /// Returns the weight rows.
    #[must_use]
    pub fn weights(&self) -> &[[f64; STATE_DIM]] {
        &self.weights
    }

    /// Returns the biases.
    #[must_use]
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    /// Returns the feature scale.
    #[must_use]
    pub const fn feature_scale(&self) -> [f64; STATE_DIM] {
        self.feature_scale
    }

    /// Applies the per-feature scale to a raw state.
    fn scaled(&self, state: &StateVector) -> [f64; STATE_DIM] {
        let mut features = [0.0; STATE_DIM];
        for (index, raw) in state.as_slice().iter().enumerate() {
            features[index] = raw / self.feature_scale[index];
        }
        features
    }

    /// Computes the softmax distribution over actions.
    fn distribution(&self, state: &StateVector) -> Vec<f64> {
        let features = self.scaled(state);
        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                row.iter().zip(&features).map(|(w, x)| w * x).sum::<f64>() + bias
            })
            .collect();
        // Max-shift keeps the exponentials bounded.
        let shift = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|logit| (logit - shift).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|exp| exp / total).collect()
    }

    /// Applies one policy-gradient step for a single `(state, action,
    /// reward)` observation.
    ///
    /// The gradient of the taken action's log-probability is the one-hot
    /// action indicator minus the current distribution, outer-multiplied
    /// with the scaled features and scaled by `reward * learning_rate`.
    /// Actions outside the policy's range are ignored.
    pub fn reinforce(&mut self, state: &StateVector, action: u32, reward: f64, learning_rate: f64) {
        let action = usize::try_from(action).unwrap_or(usize::MAX);
        if action >= self.weights.len() {
            return;
        }
        let features = self.scaled(state);
        let probs = self.distribution(state);
        for (row_index, (row, bias)) in
            self.weights.iter_mut().zip(self.biases.iter_mut()).enumerate()
        {
            let indicator = if row_index == action { 1.0 } else { 0.0 };
            let grad = indicator - probs[row_index];
            for (weight, feature) in row.iter_mut().zip(&features) {
                *weight += learning_rate * reward * grad * feature;
            }
            *bias += learning_rate * reward * grad;
        }
    }
}

impl Policy for LinearSoftmaxPolicy {
    fn action_count(&self) -> u32 {
        u32::try_from(self.weights.len()).unwrap_or(u32::MAX)
    }

    fn predict(&self, state: &StateVector) -> Result<ActionDistribution, PolicyError> {
        Ok(ActionDistribution::new(self.distribution(state)))
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
    use super::*;

    fn state(plot_area: f64, location: f64, road_width: f64) -> StateVector {
        StateVector::from_features([plot_area, location, road_width])
    }

    #[test]
    fn zeroed_policy_is_uniform() {
        let policy = LinearSoftmaxPolicy::zeroed(5);
        let dist = policy.predict(&state(1200.0, 0.0, 30.0)).unwrap();
        for prob in dist.as_slice() {
            assert!((prob - 0.2).abs() < 1e-12);
        }
        assert_eq!(dist.argmax(), 0);
    }

    #[test]
    fn prediction_is_deterministic() {
        let mut policy = LinearSoftmaxPolicy::zeroed(3);
        policy.reinforce(&state(1200.0, 0.0, 30.0), 2, 1.0, 0.5);
        let first = policy.predict(&state(1200.0, 0.0, 30.0)).unwrap();
        let second = policy.predict(&state(1200.0, 0.0, 30.0)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn distribution_sums_to_one() {
        let mut policy = LinearSoftmaxPolicy::zeroed(5);
        policy.reinforce(&state(500.0, 2.0, 5.0), 1, 1.0, 0.3);
        policy.reinforce(&state(30_000.0, 0.0, 28.0), 4, 1.0, 0.3);
        let dist = policy.predict(&state(900.0, 1.0, 12.0)).unwrap();
        let total: f64 = dist.as_slice().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(dist.as_slice().iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn positive_reward_raises_the_taken_action() {
        let mut policy = LinearSoftmaxPolicy::zeroed(3);
        let s = state(1500.0, 0.0, 28.0);
        let before = policy.predict(&s).unwrap().prob(2);
        policy.reinforce(&s, 2, 1.0, 0.5);
        let after = policy.predict(&s).unwrap().prob(2);
        assert!(after > before);
    }

    #[test]
    fn negative_reward_lowers_the_taken_action() {
        let mut policy = LinearSoftmaxPolicy::zeroed(3);
        let s = state(700.0, 2.0, 6.0);
        let before = policy.predict(&s).unwrap().prob(1);
        policy.reinforce(&s, 1, -1.0, 0.5);
        let after = policy.predict(&s).unwrap().prob(1);
        assert!(after < before);
    }

    #[test]
    fn repeated_training_converges_on_the_labeled_action() {
        let mut policy = LinearSoftmaxPolicy::zeroed(5);
        let high = state(5000.0, 0.0, 28.0);
        let low = state(600.0, 2.0, 6.0);
        for _ in 0..200 {
            policy.reinforce(&high, 4, 1.0, 0.2);
            policy.reinforce(&low, 1, 1.0, 0.2);
        }
        assert_eq!(policy.predict(&high).unwrap().argmax(), 4);
        assert_eq!(policy.predict(&low).unwrap().argmax(), 1);
    }

    #[test]
    fn out_of_range_action_update_is_a_no_op() {
        let mut policy = LinearSoftmaxPolicy::zeroed(2);
        let reference = policy.clone();
        policy.reinforce(&state(100.0, 0.0, 5.0), 7, 1.0, 0.5);
        assert_eq!(policy, reference);
    }

    #[test]
    fn mismatched_parameter_shapes_are_rejected() {
        let result = LinearSoftmaxPolicy::from_parameters(
            vec![[0.0; STATE_DIM]; 3],
            vec![0.0; 2],
            LinearSoftmaxPolicy::DEFAULT_FEATURE_SCALE,
        );
        assert!(result.is_err());
    }
}
