// crates/zonal-policy/src/checkpoint.rs
// ============================================================================
// Module: Policy Checkpoints
// Description: Versioned JSON artifacts persisting trained policies.
// Purpose: Save and load policies with fatal configuration checks.
// Dependencies: serde, serde_json, zonal-core
// ============================================================================

//! ## Overview
//! A checkpoint is a single JSON document carrying the artifact format
//! version, the state-encoding version the policy was trained under, the
//! action count, the feature scale, and the weight matrix. Loading verifies
//! all three compatibility axes against the caller's expectations and fails
//! with [`PolicyError::ConfigMismatch`] on any disagreement; a stale
//! checkpoint must never silently decide live cases.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use zonal_core::PolicyError;
use zonal_core::STATE_DIM;
use zonal_core::STATE_ENCODING_VERSION;
use zonal_core::Timestamp;

use crate::softmax::LinearSoftmaxPolicy;

// ============================================================================
// SECTION: Format
// ============================================================================

/// Version of the checkpoint artifact format.
pub const POLICY_FORMAT_VERSION: u32 = 1;

/// Serialized checkpoint artifact.
///
/// # Invariants
/// - `weights` has `action_count` rows of [`STATE_DIM`] columns and
///   `biases` has `action_count` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCheckpoint {
    /// Artifact format version.
    pub format_version: u32,
    /// State-encoding schema the policy was trained under.
    pub state_encoding_version: u32,
    /// Number of discrete actions.
    pub action_count: u32,
    /// Feature scale applied before the dot product.
    pub feature_scale: [f64; STATE_DIM],
    /// Weight rows, one per action.
    pub weights: Vec<[f64; STATE_DIM]>,
    /// Biases, one per action.
    pub biases: Vec<f64>,
    /// Time the checkpoint was written.
    pub trained_at: Timestamp,
}

impl PolicyCheckpoint {
    /// Captures the current policy parameters into a checkpoint.
    #[must_use]
    pub fn capture(policy: &LinearSoftmaxPolicy) -> Self {
        Self {
            format_version: POLICY_FORMAT_VERSION,
            state_encoding_version: STATE_ENCODING_VERSION,
            action_count: u32::try_from(policy.weights().len()).unwrap_or(u32::MAX),
            feature_scale: policy.feature_scale(),
            weights: policy.weights().to_vec(),
            biases: policy.biases().to_vec(),
            trained_at: Timestamp::now(),
        }
    }

    /// Reconstructs the policy after compatibility checks.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::ConfigMismatch`] when the format version,
    /// encoding version, or action count disagree with expectations, and
    /// [`PolicyError::Checkpoint`] when the parameter shapes are invalid.
    pub fn into_policy(self, expected_action_count: u32) -> Result<LinearSoftmaxPolicy, PolicyError> {
        if self.format_version != POLICY_FORMAT_VERSION {
            return Err(PolicyError::ConfigMismatch(format!(
                "checkpoint format version {} does not match supported version {}",
                self.format_version, POLICY_FORMAT_VERSION
            )));
        }
        if self.state_encoding_version != STATE_ENCODING_VERSION {
            return Err(PolicyError::ConfigMismatch(format!(
                "checkpoint state encoding version {} does not match runtime version {}",
                self.state_encoding_version, STATE_ENCODING_VERSION
            )));
        }
        if self.action_count != expected_action_count {
            return Err(PolicyError::ConfigMismatch(format!(
                "checkpoint action count {} does not match configured count {}",
                self.action_count, expected_action_count
            )));
        }
        if Some(self.weights.len()) != usize::try_from(self.action_count).ok() {
            return Err(PolicyError::Checkpoint(format!(
                "checkpoint declares {} actions but holds {} weight rows",
                self.action_count,
                self.weights.len()
            )));
        }
        LinearSoftmaxPolicy::from_parameters(self.weights, self.biases, self.feature_scale)
    }
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

/// Writes a policy checkpoint as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`PolicyError::Checkpoint`] when serialization or the write
/// fails.
pub fn save_checkpoint(policy: &LinearSoftmaxPolicy, path: &Path) -> Result<(), PolicyError> {
    let checkpoint = PolicyCheckpoint::capture(policy);
    let payload = serde_json::to_string_pretty(&checkpoint)
        .map_err(|error| PolicyError::Checkpoint(format!("serialize checkpoint: {error}")))?;
    fs::write(path, payload)
        .map_err(|error| PolicyError::Checkpoint(format!("write {}: {error}", path.display())))
}

/// Loads a policy checkpoint and verifies compatibility.
///
/// # Errors
///
/// Returns [`PolicyError::Checkpoint`] when the artifact cannot be read or
/// parsed, and [`PolicyError::ConfigMismatch`] on any compatibility
/// disagreement.
pub fn load_checkpoint(
    path: &Path,
    expected_action_count: u32,
) -> Result<LinearSoftmaxPolicy, PolicyError> {
    let payload = fs::read_to_string(path)
        .map_err(|error| PolicyError::Checkpoint(format!("read {}: {error}", path.display())))?;
    let checkpoint: PolicyCheckpoint = serde_json::from_str(&payload)
        .map_err(|error| PolicyError::Checkpoint(format!("parse {}: {error}", path.display())))?;
    checkpoint.into_policy(expected_action_count)
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
    use zonal_core::Policy;
    use zonal_core::StateVector;

    use super::*;

    #[test]
    fn saved_checkpoint_reloads_to_an_identical_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        let mut policy = LinearSoftmaxPolicy::zeroed(5);
        policy.reinforce(&StateVector::from_features([2000.0, 0.0, 28.0]), 4, 1.0, 0.3);
        save_checkpoint(&policy, &path).unwrap();

        let reloaded = load_checkpoint(&path, 5).unwrap();
        assert_eq!(reloaded, policy);

        let state = StateVector::from_features([2000.0, 0.0, 28.0]);
        assert_eq!(reloaded.predict(&state).unwrap(), policy.predict(&state).unwrap());
    }

    #[test]
    fn action_count_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        save_checkpoint(&LinearSoftmaxPolicy::zeroed(5), &path).unwrap();

        let error = load_checkpoint(&path, 2).unwrap_err();
        assert!(matches!(error, PolicyError::ConfigMismatch(_)));
    }

    #[test]
    fn encoding_version_mismatch_is_fatal() {
        let mut checkpoint = PolicyCheckpoint::capture(&LinearSoftmaxPolicy::zeroed(2));
        checkpoint.state_encoding_version += 1;
        let error = checkpoint.into_policy(2).unwrap_err();
        assert!(matches!(error, PolicyError::ConfigMismatch(_)));
    }

    #[test]
    fn format_version_mismatch_is_fatal() {
        let mut checkpoint = PolicyCheckpoint::capture(&LinearSoftmaxPolicy::zeroed(2));
        checkpoint.format_version += 1;
        let error = checkpoint.into_policy(2).unwrap_err();
        assert!(matches!(error, PolicyError::ConfigMismatch(_)));
    }

    #[test]
    fn corrupt_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, "{not json").unwrap();
        let error = load_checkpoint(&path, 2).unwrap_err();
        assert!(matches!(error, PolicyError::Checkpoint(_)));
    }
}
