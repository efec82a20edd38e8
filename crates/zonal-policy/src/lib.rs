// crates/zonal-policy/src/lib.rs
// ============================================================================
// Module: Zonal Policy
// Description: Linear-softmax decision policy and checkpoint artifacts.
// Purpose: Provide the trained Policy backend behind zonal-core's interface.
// Dependencies: serde, serde_json, zonal-core
// ============================================================================

//! ## Overview
//! The policy backend is a linear-softmax model over the fixed state
//! encoding: one weight row and bias per action, features scaled into a
//! comparable range before the dot product. Checkpoints are JSON artifacts
//! carrying the format version, the state-encoding version, and the action
//! count; any mismatch at load time is fatal rather than silently adapted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod checkpoint;
pub mod softmax;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use checkpoint::POLICY_FORMAT_VERSION;
pub use checkpoint::PolicyCheckpoint;
pub use checkpoint::load_checkpoint;
pub use checkpoint::save_checkpoint;
pub use softmax::LinearSoftmaxPolicy;
