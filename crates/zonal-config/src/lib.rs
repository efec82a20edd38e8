// crates/zonal-config/src/lib.rs
// ============================================================================
// Module: Zonal Config
// Description: Canonical TOML configuration model plus validation.
// Purpose: Load and validate the configuration driving the Zonal CLI.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! One TOML document configures every Zonal surface: the rule store path,
//! the policy checkpoint and action space, the narrative endpoint, artifact
//! roots, the feedback ledger, and the trainer. Loading parses the whole
//! document and then validates cross-field constraints; an invalid
//! configuration never reaches the runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("config io error at {path}: {message}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Configuration failed to parse as TOML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A field value violates a documented constraint.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Rule store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSection {
    /// `SQLite` database path.
    pub db_path: PathBuf,
}

/// Decision policy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySection {
    /// Checkpoint artifact to evaluate with.
    pub checkpoint_path: PathBuf,
    /// Number of discrete actions the deployment uses.
    #[serde(default = "default_action_count")]
    pub action_count: u32,
}

/// Narrative generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSection {
    /// Narrative service endpoint URL.
    pub endpoint: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_narrative_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum accepted response body size in bytes.
    #[serde(default = "default_narrative_max_bytes")]
    pub max_response_bytes: usize,
}

/// Artifact output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsSection {
    /// Root directory for reports and geometry artifacts.
    pub root: PathBuf,
}

/// Feedback ledger settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSection {
    /// JSONL ledger path.
    pub ledger_path: PathBuf,
}

/// Trainer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerSection {
    /// Directory receiving checkpoints and the trainer lock.
    pub checkpoint_dir: PathBuf,
    /// Oracle case file, when oracle cases participate.
    #[serde(default)]
    pub oracle_path: Option<PathBuf>,
    /// Number of single-step training episodes.
    #[serde(default = "default_episodes")]
    pub episodes: usize,
    /// Policy-gradient learning rate.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Seed for case and action sampling.
    #[serde(default)]
    pub seed: u64,
    /// Skipped-ledger-line fraction above which a warning is emitted.
    #[serde(default = "default_skip_warn_threshold")]
    pub skip_warn_threshold: f64,
}

/// Default policy action count.
const fn default_action_count() -> u32 {
    5
}

/// Default narrative request timeout in milliseconds.
const fn default_narrative_timeout_ms() -> u64 {
    10_000
}

/// Default narrative response size cap in bytes.
const fn default_narrative_max_bytes() -> usize {
    256 * 1024
}

/// Default training episode count.
const fn default_episodes() -> usize {
    5_000
}

/// Default policy-gradient learning rate.
const fn default_learning_rate() -> f64 {
    0.05
}

/// Default skipped-ledger-line warning threshold.
const fn default_skip_warn_threshold() -> f64 {
    0.05
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Canonical Zonal configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonalConfig {
    /// Rule store settings.
    pub store: StoreSection,
    /// Decision policy settings.
    pub policy: PolicySection,
    /// Narrative generator settings.
    pub narrative: NarrativeSection,
    /// Artifact output settings.
    pub artifacts: ArtifactsSection,
    /// Feedback ledger settings.
    pub feedback: FeedbackSection,
    /// Trainer settings.
    pub trainer: TrainerSection,
}

impl ZonalConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, the TOML is
    /// malformed, or any field violates its constraint.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let payload = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        let config: Self =
            toml::from_str(&payload).map_err(|error| ConfigError::Parse(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy.action_count < 2 {
            return Err(ConfigError::Invalid(format!(
                "policy.action_count must be at least 2, got {}",
                self.policy.action_count
            )));
        }
        if self.narrative.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("narrative.endpoint must not be empty".to_string()));
        }
        if self.narrative.timeout_ms == 0 {
            return Err(ConfigError::Invalid("narrative.timeout_ms must be positive".to_string()));
        }
        if self.narrative.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "narrative.max_response_bytes must be positive".to_string(),
            ));
        }
        if self.trainer.episodes == 0 {
            return Err(ConfigError::Invalid("trainer.episodes must be positive".to_string()));
        }
        if !self.trainer.learning_rate.is_finite() || self.trainer.learning_rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "trainer.learning_rate must be finite and positive, got {}",
                self.trainer.learning_rate
            )));
        }
        if !self.trainer.skip_warn_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.trainer.skip_warn_threshold)
        {
            return Err(ConfigError::Invalid(format!(
                "trainer.skip_warn_threshold must be within [0, 1], got {}",
                self.trainer.skip_warn_threshold
            )));
        }
        Ok(())
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
    use std::io::Write as _;

    use super::*;

    const VALID: &str = r#"
[store]
db_path = "zonal/rules.db"

[policy]
checkpoint_path = "zonal/checkpoints/policy-latest.json"
action_count = 5

[narrative]
endpoint = "http://127.0.0.1:8089/narrative"

[artifacts]
root = "zonal/artifacts"

[feedback]
ledger_path = "zonal/feedback.jsonl"

[trainer]
checkpoint_dir = "zonal/checkpoints"
oracle_path = "zonal/oracle.json"
"#;

    fn load(payload: &str) -> Result<ZonalConfig, ConfigError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(payload.as_bytes()).unwrap();
        ZonalConfig::load(file.path())
    }

    #[test]
    fn valid_document_loads_with_defaults() {
        let config = load(VALID).unwrap();
        assert_eq!(config.policy.action_count, 5);
        assert_eq!(config.trainer.episodes, 5_000);
        assert!((config.trainer.skip_warn_threshold - 0.05).abs() < 1e-12);
        assert_eq!(config.narrative.timeout_ms, 10_000);
    }

    #[test]
    fn undersized_action_space_is_rejected() {
        let payload = VALID.replace("action_count = 5", "action_count = 1");
        assert!(matches!(load(&payload), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_narrative_endpoint_is_rejected() {
        let payload = VALID.replace(
            "endpoint = \"http://127.0.0.1:8089/narrative\"",
            "endpoint = \"  \"",
        );
        assert!(matches!(load(&payload), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn out_of_range_skip_threshold_is_rejected() {
        let payload = VALID.replace(
            "checkpoint_dir = \"zonal/checkpoints\"",
            "checkpoint_dir = \"zonal/checkpoints\"\nskip_warn_threshold = 1.5",
        );
        assert!(matches!(load(&payload), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(load("[store\nbad"), Err(ConfigError::Parse(_))));
    }
}
