// crates/zonal-providers/src/narrative.rs
// ============================================================================
// Module: Narrative HTTP Client
// Description: Blocking HTTP adapter for the narrative generator service.
// Purpose: Fetch report narratives with bounded timeout and response size.
// Dependencies: reqwest, serde, serde_json, zonal-core
// ============================================================================

//! ## Overview
//! The narrative service receives the structured decision context as JSON
//! and returns `{"narrative": "..."}`. The client enforces a request
//! timeout, refuses redirects, and caps the response body; every failure
//! maps into [`NarrativeError`] so the runtime can degrade the report
//! instead of aborting the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde::Deserialize;
use zonal_core::NarrativeContext;
use zonal_core::NarrativeError;
use zonal_core::NarrativeGenerator;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Default request timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default response body cap in bytes.
const DEFAULT_MAX_RESPONSE_BYTES: usize = 256 * 1024;

/// Configuration for the narrative HTTP client.
///
/// # Invariants
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpNarrativeConfig {
    /// Narrative service endpoint URL.
    pub endpoint: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum accepted response body size in bytes.
    pub max_response_bytes: usize,
}

impl HttpNarrativeConfig {
    /// Creates a configuration with the documented defaults.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Response payload from the narrative service.
#[derive(Debug, Deserialize)]
struct NarrativeResponse {
    /// Generated narrative text.
    narrative: String,
}

/// Blocking narrative generator over HTTP.
pub struct HttpNarrativeGenerator {
    /// Blocking HTTP client.
    client: Client,
    /// Endpoint and limit configuration.
    config: HttpNarrativeConfig,
}

impl HttpNarrativeGenerator {
    /// Builds the client for a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NarrativeError::Upstream`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: HttpNarrativeConfig) -> Result<Self, NarrativeError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(Policy::none())
            .build()
            .map_err(|_| NarrativeError::Upstream("http client build failed".to_string()))?;
        Ok(Self {
            client,
            config,
        })
    }

    /// Reads the response body, rejecting bodies over the size cap.
    fn read_limited(
        &self,
        response: &mut reqwest::blocking::Response,
    ) -> Result<Vec<u8>, NarrativeError> {
        let max_bytes = self.config.max_response_bytes;
        let limit = u64::try_from(max_bytes)
            .map_err(|_| NarrativeError::Upstream("response size limit exceeds u64".to_string()))?
            .saturating_add(1);
        if let Some(expected) = response.content_length()
            && expected >= limit
        {
            return Err(NarrativeError::Upstream("response exceeds size limit".to_string()));
        }
        let mut buf = Vec::new();
        let mut handle = response.take(limit);
        handle
            .read_to_end(&mut buf)
            .map_err(|_| NarrativeError::Upstream("failed to read response".to_string()))?;
        if buf.len() > max_bytes {
            return Err(NarrativeError::Upstream("response exceeds size limit".to_string()));
        }
        Ok(buf)
    }
}

impl NarrativeGenerator for HttpNarrativeGenerator {
    fn generate(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        let mut response = self
            .client
            .post(&self.config.endpoint)
            .json(context)
            .send()
            .map_err(|error| {
                if error.is_timeout() {
                    NarrativeError::UpstreamTimeout
                } else {
                    NarrativeError::Upstream(format!("request failed: {error}"))
                }
            })?;
        if !response.status().is_success() {
            return Err(NarrativeError::Upstream(format!(
                "narrative service returned {}",
                response.status()
            )));
        }
        let body = self.read_limited(&mut response)?;
        let payload: NarrativeResponse = serde_json::from_slice(&body)
            .map_err(|error| NarrativeError::Upstream(format!("malformed response: {error}")))?;
        Ok(payload.narrative)
    }
}

// ============================================================================
// SECTION: Fixed Generator
// ============================================================================

/// Narrative generator returning a fixed text, for tests and offline runs.
#[derive(Debug, Clone)]
pub struct FixedNarrative {
    /// Fixed narrative text returned for every request.
    text: String,
}

impl FixedNarrative {
    /// Creates a generator that always returns `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
        }
    }
}

impl NarrativeGenerator for FixedNarrative {
    fn generate(&self, _context: &NarrativeContext) -> Result<String, NarrativeError> {
        Ok(self.text.clone())
    }
}
