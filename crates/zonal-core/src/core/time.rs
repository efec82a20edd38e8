// crates/zonal-core/src/core/time.rs
// ============================================================================
// Module: Zonal Time Model
// Description: Canonical timestamp representation for reports and ledgers.
// Purpose: Provide a stable RFC3339 wire form shared across Zonal records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Zonal embeds explicit timestamps in reports, checkpoints, and feedback
//! ledger records. The wire form is RFC3339 UTC so ledger lines remain
//! readable and sortable as plain text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp used in Zonal reports and ledger records.
///
/// # Invariants
/// - The wire form is an RFC3339 UTC string.
/// - Monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Returns the current wall-clock time in UTC.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Creates a timestamp from unix seconds.
    #[must_use]
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        OffsetDateTime::from_unix_timestamp(seconds).ok().map(Self)
    }

    /// Returns unix seconds for the timestamp.
    #[must_use]
    pub const fn unix_seconds(&self) -> i64 {
        self.0.unix_timestamp()
    }

    /// Renders the timestamp as an RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.format(&Rfc3339).unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }

    /// Renders a compact filesystem-safe form (`YYYYMMDDThhmmssZ`).
    #[must_use]
    pub fn to_compact(&self) -> String {
        format!(
            "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day(),
            self.0.hour(),
            self.0.minute(),
            self.0.second()
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl TryFrom<String> for Timestamp {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OffsetDateTime::parse(&value, &Rfc3339)
            .map(Self)
            .map_err(|err| format!("invalid rfc3339 timestamp: {err}"))
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.to_rfc3339()
    }
}
