// crates/zonal-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Rule Store
// Description: Durable RuleStore with WAL journaling and schema versioning.
// Purpose: Persist rules keyed by id with idempotent upserts.
// Dependencies: rusqlite, serde_json, zonal-core
// ============================================================================

//! ## Overview
//! One table keyed by rule id holds each rule's raw JSON payload alongside a
//! normalized city column for city-scoped queries. Database contents are
//! untrusted: every row read is re-resolved into a typed rule and a row that
//! fails resolution is a corruption error, not a silent skip. A `store_meta`
//! version row guards against schema drift across releases.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use zonal_core::City;
use zonal_core::FieldValue;
use zonal_core::RawRule;
use zonal_core::Rule;
use zonal_core::RuleStore;
use zonal_core::RuleStoreError;
use zonal_core::UpsertOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Connection configuration for the rule store.
///
/// # Invariants
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteStoreConfig {
    /// Busy timeout applied to the connection.
    pub busy_timeout_ms: u64,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable rule store over one `SQLite` database.
pub struct SqliteRuleStore {
    /// Serialized SQLite connection.
    connection: Mutex<Connection>,
}

impl SqliteRuleStore {
    /// Opens (and initializes) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError::Io`] when the database cannot be opened and
    /// [`RuleStoreError::VersionMismatch`] when the stored schema version
    /// disagrees with this release.
    pub fn open(path: &Path, config: SqliteStoreConfig) -> Result<Self, RuleStoreError> {
        let connection = Connection::open(path)
            .map_err(|error| RuleStoreError::Io(format!("open {}: {error}", path.display())))?;
        apply_pragmas(&connection, config)?;
        ensure_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Opens an in-memory store, mainly for tests and one-shot tooling.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError::Io`] when the database cannot be created.
    pub fn open_in_memory(config: SqliteStoreConfig) -> Result<Self, RuleStoreError> {
        let connection = Connection::open_in_memory()
            .map_err(|error| RuleStoreError::Io(format!("open in-memory store: {error}")))?;
        apply_pragmas(&connection, config)?;
        ensure_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Acquires the connection guard.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RuleStoreError> {
        self.connection
            .lock()
            .map_err(|_| RuleStoreError::Io("store connection lock poisoned".to_string()))
    }

    /// Loads and decodes every rule stored for a city.
    fn city_rules(
        &self,
        city: &City,
        filter: impl Fn(&Rule) -> bool,
    ) -> Result<Vec<Rule>, RuleStoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT payload FROM rules WHERE city = ?1 ORDER BY id")
            .map_err(|error| RuleStoreError::Io(format!("prepare query: {error}")))?;
        let rows = statement
            .query_map(params![city.normalized()], |row| row.get::<_, String>(0))
            .map_err(|error| RuleStoreError::Io(format!("query rules: {error}")))?;
        let mut rules = Vec::new();
        for row in rows {
            let payload =
                row.map_err(|error| RuleStoreError::Io(format!("read rule row: {error}")))?;
            let rule = decode_rule(&payload)?;
            if filter(&rule) {
                rules.push(rule);
            }
        }
        Ok(rules)
    }
}

impl RuleStore for SqliteRuleStore {
    fn upsert_rule(&self, rule: Rule) -> Result<UpsertOutcome, RuleStoreError> {
        let payload = serde_json::to_string(&rule.to_raw())
            .map_err(|error| RuleStoreError::Rejected(format!("serialize rule: {error}")))?;
        let connection = self.lock()?;
        let existing: Option<i64> = connection
            .query_row("SELECT 1 FROM rules WHERE id = ?1", params![rule.id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|error| RuleStoreError::Io(format!("probe rule id: {error}")))?;
        connection
            .execute(
                "INSERT INTO rules (id, city, payload) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET city = excluded.city, payload = excluded.payload",
                params![rule.id.as_str(), rule.city.normalized(), payload],
            )
            .map_err(|error| RuleStoreError::Io(format!("upsert rule: {error}")))?;
        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn query_field(
        &self,
        city: &City,
        field: &str,
        value: &FieldValue,
    ) -> Result<Vec<Rule>, RuleStoreError> {
        self.city_rules(city, |rule| {
            rule.conditions.get(field).is_some_and(|condition| condition.admits(value))
        })
    }

    fn unconditional_rules(&self, city: &City) -> Result<Vec<Rule>, RuleStoreError> {
        self.city_rules(city, Rule::is_unconditional)
    }

    fn rules_for_city(&self, city: &City) -> Result<Vec<Rule>, RuleStoreError> {
        self.city_rules(city, |_| true)
    }

    fn readiness(&self) -> Result<(), RuleStoreError> {
        let connection = self.lock()?;
        connection
            .query_row("SELECT COUNT(*) FROM rules", [], |row| row.get::<_, i64>(0))
            .map_err(|error| RuleStoreError::Io(format!("readiness probe: {error}")))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Applies the durable journaling and contention pragmas.
fn apply_pragmas(
    connection: &Connection,
    config: SqliteStoreConfig,
) -> Result<(), RuleStoreError> {
    connection
        .execute_batch("PRAGMA journal_mode = WAL;")
        .map_err(|error| RuleStoreError::Io(format!("set journal mode: {error}")))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|error| RuleStoreError::Io(format!("set busy timeout: {error}")))?;
    Ok(())
}

/// Creates the schema and enforces the stored version.
fn ensure_schema(connection: &Connection) -> Result<(), RuleStoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);
             CREATE TABLE IF NOT EXISTS rules (
                 id TEXT PRIMARY KEY,
                 city TEXT NOT NULL,
                 payload TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS rules_city ON rules (city);",
        )
        .map_err(|error| RuleStoreError::Io(format!("create schema: {error}")))?;
    let version: Option<i64> = connection
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|error| RuleStoreError::Io(format!("read schema version: {error}")))?;
    match version {
        None => {
            connection
                .execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|error| RuleStoreError::Io(format!("write schema version: {error}")))?;
            Ok(())
        }
        Some(stored) if stored == SCHEMA_VERSION => Ok(()),
        Some(stored) => Err(RuleStoreError::VersionMismatch(format!(
            "store schema version {stored} is not supported (expected {SCHEMA_VERSION})"
        ))),
    }
}

/// Decodes and re-resolves one stored rule payload.
fn decode_rule(payload: &str) -> Result<Rule, RuleStoreError> {
    let raw: RawRule = serde_json::from_str(payload)
        .map_err(|error| RuleStoreError::Corrupt(format!("rule payload: {error}")))?;
    Rule::resolve(raw).map_err(|error| RuleStoreError::Corrupt(format!("rule payload: {error}")))
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
    use serde_json::json;

    use super::*;

    fn rule(id: &str, city: &str, conditions: serde_json::Value) -> Rule {
        let raw: RawRule = serde_json::from_value(json!({
            "id": id,
            "city": city,
            "rule_type": "band",
            "conditions": conditions,
            "entitlements": {"fsi": 1.5},
        }))
        .unwrap();
        Rule::resolve(raw).unwrap()
    }

    fn open() -> SqliteRuleStore {
        SqliteRuleStore::open_in_memory(SqliteStoreConfig::default()).unwrap()
    }

    #[test]
    fn upsert_reports_insert_then_update() {
        let store = open();
        let first = store
            .upsert_rule(rule("r1", "Pune", json!({"road_width": {"min": 9.0, "max": 12.0}})))
            .unwrap();
        assert_eq!(first, UpsertOutcome::Inserted);
        let second = store
            .upsert_rule(rule("r1", "Pune", json!({"road_width": {"min": 6.0, "max": 9.0}})))
            .unwrap();
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.rules_for_city(&City::from("Pune")).unwrap().len(), 1);
    }

    #[test]
    fn query_field_filters_by_band_and_city() {
        let store = open();
        store
            .upsert_rule(rule("pune-1", "Pune", json!({"road_width": {"min": 9.0, "max": 12.0}})))
            .unwrap();
        store
            .upsert_rule(rule("mum-1", "Mumbai", json!({"road_width": {"min": 9.0, "max": 12.0}})))
            .unwrap();

        let hits = store
            .query_field(&City::from("Pune"), "road_width", &FieldValue::Numeric(10.0))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_str(), "pune-1");
        // Width bands are half-open at the top.
        assert!(
            store
                .query_field(&City::from("Pune"), "road_width", &FieldValue::Numeric(12.0))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn unconditional_rules_are_city_defaults() {
        let store = open();
        store.upsert_rule(rule("default", "Pune", json!({}))).unwrap();
        store
            .upsert_rule(rule("band", "Pune", json!({"plot_area": {"min": 0.0, "max": 500.0}})))
            .unwrap();

        let defaults = store.unconditional_rules(&City::from("PUNE")).unwrap();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id.as_str(), "default");
    }

    #[test]
    fn rules_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.db");
        {
            let store = SqliteRuleStore::open(&path, SqliteStoreConfig::default()).unwrap();
            store.upsert_rule(rule("r1", "Pune", json!({}))).unwrap();
        }
        let store = SqliteRuleStore::open(&path, SqliteStoreConfig::default()).unwrap();
        assert_eq!(store.rules_for_city(&City::from("Pune")).unwrap().len(), 1);
        store.readiness().unwrap();
    }

    #[test]
    fn corrupt_payload_fails_closed() {
        let store = open();
        {
            let connection = store.connection.lock().unwrap();
            connection
                .execute(
                    "INSERT INTO rules (id, city, payload) VALUES ('bad', 'pune', '{broken')",
                    [],
                )
                .unwrap();
        }
        assert!(matches!(
            store.rules_for_city(&City::from("Pune")),
            Err(RuleStoreError::Corrupt(_))
        ));
    }

    #[test]
    fn schema_version_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.db");
        {
            let store = SqliteRuleStore::open(&path, SqliteStoreConfig::default()).unwrap();
            let connection = store.connection.lock().unwrap();
            connection.execute("UPDATE store_meta SET version = 99", []).unwrap();
        }
        assert!(matches!(
            SqliteRuleStore::open(&path, SqliteStoreConfig::default()),
            Err(RuleStoreError::VersionMismatch(_))
        ));
    }
}
