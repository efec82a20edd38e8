// crates/zonal-store-sqlite/src/lib.rs
// ============================================================================
// Module: Zonal SQLite Store
// Description: Durable RuleStore backed by SQLite WAL.
// Purpose: Persist the regulatory rule catalogue across restarts.
// Dependencies: rusqlite, serde_json, zonal-core
// ============================================================================

//! ## Overview
//! Durable [`zonal_core::RuleStore`] over a single `SQLite` database. Rules
//! are stored as their raw JSON wire form keyed by rule id with a normalized
//! city column; condition predicates are re-resolved on read so the matcher
//! always sees typed conditions. Opens apply WAL journaling, a busy timeout,
//! and a schema version check that fails closed on mismatch.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use store::SqliteRuleStore;
pub use store::SqliteStoreConfig;
