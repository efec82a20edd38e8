// crates/zonal-core/src/core/mod.rs
// ============================================================================
// Module: Zonal Core Data Model
// Description: Identifiers, rules, cases, feedback, and report records.
// Purpose: Group the canonical data types shared across Zonal crates.
// Dependencies: crate submodules
// ============================================================================

//! Canonical data model for Zonal: typed identifiers, resolved rule
//! conditions, case parameters and their state-vector encoding, feedback
//! ledger records, and the compiled report.

pub mod case;
pub mod feedback;
pub mod identifiers;
pub mod report;
pub mod rules;
pub mod time;
