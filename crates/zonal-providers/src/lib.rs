// crates/zonal-providers/src/lib.rs
// ============================================================================
// Module: Zonal Providers
// Description: Concrete adapters behind zonal-core's collaborator traits.
// Purpose: Wire the decision runtime to HTTP, filesystem, and JSONL backends.
// Dependencies: reqwest, serde, serde_json, zonal-core
// ============================================================================

//! ## Overview
//! Production adapters for the collaborator interfaces: an HTTP narrative
//! generator client with bounded timeout and response size, a filesystem
//! report store keyed by project and case, a binary-STL envelope geometry
//! writer, and an append-only JSONL feedback ledger.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod geometry;
pub mod ledger;
pub mod narrative;
pub mod report_fs;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use geometry::StlGeometryWriter;
pub use ledger::FsFeedbackLedger;
pub use narrative::FixedNarrative;
pub use narrative::HttpNarrativeConfig;
pub use narrative::HttpNarrativeGenerator;
pub use report_fs::FsReportStore;
