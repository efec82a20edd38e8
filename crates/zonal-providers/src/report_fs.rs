// crates/zonal-providers/src/report_fs.rs
// ============================================================================
// Module: Filesystem Report Store
// Description: JSON report persistence keyed by project and case.
// Purpose: Durably store one report per decision run, last write wins.
// Dependencies: serde_json, zonal-core
// ============================================================================

//! ## Overview
//! Reports land at `<root>/projects/<project_id>/<case_id>_report.json`.
//! Identifiers become path components, so both are validated against
//! separators and parent references before any filesystem access.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use zonal_core::CaseId;
use zonal_core::ProjectId;
use zonal_core::Report;
use zonal_core::ReportStore;
use zonal_core::ReportStoreError;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Filesystem-backed report store.
#[derive(Debug, Clone)]
pub struct FsReportStore {
    /// Artifact root directory.
    root: PathBuf,
}

impl FsReportStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
        }
    }

    /// Builds the report path for a validated case key.
    fn report_path(
        &self,
        project_id: &ProjectId,
        case_id: &CaseId,
    ) -> Result<PathBuf, ReportStoreError> {
        validate_component(project_id.as_str())?;
        validate_component(case_id.as_str())?;
        Ok(self
            .root
            .join("projects")
            .join(project_id.as_str())
            .join(format!("{}_report.json", case_id.as_str())))
    }
}

/// Rejects identifier values that would escape the store root.
fn validate_component(value: &str) -> Result<(), ReportStoreError> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
    {
        return Err(ReportStoreError::Io(format!("invalid identifier for path use: {value:?}")));
    }
    Ok(())
}

impl ReportStore for FsReportStore {
    fn save(&self, report: &Report) -> Result<(), ReportStoreError> {
        let path = self.report_path(&report.project_id, &report.case_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                ReportStoreError::Io(format!("create {}: {error}", parent.display()))
            })?;
        }
        let payload = serde_json::to_string_pretty(report)
            .map_err(|error| ReportStoreError::Serialization(error.to_string()))?;
        fs::write(&path, payload)
            .map_err(|error| ReportStoreError::Io(format!("write {}: {error}", path.display())))
    }

    fn load(
        &self,
        project_id: &ProjectId,
        case_id: &CaseId,
    ) -> Result<Option<Report>, ReportStoreError> {
        let path = self.report_path(project_id, case_id)?;
        let payload = match fs::read_to_string(&path) {
            Ok(payload) => payload,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(ReportStoreError::Io(format!("read {}: {error}", path.display())));
            }
        };
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|error| ReportStoreError::Serialization(error.to_string()))
    }
}
