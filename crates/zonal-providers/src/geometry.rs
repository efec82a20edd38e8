// crates/zonal-providers/src/geometry.rs
// ============================================================================
// Module: STL Geometry Writer
// Description: Binary-STL envelope block artifact generator.
// Purpose: Persist the allowable envelope as a mesh per decision run.
// Dependencies: zonal-core
// ============================================================================

//! ## Overview
//! The envelope artifact is an axis-aligned block from the origin to
//! `(width, depth, height)`, written as binary STL: an 80-byte header, a
//! triangle count, and twelve facets with outward normals. Artifacts land
//! next to the run's report at
//! `<root>/projects/<project_id>/<case_id>_envelope.stl`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use zonal_core::CaseId;
use zonal_core::GeometryDims;
use zonal_core::GeometryError;
use zonal_core::GeometryWriter;
use zonal_core::ProjectId;

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Binary-STL envelope writer rooted at an artifact directory.
#[derive(Debug, Clone)]
pub struct StlGeometryWriter {
    /// Artifact root directory.
    root: PathBuf,
}

impl StlGeometryWriter {
    /// Creates a writer rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
        }
    }
}

impl GeometryWriter for StlGeometryWriter {
    fn write_envelope(
        &self,
        project_id: &ProjectId,
        case_id: &CaseId,
        dims: GeometryDims,
    ) -> Result<String, GeometryError> {
        validate_dims(dims)?;
        validate_component(project_id.as_str())?;
        validate_component(case_id.as_str())?;
        let path = self
            .root
            .join("projects")
            .join(project_id.as_str())
            .join(format!("{}_envelope.stl", case_id.as_str()));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| GeometryError::Io(format!("create {}: {error}", parent.display())))?;
        }
        fs::write(&path, encode_block(dims))
            .map_err(|error| GeometryError::Io(format!("write {}: {error}", path.display())))?;
        Ok(path.display().to_string())
    }
}

/// Rejects non-finite or negative block dimensions.
fn validate_dims(dims: GeometryDims) -> Result<(), GeometryError> {
    for (label, value) in [("width", dims.width), ("depth", dims.depth), ("height", dims.height)] {
        if !value.is_finite() || value < 0.0 {
            return Err(GeometryError::InvalidDims(format!("{label} = {value}")));
        }
    }
    Ok(())
}

/// Rejects identifiers unsafe to embed in filesystem paths.
fn validate_component(value: &str) -> Result<(), GeometryError> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
    {
        return Err(GeometryError::Io(format!("invalid identifier for path use: {value:?}")));
    }
    Ok(())
}

// ============================================================================
// SECTION: STL Encoding
// ============================================================================

/// Binary STL header size in bytes.
const STL_HEADER_BYTES: usize = 80;

/// Facets in an axis-aligned block.
const BLOCK_FACETS: u32 = 12;

/// One STL vertex in model units.
type Vertex = [f32; 3];

/// Encodes the block mesh as binary STL bytes.
#[allow(clippy::cast_possible_truncation, reason = "STL stores single-precision vertices.")]
fn encode_block(dims: GeometryDims) -> Vec<u8> {
    let w = dims.width as f32;
    let d = dims.depth as f32;
    let h = dims.height as f32;
    // Vertex ordering: bit 0 -> x, bit 1 -> y, bit 2 -> z.
    let corner = |index: usize| -> Vertex {
        [
            if index & 1 == 0 { 0.0 } else { w },
            if index & 2 == 0 { 0.0 } else { d },
            if index & 4 == 0 { 0.0 } else { h },
        ]
    };
    // Two facets per face, outward normals.
    let facets: [([f32; 3], [usize; 3]); 12] = [
        ([0.0, 0.0, -1.0], [0, 2, 1]),
        ([0.0, 0.0, -1.0], [1, 2, 3]),
        ([0.0, 0.0, 1.0], [4, 5, 6]),
        ([0.0, 0.0, 1.0], [5, 7, 6]),
        ([0.0, -1.0, 0.0], [0, 1, 4]),
        ([0.0, -1.0, 0.0], [1, 5, 4]),
        ([0.0, 1.0, 0.0], [2, 6, 3]),
        ([0.0, 1.0, 0.0], [3, 6, 7]),
        ([-1.0, 0.0, 0.0], [0, 4, 2]),
        ([-1.0, 0.0, 0.0], [2, 4, 6]),
        ([1.0, 0.0, 0.0], [1, 3, 5]),
        ([1.0, 0.0, 0.0], [3, 7, 5]),
    ];

    let mut bytes = Vec::with_capacity(STL_HEADER_BYTES + 4 + 50 * facets.len());
    let mut header = [0u8; STL_HEADER_BYTES];
    let label = b"zonal envelope block";
    header[..label.len()].copy_from_slice(label);
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&BLOCK_FACETS.to_le_bytes());
    for (normal, corners) in facets {
        for component in normal {
            bytes.extend_from_slice(&component.to_le_bytes());
        }
        for corner_index in corners {
            for component in corner(corner_index) {
                bytes.extend_from_slice(&component.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }
    bytes
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
    use super::*;

    #[test]
    fn artifact_is_a_well_formed_binary_stl() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StlGeometryWriter::new(dir.path().to_path_buf());
        let path = writer
            .write_envelope(
                &ProjectId::from("proj-1"),
                &CaseId::from("case-1"),
                GeometryDims {
                    width: 30.0,
                    depth: 30.0,
                    height: 15.0,
                },
            )
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), STL_HEADER_BYTES + 4 + 50 * 12);
        let count = u32::from_le_bytes(bytes[80..84].try_into().unwrap());
        assert_eq!(count, 12);
        assert!(path.ends_with("projects/proj-1/case-1_envelope.stl"));
    }

    #[test]
    fn negative_dimensions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StlGeometryWriter::new(dir.path().to_path_buf());
        let error = writer
            .write_envelope(
                &ProjectId::from("p"),
                &CaseId::from("c"),
                GeometryDims {
                    width: -1.0,
                    depth: 1.0,
                    height: 1.0,
                },
            )
            .unwrap_err();
        assert!(matches!(error, GeometryError::InvalidDims(_)));
    }

    #[test]
    fn traversal_identifiers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StlGeometryWriter::new(dir.path().to_path_buf());
        let error = writer
            .write_envelope(
                &ProjectId::from(".."),
                &CaseId::from("c"),
                GeometryDims {
                    width: 1.0,
                    depth: 1.0,
                    height: 1.0,
                },
            )
            .unwrap_err();
        assert!(matches!(error, GeometryError::Io(_)));
    }
}
