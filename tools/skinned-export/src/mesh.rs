//! Skinned mesh exporter (mesh JSON + hierarchy JSON -> .SkinnedMesh)

use anyhow::{Context, Result};
use skinned_common::formats::MeshSource;
use skinned_common::{CoordinateConverter, SkinnedMesh};
use std::path::Path;

use crate::config::SkeletonConfig;
use crate::skeleton::skeleton_from_hierarchy;

pub fn load_mesh_source(path: &Path) -> Result<MeshSource> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse mesh source {:?}", path))
}

/// Builds and writes a `.SkinnedMesh` file, resolving weights against the hierarchy's skeleton.
///
/// The export check is skipped here: weights only need bone ids.
pub fn export_mesh(
    input: &Path,
    hierarchy: &Path,
    output: &Path,
    config: &SkeletonConfig,
    converter: CoordinateConverter,
) -> Result<SkinnedMesh> {
    let config = SkeletonConfig {
        check_for_exportation: false,
        ..config.clone()
    };
    let skeleton = skeleton_from_hierarchy(hierarchy, &config)?;
    let source = load_mesh_source(input)?;

    let mesh = SkinnedMesh::from_source(&source, &skeleton)
        .with_context(|| format!("Failed to build mesh '{}'", source.name))?;
    mesh.save(output, converter)
        .with_context(|| format!("Failed to write mesh {:?}", output))?;
    Ok(mesh)
}
