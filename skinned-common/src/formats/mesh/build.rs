//! Mesh export from authoring-tool geometry.
//!
//! The tool stores UVs per polygon corner. The game needs them per vertex, so every distinct
//! `(source vertex, uv)` pair becomes its own exported vertex, sharing position, normal and
//! weights with its source vertex.

use glam::{Vec2, Vec3};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use super::{MAX_VERTICES, SkinnedMesh, VertexWeights};
use crate::error::{CapacityError, FormatError, Result, ValidationError};
use crate::formats::skeleton::Skeleton;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceCorner {
    pub vertex: u32,
    #[serde(default)]
    pub uv: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceWeight {
    pub bone: String,
    pub weight: f32,
}

/// Mesh geometry as the authoring tool holds it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshSource {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Polygons of three or more corners, triangulated as fans from the first corner.
    pub polygons: Vec<Vec<SourceCorner>>,
    /// Per-vertex group memberships. Empty when the mesh is not skinned.
    #[serde(default)]
    pub vertex_groups: Vec<Vec<SourceWeight>>,
}

/// Key for one exported vertex. UV compared by bit pattern with `-0.0` folded into `0.0`.
type CornerKey = (u32, [u32; 2]);

fn corner_key(corner: &SourceCorner) -> CornerKey {
    (
        corner.vertex,
        [(corner.uv.x + 0.0).to_bits(), (corner.uv.y + 0.0).to_bits()],
    )
}

impl SkinnedMesh {
    /// Splits UV seams, triangulates and maps group names to bone ids.
    ///
    /// Groups naming a bone the skeleton lacks are assigned to bone 0.
    pub fn from_source(source: &MeshSource, skeleton: &Skeleton) -> Result<Self> {
        let source_count = source.positions.len();
        if source_count > MAX_VERTICES {
            return Err(CapacityError::TooManyVertices {
                name: source.name.clone(),
                count: source_count,
                max: MAX_VERTICES,
            }
            .into());
        }
        if source.normals.len() != source_count {
            return Err(FormatError::encode(format!(
                "mesh '{}' has {} normals for {} vertices",
                source.name,
                source.normals.len(),
                source_count
            )));
        }
        if !source.vertex_groups.is_empty() && source.vertex_groups.len() != source_count {
            return Err(FormatError::encode(format!(
                "mesh '{}' has group data for {} of {} vertices",
                source.name,
                source.vertex_groups.len(),
                source_count
            )));
        }

        for (index, polygon) in source.polygons.iter().enumerate() {
            if polygon.len() < 3 {
                return Err(ValidationError::DegeneratePolygon {
                    index,
                    corners: polygon.len(),
                }
                .into());
            }
            if let Some(corner) = polygon.iter().find(|c| c.vertex as usize >= source_count) {
                return Err(ValidationError::VertexOutOfRange {
                    polygon: index,
                    vertex: corner.vertex,
                    count: source_count,
                }
                .into());
            }
        }

        let mut split: Vec<SourceCorner> = Vec::new();
        let mut lookup: HashMap<CornerKey, usize> = HashMap::new();
        let mut polygons: Vec<Vec<usize>> = Vec::with_capacity(source.polygons.len());
        for polygon in &source.polygons {
            let indices = polygon
                .iter()
                .map(|corner| {
                    *lookup.entry(corner_key(corner)).or_insert_with(|| {
                        split.push(*corner);
                        split.len() - 1
                    })
                })
                .collect();
            polygons.push(indices);
        }

        if split.len() > MAX_VERTICES {
            return Err(CapacityError::TooManySplitVertices {
                name: source.name.clone(),
                count: split.len(),
                max: MAX_VERTICES,
            }
            .into());
        }

        // Every index is below MAX_VERTICES and fits in u16.
        let triangles = polygons
            .iter()
            .flat_map(|p| (1..p.len() - 1).map(move |k| [p[0] as u16, p[k] as u16, p[k + 1] as u16]))
            .collect();

        let mut unknown_bones = HashSet::new();
        let weights = split
            .iter()
            .map(|corner| {
                let groups = source
                    .vertex_groups
                    .get(corner.vertex as usize)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                VertexWeights {
                    group_count: groups.len() as u32,
                    bone_indices: groups
                        .iter()
                        .map(|g| {
                            skeleton.bone_id(&g.bone).unwrap_or_else(|| {
                                if unknown_bones.insert(g.bone.clone()) {
                                    tracing::warn!(
                                        "Mesh '{}' group '{}' matches no bone, using bone 0",
                                        source.name,
                                        g.bone
                                    );
                                }
                                0
                            })
                        })
                        .collect(),
                    weights: groups.iter().map(|g| g.weight).collect(),
                }
            })
            .collect();

        let mesh = SkinnedMesh {
            name: source.name.clone(),
            positions: split
                .iter()
                .map(|c| source.positions[c.vertex as usize])
                .collect(),
            normals: split
                .iter()
                .map(|c| source.normals[c.vertex as usize])
                .collect(),
            uvs: split.iter().map(|c| c.uv).collect(),
            triangles,
            weights,
        };

        tracing::debug!(
            "Mesh '{}': {} source vertices split into {}, {} triangles",
            mesh.name,
            source_count,
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }
}
