//! Skinned mesh model (.SkinnedMesh)
//!
//! One exported vertex per distinct (source vertex, UV) pair. Triangles index those vertices
//! with `u16`, which caps a mesh at [`MAX_VERTICES`].

mod build;
mod codec;


pub use build::*;
pub use codec::*;

use glam::{Vec2, Vec3};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::formats::skeleton::Skeleton;

/// Vertices addressable by a `u16` triangle index.
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

/// Bone weights of one vertex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexWeights {
    /// Number of groups the source vertex belonged to. Preserved verbatim.
    pub group_count: u32,
    pub bone_indices: Vec<u32>,
    pub weights: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinnedMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u16; 3]>,
    pub normals: Vec<Vec3>,
    /// Tool-space UVs (V already flipped back from the file).
    pub uvs: Vec<Vec2>,
    pub weights: Vec<VertexWeights>,
}

/// Vertices influenced by one bone, in file order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexGroup {
    /// Bone name, or the decimal bone index when it cannot be resolved.
    pub name: String,
    pub bone_index: u32,
    /// `(vertex, weight)` pairs.
    pub assignments: Vec<(u32, f32)>,
}

impl SkinnedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Groups weights by bone, ordered by first appearance.
    ///
    /// With a skeleton, groups are named after bones. Without one (or for an index the skeleton
    /// does not have) the group is named by its raw index.
    pub fn vertex_groups(&self, skeleton: Option<&Skeleton>) -> Vec<VertexGroup> {
        let mut groups: Vec<VertexGroup> = Vec::new();
        let mut by_index: HashMap<u32, usize> = HashMap::new();

        for (vertex, record) in self.weights.iter().enumerate() {
            for (&bone_index, &weight) in record.bone_indices.iter().zip(&record.weights) {
                let slot = *by_index.entry(bone_index).or_insert_with(|| {
                    groups.push(VertexGroup {
                        name: group_name(skeleton, bone_index),
                        bone_index,
                        assignments: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[slot].assignments.push((vertex as u32, weight));
            }
        }
        groups
    }
}

fn group_name(skeleton: Option<&Skeleton>, bone_index: u32) -> String {
    match skeleton.map(|s| s.bone(bone_index)) {
        Some(Some(bone)) => bone.name.clone(),
        Some(None) => {
            tracing::warn!(
                "Weight references bone {} but the skeleton has no such bone",
                bone_index
            );
            bone_index.to_string()
        }
        None => bone_index.to_string(),
    }
}
