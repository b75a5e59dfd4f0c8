//! Skeleton model (.Skeleton)
//!
//! A flat arena of bones indexed by their dense id. Parents are stored as ids, bone 0 is always
//! a root. Absolute transforms are relative to the skeleton origin; local transforms are derived
//! from them on construction and never set directly.

mod codec;
mod hierarchy;

#[cfg(test)]
mod tests;

pub use codec::*;
pub use hierarchy::*;

use glam::{Quat, Vec3};
use hashbrown::HashMap;
use serde::Serialize;

use crate::error::{Result, ValidationError};
use crate::math::{get_local_position, get_local_rotation};

/// Parent id marking a root bone on disk (`-1` as `i32`).
pub const NO_PARENT: u32 = u32::MAX;

/// Maximum number of bones in a skeleton.
pub const MAX_BONES: usize = 256;

/// Maximum bone name length in bytes.
pub const MAX_BONE_NAME_LEN: usize = 128;

/// Name of the bone required for export (case-sensitive).
pub const HEAD_BONE_NAME: &str = "Head";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub id: u32,
    pub name: String,
    pub parent: Option<u32>,
    pub absolute_position: Vec3,
    pub absolute_rotation: Quat,
    pub absolute_scale: Vec3,
    /// Position in the parent's frame. Equals the absolute position for roots.
    pub local_position: Vec3,
    /// Rotation in the parent's frame. Equals the absolute rotation for roots.
    pub local_rotation: Quat,
}

impl Bone {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Absolute transform of one bone, the input to [`Skeleton::from_records`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoneRecord {
    pub name: String,
    pub parent: Option<u32>,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skeleton {
    name: String,
    bones: Vec<Bone>,
    #[serde(skip)]
    order: Vec<u32>,
    #[serde(skip)]
    by_name: HashMap<String, u32>,
}

impl Skeleton {
    /// Builds a skeleton from absolute transforms indexed by bone id.
    ///
    /// Bone 0's parent is forced to none. Fails on an empty or oversized bone list, invalid or
    /// duplicate names, parent ids out of range and cyclic parent chains.
    pub fn from_records(name: impl Into<String>, records: Vec<BoneRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(ValidationError::NoBones.into());
        }
        if records.len() > MAX_BONES {
            return Err(ValidationError::TooManyBones(records.len()).into());
        }

        let count = records.len();
        let mut by_name = HashMap::with_capacity(count);
        for (id, record) in records.iter().enumerate() {
            validate_bone_name(&record.name)?;
            if by_name.insert(record.name.clone(), id as u32).is_some() {
                return Err(ValidationError::DuplicateName {
                    name: record.name.clone(),
                }
                .into());
            }
            match record.parent {
                Some(parent) if id != 0 && parent as usize >= count => {
                    return Err(ValidationError::ParentOutOfRange {
                        name: record.name.clone(),
                        parent: parent as i64,
                        count,
                    }
                    .into());
                }
                _ => {}
            }
        }

        let parents: Vec<Option<u32>> = records
            .iter()
            .enumerate()
            .map(|(id, record)| if id == 0 { None } else { record.parent })
            .collect();
        if let Some(parent) = records[0].parent {
            tracing::debug!(
                "Bone '{}' is bone 0, ignoring its parent {}",
                records[0].name,
                parent
            );
        }

        let order = topological_order(&parents);
        if order.len() != count {
            let mut reached = vec![false; count];
            for &id in &order {
                reached[id as usize] = true;
            }
            let stuck = reached.iter().position(|&r| !r).unwrap_or(0);
            return Err(ValidationError::CyclicHierarchy {
                name: records[stuck].name.clone(),
            }
            .into());
        }

        let root_count = parents.iter().filter(|p| p.is_none()).count();
        if root_count > 1 {
            tracing::warn!("Skeleton has {} root bones", root_count);
        }

        let bones = records
            .iter()
            .enumerate()
            .map(|(id, record)| {
                let parent = parents[id];
                let (local_position, local_rotation) = match parent {
                    None => (record.position, record.rotation),
                    Some(p) => {
                        let p = &records[p as usize];
                        (
                            get_local_position(p.position, p.rotation, record.position),
                            get_local_rotation(p.rotation, record.rotation),
                        )
                    }
                };
                Bone {
                    id: id as u32,
                    name: record.name.clone(),
                    parent,
                    absolute_position: record.position,
                    absolute_rotation: record.rotation,
                    absolute_scale: record.scale,
                    local_position,
                    local_rotation,
                }
            })
            .collect();

        Ok(Self {
            name: name.into(),
            bones,
            order,
            by_name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bone(&self, id: u32) -> Option<&Bone> {
        self.bones.get(id as usize)
    }

    pub fn bone_by_name(&self, name: &str) -> Option<&Bone> {
        self.bone_id(name).and_then(|id| self.bone(id))
    }

    pub fn bone_id(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn parent(&self, id: u32) -> Option<&Bone> {
        self.bone(id)?.parent.and_then(|p| self.bone(p))
    }

    pub fn children(&self, id: u32) -> impl Iterator<Item = &Bone> {
        self.bones.iter().filter(move |b| b.parent == Some(id))
    }

    pub fn roots(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter().filter(|b| b.is_root())
    }

    /// Bone ids ordered parents-before-children, roots first.
    pub fn topological_order(&self) -> &[u32] {
        &self.order
    }

    /// First bone named "base" or "root" in id order, ignoring case.
    ///
    /// Skeletons built from a hierarchy pick their base in hierarchy order instead, see
    /// [`build_skeleton`].
    pub fn base_bone_id(&self) -> Option<u32> {
        self.bones
            .iter()
            .find(|b| is_base_bone_name(&b.name))
            .map(|b| b.id)
    }

    /// Checks the bones the game requires: a `Head` bone and a parentless base bone.
    pub fn validate_for_export(&self) -> std::result::Result<(), ValidationError> {
        self.check_export_bones(self.base_bone_id())
    }

    /// Export check against an already chosen base bone.
    pub(crate) fn check_export_bones(
        &self,
        base: Option<u32>,
    ) -> std::result::Result<(), ValidationError> {
        if self.bone_id(HEAD_BONE_NAME).is_none() {
            return Err(ValidationError::MissingHeadBone);
        }
        let base = base
            .and_then(|id| self.bone(id))
            .ok_or(ValidationError::MissingBaseBone)?;
        if base.parent.is_some() {
            return Err(ValidationError::BaseBoneHasParent {
                name: base.name.clone(),
            });
        }
        Ok(())
    }

    /// Absolute positions as little-endian hex, one line per bone.
    pub fn positions_hex(&self) -> Vec<String> {
        self.bones
            .iter()
            .map(|b| {
                let p = b.absolute_position;
                format!("{}: {}", b.name, hex_floats(&[p.x, p.y, p.z]))
            })
            .collect()
    }

    /// Absolute rotations (XYZW) as little-endian hex, one line per bone.
    pub fn rotations_hex(&self) -> Vec<String> {
        self.bones
            .iter()
            .map(|b| {
                let r = b.absolute_rotation;
                format!("{}: {}", b.name, hex_floats(&[r.x, r.y, r.z, r.w]))
            })
            .collect()
    }
}

pub fn is_base_bone_name(name: &str) -> bool {
    name.eq_ignore_ascii_case("base") || name.eq_ignore_ascii_case("root")
}

pub(crate) fn validate_bone_name(name: &str) -> std::result::Result<(), ValidationError> {
    if name.len() > MAX_BONE_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            name: name.to_string(),
        });
    }
    if !name.is_ascii() {
        return Err(ValidationError::NonAsciiName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Breadth-first walk from every root. Bones on a cycle are never reached.
fn topological_order(parents: &[Option<u32>]) -> Vec<u32> {
    let mut children: Vec<Vec<u32>> = vec![Vec::new(); parents.len()];
    let mut queue = std::collections::VecDeque::new();
    for (id, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p as usize].push(id as u32),
            None => queue.push_back(id as u32),
        }
    }

    let mut order = Vec::with_capacity(parents.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        queue.extend(children[id as usize].iter().copied());
    }
    order
}

fn hex_floats(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| {
            v.to_le_bytes()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
