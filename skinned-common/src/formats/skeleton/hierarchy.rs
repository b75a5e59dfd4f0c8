//! Skeleton construction from an authoring-tool bone hierarchy.
//!
//! The host supplies a snapshot of its armature as a list of [`HierarchyBone`]s. Bone ids are an
//! explicit attribute of each bone and are validated, never inferred from list order.

use glam::{Mat4, Vec3};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::{BoneRecord, MAX_BONES, Skeleton, is_base_bone_name, validate_bone_name};
use crate::error::{Result, ValidationError};
use crate::math::decompose_position_rotation;

/// One bone of a hierarchy snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyBone {
    pub name: String,
    /// Game bone id. May be missing or invalid until [`rebuild_bone_ids`] runs.
    #[serde(default)]
    pub bone_id: Option<i64>,
    /// Name of the parent bone, `None` for roots.
    #[serde(default)]
    pub parent: Option<String>,
    /// Bind matrix relative to the armature origin.
    pub matrix: Mat4,
    /// Deform bones drive mesh skinning; others are helpers.
    #[serde(default = "default_true")]
    pub deform: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Drop non-deform bones, re-parenting survivors onto their nearest kept ancestor.
    pub only_deform_bones: bool,
    /// Require the bones the game needs (see [`Skeleton::validate_for_export`]).
    pub check_for_exportation: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            only_deform_bones: true,
            check_for_exportation: true,
        }
    }
}

/// Snapshots a hierarchy into a [`Skeleton`].
///
/// Validation is fail-fast in this order: bone count, names (length, ASCII, uniqueness), then
/// ids (present, in range, unique). Scale is always reset to one.
///
/// The export check takes the first base/root bone in `bones` order as the base.
pub fn build_skeleton(name: &str, bones: &[HierarchyBone], options: BuildOptions) -> Result<Skeleton> {
    let kept: Vec<usize> = bones
        .iter()
        .enumerate()
        .filter(|(_, b)| !options.only_deform_bones || b.deform)
        .map(|(i, _)| i)
        .collect();

    if kept.is_empty() {
        return Err(ValidationError::NoBones.into());
    }
    if kept.len() > MAX_BONES {
        return Err(ValidationError::TooManyBones(kept.len()).into());
    }

    let mut kept_names: HashMap<&str, usize> = HashMap::with_capacity(kept.len());
    for &i in &kept {
        let bone = &bones[i];
        validate_bone_name(&bone.name)?;
        if kept_names.insert(bone.name.as_str(), i).is_some() {
            return Err(ValidationError::DuplicateName {
                name: bone.name.clone(),
            }
            .into());
        }
    }

    let count = kept.len();
    let mut slots: Vec<Option<usize>> = vec![None; count];
    for &i in &kept {
        let bone = &bones[i];
        let id = bone.bone_id.ok_or_else(|| ValidationError::MissingBoneId {
            name: bone.name.clone(),
        })?;
        if id < 0 || id as usize >= count {
            return Err(ValidationError::BoneIdOutOfRange {
                name: bone.name.clone(),
                id,
                count,
            }
            .into());
        }
        if let Some(other) = slots[id as usize] {
            return Err(ValidationError::DuplicateBoneId {
                name: bone.name.clone(),
                id: id as u32,
                other: bones[other].name.clone(),
            }
            .into());
        }
        slots[id as usize] = Some(i);
    }

    let all_names: HashMap<&str, usize> = bones
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.as_str(), i))
        .collect();

    let mut records = Vec::with_capacity(count);
    for slot in slots {
        // Every id in [0, count) was claimed by exactly one kept bone above.
        let Some(i) = slot else { continue };
        let bone = &bones[i];
        let parent = effective_parent(bones, &all_names, &kept_names, i)?
            .and_then(|p| bones[p].bone_id)
            .map(|id| id as u32);
        let (position, rotation) = decompose_position_rotation(&bone.matrix);
        records.push(BoneRecord {
            name: bone.name.clone(),
            parent,
            position,
            rotation,
            scale: Vec3::ONE,
        });
    }

    let skeleton = Skeleton::from_records(name, records)?;
    if options.check_for_exportation {
        // First base/root bone in hierarchy order, not id order.
        let base = kept
            .iter()
            .map(|&i| &bones[i])
            .find(|b| is_base_bone_name(&b.name))
            .and_then(|b| b.bone_id)
            .map(|id| id as u32);
        skeleton.check_export_bones(base)?;
    }
    tracing::debug!(
        "Built skeleton '{}' from {} of {} bones",
        name,
        skeleton.bone_count(),
        bones.len()
    );
    Ok(skeleton)
}

/// Nearest ancestor of `bones[index]` that survived filtering.
fn effective_parent(
    bones: &[HierarchyBone],
    all_names: &HashMap<&str, usize>,
    kept_names: &HashMap<&str, usize>,
    index: usize,
) -> Result<Option<usize>> {
    let mut current = index;
    // A chain longer than the bone list must revisit a bone.
    for _ in 0..bones.len() {
        let Some(parent_name) = bones[current].parent.as_deref() else {
            return Ok(None);
        };
        if let Some(&kept) = kept_names.get(parent_name) {
            return Ok(Some(kept));
        }
        current = *all_names
            .get(parent_name)
            .ok_or_else(|| ValidationError::UnknownParent {
                name: bones[current].name.clone(),
                parent: parent_name.to_string(),
            })?;
    }
    Err(ValidationError::CyclicHierarchy {
        name: bones[index].name.clone(),
    }
    .into())
}

/// Reassigns bone ids so the considered bones cover `[0, n)` exactly once.
///
/// The base/root bone always gets id 0. Other bones keep a valid unique id; bones with a
/// missing, out-of-range or already claimed id take the lowest free id. Returns how many bones
/// changed id.
pub fn rebuild_bone_ids(bones: &mut [HierarchyBone], only_deform_bones: bool) -> Result<usize> {
    let considered: Vec<usize> = bones
        .iter()
        .enumerate()
        .filter(|(_, b)| !only_deform_bones || b.deform)
        .map(|(i, _)| i)
        .collect();

    let base = considered
        .iter()
        .copied()
        .find(|&i| is_base_bone_name(&bones[i].name))
        .ok_or(ValidationError::MissingBaseBone)?;

    let count = considered.len();
    let mut claimed = vec![false; count];
    claimed[0] = true;

    let mut pending = Vec::new();
    for &i in considered.iter().filter(|&&i| i != base) {
        match bones[i].bone_id {
            Some(id) if id > 0 && (id as usize) < count && !claimed[id as usize] => {
                claimed[id as usize] = true;
            }
            _ => pending.push(i),
        }
    }

    let mut changed = usize::from(bones[base].bone_id != Some(0));
    bones[base].bone_id = Some(0);

    let mut free = (1..count).filter(|&id| !claimed[id]);
    for i in pending {
        // pending.len() equals the number of unclaimed ids.
        let Some(id) = free.next() else { break };
        tracing::debug!(
            "Bone '{}' id {:?} -> {}",
            bones[i].name,
            bones[i].bone_id,
            id
        );
        bones[i].bone_id = Some(id as i64);
        changed += 1;
    }

    tracing::info!("Rebuilt bone ids: {} of {} bones changed", changed, count);
    Ok(changed)
}

impl Skeleton {
    /// Hierarchy snapshot of this skeleton, using absolute transforms as bind matrices.
    pub fn to_hierarchy(&self) -> Vec<HierarchyBone> {
        self.bones()
            .iter()
            .map(|bone| HierarchyBone {
                name: bone.name.clone(),
                bone_id: Some(bone.id as i64),
                parent: self.parent(bone.id).map(|p| p.name.clone()),
                matrix: Mat4::from_rotation_translation(
                    bone.absolute_rotation,
                    bone.absolute_position,
                ),
                deform: true,
            })
            .collect()
    }
}
