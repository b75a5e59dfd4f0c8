//! Pose reconstruction: stored samples to per-bone offsets from the bind pose.
//!
//! Hosts key these offsets on top of the rest pose, so a bone sitting exactly at its bind
//! transform yields a zero offset and an identity rotation.

use glam::{Quat, Vec3};
use serde::Serialize;

use super::SkinnedAnimation;
use crate::error::{FormatError, Result};
use crate::formats::skeleton::Skeleton;
use crate::math::{get_local_position, get_local_rotation, get_world_position, get_world_rotation};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BonePose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl BonePose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };
}

/// One channel of a reconstructed track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Channel<T> {
    /// Held for the whole clip; keyed once at frame 0.
    Static(T),
    /// One value per frame.
    Dynamic(Vec<T>),
}

impl<T: Copy> Channel<T> {
    /// Value at `frame`, holding the last sample past the end.
    pub fn at(&self, frame: usize) -> Option<T> {
        match self {
            Channel::Static(value) => Some(*value),
            Channel::Dynamic(values) => values.get(frame.min(values.len().saturating_sub(1))).copied(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Channel::Dynamic(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoneTrack {
    pub bone_id: u32,
    pub bone_name: String,
    pub position: Channel<Vec3>,
    pub rotation: Channel<Quat>,
}

/// Reconstructed clip: one track per skeleton bone, indexed by bone id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationClip {
    pub name: String,
    pub total_frames: u32,
    pub tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    pub fn track(&self, bone_name: &str) -> Option<&BoneTrack> {
        self.tracks.iter().find(|t| t.bone_name == bone_name)
    }
}

/// Armature-space and bind-relative poses of every bone at one frame.
struct FramePoses {
    world: Vec<BonePose>,
    offsets: Vec<BonePose>,
}

impl SkinnedAnimation {
    fn check_skeleton(&self, skeleton: &Skeleton) -> Result<()> {
        if self.bone_count as usize != skeleton.bone_count() {
            return Err(FormatError::FormatMismatch {
                animation_bones: self.bone_count,
                skeleton_bones: skeleton.bone_count() as u32,
            });
        }
        Ok(())
    }

    /// Resolves one frame parent-before-child.
    ///
    /// Roots (and bone 0) store armature-space samples. Other bones store parent-relative
    /// samples when `positions_relative_to_parent` is set, armature-space samples otherwise.
    fn solve_frame(&self, skeleton: &Skeleton, frame: u32) -> Result<FramePoses> {
        let count = skeleton.bone_count();
        let mut world = vec![BonePose::IDENTITY; count];
        let mut offsets = vec![BonePose::IDENTITY; count];

        for &id in skeleton.topological_order() {
            let Some(bone) = skeleton.bone(id) else {
                continue;
            };
            let stored = BonePose {
                position: self.position_sample(id, frame)?,
                rotation: self.rotation_sample(id, frame)?,
            };
            let i = id as usize;

            match bone.parent.filter(|_| id != 0) {
                None => {
                    let inverse = bone.absolute_rotation.conjugate();
                    world[i] = stored;
                    offsets[i] = BonePose {
                        position: inverse * (stored.position - bone.absolute_position),
                        rotation: inverse * stored.rotation,
                    };
                }
                Some(parent) if self.positions_relative_to_parent => {
                    let parent_world = world[parent as usize];
                    let inverse = bone.local_rotation.conjugate();
                    world[i] = BonePose {
                        position: get_world_position(
                            parent_world.position,
                            parent_world.rotation,
                            stored.position,
                        ),
                        rotation: get_world_rotation(parent_world.rotation, stored.rotation),
                    };
                    offsets[i] = BonePose {
                        position: inverse * (stored.position - bone.local_position),
                        rotation: inverse * stored.rotation,
                    };
                }
                Some(parent) => {
                    let parent_world = world[parent as usize];
                    let inverse = bone.local_rotation.conjugate();
                    let relative_position = get_local_position(
                        parent_world.position,
                        parent_world.rotation,
                        stored.position,
                    );
                    let relative_rotation = get_local_rotation(parent_world.rotation, stored.rotation);
                    world[i] = stored;
                    offsets[i] = BonePose {
                        position: inverse * (relative_position - bone.local_position),
                        rotation: inverse * relative_rotation,
                    };
                }
            }
        }

        Ok(FramePoses { world, offsets })
    }

    /// Armature-space pose of every bone at `frame`, indexed by bone id.
    pub fn world_poses(&self, skeleton: &Skeleton, frame: u32) -> Result<Vec<BonePose>> {
        self.check_skeleton(skeleton)?;
        Ok(self.solve_frame(skeleton, frame)?.world)
    }

    /// Rebuilds per-bone tracks against `skeleton`.
    ///
    /// Dynamic channels get one offset per frame. Static channels are resolved once at frame 0
    /// and held.
    pub fn to_clip(&self, skeleton: &Skeleton, name: &str) -> Result<AnimationClip> {
        self.check_skeleton(skeleton)?;

        let frames = (0..self.total_frames)
            .map(|frame| self.solve_frame(skeleton, frame).map(|p| p.offsets))
            .collect::<Result<Vec<_>>>()?;
        let rest = match frames.first() {
            Some(first) => first.clone(),
            None => self.solve_frame(skeleton, 0)?.offsets,
        };

        let tracks = skeleton
            .bones()
            .iter()
            .map(|bone| {
                let i = bone.id as usize;
                let channels = self.bone_map[i];
                BoneTrack {
                    bone_id: bone.id,
                    bone_name: bone.name.clone(),
                    position: if channels.position.is_dynamic() {
                        Channel::Dynamic(frames.iter().map(|f| f[i].position).collect())
                    } else {
                        Channel::Static(rest[i].position)
                    },
                    rotation: if channels.rotation.is_dynamic() {
                        Channel::Dynamic(frames.iter().map(|f| f[i].rotation).collect())
                    } else {
                        Channel::Static(rest[i].rotation)
                    },
                }
            })
            .collect();

        tracing::debug!(
            "Reconstructed clip '{}': {} tracks, {} frames",
            name,
            skeleton.bone_count(),
            self.total_frames
        );

        Ok(AnimationClip {
            name: name.to_string(),
            total_frames: self.total_frames,
            tracks,
        })
    }
}
