//! Baking sampled clips into stored channels.

use glam::{Quat, Vec3};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::pose::AnimationClip;
use super::{BoneChannels, ChannelSlot, SkinnedAnimation};
use crate::error::{FormatError, Result};
use crate::formats::skeleton::Skeleton;
use crate::math::{get_world_position, get_world_rotation};

/// Source of per-frame bone offsets from the bind pose, in the bone's parent frame.
pub trait AnimationSampler {
    fn sample_position(&self, bone: &str, frame: i32) -> Vec3;
    fn sample_rotation(&self, bone: &str, frame: i32) -> Quat;
}

/// In-memory samples keyed by bone name, one entry per frame from `first_frame`.
///
/// Bones without samples stay at rest. Frames past either end hold the nearest sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampledClip {
    #[serde(default)]
    pub first_frame: i32,
    #[serde(default)]
    pub positions: HashMap<String, Vec<Vec3>>,
    #[serde(default)]
    pub rotations: HashMap<String, Vec<Quat>>,
}

impl SampledClip {
    /// Last frame covered by any channel, or `first_frame` when empty.
    pub fn last_frame(&self) -> i32 {
        let longest = self
            .positions
            .values()
            .map(Vec::len)
            .chain(self.rotations.values().map(Vec::len))
            .max()
            .unwrap_or(1);
        self.first_frame + longest.max(1) as i32 - 1
    }

    fn lookup<T: Copy>(&self, samples: Option<&Vec<T>>, frame: i32) -> Option<T> {
        let samples = samples.filter(|s| !s.is_empty())?;
        let index = (frame - self.first_frame).clamp(0, samples.len() as i32 - 1);
        samples.get(index as usize).copied()
    }
}

impl AnimationSampler for SampledClip {
    fn sample_position(&self, bone: &str, frame: i32) -> Vec3 {
        self.lookup(self.positions.get(bone), frame)
            .unwrap_or(Vec3::ZERO)
    }

    fn sample_rotation(&self, bone: &str, frame: i32) -> Quat {
        self.lookup(self.rotations.get(bone), frame)
            .unwrap_or(Quat::IDENTITY)
    }
}

impl AnimationSampler for AnimationClip {
    fn sample_position(&self, bone: &str, frame: i32) -> Vec3 {
        self.track(bone)
            .and_then(|t| t.position.at(frame.max(0) as usize))
            .unwrap_or(Vec3::ZERO)
    }

    fn sample_rotation(&self, bone: &str, frame: i32) -> Quat {
        self.track(bone)
            .and_then(|t| t.rotation.at(frame.max(0) as usize))
            .unwrap_or(Quat::IDENTITY)
    }
}

/// True when `samples` holds at least two distinct values.
fn varies<T: PartialEq>(samples: &[T]) -> bool {
    samples.split_first().is_some_and(|(first, rest)| rest.iter().any(|s| s != first))
}

fn dense_index(count: usize) -> Result<u8> {
    u8::try_from(count)
        .map_err(|_| FormatError::encode(format!("channel index {count} does not fit in a byte")))
}

impl SkinnedAnimation {
    /// Samples `first_frame..=last_frame` and bakes every bone against its bind local pose.
    ///
    /// Both ends are inclusive, so `bake(.., 3, 5)` writes three frames.
    ///
    /// A channel is dynamic when its samples take at least two distinct values; otherwise it is
    /// stored once from `first_frame`. Baked clips are always parent-relative.
    pub fn bake(
        skeleton: &Skeleton,
        sampler: &impl AnimationSampler,
        first_frame: i32,
        last_frame: i32,
    ) -> Result<Self> {
        if last_frame < first_frame {
            return Err(FormatError::encode(format!(
                "frame range {first_frame}..={last_frame} is empty"
            )));
        }
        let total_frames = last_frame
            .checked_sub(first_frame)
            .and_then(|span| span.checked_add(1))
            .and_then(|count| u32::try_from(count).ok())
            .ok_or_else(|| {
                FormatError::encode(format!(
                    "frame range {first_frame}..={last_frame} is too long"
                ))
            })?;
        let frames = first_frame..=last_frame;

        let mut dynamic_positions: Vec<Vec<Vec3>> = Vec::new();
        let mut dynamic_rotations: Vec<Vec<Quat>> = Vec::new();
        let mut fixed_positions = Vec::new();
        let mut fixed_rotations = Vec::new();
        let mut bone_map = Vec::with_capacity(skeleton.bone_count());

        for bone in skeleton.bones() {
            let positions: Vec<Vec3> = frames
                .clone()
                .map(|f| sampler.sample_position(&bone.name, f))
                .collect();
            let rotations: Vec<Quat> = frames
                .clone()
                .map(|f| sampler.sample_rotation(&bone.name, f))
                .collect();

            let stored_positions = positions
                .iter()
                .map(|&p| get_world_position(bone.local_position, bone.local_rotation, p));
            let stored_rotations = rotations
                .iter()
                .map(|&r| get_world_rotation(bone.local_rotation, r));

            let position = if varies(&positions) {
                dynamic_positions.push(stored_positions.collect());
                ChannelSlot::dynamic(dense_index(dynamic_positions.len() - 1)?)
            } else {
                fixed_positions.extend(stored_positions.take(1));
                ChannelSlot::fixed(dense_index(fixed_positions.len() - 1)?)
            };
            let rotation = if varies(&rotations) {
                dynamic_rotations.push(stored_rotations.collect());
                ChannelSlot::dynamic(dense_index(dynamic_rotations.len() - 1)?)
            } else {
                fixed_rotations.extend(stored_rotations.take(1));
                ChannelSlot::fixed(dense_index(fixed_rotations.len() - 1)?)
            };

            tracing::debug!(
                "Bone '{}': position {}, rotation {}",
                bone.name,
                if position.is_dynamic() { "dynamic" } else { "static" },
                if rotation.is_dynamic() { "dynamic" } else { "static" }
            );
            bone_map.push(BoneChannels { position, rotation });
        }

        let frame_count = total_frames as usize;
        let animated_positions = (0..frame_count)
            .flat_map(|f| dynamic_positions.iter().map(move |channel| channel[f]))
            .collect();
        let animated_rotations = (0..frame_count)
            .flat_map(|f| dynamic_rotations.iter().map(move |channel| channel[f]))
            .collect();

        tracing::info!(
            "Baked {} frames: {} dynamic / {} static positions, {} dynamic / {} static rotations",
            total_frames,
            dynamic_positions.len(),
            fixed_positions.len(),
            dynamic_rotations.len(),
            fixed_rotations.len()
        );

        Ok(Self {
            bone_count: skeleton.bone_count() as u32,
            total_frames,
            positions_relative_to_parent: true,
            animated_rotation_count: dynamic_rotations.len() as u32,
            animated_position_count: dynamic_positions.len() as u32,
            animated_rotations,
            animated_positions,
            fixed_positions,
            fixed_rotations,
            bone_map,
        })
    }
}
