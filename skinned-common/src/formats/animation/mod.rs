//! Skinned animation format (.SkinnedAnim)
//!
//! Each bone's position and rotation channel is either dynamic (one sample per frame) or static
//! (one sample for the whole clip). Samples are stored in four flat arrays and the bone map
//! points every channel at its slot.
//!
//! # Layout
//! ```text
//! Header (124 bytes, constant except the payload size at 0x08)
//!
//! Fields, each {tag u32, size u32, value}:
//!   bone_amount u32, total_frames u32, relative_to_parent u8,
//!   rotations_animated u32, positions_animated u32, rotations_fixed u32, positions_fixed u32
//!
//! Arrays, each {tag u32, byte_size u32, data}:
//!   animated rotations  total_frames x rotations_animated x quat XYZW
//!   animated positions  total_frames x positions_animated x vec3
//!   fixed positions     positions_fixed x vec3
//!   fixed rotations     rotations_fixed x quat XYZW
//!
//! Bone map {tag u32, byte_size u32}, then per bone:
//!   pos_index u8, pos_flag u8, rot_index u8, rot_flag u8   (flag 0xF0 = dynamic)
//! ```
//!
//! Animated arrays are frame-major: sample `i` of frame `f` is at `f * count + i`.

mod bake;
mod codec;
mod header;
mod pose;


pub use bake::{AnimationSampler, SampledClip};
pub use codec::{read_skinned_anim, write_skinned_anim};
pub use header::*;
pub use pose::{AnimationClip, BonePose, BoneTrack, Channel};

use glam::{Quat, Vec3};
use serde::Serialize;

use crate::error::{FormatError, Result};

/// Channel flag marking a dynamic (per-frame) channel.
pub const DYNAMIC_CHANNEL_FLAG: u8 = 0xF0;

/// Flag written for static channels.
pub const STATIC_CHANNEL_FLAG: u8 = 0x00;

/// Where one channel of one bone keeps its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelSlot {
    /// Dense index into the animated (per-frame) or fixed array.
    pub index: u8,
    pub flag: u8,
}

impl ChannelSlot {
    pub fn dynamic(index: u8) -> Self {
        Self {
            index,
            flag: DYNAMIC_CHANNEL_FLAG,
        }
    }

    pub fn fixed(index: u8) -> Self {
        Self {
            index,
            flag: STATIC_CHANNEL_FLAG,
        }
    }

    /// Any flag other than `0xF0` is static.
    pub fn is_dynamic(&self) -> bool {
        self.flag == DYNAMIC_CHANNEL_FLAG
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoneChannels {
    pub position: ChannelSlot,
    pub rotation: ChannelSlot,
}

/// Stored contents of a `.SkinnedAnim` file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkinnedAnimation {
    pub bone_count: u32,
    pub total_frames: u32,
    /// Stored non-root samples are relative to the parent's animated pose rather than in
    /// armature space.
    pub positions_relative_to_parent: bool,
    /// Dynamic rotation channels per frame.
    pub animated_rotation_count: u32,
    /// Dynamic position channels per frame.
    pub animated_position_count: u32,
    pub animated_rotations: Vec<Quat>,
    pub animated_positions: Vec<Vec3>,
    pub fixed_positions: Vec<Vec3>,
    pub fixed_rotations: Vec<Quat>,
    pub bone_map: Vec<BoneChannels>,
}

impl SkinnedAnimation {
    fn channels(&self, bone: u32) -> Result<&BoneChannels> {
        self.bone_map.get(bone as usize).ok_or_else(|| {
            FormatError::decode(format!(
                "bone {} has no channel map entry ({} entries)",
                bone,
                self.bone_map.len()
            ))
        })
    }

    /// Stored position of `bone` at `frame`. Static channels ignore the frame.
    pub fn position_sample(&self, bone: u32, frame: u32) -> Result<Vec3> {
        let slot = self.channels(bone)?.position;
        sample(
            slot,
            frame,
            self.animated_position_count,
            &self.animated_positions,
            &self.fixed_positions,
        )
        .ok_or_else(|| {
            FormatError::decode(format!(
                "position slot {} of bone {} out of range at frame {}",
                slot.index, bone, frame
            ))
        })
    }

    /// Stored rotation of `bone` at `frame`. Static channels ignore the frame.
    pub fn rotation_sample(&self, bone: u32, frame: u32) -> Result<Quat> {
        let slot = self.channels(bone)?.rotation;
        sample(
            slot,
            frame,
            self.animated_rotation_count,
            &self.animated_rotations,
            &self.fixed_rotations,
        )
        .ok_or_else(|| {
            FormatError::decode(format!(
                "rotation slot {} of bone {} out of range at frame {}",
                slot.index, bone, frame
            ))
        })
    }

    pub fn dynamic_position_bones(&self) -> Vec<u32> {
        self.bones_where(|c| c.position.is_dynamic())
    }

    pub fn static_position_bones(&self) -> Vec<u32> {
        self.bones_where(|c| !c.position.is_dynamic())
    }

    pub fn dynamic_rotation_bones(&self) -> Vec<u32> {
        self.bones_where(|c| c.rotation.is_dynamic())
    }

    pub fn static_rotation_bones(&self) -> Vec<u32> {
        self.bones_where(|c| !c.rotation.is_dynamic())
    }

    fn bones_where(&self, predicate: impl Fn(&BoneChannels) -> bool) -> Vec<u32> {
        self.bone_map
            .iter()
            .enumerate()
            .filter(|(_, c)| predicate(c))
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Checks every channel slot against the sample arrays.
    pub fn validate(&self) -> Result<()> {
        if self.bone_map.len() != self.bone_count as usize {
            return Err(FormatError::decode(format!(
                "bone map has {} entries for {} bones",
                self.bone_map.len(),
                self.bone_count
            )));
        }
        let animated_rotations = self.animated_rotation_count as usize * self.total_frames as usize;
        let animated_positions = self.animated_position_count as usize * self.total_frames as usize;
        if self.animated_rotations.len() < animated_rotations
            || self.animated_positions.len() < animated_positions
        {
            return Err(FormatError::decode(format!(
                "animated arrays hold {} rotations and {} positions, {} and {} expected",
                self.animated_rotations.len(),
                self.animated_positions.len(),
                animated_rotations,
                animated_positions
            )));
        }

        for (bone, channels) in self.bone_map.iter().enumerate() {
            let position_ok = slot_in_range(
                channels.position,
                self.animated_position_count,
                self.fixed_positions.len(),
            );
            let rotation_ok = slot_in_range(
                channels.rotation,
                self.animated_rotation_count,
                self.fixed_rotations.len(),
            );
            if !position_ok || !rotation_ok {
                return Err(FormatError::decode(format!(
                    "bone {bone} channel slot out of range (position {:?}, rotation {:?})",
                    channels.position, channels.rotation
                )));
            }
        }
        Ok(())
    }
}

fn slot_in_range(slot: ChannelSlot, animated_count: u32, fixed_len: usize) -> bool {
    if slot.is_dynamic() {
        u32::from(slot.index) < animated_count
    } else {
        usize::from(slot.index) < fixed_len
    }
}

fn sample<T: Copy>(
    slot: ChannelSlot,
    frame: u32,
    animated_count: u32,
    animated: &[T],
    fixed: &[T],
) -> Option<T> {
    if slot.is_dynamic() {
        if u32::from(slot.index) >= animated_count {
            return None;
        }
        let at = frame as usize * animated_count as usize + slot.index as usize;
        animated.get(at).copied()
    } else {
        fixed.get(slot.index as usize).copied()
    }
}
