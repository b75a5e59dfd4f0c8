//! `.Skeleton` reader and writer.
//!
//! # Layout
//! ```text
//! 0x000: header words 1979, 0, 0x03000000, 0xFFFFFFFF, 276, 3
//! 0x018: 256 zero bytes
//! 0x118: bone_count u32
//! 0x11C: 0 u32, 0 u32, 30.0 f32
//! section 0x03000200 (names):      bone_count x 128-byte ASCII, NUL padded
//! section 0x03000400 (parents):    bone_count x i32, -1 for roots
//! section 0x03000100 (transforms): bone_count x {position vec3, scale vec3, rotation quat XYZW}
//! section 0x03000300 (end):        empty
//! ```
//!
//! Every section starts with `{tag u32, byte_size u32, sentinel u32}`. The sentinel is
//! `0xFFFFFFFF`, except for the transforms section which uses `0x0FFFFFFF`. Sentinels are not
//! checked on read.

use std::io::{Read, Write};
use std::path::Path;

use super::{BoneRecord, MAX_BONE_NAME_LEN, MAX_BONES, NO_PARENT, Skeleton};
use crate::coords::CoordinateConverter;
use crate::error::{FormatError, Result, ValidationError};
use crate::formats::serialization::{le_u32, read_block, write_block};
use crate::fs::{MAX_ASSET_BYTES, open_with_limit, write_with_cleanup};
use crate::serializer::{BinaryReader, BinaryWriter, StringEncoding};

/// Leading header words of every skeleton file.
pub const SKELETON_MAGIC: [u32; 6] = [1979, 0, 50331648, 0xFFFF_FFFF, 276, 3];

/// Size of the fixed preamble before the bone count.
pub const SKELETON_PREAMBLE_SIZE: usize = 280;

/// Value following the bone count. Always 30.0 in shipped files.
pub const SKELETON_RATE: f32 = 30.0;

pub const TAG_BONE_NAMES: u32 = 50332160;
pub const TAG_PARENT_IDS: u32 = 50332672;
pub const TAG_TRANSFORMS: u32 = 50331904;
pub const TAG_END: u32 = 50332416;

/// Last word of the names, parents and end section headers.
pub const SECTION_SENTINEL: u32 = 0xFFFF_FFFF;

/// Last word of the transforms section header. Shipped files carry this exact value.
pub const TRANSFORMS_SENTINEL: u32 = 0x0FFF_FFFF;

/// Size of one transform record (position, scale, rotation).
pub const BONE_TRANSFORM_RECORD_SIZE: usize = 40;

/// `{tag, byte_size, sentinel}` frame in front of each skeleton section (12 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub tag: u32,
    /// Size of the section body in bytes
    pub size: u32,
    pub sentinel: u32,
}

impl SectionHeader {
    pub const SIZE: usize = 12;

    pub fn new(tag: u32, size: u32) -> Self {
        Self::with_sentinel(tag, size, SECTION_SENTINEL)
    }

    pub fn with_sentinel(tag: u32, size: u32, sentinel: u32) -> Self {
        Self {
            tag,
            size,
            sentinel,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.tag.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.size.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.sentinel.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            tag: le_u32(bytes, 0),
            size: le_u32(bytes, 4),
            sentinel: le_u32(bytes, 8),
        })
    }
}

/// Preamble plus bone count block (296 bytes)
///
/// Only `bone_count` is meaningful on read; the remaining words are written as constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkeletonHeader {
    pub bone_count: u32,
}

impl SkeletonHeader {
    pub const SIZE: usize = SKELETON_PREAMBLE_SIZE + 16;

    pub fn new(bone_count: u32) -> Self {
        Self { bone_count }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        for (i, word) in SKELETON_MAGIC.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        let at = SKELETON_PREAMBLE_SIZE;
        bytes[at..at + 4].copy_from_slice(&self.bone_count.to_le_bytes());
        // at + 4 .. at + 12 stay zero
        bytes[at + 12..at + 16].copy_from_slice(&SKELETON_RATE.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            bone_count: le_u32(bytes, SKELETON_PREAMBLE_SIZE),
        })
    }
}

/// Decodes a skeleton. Positions and rotations pass through the reader's converter; scale is
/// read raw.
pub fn read_skeleton<R: Read>(reader: &mut BinaryReader<R>, name: &str) -> Result<Skeleton> {
    let header: SkeletonHeader = read_block(reader)?;
    let count = header.bone_count as usize;
    if count == 0 || count > MAX_BONES {
        return Err(FormatError::decode(format!(
            "bone count {count} out of range [1, {MAX_BONES}]"
        )));
    }
    tracing::debug!("Reading skeleton '{}' with {} bones", name, count);

    let _: SectionHeader = read_block(reader)?;
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(reader.read_fixed_string(MAX_BONE_NAME_LEN, StringEncoding::Ascii)?);
    }

    let _: SectionHeader = read_block(reader)?;
    let mut parents = Vec::with_capacity(count);
    for (id, bone_name) in names.iter().enumerate() {
        let raw = reader.read_i32()?;
        let parent = match raw {
            _ if id == 0 => None,
            -1 => None,
            p if p >= 0 => Some(p as u32),
            p => {
                return Err(ValidationError::ParentOutOfRange {
                    name: bone_name.clone(),
                    parent: p as i64,
                    count,
                }
                .into());
            }
        };
        parents.push(parent);
    }

    let _: SectionHeader = read_block(reader)?;
    let mut records = Vec::with_capacity(count);
    for (name, parent) in names.into_iter().zip(parents) {
        let position = reader.read_vec3_converted()?;
        let scale = reader.read_vec3()?;
        let rotation = reader.read_quat_converted()?;
        records.push(BoneRecord {
            name,
            parent,
            position,
            rotation,
            scale,
        });
    }

    Skeleton::from_records(name, records)
}

/// Encodes a skeleton. Inverse of [`read_skeleton`].
pub fn write_skeleton<W: Write>(writer: &mut BinaryWriter<W>, skeleton: &Skeleton) -> Result<()> {
    let count = skeleton.bone_count() as u32;
    write_block(writer, &SkeletonHeader::new(count))?;

    write_block(
        writer,
        &SectionHeader::new(TAG_BONE_NAMES, count * MAX_BONE_NAME_LEN as u32),
    )?;
    for bone in skeleton.bones() {
        writer.write_fixed_string(&bone.name, MAX_BONE_NAME_LEN, StringEncoding::Ascii)?;
    }

    write_block(writer, &SectionHeader::new(TAG_PARENT_IDS, count * 4))?;
    for bone in skeleton.bones() {
        writer.write_u32(bone.parent.unwrap_or(NO_PARENT))?;
    }

    write_block(
        writer,
        &SectionHeader::with_sentinel(
            TAG_TRANSFORMS,
            count * BONE_TRANSFORM_RECORD_SIZE as u32,
            TRANSFORMS_SENTINEL,
        ),
    )?;
    for bone in skeleton.bones() {
        writer.write_vec3_converted(bone.absolute_position)?;
        writer.write_vec3(bone.absolute_scale)?;
        writer.write_quat_converted(bone.absolute_rotation)?;
    }

    write_block(writer, &SectionHeader::new(TAG_END, 0))?;
    Ok(())
}

impl Skeleton {
    /// Reads a `.Skeleton` file, naming the skeleton after the file stem.
    pub fn load(path: &Path, converter: CoordinateConverter) -> Result<Self> {
        let file = open_with_limit(path, MAX_ASSET_BYTES)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("skeleton");
        let mut reader = BinaryReader::new(file, converter);
        let skeleton = read_skeleton(&mut reader, name)?;
        tracing::info!(
            "Loaded skeleton '{}' ({} bones) from {}",
            skeleton.name(),
            skeleton.bone_count(),
            path.display()
        );
        Ok(skeleton)
    }

    /// Writes a `.Skeleton` file. A partially written file is removed on failure.
    pub fn save(&self, path: &Path, converter: CoordinateConverter) -> Result<()> {
        write_with_cleanup(path, |file| {
            let mut writer = BinaryWriter::new(file, converter);
            write_skeleton(&mut writer, self)
        })?;
        tracing::info!(
            "Wrote skeleton '{}' ({} bones) to {}",
            self.name(),
            self.bone_count(),
            path.display()
        );
        Ok(())
    }

    /// Decodes from any byte source with the default import conversion.
    pub fn from_reader<R: Read>(source: R, name: &str) -> Result<Self> {
        let mut reader = BinaryReader::new(source, CoordinateConverter::import());
        read_skeleton(&mut reader, name)
    }

    /// Encodes to bytes with the default export conversion.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new(Vec::new(), CoordinateConverter::export());
        write_skeleton(&mut writer, self)?;
        Ok(writer.into_inner())
    }
}
