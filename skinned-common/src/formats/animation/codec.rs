//! `.SkinnedAnim` reader and writer.

use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use super::header::*;
use super::{BoneChannels, ChannelSlot, SkinnedAnimation};
use crate::coords::CoordinateConverter;
use crate::error::{FormatError, Result};
use crate::formats::serialization::{read_block, write_block};
use crate::formats::skeleton::MAX_BONES;
use crate::fs::{MAX_ASSET_BYTES, open_with_limit, write_with_cleanup};
use crate::serializer::{BinaryReader, BinaryWriter};

const QUAT_SIZE: u32 = 16;
const VEC3_SIZE: u32 = 12;

fn read_field_u32<R: Read>(reader: &mut BinaryReader<R>) -> Result<u32> {
    // tag, size
    reader.read_u32()?;
    reader.read_u32()?;
    reader.read_u32()
}

/// Reads an array's `{tag, byte_size}` frame and returns the element count.
fn read_array_len<R: Read>(reader: &mut BinaryReader<R>, element_size: u32, what: &str) -> Result<usize> {
    reader.read_u32()?;
    let byte_size = reader.read_u32()?;
    if byte_size % element_size != 0 {
        return Err(FormatError::decode(format!(
            "{what} array size {byte_size} is not a multiple of {element_size}"
        )));
    }
    Ok((byte_size / element_size) as usize)
}

/// Reads `len` elements without trusting `len` for the up-front allocation.
fn read_elements<R: Read, T>(
    reader: &mut BinaryReader<R>,
    len: usize,
    mut read: impl FnMut(&mut BinaryReader<R>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(len.min(1 << 16));
    for _ in 0..len {
        out.push(read(reader)?);
    }
    Ok(out)
}

pub fn read_skinned_anim<R: Read>(reader: &mut BinaryReader<R>) -> Result<SkinnedAnimation> {
    let _: SkinnedAnimHeader = read_block(reader)?;

    let bone_count = read_field_u32(reader)?;
    let total_frames = read_field_u32(reader)?;
    reader.read_u32()?;
    reader.read_u32()?;
    let positions_relative_to_parent = reader.read_bool()?;
    let animated_rotation_count = read_field_u32(reader)?;
    let animated_position_count = read_field_u32(reader)?;
    let fixed_rotation_count = read_field_u32(reader)?;
    let fixed_position_count = read_field_u32(reader)?;

    tracing::debug!(
        "SkinnedAnim: {} bones, {} frames, relative={}, animated rot/pos {}/{}, fixed rot/pos {}/{}",
        bone_count,
        total_frames,
        positions_relative_to_parent,
        animated_rotation_count,
        animated_position_count,
        fixed_rotation_count,
        fixed_position_count
    );

    let len = read_array_len(reader, QUAT_SIZE, "animated rotation")?;
    let animated_rotations = read_elements(reader, len, |r| r.read_quat_converted())?;

    let len = read_array_len(reader, VEC3_SIZE, "animated position")?;
    let animated_positions = read_elements(reader, len, |r| r.read_vec3_converted())?;

    let len = read_array_len(reader, VEC3_SIZE, "fixed position")?;
    let fixed_positions = read_elements(reader, len, |r| r.read_vec3_converted())?;

    let len = read_array_len(reader, QUAT_SIZE, "fixed rotation")?;
    let fixed_rotations = read_elements(reader, len, |r| r.read_quat_converted())?;

    if fixed_positions.len() != fixed_position_count as usize
        || fixed_rotations.len() != fixed_rotation_count as usize
    {
        tracing::warn!(
            "Fixed arrays hold {} positions and {} rotations, header declares {} and {}",
            fixed_positions.len(),
            fixed_rotations.len(),
            fixed_position_count,
            fixed_rotation_count
        );
    }

    reader.read_u32()?;
    reader.read_u32()?;
    let mut bone_map = Vec::with_capacity((bone_count as usize).min(MAX_BONES));
    for _ in 0..bone_count {
        let position = ChannelSlot {
            index: reader.read_u8()?,
            flag: reader.read_u8()?,
        };
        let rotation = ChannelSlot {
            index: reader.read_u8()?,
            flag: reader.read_u8()?,
        };
        bone_map.push(BoneChannels { position, rotation });
    }

    let animation = SkinnedAnimation {
        bone_count,
        total_frames,
        positions_relative_to_parent,
        animated_rotation_count,
        animated_position_count,
        animated_rotations,
        animated_positions,
        fixed_positions,
        fixed_rotations,
        bone_map,
    };
    animation.validate()?;
    Ok(animation)
}

fn write_field<W: Write>(writer: &mut BinaryWriter<W>, tag: u32, value: u32) -> Result<()> {
    writer.write_u32(tag)?;
    writer.write_u32(4)?;
    writer.write_u32(value)
}

fn array_bytes(count: usize, element_size: u32) -> Result<u32> {
    u32::try_from(count)
        .ok()
        .and_then(|n| n.checked_mul(element_size))
        .ok_or_else(|| FormatError::encode(format!("array of {count} elements is too large")))
}

/// Encodes an animation, then backpatches the payload size in the header.
pub fn write_skinned_anim<W: Write + Seek>(
    writer: &mut BinaryWriter<W>,
    animation: &SkinnedAnimation,
) -> Result<()> {
    animation
        .validate()
        .map_err(|e| FormatError::encode(format!("inconsistent animation: {e}")))?;

    let start = writer.position()?;
    write_block(writer, &SkinnedAnimHeader::new(0))?;

    write_field(writer, FIELD_BONE_AMOUNT, animation.bone_count)?;
    write_field(writer, FIELD_TOTAL_FRAMES, animation.total_frames)?;
    writer.write_u32(FIELD_RELATIVE_TO_PARENT)?;
    writer.write_u32(1)?;
    writer.write_bool(animation.positions_relative_to_parent)?;
    write_field(
        writer,
        FIELD_ROTATIONS_ANIMATED,
        animation.animated_rotation_count,
    )?;
    write_field(
        writer,
        FIELD_POSITIONS_ANIMATED,
        animation.animated_position_count,
    )?;
    write_field(
        writer,
        FIELD_ROTATIONS_FIXED,
        animation.fixed_rotations.len() as u32,
    )?;
    write_field(
        writer,
        FIELD_POSITIONS_FIXED,
        animation.fixed_positions.len() as u32,
    )?;

    writer.write_u32(ARRAY_ANIMATED_ROTATIONS)?;
    writer.write_u32(array_bytes(animation.animated_rotations.len(), QUAT_SIZE)?)?;
    for &q in &animation.animated_rotations {
        writer.write_quat_converted(q)?;
    }

    writer.write_u32(ARRAY_ANIMATED_POSITIONS)?;
    writer.write_u32(array_bytes(animation.animated_positions.len(), VEC3_SIZE)?)?;
    for &p in &animation.animated_positions {
        writer.write_vec3_converted(p)?;
    }

    writer.write_u32(ARRAY_FIXED_POSITIONS)?;
    writer.write_u32(array_bytes(animation.fixed_positions.len(), VEC3_SIZE)?)?;
    for &p in &animation.fixed_positions {
        writer.write_vec3_converted(p)?;
    }

    writer.write_u32(ARRAY_FIXED_ROTATIONS)?;
    writer.write_u32(array_bytes(animation.fixed_rotations.len(), QUAT_SIZE)?)?;
    for &q in &animation.fixed_rotations {
        writer.write_quat_converted(q)?;
    }

    writer.write_u32(ARRAY_BONE_MAP)?;
    writer.write_u32(array_bytes(animation.bone_map.len(), 4)?)?;
    for channels in &animation.bone_map {
        writer.write_u8(channels.position.index)?;
        writer.write_u8(channels.position.flag)?;
        writer.write_u8(channels.rotation.index)?;
        writer.write_u8(channels.rotation.flag)?;
    }

    let end = writer.position()?;
    let payload = u32::try_from(end - start - ANIM_SIZE_EXCLUDED)
        .map_err(|_| FormatError::encode("animation exceeds 4 GiB"))?;
    writer.seek_absolute(start + ANIM_SIZE_OFFSET)?;
    writer.write_u32(payload)?;
    writer.seek_absolute(end)?;
    Ok(())
}

impl SkinnedAnimation {
    pub fn load(path: &Path, converter: CoordinateConverter) -> Result<Self> {
        let file = open_with_limit(path, MAX_ASSET_BYTES)?;
        let mut reader = BinaryReader::new(file, converter);
        let animation = read_skinned_anim(&mut reader)?;
        tracing::info!(
            "Loaded animation ({} bones, {} frames) from {}",
            animation.bone_count,
            animation.total_frames,
            path.display()
        );
        Ok(animation)
    }

    /// Writes a `.SkinnedAnim` file. A partially written file is removed on failure.
    pub fn save(&self, path: &Path, converter: CoordinateConverter) -> Result<()> {
        write_with_cleanup(path, |file| {
            let mut writer = BinaryWriter::new(file, converter);
            write_skinned_anim(&mut writer, self)
        })?;
        tracing::info!(
            "Wrote animation ({} bones, {} frames) to {}",
            self.bone_count,
            self.total_frames,
            path.display()
        );
        Ok(())
    }

    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let mut reader = BinaryReader::new(source, CoordinateConverter::import());
        read_skinned_anim(&mut reader)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), CoordinateConverter::export());
        write_skinned_anim(&mut writer, self)?;
        Ok(writer.into_inner().into_inner())
    }
}
