//! `.SkinnedMesh` reader and writer.
//!
//! # Layout
//! ```text
//! name_length u32            UTF-16 code units including the terminating NUL
//! name                       name_length x 2 bytes, UTF-16LE
//! vertex_count u32
//! index_count u32            3 x triangle count
//! 1, 1, 0, 1, 1 u32          constant
//! index_count u32            repeated
//! indices                    index_count x u16
//! vertex_count u32, positions vertex_count x vec3
//! normal_count u32, normals   normal_count x vec3
//! uv_count u32, uvs           uv_count x {u f32, v f32} (V negated)
//! weight_count u32, weights   weight_count x {group_count u32, n u32, u32[n], m u32, f32[m]}
//! ```

use std::io::{Read, Write};
use std::path::Path;

use glam::Vec2;

use super::{MAX_VERTICES, SkinnedMesh, VertexWeights};
use crate::coords::CoordinateConverter;
use crate::error::{CapacityError, FormatError, Result};
use crate::fs::{MAX_ASSET_BYTES, open_with_limit, write_with_cleanup};
use crate::serializer::{BinaryReader, BinaryWriter, StringEncoding};

/// Constant words between the index count and its repetition.
pub const MESH_LAYOUT_WORDS: [u32; 5] = [1, 1, 0, 1, 1];

/// Longest mesh name accepted on read, in UTF-16 code units.
const MAX_NAME_UNITS: u32 = 4096;

/// Upper bound on per-vertex influences accepted on read.
const MAX_INFLUENCES: u32 = 256;

/// Reads a count and caps the pre-allocation for it.
fn read_count<R: Read>(reader: &mut BinaryReader<R>, what: &str) -> Result<(usize, usize)> {
    let count = reader.read_u32()? as usize;
    tracing::debug!("{}: {}", what, count);
    Ok((count, count.min(MAX_VERTICES)))
}

pub fn read_skinned_mesh<R: Read>(reader: &mut BinaryReader<R>) -> Result<SkinnedMesh> {
    let name_units = reader.read_u32()?;
    if name_units > MAX_NAME_UNITS {
        return Err(FormatError::decode(format!(
            "mesh name length {name_units} exceeds {MAX_NAME_UNITS}"
        )));
    }
    let name = reader.read_fixed_string(name_units as usize * 2, StringEncoding::Utf16Le)?;

    let vertex_count = reader.read_u32()? as usize;
    let index_count = reader.read_u32()? as usize;
    if index_count % 3 != 0 {
        return Err(FormatError::decode(format!(
            "mesh '{name}' has {index_count} triangle indices, not a multiple of 3"
        )));
    }
    // Layout words and the repeated index count.
    for _ in 0..MESH_LAYOUT_WORDS.len() + 1 {
        reader.read_u32()?;
    }

    let mut triangles = Vec::with_capacity((index_count / 3).min(MAX_VERTICES));
    for _ in 0..index_count / 3 {
        let triangle = [reader.read_u16()?, reader.read_u16()?, reader.read_u16()?];
        if let Some(&bad) = triangle.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(FormatError::decode(format!(
                "mesh '{name}' triangle index {bad} out of range for {vertex_count} vertices"
            )));
        }
        triangles.push(triangle);
    }

    let (count, capacity) = read_count(reader, "positions")?;
    let mut positions = Vec::with_capacity(capacity);
    for _ in 0..count {
        positions.push(reader.read_vec3_converted()?);
    }
    if positions.len() != vertex_count {
        tracing::warn!(
            "Mesh '{}' declares {} vertices but stores {} positions",
            name,
            vertex_count,
            positions.len()
        );
    }

    let (count, capacity) = read_count(reader, "normals")?;
    let mut normals = Vec::with_capacity(capacity);
    for _ in 0..count {
        normals.push(reader.read_vec3_converted()?);
    }

    let (count, capacity) = read_count(reader, "uvs")?;
    let mut uvs = Vec::with_capacity(capacity);
    for _ in 0..count {
        let u = reader.read_f32()?;
        let v = reader.read_f32()?;
        uvs.push(Vec2::new(u, -v));
    }

    let (count, capacity) = read_count(reader, "weights")?;
    let mut weights = Vec::with_capacity(capacity);
    for _ in 0..count {
        weights.push(read_vertex_weights(reader)?);
    }

    tracing::debug!(
        "Read mesh '{}': {} vertices, {} triangles",
        name,
        positions.len(),
        triangles.len()
    );

    Ok(SkinnedMesh {
        name,
        positions,
        triangles,
        normals,
        uvs,
        weights,
    })
}

fn read_vertex_weights<R: Read>(reader: &mut BinaryReader<R>) -> Result<VertexWeights> {
    let group_count = reader.read_u32()?;

    let index_count = reader.read_u32()?;
    if index_count > MAX_INFLUENCES {
        return Err(FormatError::decode(format!(
            "vertex has {index_count} bone indices, at most {MAX_INFLUENCES} are supported"
        )));
    }
    let bone_indices = (0..index_count)
        .map(|_| reader.read_u32())
        .collect::<Result<Vec<_>>>()?;

    let weight_count = reader.read_u32()?;
    if weight_count > MAX_INFLUENCES {
        return Err(FormatError::decode(format!(
            "vertex has {weight_count} weights, at most {MAX_INFLUENCES} are supported"
        )));
    }
    let weights = (0..weight_count)
        .map(|_| reader.read_f32())
        .collect::<Result<Vec<_>>>()?;

    Ok(VertexWeights {
        group_count,
        bone_indices,
        weights,
    })
}

/// Encodes a mesh. Per-vertex arrays must all have one entry per position.
pub fn write_skinned_mesh<W: Write>(writer: &mut BinaryWriter<W>, mesh: &SkinnedMesh) -> Result<()> {
    let vertex_count = mesh.positions.len();
    if vertex_count > MAX_VERTICES {
        return Err(CapacityError::TooManyVertices {
            name: mesh.name.clone(),
            count: vertex_count,
            max: MAX_VERTICES,
        }
        .into());
    }
    for (what, len) in [
        ("normals", mesh.normals.len()),
        ("uvs", mesh.uvs.len()),
        ("weights", mesh.weights.len()),
    ] {
        if len != vertex_count {
            return Err(FormatError::encode(format!(
                "mesh '{}' has {} {} for {} vertices",
                mesh.name, len, what, vertex_count
            )));
        }
    }

    let name_units = mesh.name.encode_utf16().count() + 1;
    writer.write_u32(name_units as u32)?;
    writer.write_fixed_string(&mesh.name, name_units * 2, StringEncoding::Utf16Le)?;

    let index_count = mesh.triangles.len() as u32 * 3;
    writer.write_u32(vertex_count as u32)?;
    writer.write_u32(index_count)?;
    for word in MESH_LAYOUT_WORDS {
        writer.write_u32(word)?;
    }
    writer.write_u32(index_count)?;
    for triangle in &mesh.triangles {
        for &index in triangle {
            writer.write_u16(index)?;
        }
    }

    writer.write_u32(vertex_count as u32)?;
    for &position in &mesh.positions {
        writer.write_vec3_converted(position)?;
    }

    writer.write_u32(vertex_count as u32)?;
    for &normal in &mesh.normals {
        writer.write_vec3_converted(normal)?;
    }

    writer.write_u32(vertex_count as u32)?;
    for uv in &mesh.uvs {
        writer.write_f32(uv.x)?;
        writer.write_f32(-uv.y)?;
    }

    writer.write_u32(vertex_count as u32)?;
    for record in &mesh.weights {
        writer.write_u32(record.group_count)?;
        writer.write_u32(record.bone_indices.len() as u32)?;
        for &index in &record.bone_indices {
            writer.write_u32(index)?;
        }
        writer.write_u32(record.weights.len() as u32)?;
        for &weight in &record.weights {
            writer.write_f32(weight)?;
        }
    }
    Ok(())
}

impl SkinnedMesh {
    pub fn load(path: &Path, converter: CoordinateConverter) -> Result<Self> {
        let file = open_with_limit(path, MAX_ASSET_BYTES)?;
        let mut reader = BinaryReader::new(file, converter);
        let mesh = read_skinned_mesh(&mut reader)?;
        tracing::info!(
            "Loaded mesh '{}' ({} vertices, {} triangles) from {}",
            mesh.name,
            mesh.vertex_count(),
            mesh.triangle_count(),
            path.display()
        );
        Ok(mesh)
    }

    /// Writes a `.SkinnedMesh` file. A partially written file is removed on failure.
    pub fn save(&self, path: &Path, converter: CoordinateConverter) -> Result<()> {
        write_with_cleanup(path, |file| {
            let mut writer = BinaryWriter::new(file, converter);
            write_skinned_mesh(&mut writer, self)
        })?;
        tracing::info!(
            "Wrote mesh '{}' ({} vertices, {} triangles) to {}",
            self.name,
            self.vertex_count(),
            self.triangle_count(),
            path.display()
        );
        Ok(())
    }

    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let mut reader = BinaryReader::new(source, CoordinateConverter::import());
        read_skinned_mesh(&mut reader)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new(Vec::new(), CoordinateConverter::export());
        write_skinned_mesh(&mut writer, self)?;
        Ok(writer.into_inner())
    }
}
