//! Little-endian cursor reader and writer.
//!
//! Both wrap a byte stream and carry the [`CoordinateConverter`] applied by the `*_converted`
//! helpers, so format code never touches axis conventions directly.
//!
//! Quaternions are stored XYZW. Matrices default to row-major.

use std::io::{Read, Seek, SeekFrom, Write};

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::coords::CoordinateConverter;
use crate::error::{FormatError, Result};

/// Character encoding of fixed-size string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Ascii,
    Utf16Le,
}

/// Element order of 4x4 matrices on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixOrder {
    #[default]
    RowMajor,
    ColumnMajor,
}

pub struct BinaryReader<R> {
    inner: R,
    converter: CoordinateConverter,
    matrix_order: MatrixOrder,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(inner: R, converter: CoordinateConverter) -> Self {
        Self {
            inner,
            converter,
            matrix_order: MatrixOrder::default(),
        }
    }

    pub fn with_matrix_order(mut self, order: MatrixOrder) -> Self {
        self.matrix_order = order;
        self
    }

    pub fn converter(&self) -> &CoordinateConverter {
        &self.converter
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads `byte_len` bytes and decodes them up to the first NUL.
    pub fn read_fixed_string(&mut self, byte_len: usize, encoding: StringEncoding) -> Result<String> {
        let bytes = self.read_bytes(byte_len)?;
        decode_fixed_string(&bytes, encoding)
    }

    pub fn read_vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_quat(&mut self) -> Result<Quat> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        let w = self.read_f32()?;
        Ok(Quat::from_xyzw(x, y, z, w))
    }

    pub fn read_mat4(&mut self) -> Result<Mat4> {
        let mut values = [0.0f32; 16];
        for value in &mut values {
            *value = self.read_f32()?;
        }
        Ok(match self.matrix_order {
            MatrixOrder::ColumnMajor => Mat4::from_cols_array(&values),
            MatrixOrder::RowMajor => Mat4::from_cols_array(&values).transpose(),
        })
    }

    pub fn read_vec3_converted(&mut self) -> Result<Vec3> {
        let v = self.read_vec3()?;
        Ok(self.converter.convert_vec3(v))
    }

    pub fn read_quat_converted(&mut self) -> Result<Quat> {
        let q = self.read_quat()?;
        Ok(self.converter.convert_quat(q))
    }

    pub fn read_mat4_converted(&mut self) -> Result<Mat4> {
        let m = self.read_mat4()?;
        Ok(convert_mat4(&self.converter, &m))
    }
}

impl<R: Read + Seek> BinaryReader<R> {
    pub fn skip(&mut self, len: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Current(len as i64))?;
        Ok(())
    }

    pub fn seek_absolute(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }
}

pub struct BinaryWriter<W> {
    inner: W,
    converter: CoordinateConverter,
    matrix_order: MatrixOrder,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W, converter: CoordinateConverter) -> Self {
        Self {
            inner,
            converter,
            matrix_order: MatrixOrder::default(),
        }
    }

    pub fn with_matrix_order(mut self, order: MatrixOrder) -> Self {
        self.matrix_order = order;
        self
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_all(&[value])?;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_zeros(&mut self, len: usize) -> Result<()> {
        self.write_bytes(&vec![0u8; len])
    }

    /// Writes `value` NUL-padded to exactly `byte_len` bytes.
    pub fn write_fixed_string(
        &mut self,
        value: &str,
        byte_len: usize,
        encoding: StringEncoding,
    ) -> Result<()> {
        let bytes = encode_fixed_string(value, byte_len, encoding)?;
        self.write_bytes(&bytes)
    }

    pub fn write_vec2(&mut self, v: Vec2) -> Result<()> {
        self.write_f32(v.x)?;
        self.write_f32(v.y)
    }

    pub fn write_vec3(&mut self, v: Vec3) -> Result<()> {
        self.write_f32(v.x)?;
        self.write_f32(v.y)?;
        self.write_f32(v.z)
    }

    pub fn write_quat(&mut self, q: Quat) -> Result<()> {
        self.write_f32(q.x)?;
        self.write_f32(q.y)?;
        self.write_f32(q.z)?;
        self.write_f32(q.w)
    }

    pub fn write_mat4(&mut self, m: &Mat4) -> Result<()> {
        let values = match self.matrix_order {
            MatrixOrder::ColumnMajor => m.to_cols_array(),
            MatrixOrder::RowMajor => m.transpose().to_cols_array(),
        };
        for value in values {
            self.write_f32(value)?;
        }
        Ok(())
    }

    pub fn write_vec3_converted(&mut self, v: Vec3) -> Result<()> {
        let converted = self.converter.convert_vec3(v);
        self.write_vec3(converted)
    }

    pub fn write_quat_converted(&mut self, q: Quat) -> Result<()> {
        let converted = self.converter.convert_quat(q);
        self.write_quat(converted)
    }

    pub fn write_mat4_converted(&mut self, m: &Mat4) -> Result<()> {
        let converted = convert_mat4(&self.converter, m);
        self.write_mat4(&converted)
    }
}

impl<W: Write + Seek> BinaryWriter<W> {
    pub fn seek_absolute(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }
}

fn convert_mat4(converter: &CoordinateConverter, m: &Mat4) -> Mat4 {
    let (scale, rotation, translation) = m.to_scale_rotation_translation();
    Mat4::from_scale_rotation_translation(
        scale,
        converter.convert_quat(rotation),
        converter.convert_vec3(translation),
    )
}

fn decode_fixed_string(bytes: &[u8], encoding: StringEncoding) -> Result<String> {
    match encoding {
        StringEncoding::Ascii => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            let text = &bytes[..end];
            if !text.is_ascii() {
                return Err(FormatError::decode(format!(
                    "invalid ASCII string {:02x?}",
                    text
                )));
            }
            // ASCII is always valid UTF-8.
            Ok(text.iter().map(|&b| b as char).collect())
        }
        StringEncoding::Utf16Le => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .take_while(|&unit| unit != 0)
                .collect();
            String::from_utf16(&units)
                .map_err(|e| FormatError::decode(format!("invalid UTF-16 string: {e}")))
        }
    }
}

fn encode_fixed_string(value: &str, byte_len: usize, encoding: StringEncoding) -> Result<Vec<u8>> {
    let mut bytes = match encoding {
        StringEncoding::Ascii => {
            if !value.is_ascii() {
                return Err(FormatError::encode(format!(
                    "string '{value}' is not ASCII"
                )));
            }
            value.as_bytes().to_vec()
        }
        StringEncoding::Utf16Le => value
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect(),
    };
    if bytes.len() > byte_len {
        return Err(FormatError::encode(format!(
            "string '{value}' needs {} bytes, field holds {byte_len}",
            bytes.len()
        )));
    }
    bytes.resize(byte_len, 0);
    Ok(bytes)
}
