//! Binary serialization trait for fixed-size format blocks.
//!
//! Headers and section frames implement `BinarySerializable` so codecs can read and write them
//! generically. Each type also keeps its own `to_bytes()` returning a fixed-size array.

use std::io::{Read, Write};

use crate::error::{FormatError, Result};
use crate::serializer::{BinaryReader, BinaryWriter};

/// Trait for fixed-size binary blocks.
///
/// # Example
///
/// ```
/// use skinned_common::formats::{BinarySerializable, SectionHeader};
///
/// let section = SectionHeader::new(50332160, 128);
/// let bytes = section.serialize();
/// let parsed = SectionHeader::deserialize(&bytes).unwrap();
/// assert_eq!(parsed.size, 128);
/// ```
pub trait BinarySerializable: Sized {
    /// Size of the serialized block in bytes.
    const SIZE: usize;

    fn serialize(&self) -> Vec<u8>;

    /// Returns `None` if the byte slice is too short.
    fn deserialize(bytes: &[u8]) -> Option<Self>;
}

/// Reads one `T` block from the reader.
pub(crate) fn read_block<T: BinarySerializable, R: Read>(reader: &mut BinaryReader<R>) -> Result<T> {
    let bytes = reader.read_bytes(T::SIZE)?;
    T::deserialize(&bytes).ok_or_else(|| {
        FormatError::decode(format!(
            "malformed {} block",
            std::any::type_name::<T>().rsplit("::").next().unwrap_or("binary")
        ))
    })
}

pub(crate) fn write_block<T: BinarySerializable, W: Write>(
    writer: &mut BinaryWriter<W>,
    block: &T,
) -> Result<()> {
    writer.write_bytes(&block.serialize())
}

pub(crate) fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

impl BinarySerializable for super::SectionHeader {
    const SIZE: usize = Self::SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}

impl BinarySerializable for super::SkeletonHeader {
    const SIZE: usize = Self::SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}

impl BinarySerializable for super::SkinnedAnimHeader {
    const SIZE: usize = Self::SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{SectionHeader, SkeletonHeader, SkinnedAnimHeader};

    fn roundtrip_via_trait<T: BinarySerializable>(value: &T) -> T {
        let bytes = value.serialize();
        assert_eq!(bytes.len(), T::SIZE);
        T::deserialize(&bytes).unwrap()
    }

    #[test]
    fn test_trait_sizes() {
        assert_eq!(<SectionHeader as BinarySerializable>::SIZE, 12);
        assert_eq!(<SkeletonHeader as BinarySerializable>::SIZE, 296);
        assert_eq!(<SkinnedAnimHeader as BinarySerializable>::SIZE, 124);
    }

    #[test]
    fn test_trait_roundtrip() {
        let section = roundtrip_via_trait(&SectionHeader::new(7, 40));
        assert_eq!(section.tag, 7);
        assert_eq!(section.size, 40);

        let header = roundtrip_via_trait(&SkeletonHeader::new(12));
        assert_eq!(header.bone_count, 12);

        let anim = roundtrip_via_trait(&SkinnedAnimHeader::new(1024));
        assert_eq!(anim.payload_size, 1024);
    }

    #[test]
    fn test_short_bytes_rejected() {
        assert!(SectionHeader::deserialize(&[0u8; 4]).is_none());
        assert!(SkeletonHeader::deserialize(&[0u8; 100]).is_none());
        assert!(SkinnedAnimHeader::deserialize(&[0u8; 8]).is_none());
    }
}
