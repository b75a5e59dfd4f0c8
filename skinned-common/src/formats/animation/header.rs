//! Animation header structure and field tags

use crate::formats::serialization::le_u32;

/// Leading words of the 124-byte header. Word 2 is the payload size and is written separately.
pub const ANIM_MAGIC: [u32; 2] = [1040676, 8246869];

/// Words 3..=10 of the header.
pub const ANIM_HEADER_WORDS: [u32; 8] = [163761, 0, 1, 34231528, 52, 34231528, 0, 0];

/// Four `{tag, 12, vec3}` blocks closing the header.
pub const ANIM_HEADER_VECTORS: [(u32, [f32; 3]); 4] = [
    (35741130, [0.0, 0.0, 0.0]),
    (57751914, [10.0, 10.0, 10.0]),
    (4831592, [5.0, 5.0, 5.0]),
    (56946838, [10.0, 10.0, 10.0]),
];

/// Offset of the payload size word.
pub const ANIM_SIZE_OFFSET: u64 = 8;

/// Bytes not counted by the payload size (magic and the size word itself).
pub const ANIM_SIZE_EXCLUDED: u64 = 12;

pub const FIELD_BONE_AMOUNT: u32 = 977004;
pub const FIELD_TOTAL_FRAMES: u32 = 45797634;
pub const FIELD_RELATIVE_TO_PARENT: u32 = 4364479;
pub const FIELD_ROTATIONS_ANIMATED: u32 = 7986641;
pub const FIELD_POSITIONS_ANIMATED: u32 = 33191686;
pub const FIELD_ROTATIONS_FIXED: u32 = 61737251;
pub const FIELD_POSITIONS_FIXED: u32 = 22942296;

pub const ARRAY_ANIMATED_ROTATIONS: u32 = 18854571;
pub const ARRAY_ANIMATED_POSITIONS: u32 = 36183766;
pub const ARRAY_FIXED_POSITIONS: u32 = 27595076;
pub const ARRAY_FIXED_ROTATIONS: u32 = 10265881;
pub const ARRAY_BONE_MAP: u32 = 30362205;

/// SkinnedAnim header (124 bytes)
///
/// Constant apart from the payload size, which counts every byte after offset 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinnedAnimHeader {
    pub payload_size: u32,
}

impl SkinnedAnimHeader {
    pub const SIZE: usize = 124;

    pub fn new(payload_size: u32) -> Self {
        Self { payload_size }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let mut at = 0;
        let mut put = |bytes: &mut [u8; Self::SIZE], word: [u8; 4]| {
            bytes[at..at + 4].copy_from_slice(&word);
            at += 4;
        };

        for word in ANIM_MAGIC {
            put(&mut bytes, word.to_le_bytes());
        }
        put(&mut bytes, self.payload_size.to_le_bytes());
        for word in ANIM_HEADER_WORDS {
            put(&mut bytes, word.to_le_bytes());
        }
        for (tag, values) in ANIM_HEADER_VECTORS {
            put(&mut bytes, tag.to_le_bytes());
            put(&mut bytes, 12u32.to_le_bytes());
            for value in values {
                put(&mut bytes, value.to_le_bytes());
            }
        }
        bytes
    }

    /// Reads the payload size. The constant words are not checked.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            payload_size: le_u32(bytes, ANIM_SIZE_OFFSET as usize),
        })
    }

    /// Whether the leading magic words match.
    pub fn has_magic(bytes: &[u8]) -> bool {
        bytes.len() >= 8 && le_u32(bytes, 0) == ANIM_MAGIC[0] && le_u32(bytes, 4) == ANIM_MAGIC[1]
    }
}
