//! Error types for the skinned asset codecs.

use thiserror::Error;

/// Result alias used throughout the codecs.
pub type Result<T> = std::result::Result<T, FormatError>;

/// Top-level error returned by every decode, encode and build entry point.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Short read, short write, or any other failure of the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes were read but do not form a valid value.
    #[error("decode error: {0}")]
    Decode(String),

    /// A value cannot be represented in the target field.
    #[error("encode error: {0}")]
    Encode(String),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Animation bone count does not match the target skeleton.
    #[error(
        "animation has {animation_bones} bones but the target skeleton has {skeleton_bones}"
    )]
    FormatMismatch {
        animation_bones: u32,
        skeleton_bones: u32,
    },

    #[error("capacity exceeded: {0}")]
    Capacity(#[from] CapacityError),
}

impl FormatError {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub(crate) fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }
}

/// Skeleton and mesh validation failures, reported on the first offending item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("skeleton has no bones")]
    NoBones,

    #[error("skeleton has {0} bones, at most 256 are supported")]
    TooManyBones(usize),

    #[error("bone name '{name}' is longer than 128 bytes")]
    NameTooLong { name: String },

    #[error("bone name '{name}' contains non-ASCII characters")]
    NonAsciiName { name: String },

    #[error("bone name '{name}' is used more than once")]
    DuplicateName { name: String },

    #[error("bone '{name}' has no bone id")]
    MissingBoneId { name: String },

    #[error("bone '{name}' has id {id}, expected a value in [0, {count})")]
    BoneIdOutOfRange { name: String, id: i64, count: usize },

    #[error("bone '{name}' has id {id}, already used by bone '{other}'")]
    DuplicateBoneId { name: String, id: u32, other: String },

    #[error("bone '{name}' references unknown parent '{parent}'")]
    UnknownParent { name: String, parent: String },

    #[error("bone '{name}' has parent index {parent}, expected a value in [0, {count})")]
    ParentOutOfRange { name: String, parent: i64, count: usize },

    #[error("bone '{name}' is part of a cyclic parent chain")]
    CyclicHierarchy { name: String },

    #[error("skeleton has no 'Head' bone")]
    MissingHeadBone,

    #[error("skeleton has no 'Base' or 'Root' bone")]
    MissingBaseBone,

    #[error("base bone '{name}' must not have a parent")]
    BaseBoneHasParent { name: String },

    #[error("polygon {index} has {corners} corners, at least 3 are required")]
    DegeneratePolygon { index: usize, corners: usize },

    #[error("polygon {polygon} references vertex {vertex}, mesh has {count} vertices")]
    VertexOutOfRange {
        polygon: usize,
        vertex: u32,
        count: usize,
    },
}

/// Limits of the 16-bit triangle index space.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("mesh '{name}' has {count} vertices, at most {max} are supported")]
    TooManyVertices {
        name: String,
        count: usize,
        max: usize,
    },

    #[error(
        "mesh '{name}' has {count} vertices after splitting UV seams, at most {max} are supported"
    )]
    TooManySplitVertices {
        name: String,
        count: usize,
        max: usize,
    },
}
