//! Binary asset formats.
//!
//! - [`skeleton`] - `.Skeleton` bone hierarchies with bind transforms
//! - [`mesh`] - `.SkinnedMesh` geometry with per-vertex bone weights
//! - [`animation`] - `.SkinnedAnim` clips split into dynamic and static channels
//!
//! All integers and floats are little-endian. Positions and rotations pass through the
//! reader/writer's [`CoordinateConverter`](crate::CoordinateConverter) on the way in and out.
//!
//! Fixed-size blocks implement the [`BinarySerializable`] trait.

pub mod animation;
pub mod mesh;
mod serialization;
pub mod skeleton;

pub use animation::*;
pub use mesh::*;
pub use serialization::BinarySerializable;
pub use skeleton::*;

/// File extension of skeleton files.
pub const SKELETON_EXT: &str = "Skeleton";
/// File extension of skinned mesh files.
pub const SKINNED_MESH_EXT: &str = "SkinnedMesh";
/// File extension of skinned animation files.
pub const SKINNED_ANIM_EXT: &str = "SkinnedAnim";

/// Asset kind inferred from a file extension (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Skeleton,
    SkinnedMesh,
    SkinnedAnim,
}

impl AssetKind {
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        [
            (SKELETON_EXT, Self::Skeleton),
            (SKINNED_MESH_EXT, Self::SkinnedMesh),
            (SKINNED_ANIM_EXT, Self::SkinnedAnim),
        ]
        .into_iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, kind)| kind)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Skeleton => SKELETON_EXT,
            Self::SkinnedMesh => SKINNED_MESH_EXT,
            Self::SkinnedAnim => SKINNED_ANIM_EXT,
        }
    }
}
