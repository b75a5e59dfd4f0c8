//! Shared types and codecs for skinned character assets
//!
//! This crate reads and writes the three binary formats a skinned character ships as:
//! - `.Skeleton` - bone hierarchy with bind transforms
//! - `.SkinnedMesh` - triangle geometry with per-vertex bone weights
//! - `.SkinnedAnim` - clips split into dynamic and static channels
//!
//! # Modules
//!
//! - [`coords`] - Axis conversion between engine and authoring-tool coordinate systems
//! - [`serializer`] - Little-endian binary reader/writer applying a [`CoordinateConverter`]
//! - [`formats`] - The three asset formats and their in-memory models
//! - [`math`] - Parent/child transform composition
//! - [`fs`] - Size-limited reads and delete-on-error writes

pub mod coords;
pub mod error;
pub mod formats;
pub mod fs;
pub mod math;
pub mod serializer;

pub use coords::{CoordinateConverter, CoordinateSystem};
pub use error::{CapacityError, FormatError, Result, ValidationError};

// Re-export the models and their entry points
pub use formats::{
    AnimationClip, AnimationSampler, AssetKind, BuildOptions, HierarchyBone, SampledClip,
    Skeleton, SkinnedAnimation, SkinnedMesh, build_skeleton, rebuild_bone_ids,
};
