//! Animation exporter (sampled clip JSON + hierarchy JSON -> .SkinnedAnim)

use anyhow::{Context, Result};
use skinned_common::{CoordinateConverter, SampledClip, SkinnedAnimation};
use std::path::Path;

use crate::config::{AnimationConfig, SkeletonConfig};
use crate::skeleton::skeleton_from_hierarchy;

pub fn load_samples(path: &Path) -> Result<SampledClip> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse samples {:?}", path))
}

/// Frame range to bake. Unset ends fall back to the range covered by the samples.
pub fn frame_range(clip: &SampledClip, config: &AnimationConfig) -> (i32, i32) {
    (
        config.first_frame.unwrap_or(clip.first_frame),
        config.last_frame.unwrap_or_else(|| clip.last_frame()),
    )
}

/// Bakes and writes a `.SkinnedAnim` file against the hierarchy's skeleton.
pub fn export_animation(
    input: &Path,
    hierarchy: &Path,
    output: &Path,
    skeleton_config: &SkeletonConfig,
    animation_config: &AnimationConfig,
    converter: CoordinateConverter,
) -> Result<SkinnedAnimation> {
    let skeleton_config = SkeletonConfig {
        check_for_exportation: false,
        ..skeleton_config.clone()
    };
    let skeleton = skeleton_from_hierarchy(hierarchy, &skeleton_config)?;
    let clip = load_samples(input)?;

    let (first, last) = frame_range(&clip, animation_config);
    tracing::info!("Baking frames {}..={} of {:?}", first, last, input);

    let animation = SkinnedAnimation::bake(&skeleton, &clip, first, last)
        .with_context(|| format!("Failed to bake {:?}", input))?;
    animation
        .save(output, converter)
        .with_context(|| format!("Failed to write animation {:?}", output))?;
    Ok(animation)
}
