//! Inspection commands: `info` summaries and `dump` JSON snapshots of existing assets

use anyhow::{Context, Result, bail};
use hashbrown::HashMap;
use serde::Serialize;
use skinned_common::formats::VertexGroup;
use skinned_common::{AnimationClip, AssetKind, CoordinateConverter, Skeleton, SkinnedAnimation, SkinnedMesh};
use std::path::Path;

/// Decoded contents of any of the three formats.
pub enum Asset {
    Skeleton(Skeleton),
    Mesh(SkinnedMesh),
    Animation(SkinnedAnimation),
}

pub fn asset_kind(path: &Path) -> Result<AssetKind> {
    match AssetKind::from_path(path) {
        Some(kind) => Ok(kind),
        None => bail!(
            "Unsupported file: {:?} (use .Skeleton, .SkinnedMesh or .SkinnedAnim)",
            path
        ),
    }
}

pub fn load_asset(path: &Path, converter: CoordinateConverter) -> Result<Asset> {
    let asset = match asset_kind(path)? {
        AssetKind::Skeleton => Asset::Skeleton(Skeleton::load(path, converter)?),
        AssetKind::SkinnedMesh => Asset::Mesh(SkinnedMesh::load(path, converter)?),
        AssetKind::SkinnedAnim => Asset::Animation(SkinnedAnimation::load(path, converter)?),
    };
    Ok(asset)
}

fn load_skeleton(path: Option<&Path>, converter: CoordinateConverter) -> Result<Option<Skeleton>> {
    path.map(|p| {
        Skeleton::load(p, converter).with_context(|| format!("Failed to load skeleton {:?}", p))
    })
    .transpose()
}

/// Influence count -> number of vertices with that many weights.
fn influence_histogram(mesh: &SkinnedMesh) -> Vec<(usize, usize)> {
    let mut histogram: HashMap<usize, usize> = HashMap::new();
    for weights in &mesh.weights {
        *histogram.entry(weights.bone_indices.len()).or_default() += 1;
    }
    let mut sorted: Vec<_> = histogram.into_iter().collect();
    sorted.sort_unstable();
    sorted
}

/// Logs a summary of an asset.
pub fn info(path: &Path, skeleton: Option<&Path>, converter: CoordinateConverter) -> Result<()> {
    let skeleton = load_skeleton(skeleton, converter)?;

    match load_asset(path, converter)? {
        Asset::Skeleton(skeleton) => {
            tracing::info!("Skeleton '{}': {} bones", skeleton.name(), skeleton.bone_count());
            for bone in skeleton.bones() {
                let parent = bone
                    .parent
                    .and_then(|p| skeleton.bone(p))
                    .map(|p| p.name.as_str())
                    .unwrap_or("-");
                tracing::info!("  [{}] {} (parent: {})", bone.id, bone.name, parent);
            }
            if let Err(e) = skeleton.validate_for_export() {
                tracing::warn!("Not exportable: {}", e);
            }
        }
        Asset::Mesh(mesh) => {
            tracing::info!(
                "Mesh '{}': {} vertices, {} triangles",
                mesh.name,
                mesh.vertex_count(),
                mesh.triangle_count()
            );
            for (influences, vertices) in influence_histogram(&mesh) {
                tracing::info!("  {} vertices with {} influence(s)", vertices, influences);
            }
            let groups = mesh.vertex_groups(skeleton.as_ref());
            tracing::info!("  {} vertex groups", groups.len());
        }
        Asset::Animation(animation) => {
            tracing::info!(
                "Animation: {} bones, {} frames, relative to parent: {}",
                animation.bone_count,
                animation.total_frames,
                animation.positions_relative_to_parent
            );
            tracing::info!(
                "  positions: {} dynamic, {} static",
                animation.dynamic_position_bones().len(),
                animation.static_position_bones().len()
            );
            tracing::info!(
                "  rotations: {} dynamic, {} static",
                animation.dynamic_rotation_bones().len(),
                animation.static_rotation_bones().len()
            );
            if let Some(skeleton) = &skeleton {
                for id in animation.dynamic_position_bones() {
                    if let Some(bone) = skeleton.bone(id) {
                        tracing::info!("  dynamic position: {}", bone.name);
                    }
                }
                for id in animation.dynamic_rotation_bones() {
                    if let Some(bone) = skeleton.bone(id) {
                        tracing::info!("  dynamic rotation: {}", bone.name);
                    }
                }
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct MeshDump<'a> {
    #[serde(flatten)]
    mesh: &'a SkinnedMesh,
    vertex_groups: Vec<VertexGroup>,
}

#[derive(Serialize)]
struct AnimationDump {
    bone_count: u32,
    total_frames: u32,
    positions_relative_to_parent: bool,
    clip: AnimationClip,
}

/// Serializes the decoded model of an asset as pretty JSON.
///
/// Animations are reconstructed against `skeleton`, which is required for them.
pub fn dump_json(path: &Path, skeleton: Option<&Path>, converter: CoordinateConverter) -> Result<String> {
    let skeleton = load_skeleton(skeleton, converter)?;

    let json = match load_asset(path, converter)? {
        Asset::Skeleton(skeleton) => serde_json::to_string_pretty(&skeleton)?,
        Asset::Mesh(mesh) => serde_json::to_string_pretty(&MeshDump {
            vertex_groups: mesh.vertex_groups(skeleton.as_ref()),
            mesh: &mesh,
        })?,
        Asset::Animation(animation) => {
            let Some(skeleton) = skeleton else {
                bail!("Dumping an animation needs --skeleton");
            };
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("animation");
            let clip = animation
                .to_clip(&skeleton, name)
                .with_context(|| format!("Failed to reconstruct {:?}", path))?;
            serde_json::to_string_pretty(&AnimationDump {
                bone_count: animation.bone_count,
                total_frames: animation.total_frames,
                positions_relative_to_parent: animation.positions_relative_to_parent,
                clip,
            })?
        }
    };
    Ok(json)
}

pub fn dump(
    path: &Path,
    skeleton: Option<&Path>,
    output: &Path,
    converter: CoordinateConverter,
) -> Result<()> {
    let json = dump_json(path, skeleton, converter)?;
    std::fs::write(output, json).with_context(|| format!("Failed to write {:?}", output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skinned_common::formats::VertexWeights;

    #[test]
    fn test_asset_kind_rejects_unknown() {
        assert!(asset_kind(Path::new("hero.fbx")).is_err());
        assert_eq!(
            asset_kind(Path::new("hero.Skeleton")).unwrap(),
            AssetKind::Skeleton
        );
    }

    #[test]
    fn test_influence_histogram() {
        let weights = |n: usize| VertexWeights {
            group_count: n as u32,
            bone_indices: vec![0; n],
            weights: vec![1.0 / n.max(1) as f32; n],
        };
        let mesh = SkinnedMesh {
            weights: vec![weights(1), weights(2), weights(1), weights(4)],
            ..Default::default()
        };
        assert_eq!(influence_histogram(&mesh), vec![(1, 2), (2, 1), (4, 1)]);
    }
}
