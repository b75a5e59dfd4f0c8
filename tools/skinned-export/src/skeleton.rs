//! Skeleton exporter (hierarchy JSON -> .Skeleton)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use skinned_common::{
    CoordinateConverter, HierarchyBone, Skeleton, build_skeleton, rebuild_bone_ids,
};
use std::path::Path;

use crate::config::SkeletonConfig;

/// Armature snapshot as written by the authoring-tool side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchySnapshot {
    /// Skeleton name. Defaults to the file stem.
    #[serde(default)]
    pub name: Option<String>,
    pub bones: Vec<HierarchyBone>,
}

pub fn load_hierarchy(path: &Path) -> Result<HierarchySnapshot> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse hierarchy {:?}", path))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("skeleton")
        .to_string()
}

/// Builds a skeleton from a hierarchy JSON file, rebuilding bone ids first when configured.
pub fn skeleton_from_hierarchy(path: &Path, config: &SkeletonConfig) -> Result<Skeleton> {
    let mut snapshot = load_hierarchy(path)?;
    let name = snapshot.name.take().unwrap_or_else(|| file_stem(path));

    if config.rebuild_missing_ids {
        let changed = rebuild_bone_ids(&mut snapshot.bones, config.only_deform_bones)
            .with_context(|| format!("Failed to rebuild bone ids in {:?}", path))?;
        if changed > 0 {
            tracing::info!("Reassigned {} bone id(s)", changed);
        }
    }

    build_skeleton(&name, &snapshot.bones, config.build_options())
        .with_context(|| format!("Invalid skeleton in {:?}", path))
}

/// Builds and writes a `.Skeleton` file.
pub fn export_skeleton(
    input: &Path,
    output: &Path,
    config: &SkeletonConfig,
    converter: CoordinateConverter,
) -> Result<Skeleton> {
    let skeleton = skeleton_from_hierarchy(input, config)?;
    skeleton
        .save(output, converter)
        .with_context(|| format!("Failed to write skeleton {:?}", output))?;
    Ok(skeleton)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use skinned_common::CoordinateSystem;

    fn hierarchy_json(head_id: &str) -> String {
        format!(
            r#"{{
  "bones": [
    {{ "name": "Base", "bone_id": 0,
       "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1] }},
    {{ "name": "Spine", "bone_id": 1, "parent": "Base",
       "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,1,1] }},
    {{ "name": "Head", "bone_id": {head_id}, "parent": "Spine",
       "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,2,1] }},
    {{ "name": "IK_Target", "parent": "Base", "deform": false,
       "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 1,0,0,1] }}
  ]
}}"#
        )
    }

    #[test]
    fn test_skeleton_from_hierarchy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hero.json");
        std::fs::write(&path, hierarchy_json("2")).unwrap();

        let skeleton = skeleton_from_hierarchy(&path, &SkeletonConfig::default()).unwrap();
        assert_eq!(skeleton.name(), "hero");
        assert_eq!(skeleton.bone_count(), 3);
        assert_eq!(skeleton.bone_id("Head"), Some(2));
        assert!(skeleton.bone_by_name("IK_Target").is_none());
    }

    #[test]
    fn test_missing_id_rejected_unless_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hero.json");
        std::fs::write(&path, hierarchy_json("null")).unwrap();

        assert!(skeleton_from_hierarchy(&path, &SkeletonConfig::default()).is_err());

        let config = SkeletonConfig {
            rebuild_missing_ids: true,
            ..Default::default()
        };
        let skeleton = skeleton_from_hierarchy(&path, &config).unwrap();
        assert_eq!(skeleton.bone_id("Head"), Some(2));
    }

    #[test]
    fn test_export_skeleton_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("hero.json");
        let output = dir.path().join("hero.Skeleton");
        std::fs::write(&input, hierarchy_json("2")).unwrap();

        let converter = CoordinateConverter::new(CoordinateSystem::Blender, CoordinateSystem::Unity);
        export_skeleton(&input, &output, &SkeletonConfig::default(), converter).unwrap();

        let loaded = Skeleton::load(&output, converter.inverse()).unwrap();
        assert_eq!(loaded.bone_count(), 3);
        assert!(
            loaded
                .bone(2)
                .unwrap()
                .absolute_position
                .abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-6)
        );
    }
}
