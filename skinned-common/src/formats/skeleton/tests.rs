//! Skeleton model and codec tests

use super::*;
use crate::coords::CoordinateConverter;
use crate::error::FormatError;
use glam::{Mat4, Quat, Vec3};
use std::io::Cursor;

const EPSILON: f32 = 1e-5;

fn bone(name: &str, id: i64, parent: Option<&str>, position: Vec3, rotation: Quat) -> HierarchyBone {
    HierarchyBone {
        name: name.to_string(),
        bone_id: Some(id),
        parent: parent.map(str::to_string),
        matrix: Mat4::from_rotation_translation(rotation, position),
        deform: true,
    }
}

/// Base -> Spine -> Head, plus Hand under Spine.
fn humanoid() -> Vec<HierarchyBone> {
    vec![
        bone("Base", 0, None, Vec3::ZERO, Quat::IDENTITY),
        bone(
            "Spine",
            1,
            Some("Base"),
            Vec3::new(0.0, 0.0, 1.0),
            Quat::from_rotation_z(0.5),
        ),
        bone(
            "Head",
            2,
            Some("Spine"),
            Vec3::new(0.1, 0.2, 1.8),
            Quat::from_rotation_x(-0.3) * Quat::from_rotation_z(0.5),
        ),
        bone(
            "Hand",
            3,
            Some("Spine"),
            Vec3::new(0.7, -0.1, 1.4),
            Quat::from_rotation_y(1.2),
        ),
    ]
}

fn no_checks() -> BuildOptions {
    BuildOptions {
        only_deform_bones: false,
        check_for_exportation: false,
    }
}

fn chain(count: usize) -> Vec<HierarchyBone> {
    (0..count)
        .map(|i| {
            let parent = (i > 0).then(|| format!("bone_{}", i - 1));
            HierarchyBone {
                name: format!("bone_{i}"),
                bone_id: Some(i as i64),
                parent,
                matrix: Mat4::from_translation(Vec3::new(0.0, 0.0, i as f32 * 0.1)),
                deform: true,
            }
        })
        .collect()
}

fn validation_error(result: crate::error::Result<Skeleton>) -> ValidationError {
    match result {
        Err(FormatError::Validation(e)) => e,
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ============================================================================
// Model
// ============================================================================

#[test]
fn test_build_humanoid() {
    let skeleton = build_skeleton("hero", &humanoid(), BuildOptions::default()).unwrap();
    assert_eq!(skeleton.name(), "hero");
    assert_eq!(skeleton.bone_count(), 4);
    assert_eq!(skeleton.bone_id("Head"), Some(2));
    assert_eq!(skeleton.bone(2).unwrap().parent, Some(1));
    assert_eq!(skeleton.base_bone_id(), Some(0));
    assert!(skeleton.bones().iter().all(|b| b.absolute_scale == Vec3::ONE));

    let children: Vec<&str> = skeleton.children(1).map(|b| b.name.as_str()).collect();
    assert_eq!(children, vec!["Head", "Hand"]);
    assert_eq!(skeleton.roots().count(), 1);
}

#[test]
fn test_local_derivation_invariant() {
    let skeleton = build_skeleton("hero", &humanoid(), no_checks()).unwrap();
    for bone in skeleton.bones() {
        match skeleton.parent(bone.id) {
            None => {
                assert_eq!(bone.local_position, bone.absolute_position);
                assert_eq!(bone.local_rotation, bone.absolute_rotation);
            }
            Some(parent) => {
                let position = parent.absolute_position
                    + parent.absolute_rotation * bone.local_position;
                let rotation = parent.absolute_rotation * bone.local_rotation;
                assert!(position.abs_diff_eq(bone.absolute_position, EPSILON));
                assert!(crate::math::same_rotation(
                    rotation,
                    bone.absolute_rotation,
                    EPSILON
                ));
            }
        }
    }
}

#[test]
fn test_topological_order_parents_first() {
    // Ids deliberately out of hierarchy order.
    let bones = vec![
        bone("Root", 0, None, Vec3::ZERO, Quat::IDENTITY),
        bone("Tip", 1, Some("Mid"), Vec3::Z * 2.0, Quat::IDENTITY),
        bone("Mid", 2, Some("Root"), Vec3::Z, Quat::IDENTITY),
    ];
    let skeleton = build_skeleton("s", &bones, no_checks()).unwrap();
    assert_eq!(skeleton.topological_order(), &[0, 2, 1]);
}

#[test]
fn test_bone_zero_parent_forced_to_root() {
    let records = vec![
        BoneRecord {
            name: "a".into(),
            parent: Some(1),
            position: Vec3::X,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        },
        BoneRecord {
            name: "b".into(),
            parent: Some(0),
            position: Vec3::Y,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        },
    ];
    let skeleton = Skeleton::from_records("s", records).unwrap();
    assert_eq!(skeleton.bone(0).unwrap().parent, None);
    assert_eq!(skeleton.bone(0).unwrap().local_position, Vec3::X);
}

#[test]
fn test_cyclic_parents_rejected() {
    let record = |name: &str, parent: u32| BoneRecord {
        name: name.into(),
        parent: Some(parent),
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };
    let records = vec![record("root", 0), record("a", 2), record("b", 1)];
    let err = validation_error(Skeleton::from_records("s", records));
    assert_eq!(err, ValidationError::CyclicHierarchy { name: "a".into() });
}

#[test]
fn test_hex_dumps() {
    let skeleton = build_skeleton("hero", &humanoid(), no_checks()).unwrap();
    let positions = skeleton.positions_hex();
    assert_eq!(positions.len(), 4);
    assert_eq!(positions[0], "Base: 00000000 00000000 00000000");
    // 1.0f32 = 0x3f800000, little-endian
    assert!(positions[1].ends_with("0000803f"));
    let rotations = skeleton.rotations_hex();
    assert_eq!(rotations.len(), 4);
    assert!(rotations[0].starts_with("Base: "));
    assert_eq!(rotations[0].split(' ').count(), 5);
}

// ============================================================================
// Build validation
// ============================================================================

#[test]
fn test_bone_count_bounds() {
    assert_eq!(
        validation_error(build_skeleton("s", &[], no_checks())),
        ValidationError::NoBones
    );
    assert_eq!(
        validation_error(build_skeleton("s", &chain(257), no_checks())),
        ValidationError::TooManyBones(257)
    );
    assert_eq!(build_skeleton("s", &chain(1), no_checks()).unwrap().bone_count(), 1);
    assert_eq!(build_skeleton("s", &chain(256), no_checks()).unwrap().bone_count(), 256);
}

#[test]
fn test_name_validation() {
    let mut bones = chain(2);
    bones[1].name = "x".repeat(129);
    assert!(matches!(
        validation_error(build_skeleton("s", &bones, no_checks())),
        ValidationError::NameTooLong { .. }
    ));

    let mut bones = chain(2);
    bones[1].name = "x".repeat(128);
    assert!(build_skeleton("s", &bones, no_checks()).is_ok());

    let mut bones = chain(2);
    bones[1].name = "Köpf".into();
    assert_eq!(
        validation_error(build_skeleton("s", &bones, no_checks())),
        ValidationError::NonAsciiName { name: "Köpf".into() }
    );

    let mut bones = chain(3);
    bones[2].name = "bone_0".into();
    assert_eq!(
        validation_error(build_skeleton("s", &bones, no_checks())),
        ValidationError::DuplicateName { name: "bone_0".into() }
    );
}

#[test]
fn test_id_validation() {
    let mut bones = chain(3);
    bones[1].bone_id = None;
    assert_eq!(
        validation_error(build_skeleton("s", &bones, no_checks())),
        ValidationError::MissingBoneId { name: "bone_1".into() }
    );

    let mut bones = chain(3);
    bones[2].bone_id = Some(3);
    assert_eq!(
        validation_error(build_skeleton("s", &bones, no_checks())),
        ValidationError::BoneIdOutOfRange {
            name: "bone_2".into(),
            id: 3,
            count: 3
        }
    );

    let mut bones = chain(3);
    bones[2].bone_id = Some(1);
    assert_eq!(
        validation_error(build_skeleton("s", &bones, no_checks())),
        ValidationError::DuplicateBoneId {
            name: "bone_2".into(),
            id: 1,
            other: "bone_1".into()
        }
    );
}

#[test]
fn test_missing_head_only_fails_export_check() {
    let mut bones = humanoid();
    bones[2].name = "Skull".into();

    assert!(build_skeleton("s", &bones, no_checks()).is_ok());

    let options = BuildOptions {
        only_deform_bones: false,
        check_for_exportation: true,
    };
    assert_eq!(
        validation_error(build_skeleton("s", &bones, options)),
        ValidationError::MissingHeadBone
    );
}

#[test]
fn test_head_check_is_case_sensitive() {
    let mut bones = humanoid();
    bones[2].name = "head".into();
    assert_eq!(
        validation_error(build_skeleton("s", &bones, BuildOptions::default())),
        ValidationError::MissingHeadBone
    );
}

#[test]
fn test_base_bone_rules() {
    let mut bones = humanoid();
    bones[0].name = "ROOT".into();
    bones[1].parent = Some("ROOT".into());
    assert!(build_skeleton("s", &bones, BuildOptions::default()).is_ok());

    let mut bones = humanoid();
    bones[0].name = "Pelvis".into();
    bones[1].parent = Some("Pelvis".into());
    assert_eq!(
        validation_error(build_skeleton("s", &bones, BuildOptions::default())),
        ValidationError::MissingBaseBone
    );

    // Base bone hung below another root.
    let bones = vec![
        bone("Origin", 0, None, Vec3::ZERO, Quat::IDENTITY),
        bone("Base", 1, Some("Origin"), Vec3::Z, Quat::IDENTITY),
        bone("Head", 2, Some("Base"), Vec3::Z * 2.0, Quat::IDENTITY),
    ];
    assert_eq!(
        validation_error(build_skeleton("s", &bones, BuildOptions::default())),
        ValidationError::BaseBoneHasParent { name: "Base".into() }
    );
}

#[test]
fn test_base_bone_follows_hierarchy_order() {
    // "Root" comes first in the hierarchy but "Base" has the lower id.
    let mut bones = vec![
        bone("Root", 2, None, Vec3::ZERO, Quat::IDENTITY),
        bone("Base", 1, Some("Root"), Vec3::Z, Quat::IDENTITY),
        bone("Pelvis", 0, None, Vec3::X, Quat::IDENTITY),
        bone("Head", 3, Some("Base"), Vec3::Z * 2.0, Quat::IDENTITY),
    ];
    let skeleton = build_skeleton("s", &bones, BuildOptions::default()).unwrap();

    // A decoded skeleton has no hierarchy order and falls back to id order.
    assert_eq!(skeleton.base_bone_id(), Some(1));
    assert_eq!(
        skeleton.validate_for_export(),
        Err(ValidationError::BaseBoneHasParent { name: "Base".into() })
    );

    bones.swap(0, 1);
    assert_eq!(
        validation_error(build_skeleton("s", &bones, BuildOptions::default())),
        ValidationError::BaseBoneHasParent { name: "Base".into() }
    );
}

#[test]
fn test_deform_filter_reparents_to_kept_ancestor() {
    let mut bones = vec![
        bone("Base", 0, None, Vec3::ZERO, Quat::IDENTITY),
        bone("Helper", 99, Some("Base"), Vec3::Z, Quat::from_rotation_z(1.0)),
        bone("Head", 1, Some("Helper"), Vec3::Z * 2.0, Quat::IDENTITY),
    ];
    bones[1].deform = false;

    let skeleton = build_skeleton("s", &bones, BuildOptions::default()).unwrap();
    assert_eq!(skeleton.bone_count(), 2);
    let head = skeleton.bone_by_name("Head").unwrap();
    assert_eq!(head.parent, Some(0));
    assert!(head.local_position.abs_diff_eq(Vec3::Z * 2.0, EPSILON));

    // Without filtering the helper's out-of-range id is rejected.
    assert!(matches!(
        validation_error(build_skeleton("s", &bones, no_checks())),
        ValidationError::BoneIdOutOfRange { .. }
    ));
}

#[test]
fn test_unknown_parent_rejected() {
    let mut bones = chain(2);
    bones[1].parent = Some("ghost".into());
    bones[1].deform = true;
    let options = BuildOptions {
        only_deform_bones: true,
        check_for_exportation: false,
    };
    assert_eq!(
        validation_error(build_skeleton("s", &bones, options)),
        ValidationError::UnknownParent {
            name: "bone_1".into(),
            parent: "ghost".into()
        }
    );
}

// ============================================================================
// Bone id rebuilding
// ============================================================================

#[test]
fn test_rebuild_ids_base_first() {
    let mut bones = humanoid();
    bones[0].bone_id = Some(3);
    bones[1].bone_id = None;
    bones[2].bone_id = Some(2);
    bones[3].bone_id = Some(2);

    let changed = rebuild_bone_ids(&mut bones, true).unwrap();
    assert_eq!(changed, 3);
    assert_eq!(bones[0].bone_id, Some(0));
    assert_eq!(bones[2].bone_id, Some(2));
    assert_eq!(bones[1].bone_id, Some(1));
    assert_eq!(bones[3].bone_id, Some(3));

    assert!(build_skeleton("s", &bones, BuildOptions::default()).is_ok());
}

#[test]
fn test_rebuild_ids_keeps_valid_ids() {
    let mut bones = humanoid();
    assert_eq!(rebuild_bone_ids(&mut bones, false).unwrap(), 0);
    let ids: Vec<_> = bones.iter().map(|b| b.bone_id).collect();
    assert_eq!(ids, vec![Some(0), Some(1), Some(2), Some(3)]);
}

#[test]
fn test_rebuild_ids_skips_filtered_bones() {
    let mut bones = humanoid();
    bones[3].deform = false;
    bones[3].bone_id = Some(42);
    bones[2].bone_id = Some(7);

    rebuild_bone_ids(&mut bones, true).unwrap();
    assert_eq!(bones[2].bone_id, Some(2));
    assert_eq!(bones[3].bone_id, Some(42));
}

#[test]
fn test_rebuild_ids_requires_base() {
    let mut bones = chain(3);
    assert!(matches!(
        rebuild_bone_ids(&mut bones, false),
        Err(FormatError::Validation(ValidationError::MissingBaseBone))
    ));
}

// ============================================================================
// Codec
// ============================================================================

#[test]
fn test_skeleton_roundtrip() {
    let skeleton = build_skeleton("hero", &humanoid(), BuildOptions::default()).unwrap();
    let bytes = skeleton.to_bytes().unwrap();
    let decoded = Skeleton::from_reader(Cursor::new(bytes), "hero").unwrap();

    assert_eq!(decoded.bone_count(), skeleton.bone_count());
    for (a, b) in skeleton.bones().iter().zip(decoded.bones()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.parent, b.parent);
        assert!(a.absolute_position.abs_diff_eq(b.absolute_position, EPSILON));
        assert!(a.absolute_rotation.abs_diff_eq(b.absolute_rotation, EPSILON));
        assert_eq!(a.absolute_scale, b.absolute_scale);
        assert!(a.local_position.abs_diff_eq(b.local_position, EPSILON));
    }
}

#[test]
fn test_skeleton_layout() {
    let skeleton = build_skeleton("hero", &humanoid(), BuildOptions::default()).unwrap();
    let bytes = skeleton.to_bytes().unwrap();
    let word = |offset: usize| u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());

    let n = 4;
    assert_eq!(
        bytes.len(),
        SkeletonHeader::SIZE + 4 * SectionHeader::SIZE + n * (128 + 4 + 40)
    );
    for (i, magic) in SKELETON_MAGIC.iter().enumerate() {
        assert_eq!(word(i * 4), *magic);
    }
    assert!(bytes[24..280].iter().all(|&b| b == 0));
    assert_eq!(word(280), 4);
    assert_eq!(f32::from_le_bytes(bytes[292..296].try_into().unwrap()), 30.0);

    assert_eq!(word(296), TAG_BONE_NAMES);
    assert_eq!(word(300), 128 * 4);
    assert_eq!(word(304), SECTION_SENTINEL);
    assert_eq!(&bytes[308..312], b"Base");

    let parents = 308 + 128 * n + SectionHeader::SIZE;
    assert_eq!(word(parents - 12), TAG_PARENT_IDS);
    assert_eq!(word(parents), NO_PARENT);
    assert_eq!(word(parents + 4), 0);

    let transforms = parents + 4 * n + SectionHeader::SIZE;
    assert_eq!(word(transforms - 12), TAG_TRANSFORMS);
    assert_eq!(word(transforms - 8), 40 * n as u32);
    assert_eq!(word(transforms - 4), 0x0FFF_FFFF);

    let end = bytes.len() - SectionHeader::SIZE;
    assert_eq!(word(end), TAG_END);
    assert_eq!(word(end + 4), 0);
    assert_eq!(word(end + 8), SECTION_SENTINEL);
}

#[test]
fn test_transforms_sentinel_not_checked_on_read() {
    let skeleton = build_skeleton("hero", &humanoid(), BuildOptions::default()).unwrap();
    let mut bytes = skeleton.to_bytes().unwrap();
    let sentinel = 308 + 128 * 4 + SectionHeader::SIZE + 4 * 4 + 8;
    assert_eq!(&bytes[sentinel..sentinel + 4], &TRANSFORMS_SENTINEL.to_le_bytes());

    bytes[sentinel..sentinel + 4].copy_from_slice(&SECTION_SENTINEL.to_le_bytes());
    let decoded = Skeleton::from_reader(Cursor::new(bytes), "hero").unwrap();
    assert_eq!(decoded.bone_count(), 4);
}

#[test]
fn test_truncated_skeleton_is_io_error() {
    let skeleton = build_skeleton("hero", &humanoid(), no_checks()).unwrap();
    let mut bytes = skeleton.to_bytes().unwrap();
    bytes.truncate(bytes.len() - 30);
    assert!(matches!(
        Skeleton::from_reader(Cursor::new(bytes), "hero"),
        Err(FormatError::Io(_))
    ));
}

#[test]
fn test_bad_bone_count_is_decode_error() {
    let skeleton = build_skeleton("hero", &humanoid(), no_checks()).unwrap();
    let mut bytes = skeleton.to_bytes().unwrap();
    bytes[280..284].copy_from_slice(&0u32.to_le_bytes());
    assert!(matches!(
        Skeleton::from_reader(Cursor::new(bytes), "hero"),
        Err(FormatError::Decode(_))
    ));
}

#[test]
fn test_stored_root_parent_ignored() {
    let skeleton = build_skeleton("hero", &humanoid(), no_checks()).unwrap();
    let mut bytes = skeleton.to_bytes().unwrap();
    let parents = 308 + 128 * 4 + SectionHeader::SIZE;
    bytes[parents..parents + 4].copy_from_slice(&2i32.to_le_bytes());

    let decoded = Skeleton::from_reader(Cursor::new(bytes), "hero").unwrap();
    assert_eq!(decoded.bone(0).unwrap().parent, None);
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hero.Skeleton");

    let skeleton = build_skeleton("hero", &humanoid(), BuildOptions::default()).unwrap();
    skeleton.save(&path, CoordinateConverter::export()).unwrap();

    let loaded = Skeleton::load(&path, CoordinateConverter::import()).unwrap();
    assert_eq!(loaded.name(), "hero");
    assert_eq!(loaded.bone_count(), 4);
    assert_eq!(loaded.bone_id("Hand"), Some(3));
}

#[test]
fn test_to_hierarchy_rebuilds_same_skeleton() {
    let skeleton = build_skeleton("hero", &humanoid(), BuildOptions::default()).unwrap();
    let rebuilt = build_skeleton("hero", &skeleton.to_hierarchy(), BuildOptions::default()).unwrap();
    for (a, b) in skeleton.bones().iter().zip(rebuilt.bones()) {
        assert_eq!(a.parent, b.parent);
        assert!(a.absolute_position.abs_diff_eq(b.absolute_position, EPSILON));
    }
}
