//! Transform helpers shared by the skeleton and animation codecs.
//!
//! Positions and rotations are kept separate (no scale) because the formats never store a
//! local scale.

use glam::{Mat4, Quat, Vec3};

/// Multiplies `a * b`, first flipping `b` into the same hemisphere as `a`.
///
/// Keeps consecutive baked rotations on the short arc so interpolation in the host does not
/// spin the long way round.
pub fn safe_quat_mul(a: Quat, b: Quat) -> Quat {
    if a.dot(b) < 0.0 { a * -b } else { a * b }
}

/// Expresses `world_position` in the frame of a parent at `parent_position`/`parent_rotation`.
pub fn get_local_position(parent_position: Vec3, parent_rotation: Quat, world_position: Vec3) -> Vec3 {
    parent_rotation.conjugate() * (world_position - parent_position)
}

/// Inverse of [`get_local_position`].
pub fn get_world_position(parent_position: Vec3, parent_rotation: Quat, local_position: Vec3) -> Vec3 {
    parent_position + parent_rotation * local_position
}

pub fn get_local_rotation(parent_rotation: Quat, world_rotation: Quat) -> Quat {
    safe_quat_mul(parent_rotation.conjugate(), world_rotation)
}

pub fn get_world_rotation(parent_rotation: Quat, local_rotation: Quat) -> Quat {
    safe_quat_mul(parent_rotation, local_rotation)
}

/// Translation and rotation of an affine matrix. Scale is discarded.
pub fn decompose_position_rotation(matrix: &Mat4) -> (Vec3, Quat) {
    let (_, rotation, translation) = matrix.to_scale_rotation_translation();
    (translation, rotation.normalize())
}

/// Rotation component equality up to sign.
pub fn same_rotation(a: Quat, b: Quat, epsilon: f32) -> bool {
    a.abs_diff_eq(b, epsilon) || a.abs_diff_eq(-b, epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_local_world_position_roundtrip() {
        let parent_pos = Vec3::new(1.0, -2.0, 0.5);
        let parent_rot = Quat::from_rotation_z(0.9) * Quat::from_rotation_x(-0.3);
        let world = Vec3::new(3.0, 4.0, -1.0);

        let local = get_local_position(parent_pos, parent_rot, world);
        let back = get_world_position(parent_pos, parent_rot, local);
        assert!(back.abs_diff_eq(world, EPSILON));
    }

    #[test]
    fn test_local_world_rotation_roundtrip() {
        let parent_rot = Quat::from_rotation_y(1.1);
        let world = Quat::from_rotation_x(0.4) * Quat::from_rotation_z(-2.5);

        let local = get_local_rotation(parent_rot, world);
        let back = get_world_rotation(parent_rot, local);
        assert!(same_rotation(back, world, EPSILON));
    }

    #[test]
    fn test_safe_mul_stays_in_hemisphere() {
        let a = Quat::from_rotation_z(0.1);
        let b = -Quat::from_rotation_z(0.2);
        assert!(a.dot(b) < 0.0);

        let result = safe_quat_mul(a, b);
        assert!(result.abs_diff_eq(Quat::from_rotation_z(0.3), EPSILON));
    }

    #[test]
    fn test_decompose_drops_scale() {
        let rotation = Quat::from_rotation_y(0.5);
        let translation = Vec3::new(1.0, 2.0, 3.0);
        let matrix =
            Mat4::from_scale_rotation_translation(Vec3::splat(2.0), rotation, translation);

        let (pos, rot) = decompose_position_rotation(&matrix);
        assert!(pos.abs_diff_eq(translation, EPSILON));
        assert!(same_rotation(rot, rotation, EPSILON));
    }
}
