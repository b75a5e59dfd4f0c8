//! Coordinate system conversion.
//!
//! Files store positions and rotations in the engine's system ([`CoordinateSystem::Unity`]).
//! Authoring happens in [`CoordinateSystem::Blender`]. Every other system is tabulated against
//! Blender, and pairs that do not involve Blender are composed through it.
//!
//! Each mapping is an axis permutation with sign flips plus the matching quaternion component
//! reorder. Swapping source and target yields the exact inverse.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Closed set of supported coordinate systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// Right-handed, Z up.
    #[default]
    Blender,
    /// Left-handed, Y up. The on-disk system of all three formats.
    Unity,
    /// 3ds Max.
    Max,
    /// 3ds Max with the Y axis flipped.
    MaxInverseY,
}

/// Maps positions and rotations from `source` to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateConverter {
    pub source: CoordinateSystem,
    pub target: CoordinateSystem,
    /// Selects the variant where the engine forward axis maps to tool -Y.
    pub negative_forward: bool,
}

impl Default for CoordinateConverter {
    fn default() -> Self {
        Self::import()
    }
}

impl CoordinateConverter {
    pub fn new(source: CoordinateSystem, target: CoordinateSystem) -> Self {
        Self {
            source,
            target,
            negative_forward: false,
        }
    }

    /// Engine (file) space to tool space. Used by every decoder.
    pub fn import() -> Self {
        Self::new(CoordinateSystem::Unity, CoordinateSystem::Blender)
    }

    /// Tool space to engine (file) space. Used by every encoder.
    pub fn export() -> Self {
        Self::new(CoordinateSystem::Blender, CoordinateSystem::Unity)
    }

    pub fn with_negative_forward(mut self, negative_forward: bool) -> Self {
        self.negative_forward = negative_forward;
        self
    }

    /// The converter mapping `target` back to `source`.
    pub fn inverse(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
            negative_forward: self.negative_forward,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }

    pub fn convert_vec3(&self, v: Vec3) -> Vec3 {
        use CoordinateSystem::Blender;
        match (self.source, self.target) {
            (s, t) if s == t => v,
            (s, Blender) => vec_to_blender(s, v, self.negative_forward),
            (Blender, t) => vec_from_blender(t, v, self.negative_forward),
            (s, t) => vec_from_blender(
                t,
                vec_to_blender(s, v, self.negative_forward),
                self.negative_forward,
            ),
        }
    }

    pub fn convert_quat(&self, q: Quat) -> Quat {
        use CoordinateSystem::Blender;
        match (self.source, self.target) {
            (s, t) if s == t => q,
            (s, Blender) => quat_to_blender(s, q, self.negative_forward),
            (Blender, t) => quat_from_blender(t, q, self.negative_forward),
            (s, t) => quat_from_blender(
                t,
                quat_to_blender(s, q, self.negative_forward),
                self.negative_forward,
            ),
        }
    }
}

fn vec_to_blender(source: CoordinateSystem, v: Vec3, negative_forward: bool) -> Vec3 {
    match (source, negative_forward) {
        (CoordinateSystem::Blender, _) => v,
        (CoordinateSystem::Unity, false) => Vec3::new(v.x, v.z, v.y),
        (CoordinateSystem::Unity, true) => Vec3::new(-v.x, -v.z, v.y),
        (CoordinateSystem::Max, false) | (CoordinateSystem::MaxInverseY, true) => {
            Vec3::new(-v.x, -v.y, v.z)
        }
        (CoordinateSystem::Max, true) | (CoordinateSystem::MaxInverseY, false) => v,
    }
}

fn vec_from_blender(target: CoordinateSystem, v: Vec3, negative_forward: bool) -> Vec3 {
    match (target, negative_forward) {
        (CoordinateSystem::Unity, false) => Vec3::new(v.x, v.z, v.y),
        (CoordinateSystem::Unity, true) => Vec3::new(-v.x, v.z, -v.y),
        // The Max mappings are involutions.
        (system, _) => vec_to_blender(system, v, negative_forward),
    }
}

fn quat_to_blender(source: CoordinateSystem, q: Quat, negative_forward: bool) -> Quat {
    match (source, negative_forward) {
        (CoordinateSystem::Blender, _) => q,
        (CoordinateSystem::Unity, false) => Quat::from_xyzw(-q.x, -q.z, -q.y, q.w),
        (CoordinateSystem::Unity, true) => Quat::from_xyzw(-q.x, -q.z, q.y, -q.w),
        (CoordinateSystem::Max, false) | (CoordinateSystem::MaxInverseY, true) => {
            Quat::from_xyzw(-q.x, -q.y, q.z, q.w)
        }
        (CoordinateSystem::Max, true) | (CoordinateSystem::MaxInverseY, false) => q,
    }
}

fn quat_from_blender(target: CoordinateSystem, q: Quat, negative_forward: bool) -> Quat {
    match (target, negative_forward) {
        (CoordinateSystem::Unity, false) => Quat::from_xyzw(-q.x, -q.z, -q.y, q.w),
        (CoordinateSystem::Unity, true) => Quat::from_xyzw(-q.x, q.z, -q.y, -q.w),
        (system, _) => quat_to_blender(system, q, negative_forward),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    const ALL_SYSTEMS: [CoordinateSystem; 4] = [
        CoordinateSystem::Blender,
        CoordinateSystem::Unity,
        CoordinateSystem::Max,
        CoordinateSystem::MaxInverseY,
    ];

    fn sample_vectors() -> Vec<Vec3> {
        vec![
            Vec3::ZERO,
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-0.25, 10.5, -7.0),
            Vec3::new(1e3, -1e-3, 0.5),
        ]
    }

    fn sample_quats() -> Vec<Quat> {
        vec![
            Quat::IDENTITY,
            Quat::from_rotation_x(0.7),
            Quat::from_rotation_y(-1.3),
            Quat::from_euler(glam::EulerRot::XYZ, 0.3, -0.8, 2.1),
        ]
    }

    #[test]
    fn test_unity_to_blender_swaps_y_and_z() {
        let converter = CoordinateConverter::import();
        assert_eq!(
            converter.convert_vec3(Vec3::new(1.0, 2.0, 3.0)),
            Vec3::new(1.0, 3.0, 2.0)
        );

        let q = Quat::from_xyzw(0.1, 0.2, 0.3, 0.9);
        let converted = converter.convert_quat(q);
        assert_eq!(converted, Quat::from_xyzw(-0.1, -0.3, -0.2, 0.9));
    }

    #[test]
    fn test_unity_to_blender_negative_forward() {
        let converter = CoordinateConverter::import().with_negative_forward(true);
        assert_eq!(
            converter.convert_vec3(Vec3::new(1.0, 2.0, 3.0)),
            Vec3::new(-1.0, -3.0, 2.0)
        );
        assert_eq!(
            converter.convert_quat(Quat::from_xyzw(0.1, 0.2, 0.3, 0.9)),
            Quat::from_xyzw(-0.1, -0.3, 0.2, -0.9)
        );
    }

    #[test]
    fn test_same_system_is_identity() {
        for system in ALL_SYSTEMS {
            let converter = CoordinateConverter::new(system, system);
            assert!(converter.is_identity());
            let v = Vec3::new(4.0, -5.0, 6.0);
            assert_eq!(converter.convert_vec3(v), v);
        }
    }

    #[test]
    fn test_roundtrip_all_pairs() {
        for negative_forward in [false, true] {
            for source in ALL_SYSTEMS {
                for target in ALL_SYSTEMS {
                    let forward =
                        CoordinateConverter::new(source, target).with_negative_forward(negative_forward);
                    let back = forward.inverse();

                    for v in sample_vectors() {
                        let roundtrip = back.convert_vec3(forward.convert_vec3(v));
                        assert!(
                            roundtrip.abs_diff_eq(v, EPSILON),
                            "{source:?} -> {target:?} ({negative_forward}): {v:?} became {roundtrip:?}"
                        );
                    }

                    for q in sample_quats() {
                        let roundtrip = back.convert_quat(forward.convert_quat(q));
                        assert!(
                            roundtrip.abs_diff_eq(q, EPSILON),
                            "{source:?} -> {target:?} ({negative_forward}): {q:?} became {roundtrip:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_max_negative_forward_is_identity() {
        let converter = CoordinateConverter::new(CoordinateSystem::Max, CoordinateSystem::Blender)
            .with_negative_forward(true);
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(converter.convert_vec3(v), v);

        let converter = converter.with_negative_forward(false);
        assert_eq!(converter.convert_vec3(v), Vec3::new(-1.0, -2.0, 3.0));
    }

    #[test]
    fn test_coordinate_system_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            system: CoordinateSystem,
        }

        let parsed: Wrapper = serde_json::from_str(r#"{"system":"max_inverse_y"}"#).unwrap();
        assert_eq!(parsed.system, CoordinateSystem::MaxInverseY);
    }
}
