use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::{
    geometry_utils::{euler_to_quaternion, quaternion_from_xyzw, renormalize},
    streamer_config::StreamerConfig,
    tracking::RigidBodyPose,
    Position3D,
};

/// A rigid body pose, in the application's working axes and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertedPose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

/// Remaps capture-system poses into working axes: optional Y/Z swap, then
/// scale (positions) or local-frame offset (rotations).
pub struct CoordinateConverter {
    flip_yz: bool,
    position_scale: Vector3<f32>,
    rotation_offset: [f32; 3],
}

impl CoordinateConverter {
    pub fn new(config: &StreamerConfig) -> Self {
        CoordinateConverter {
            flip_yz: config.flip_yz,
            position_scale: Vector3::from(config.position_scale),
            rotation_offset: config.rotation_offset,
        }
    }

    /// None if the reported rotation is not a usable quaternion
    pub fn convert(&self, pose: &RigidBodyPose) -> Option<ConvertedPose> {
        let raw_rotation = quaternion_from_xyzw(&pose.rotation)?;
        Some(ConvertedPose {
            position: convert_position(&pose.position, self.flip_yz, &self.position_scale),
            rotation: convert_rotation(&raw_rotation, self.flip_yz, &self.rotation_offset),
        })
    }
}

pub fn convert_position(raw: &Position3D, flip_yz: bool, scale: &Vector3<f32>) -> Vector3<f32> {
    let [x, y, z] = *raw;
    let converted = if flip_yz {
        Vector3::new(x, z, y)
    } else {
        Vector3::new(x, y, z)
    };
    converted.component_mul(scale)
}

pub fn convert_rotation(
    raw: &UnitQuaternion<f32>,
    flip_yz: bool,
    euler_offset: &[f32; 3],
) -> UnitQuaternion<f32> {
    let converted = if flip_yz {
        // Swapping two axes flips handedness, hence the negated w
        let q = raw.quaternion();
        UnitQuaternion::new_normalize(Quaternion::new(-q.w, q.i, q.k, q.j))
    } else {
        renormalize(raw)
    };

    if euler_offset.iter().any(|a| *a != 0.) {
        converted * euler_to_quaternion(euler_offset)
    } else {
        converted
    }
}
