use nalgebra::{UnitQuaternion, Vector3};

use crate::geometry_utils::renormalize;

use super::coordinate_conversion::ConvertedPose;

/// Pose of one body expressed in the local frame of a reference body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativePose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Default for RelativePose {
    fn default() -> Self {
        RelativePose {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

pub fn relative_position(
    world_a: &Vector3<f32>,
    world_b: &Vector3<f32>,
    orientation_b: &UnitQuaternion<f32>,
) -> Vector3<f32> {
    renormalize(orientation_b).inverse_transform_vector(&(world_a - world_b))
}

pub fn relative_rotation(
    rotation_a: &UnitQuaternion<f32>,
    rotation_b: &UnitQuaternion<f32>,
) -> UnitQuaternion<f32> {
    renormalize(&(renormalize(rotation_b).inverse() * renormalize(rotation_a)))
}

/// Express `body` in the local frame of `reference`
pub fn calculate(body: &ConvertedPose, reference: &ConvertedPose) -> RelativePose {
    RelativePose {
        position: relative_position(&body.position, &reference.position, &reference.rotation),
        rotation: relative_rotation(&body.rotation, &reference.rotation),
    }
}

/// The inverse of [`calculate`]: recover the world pose of the body from the
/// reference's world pose and a relative pose.
pub fn compose(reference: &ConvertedPose, relative: &RelativePose) -> ConvertedPose {
    ConvertedPose {
        position: reference.position + reference.rotation * relative.position,
        rotation: renormalize(&(reference.rotation * relative.rotation)),
    }
}
