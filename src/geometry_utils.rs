use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::{Position3D, Rotation3D};

pub fn distance(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    (a - b).norm()
}

/// Return the minimal rotation angle (in degrees) between two orientations,
/// always in the range [0,180]. A quaternion and its negation count as the
/// same orientation.
pub fn angle_between(a: &UnitQuaternion<f32>, b: &UnitQuaternion<f32>) -> f32 {
    a.angle_to(b).to_degrees().clamp(0., 180.)
}

/// Build a unit quaternion from (x, y, z, w) components, normalising on the way.
/// Returns None if the components are (close to) all zero.
pub fn quaternion_from_xyzw(rotation: &Rotation3D) -> Option<UnitQuaternion<f32>> {
    let [x, y, z, w] = *rotation;
    if [x, y, z, w].iter().any(|c| !c.is_finite()) {
        return None;
    }
    UnitQuaternion::try_new(Quaternion::new(w, x, y, z), f32::EPSILON)
}

pub fn quaternion_to_xyzw(rotation: &UnitQuaternion<f32>) -> Rotation3D {
    let q = rotation.quaternion();
    [q.i, q.j, q.k, q.w]
}

pub fn vector_to_array(v: &Vector3<f32>) -> Position3D {
    [v.x, v.y, v.z]
}

/// Repeated multiplication drifts away from unit length; pull it back.
pub fn renormalize(rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    UnitQuaternion::new_normalize(*rotation.quaternion())
}

/// Quaternion for an offset given as Euler angles in degrees (x, y, z).
///
/// Follows the capture host's convention: rotate about Z first, then X,
/// then Y, i.e. `Ry * Rx * Rz`.
pub fn euler_to_quaternion(degrees: &[f32; 3]) -> UnitQuaternion<f32> {
    let [x, y, z] = *degrees;
    let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), x.to_radians());
    let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), y.to_radians());
    let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), z.to_radians());
    ry * rx * rz
}
