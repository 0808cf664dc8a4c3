// Euler angle helpers.
//
// FBX stores rotations as XYZ Euler triples in degrees, applied in ZYX order
// (intrinsic X, then Y, then Z on the column vector). glam's `EulerRot::ZYX`
// takes its angles outermost-first, so the triple is passed as (z, y, x).

use glam::{EulerRot, Quat, Vec3};

/// Convert a triple of degrees to radians, component-wise.
#[inline]
pub fn deg_to_rad(degrees: Vec3) -> Vec3 {
    Vec3::new(
        degrees.x.to_radians(),
        degrees.y.to_radians(),
        degrees.z.to_radians(),
    )
}

/// Build a quaternion from an XYZ Euler triple (radians) in ZYX order.
#[inline]
pub fn euler_zyx_to_quat(euler: Vec3) -> Quat {
    Quat::from_euler(EulerRot::ZYX, euler.z, euler.y, euler.x)
}

/// Decompose a quaternion into an XYZ Euler triple (radians) in ZYX order.
#[inline]
pub fn quat_to_euler_zyx(q: Quat) -> Vec3 {
    let (z, y, x) = q.to_euler(EulerRot::ZYX);
    Vec3::new(x, y, z)
}
