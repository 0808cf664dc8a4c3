// Transform utilities for Mat4 and node orientation.
//
// FBX matrices arrive as 16 doubles in column-major order, which matches
// glam's `from_cols_array` layout.

use glam::{Mat3, Mat4, Quat, Vec3};

/// Build a Mat4 from 16 column-major doubles.
///
/// Returns `None` if fewer than 16 values are supplied. Extra values are ignored.
pub fn mat4_from_slice(values: &[f64]) -> Option<Mat4> {
    if values.len() < 16 {
        return None;
    }
    let mut cols = [0.0f32; 16];
    for (dst, src) in cols.iter_mut().zip(values) {
        *dst = *src as f32;
    }
    Some(Mat4::from_cols_array(&cols))
}

/// Rotation that points an object's local axis at `target`.
///
/// With `negative_z_forward` set (cameras and lights) the local -Z axis faces
/// the target; otherwise the local +Z axis does. `up` picks the roll. When eye
/// and target coincide the rotation faces +Z, and a degenerate `up` is nudged
/// off the view axis.
pub fn look_at_rotation(eye: Vec3, target: Vec3, up: Vec3, negative_z_forward: bool) -> Quat {
    let mut z = if negative_z_forward { eye - target } else { target - eye };
    if z.length_squared() == 0.0 {
        z = Vec3::Z;
    }
    z = z.normalize();

    let mut x = up.cross(z);
    if x.length_squared() == 0.0 {
        // up is parallel to z
        if up.z.abs() == 1.0 {
            z.x += 0.0001;
        } else {
            z.z += 0.0001;
        }
        z = z.normalize();
        x = up.cross(z);
    }
    x = x.normalize();
    let y = z.cross(x);

    Quat::from_mat3(&Mat3::from_cols(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mat4_from_slice_column_major() {
        let mut values = [0.0f64; 16];
        values[0] = 1.0;
        values[5] = 1.0;
        values[10] = 1.0;
        values[15] = 1.0;
        values[12] = 10.0;
        values[13] = 20.0;
        values[14] = 30.0;
        let m = mat4_from_slice(&values).unwrap();
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(10.0, 20.0, 30.0));
    }

    #[test]
    fn test_mat4_from_slice_too_short() {
        assert!(mat4_from_slice(&[1.0; 15]).is_none());
    }

    #[test]
    fn test_look_at_positive_z() {
        let q = look_at_rotation(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), Vec3::Y, false);
        let forward = q * Vec3::Z;
        assert!((forward - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_look_at_negative_z_for_cameras() {
        let q = look_at_rotation(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y, true);
        let forward = q * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
        let up = q * Vec3::Y;
        assert!((up - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_look_at_degenerate_up() {
        let q = look_at_rotation(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0), Vec3::Y, false);
        assert!(q.is_finite());
        assert!(q.is_normalized());
    }
}
