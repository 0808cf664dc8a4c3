// Re-export glam for convenience
pub use glam::*;

// FBX math helpers
mod euler;
mod nurbs;
mod transform;

pub use euler::{deg_to_rad, euler_zyx_to_quat, quat_to_euler_zyx};
pub use nurbs::NurbsCurve;
pub use transform::{look_at_rotation, mat4_from_slice};
