//! Lie group math for rotations and poses

mod se3;
mod so3;

pub use se3::SE3;
pub use so3::{right_jacobian_inverse, SO3};

/// Camera pose, camera-to-world.
pub type Pose3 = SE3<f64>;
/// Landmark position in world coordinates.
pub type Point3 = visam_solver::math3d::Vec3<f64>;
