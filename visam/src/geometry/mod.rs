//! Observation primitives

use crate::camera::Calibration;
use crate::keys::LandmarkId;
use crate::math::{Point3, Pose3};

/// Pixel coordinates `(u, v)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    pub u: f64,
    pub v: f64,
}

impl Pixel {
    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }
}

/// A monocular observation of one landmark, scoped to the frame that owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub landmark: LandmarkId,
    pub pixel: Pixel,
}

impl Measurement {
    pub fn new(landmark: LandmarkId, u: f64, v: f64) -> Self {
        Self {
            landmark,
            pixel: Pixel::new(u, v),
        }
    }
}

/// Project a world point through a camera pose.
///
/// Returns `None` when the point is not in front of the camera.
pub fn project_world_point(
    calibration: &Calibration<f64>,
    world_t_camera: &Pose3,
    point: Point3,
) -> Option<Pixel> {
    let p = world_t_camera.transform_to(point);
    if p.z <= 0.0 {
        return None;
    }
    let (u, v) = calibration.project(p);
    Some(Pixel::new(u, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use visam_solver::math3d::Vec3;

    #[test]
    fn point_behind_camera_is_not_projected() {
        let k = Calibration::simple(500.0, 640.0, 480.0);
        let pose = Pose3::identity();
        assert!(project_world_point(&k, &pose, Vec3::new(0.0, 0.0, -1.0)).is_none());
        assert_eq!(
            project_world_point(&k, &pose, Vec3::new(0.0, 0.0, 1.0)),
            Some(Pixel::new(320.0, 240.0))
        );
    }
}
