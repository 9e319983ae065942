//! Camera models

use std::sync::Arc;
use visam_solver::math3d::Vec3;
use visam_solver::Real;

/// Pinhole intrinsics with skew.
///
///   u = fx * X/Z + s * Y/Z + cx
///   v = fy * Y/Z + cy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration<T> {
    pub fx: T,
    pub fy: T,
    pub skew: T,
    pub cx: T,
    pub cy: T,
}

/// Calibration shared by every projection constraint of a run.
pub type SharedCalibration = Arc<Calibration<f64>>;

impl<T: Real> Calibration<T> {
    pub fn new(fx: T, fy: T, skew: T, cx: T, cy: T) -> Self {
        Self {
            fx,
            fy,
            skew,
            cx,
            cy,
        }
    }

    /// Project a camera-frame point. The caller checks `Z > 0`.
    pub fn project(&self, point_cam: Vec3<T>) -> (T, T) {
        let inv_z = T::one() / point_cam.z;
        let x = point_cam.x * inv_z;
        let y = point_cam.y * inv_z;
        (
            self.fx * x + self.skew * y + self.cx,
            self.fy * y + self.cy,
        )
    }
}

impl Calibration<f64> {
    /// Square pixels, no skew, principal point at the image centre.
    pub fn simple(focal_length: f64, image_width: f64, image_height: f64) -> Self {
        Self::new(
            focal_length,
            focal_length,
            0.0,
            image_width * 0.5,
            image_height * 0.5,
        )
    }

    pub fn lift<T: Real>(&self) -> Calibration<T> {
        Calibration::new(
            T::from_f64(self.fx),
            T::from_f64(self.fy),
            T::from_f64(self.skew),
            T::from_f64(self.cx),
            T::from_f64(self.cy),
        )
    }

    /// Back-project a pixel to the camera-frame point at `depth`.
    pub fn unproject(&self, u: f64, v: f64, depth: f64) -> Vec3<f64> {
        let y = (v - self.cy) / self.fy;
        let x = (u - self.cx - self.skew * y) / self.fx;
        Vec3::new(x * depth, y * depth, depth)
    }
}

/// Calibration plus the image size used for visibility checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    pub calibration: Calibration<f64>,
    pub image_width: f64,
    pub image_height: f64,
}

impl CameraModel {
    pub fn in_image(&self, u: f64, v: f64) -> bool {
        u >= 0.0 && u < self.image_width && v >= 0.0 && v < self.image_height
    }
}
