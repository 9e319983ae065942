//! Simulation and synthetic data generation

use crate::camera::{CameraModel, Calibration};
use crate::dataset::Dataset;
use crate::geometry::{project_world_point, Measurement, Pixel};
use crate::keys::{FrameId, LandmarkId, PoseId};
use crate::math::{Point3, Pose3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;
use visam_solver::math3d::Vec3;

/// Parameters of a synthetic orbit around a cloud of landmarks.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub n_landmarks: usize,
    pub n_frames: usize,
    /// `[min_x, max_x, min_y, max_y, min_z, max_z]`
    pub landmark_bounds: [f64; 6],
    /// Orbit radius (meters)
    pub radius: f64,
    /// Camera height above the landmark cloud centre (meters)
    pub height: f64,
    /// Angle swept by the whole trajectory (radians)
    pub arc: f64,
    pub focal_length: f64,
    pub image_width: f64,
    pub image_height: f64,
    /// Gaussian pixel noise stddev; zero gives perfect measurements
    pub pixel_noise: f64,
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            n_landmarks: 60,
            n_frames: 7,
            landmark_bounds: [-3.0, 3.0, -3.0, 3.0, -1.5, 1.5],
            radius: 9.0,
            height: 1.0,
            arc: 1.0,
            focal_length: 500.0,
            image_width: 640.0,
            image_height: 480.0,
            pixel_noise: 0.0,
            seed: 42,
        }
    }
}

/// Generate random 3D points within a bounding box
pub fn generate_random_points(n_points: usize, bounds: [f64; 6], seed: u64) -> Vec<Point3> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let [min_x, max_x, min_y, max_y, min_z, max_z] = bounds;

    (0..n_points)
        .map(|_| {
            Vec3::new(
                rng.gen_range(min_x..max_x),
                rng.gen_range(min_y..max_y),
                rng.gen_range(min_z..max_z),
            )
        })
        .collect()
}

/// Cameras on a horizontal arc, all looking at the origin.
pub fn circular_trajectory(n_frames: usize, radius: f64, height: f64, arc: f64) -> Vec<Pose3> {
    let up = Vec3::new(0.0, 0.0, 1.0);
    let step = if n_frames > 1 {
        arc / (n_frames - 1) as f64
    } else {
        0.0
    };
    (0..n_frames)
        .map(|i| {
            let angle = step * i as f64;
            let eye = Vec3::new(radius * angle.cos(), radius * angle.sin(), height);
            Pose3::look_at(eye, Vec3::zero(), up)
        })
        .collect()
}

/// Project every landmark into every camera, keeping those in front of the
/// camera and inside the image. Every pose gets a frame, possibly empty.
pub fn generate_observations(
    landmarks: &BTreeMap<LandmarkId, Point3>,
    poses: &BTreeMap<PoseId, Pose3>,
    camera: &CameraModel,
) -> BTreeMap<FrameId, Vec<Measurement>> {
    poses
        .iter()
        .map(|(&frame, pose)| {
            let visible = landmarks
                .iter()
                .filter_map(|(&landmark, &point)| {
                    let pixel = project_world_point(&camera.calibration, pose, point)?;
                    camera.in_image(pixel.u, pixel.v).then_some(Measurement { landmark, pixel })
                })
                .collect();
            (frame, visible)
        })
        .collect()
}

/// Add zero-mean Gaussian noise to every pixel.
///
/// A `sigma` of zero leaves the pixels untouched. A negative, NaN or
/// infinite `sigma` is not a usable stddev: it is logged as a warning and
/// the measurements are returned unchanged.
pub fn add_pixel_noise(
    measurements: &BTreeMap<FrameId, Vec<Measurement>>,
    sigma: f64,
    seed: u64,
) -> BTreeMap<FrameId, Vec<Measurement>> {
    if sigma == 0.0 {
        return measurements.clone();
    }
    let normal = match Normal::new(0.0, sigma) {
        Ok(normal) if sigma.is_finite() => normal,
        Ok(_) | Err(_) => {
            log::warn!("pixel noise sigma {sigma} is not a valid stddev, measurements left as is");
            return measurements.clone();
        }
    };
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    measurements
        .iter()
        .map(|(&frame, list)| {
            let noisy = list
                .iter()
                .map(|m| Measurement {
                    landmark: m.landmark,
                    pixel: Pixel::new(
                        m.pixel.u + normal.sample(&mut rng),
                        m.pixel.v + normal.sample(&mut rng),
                    ),
                })
                .collect();
            (frame, noisy)
        })
        .collect()
}

/// A complete dataset whose first pose is the identity.
///
/// Poses and landmarks are re-expressed in the first camera's frame, so the
/// gauge anchor placed on frame 0 agrees with the ground truth.
pub fn synthetic_dataset(config: &SceneConfig) -> Dataset {
    let camera = CameraModel {
        calibration: Calibration::simple(
            config.focal_length,
            config.image_width,
            config.image_height,
        ),
        image_width: config.image_width,
        image_height: config.image_height,
    };

    let trajectory = circular_trajectory(config.n_frames, config.radius, config.height, config.arc);
    let origin = trajectory.first().copied().unwrap_or_else(Pose3::identity).inverse();

    let mut dataset = Dataset::new(camera);
    dataset.poses = trajectory
        .iter()
        .enumerate()
        .map(|(i, pose)| (PoseId(i as u32), origin * *pose))
        .collect();
    dataset.landmarks = generate_random_points(config.n_landmarks, config.landmark_bounds, config.seed)
        .into_iter()
        .enumerate()
        .map(|(i, p)| (LandmarkId(i as u32), origin.transform_point(p)))
        .collect();

    let perfect = generate_observations(&dataset.landmarks, &dataset.poses, &dataset.camera);
    dataset.measurements =
        add_pixel_noise(&perfect, config.pixel_noise, config.seed.wrapping_add(1));

    log::debug!(
        "synthetic scene: {} landmarks, {} frames, {} measurements",
        dataset.landmarks.len(),
        dataset.frame_count(),
        dataset.measurement_count()
    );
    dataset
}
