//! Shared fixtures for unit tests.

use crate::camera::{CameraModel, Calibration};
use crate::context::RunContext;
use crate::dataset::Dataset;
use crate::geometry::{project_world_point, Measurement};
use crate::keys::{LandmarkId, PoseId};
use crate::math::{Pose3, SO3};
use crate::noise::NoiseConfig;
use crate::optimization::{IncrementalAddition, IncrementalEstimator, Result};
use crate::values::{Estimate, Values};
use visam_solver::math3d::Vec3;

fn measure(dataset: &Dataset, frame: PoseId, landmark: LandmarkId) -> Measurement {
    let pixel = project_world_point(
        &dataset.camera.calibration,
        &dataset.poses[&frame],
        dataset.landmarks[&landmark],
    )
    .unwrap();
    Measurement {
        landmark,
        pixel,
    }
}

/// Frames 0, 1, 2; landmarks 10 and 20 seen from frames 0 and 1, landmark
/// 30 first seen from frame 2.
pub fn scenario_a() -> RunContext {
    let camera = CameraModel {
        calibration: Calibration::simple(500.0, 640.0, 480.0),
        image_width: 640.0,
        image_height: 480.0,
    };
    let mut dataset = Dataset::new(camera);
    dataset.landmarks.insert(LandmarkId(10), Vec3::new(-0.5, 0.2, 5.0));
    dataset.landmarks.insert(LandmarkId(20), Vec3::new(0.6, -0.3, 6.0));
    dataset.landmarks.insert(LandmarkId(30), Vec3::new(0.1, 0.4, 4.0));

    for i in 0..3 {
        let pose = Pose3::from_rotation_translation(
            SO3::identity(),
            Vec3::new(0.5 * i as f64, 0.0, 0.0),
        );
        dataset.poses.insert(PoseId(i), pose);
    }

    let observed: [(u32, &[u32]); 3] = [(0, &[10, 20]), (1, &[20, 10]), (2, &[10, 20, 30])];
    for (frame, landmarks) in observed {
        let list = landmarks
            .iter()
            .map(|&l| measure(&dataset, PoseId(frame), LandmarkId(l)))
            .collect();
        dataset.measurements.insert(PoseId(frame), list);
    }

    RunContext::new(dataset, NoiseConfig::default())
}

/// Snapshot holding the ground-truth values of the given keys.
pub fn snapshot_with(context: &RunContext, poses: &[PoseId], landmarks: &[LandmarkId]) -> Estimate {
    let mut values = Values::new();
    for id in poses {
        values.insert_pose(*id, context.dataset.poses[id]);
    }
    for id in landmarks {
        values.insert_point(*id, context.dataset.landmarks[id]);
    }
    Estimate::new(values)
}

/// Estimator that records every addition and echoes initial values back.
#[derive(Default)]
pub struct RecordingEstimator {
    pub additions: Vec<IncrementalAddition>,
    values: Values,
}

impl IncrementalEstimator for RecordingEstimator {
    fn update(&mut self, addition: IncrementalAddition) -> Result<()> {
        self.values.extend(addition.initial_values.clone());
        self.additions.push(addition);
        Ok(())
    }

    fn estimate(&self) -> Estimate {
        Estimate::new(self.values.clone())
    }
}
