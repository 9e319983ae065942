//! Ground-truth tables for a run.

use crate::camera::{CameraModel, SharedCalibration};
use crate::geometry::Measurement;
use crate::keys::{FrameId, LandmarkId, PoseId};
use crate::math::{Point3, Pose3};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Calibration, landmark, pose and measurement tables.
///
/// Loaded once before the run and read-only afterwards. Frames are ordered
/// by id regardless of the order they appeared in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub camera: CameraModel,
    pub landmarks: BTreeMap<LandmarkId, Point3>,
    pub poses: BTreeMap<PoseId, Pose3>,
    pub measurements: BTreeMap<FrameId, Vec<Measurement>>,
}

impl Dataset {
    pub fn new(camera: CameraModel) -> Self {
        Self {
            camera,
            landmarks: BTreeMap::new(),
            poses: BTreeMap::new(),
            measurements: BTreeMap::new(),
        }
    }

    pub fn shared_calibration(&self) -> SharedCalibration {
        Arc::new(self.camera.calibration)
    }

    pub fn landmark(&self, id: LandmarkId) -> Option<&Point3> {
        self.landmarks.get(&id)
    }

    pub fn pose(&self, id: PoseId) -> Option<&Pose3> {
        self.poses.get(&id)
    }

    pub fn frame_count(&self) -> usize {
        self.measurements.len()
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.values().map(Vec::len).sum()
    }

    /// Frames in increasing id order.
    pub fn frames(&self) -> impl Iterator<Item = (FrameId, &[Measurement])> + '_ {
        self.measurements.iter().map(|(id, m)| (*id, m.as_slice()))
    }
}
