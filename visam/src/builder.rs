//! Per-frame construction of the incremental addition.
//!
//! For one frame the builder emits, in order:
//!   1. a projection constraint per measurement, in input order
//!   2. the gauge anchor on the frame's pose, only while the estimate holds no pose
//!   3. the initial value of the frame's pose
//!   4. for every landmark the estimate has not seen yet, its initial value
//!      from the landmark table and an anchor at that same value
//!
//! All table lookups are validated before anything is emitted.

use crate::context::RunContext;
use crate::geometry::Measurement;
use crate::keys::{FrameId, Key, LandmarkId};
use crate::math::Pose3;
use crate::optimization::{
    Factor, IncrementalAddition, LandmarkPriorFactor, PosePriorFactor, ProjectionFactor,
};
use crate::values::{Estimate, Values};
use std::sync::Arc;
use thiserror::Error;

/// Inconsistency between a frame and the ground-truth tables.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("frame {}: measurement references landmark {}, which is not in the landmark table", .frame.0, .landmark.0)]
    MissingLandmark { frame: FrameId, landmark: LandmarkId },

    #[error("frame {}: no pose with this id in the pose table", .frame.0)]
    MissingPose { frame: FrameId },
}

pub struct FrameUpdateBuilder<'a> {
    context: &'a RunContext,
}

impl<'a> FrameUpdateBuilder<'a> {
    pub fn new(context: &'a RunContext) -> Self {
        Self { context }
    }

    /// Build the addition for `frame` against the current `estimate`.
    ///
    /// Pure: the estimate is only queried and the context is read-only.
    pub fn build(
        &self,
        estimate: &Estimate,
        frame: FrameId,
        measurements: &[Measurement],
    ) -> Result<IncrementalAddition, BuildError> {
        let dataset = &self.context.dataset;
        let noise = &self.context.noise;

        let pose = *dataset
            .pose(frame)
            .ok_or(BuildError::MissingPose { frame })?;
        let points = measurements
            .iter()
            .map(|m| {
                dataset
                    .landmark(m.landmark)
                    .copied()
                    .ok_or(BuildError::MissingLandmark {
                        frame,
                        landmark: m.landmark,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut constraints = Vec::with_capacity(measurements.len() * 2 + 1);
        let mut initial_values = Values::new();

        for m in measurements {
            constraints.push(Factor::Projection(ProjectionFactor {
                pose: frame,
                landmark: m.landmark,
                measured: m.pixel,
                noise: Arc::clone(&noise.measurement),
                calibration: Arc::clone(&self.context.calibration),
            }));
        }

        if estimate.has_no_poses() {
            log::debug!("frame {}: anchoring gauge at identity", frame.0);
            constraints.push(Factor::PosePrior(PosePriorFactor {
                pose: frame,
                prior: Pose3::identity(),
                noise: Arc::clone(&noise.pose_prior),
            }));
        }

        initial_values.insert_pose(frame, pose);

        for (m, point) in measurements.iter().zip(points) {
            let key = Key::Landmark(m.landmark);
            if estimate.contains(key) || initial_values.contains(key) {
                continue;
            }
            initial_values.insert_point(m.landmark, point);
            constraints.push(Factor::LandmarkPrior(LandmarkPriorFactor {
                landmark: m.landmark,
                prior: point,
                noise: Arc::clone(&noise.landmark_prior),
            }));
        }

        if measurements.is_empty() {
            log::warn!("frame {} has no measurements", frame.0);
        }
        Ok(IncrementalAddition {
            constraints,
            initial_values,
        })
    }
}
