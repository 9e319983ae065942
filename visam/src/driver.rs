//! Sequential frame processing against one estimator.

use crate::builder::{BuildError, FrameUpdateBuilder};
use crate::context::RunContext;
use crate::geometry::Measurement;
use crate::keys::FrameId;
use crate::optimization::{EstimatorError, IncrementalEstimator};
use crate::values::Estimate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("frame {}: estimator update failed: {source}", .frame.0)]
    Estimator {
        frame: FrameId,
        source: EstimatorError,
    },
}

impl RunError {
    pub fn frame(&self) -> FrameId {
        match self {
            RunError::Build(BuildError::MissingLandmark { frame, .. })
            | RunError::Build(BuildError::MissingPose { frame })
            | RunError::Estimator { frame, .. } => *frame,
        }
    }
}

/// What happened to one frame, handed to the observer after its update.
#[derive(Debug, Clone)]
pub struct FrameReport<'a> {
    pub frame: FrameId,
    /// Zero-based position of the frame in the run.
    pub index: usize,
    pub measurements: usize,
    pub new_landmarks: usize,
    pub anchored: bool,
    pub estimate: &'a Estimate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub measurements: usize,
    pub landmarks: usize,
    pub poses: usize,
}

/// Owns the estimator and threads the running estimate from frame to frame.
pub struct Driver<'a, E> {
    context: &'a RunContext,
    estimator: E,
    estimate: Estimate,
    frames_done: usize,
}

impl<'a, E: IncrementalEstimator> Driver<'a, E> {
    pub fn new(context: &'a RunContext, estimator: E) -> Self {
        let estimate = estimator.estimate();
        Self {
            context,
            estimator,
            estimate,
            frames_done: 0,
        }
    }

    /// Build and apply one frame. On error the estimate is left as it was.
    pub fn process_frame(
        &mut self,
        frame: FrameId,
        measurements: &[Measurement],
    ) -> Result<FrameReport<'_>, RunError> {
        let addition =
            FrameUpdateBuilder::new(self.context).build(&self.estimate, frame, measurements)?;
        let anchored = addition.pose_priors().next().is_some();
        let new_landmarks = addition.landmark_priors().count();

        self.estimator
            .update(addition)
            .map_err(|source| RunError::Estimator { frame, source })?;
        self.estimate = self.estimator.estimate();

        let index = self.frames_done;
        self.frames_done += 1;
        log::info!(
            "frame {}: {} measurements, {} new landmarks, {} variables",
            frame.0,
            measurements.len(),
            new_landmarks,
            self.estimate.len()
        );

        Ok(FrameReport {
            frame,
            index,
            measurements: measurements.len(),
            new_landmarks,
            anchored,
            estimate: &self.estimate,
        })
    }

    /// Process every frame in increasing id order. The first error aborts.
    pub fn run<F>(&mut self, mut observer: F) -> Result<RunSummary, RunError>
    where
        F: FnMut(&FrameReport<'_>),
    {
        let context = self.context;
        let mut summary = RunSummary::default();

        for (frame, measurements) in context.dataset.frames() {
            let report = self.process_frame(frame, measurements)?;
            summary.frames += 1;
            summary.measurements += report.measurements;
            summary.landmarks += report.new_landmarks;
            observer(&report);
        }
        summary.poses = summary.frames;
        Ok(summary)
    }

    pub fn estimate(&self) -> &Estimate {
        &self.estimate
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn into_estimator(self) -> E {
        self.estimator
    }
}
