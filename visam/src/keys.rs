//! Variable keys.
//!
//! Pose and landmark ids are both plain integers in the data files. They are
//! wrapped in distinct newtypes and tagged by `Key` so one can never be
//! looked up as the other.

use std::fmt;

/// Id of a camera pose. A frame is identified by the pose it introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoseId(pub u32);

/// Id of a 3D landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LandmarkId(pub u32);

/// A frame id is the id of its pose.
pub type FrameId = PoseId;

/// Type-tagged variable key.
///
/// Ordering puts every pose before every landmark, then sorts by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Pose(PoseId),
    Landmark(LandmarkId),
}

impl Key {
    /// Tangent-space dimension of the variable.
    pub fn dim(self) -> usize {
        match self {
            Key::Pose(_) => 6,
            Key::Landmark(_) => 3,
        }
    }

    pub fn is_pose(self) -> bool {
        matches!(self, Key::Pose(_))
    }
}

impl From<PoseId> for Key {
    fn from(id: PoseId) -> Self {
        Key::Pose(id)
    }
}

impl From<LandmarkId> for Key {
    fn from(id: LandmarkId) -> Self {
        Key::Landmark(id)
    }
}

impl fmt::Display for PoseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Pose(id) => write!(f, "{id}"),
            Key::Landmark(id) => write!(f, "{id}"),
        }
    }
}
