//! Variable assignments and the read-only estimate snapshot.

use crate::keys::{Key, LandmarkId, PoseId};
use crate::math::{Point3, Pose3};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Pose(Pose3),
    Point(Point3),
}

/// Ordered map from key to value. Iteration is poses by id, then landmarks by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    entries: BTreeMap<Key, Value>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous value if the pose was already present.
    pub fn insert_pose(&mut self, id: PoseId, pose: Pose3) -> Option<Value> {
        self.entries.insert(Key::Pose(id), Value::Pose(pose))
    }

    /// Returns the previous value if the landmark was already present.
    pub fn insert_point(&mut self, id: LandmarkId, point: Point3) -> Option<Value> {
        self.entries.insert(Key::Landmark(id), Value::Point(point))
    }

    pub fn contains(&self, key: Key) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn get(&self, key: Key) -> Option<&Value> {
        self.entries.get(&key)
    }

    pub fn pose(&self, id: PoseId) -> Option<&Pose3> {
        match self.entries.get(&Key::Pose(id)) {
            Some(Value::Pose(p)) => Some(p),
            _ => None,
        }
    }

    pub fn point(&self, id: LandmarkId) -> Option<&Point3> {
        match self.entries.get(&Key::Landmark(id)) {
            Some(Value::Point(p)) => Some(p),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &Value)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pose_count(&self) -> usize {
        self.entries.keys().filter(|k| k.is_pose()).count()
    }

    /// Move every entry of `other` into `self`, overwriting on collision.
    pub fn extend(&mut self, other: Values) {
        self.entries.extend(other.entries);
    }

    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut Value> {
        self.entries.get_mut(&key)
    }
}

impl FromIterator<(Key, Value)> for Values {
    fn from_iter<I: IntoIterator<Item = (Key, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Immutable view of the estimator's current values.
///
/// Cheap to clone; supports membership and lookup only. A new snapshot
/// replaces the old one after every accepted update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Estimate {
    values: Arc<Values>,
}

impl Estimate {
    pub fn new(values: Values) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    pub fn contains(&self, key: impl Into<Key>) -> bool {
        self.values.contains(key.into())
    }

    pub fn pose(&self, id: PoseId) -> Option<&Pose3> {
        self.values.pose(id)
    }

    pub fn point(&self, id: LandmarkId) -> Option<&Point3> {
        self.values.point(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &Value)> + '_ {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when no pose has been introduced yet.
    pub fn has_no_poses(&self) -> bool {
        self.values.pose_count() == 0
    }

    pub fn values(&self) -> &Values {
        &self.values
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Values with {} values:", self.len())?;
        for (key, value) in self.iter() {
            match value {
                Value::Pose(pose) => writeln!(f, "Value {}: {}", key, pose)?,
                Value::Point(p) => writeln!(f, "Value {}: [{:.6}, {:.6}, {:.6}]", key, p.x, p.y, p.z)?,
            }
        }
        Ok(())
    }
}
