use nalgebra::{Quaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::error::{AssemblyError, Result};

/// 3D point in world or element-local coordinates.
pub type Point = nalgebra::Point3<f64>;

/// 3D displacement vector.
pub type Vector = nalgebra::Vector3<f64>;

/// How far a view quaternion's norm may stray from 1 before the pose is
/// rejected as invalid. Accepted quaternions are renormalized on storage.
pub const UNIT_NORM_TOLERANCE: f64 = 1e-5;

/// Rigid placement of a sobject: a translation (`point_of_view`) plus a unit
/// quaternion (`view`, w-x-y-z component order in the public API).
///
/// The view maps world directions into the element's local frame:
/// `local = R(view) * (world - point_of_view)` and the inverse
/// `world = R(view)^-1 * local + point_of_view`. Poses are immutable value
/// types; transforms return new poses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PoseData", into = "PoseData")]
pub struct Pose {
    point_of_view: Point,
    view: UnitQuaternion<f64>,
}

impl Pose {
    /// Pose at the world origin with no rotation.
    pub fn identity() -> Self {
        Self {
            point_of_view: Point::origin(),
            view: UnitQuaternion::identity(),
        }
    }

    /// Builds a pose from a translation and a `[w, x, y, z]` quaternion.
    ///
    /// Fails with [`AssemblyError::InvalidPose`] unless the quaternion norm
    /// is within [`UNIT_NORM_TOLERANCE`] of 1; NaN components are rejected.
    /// Deserialization runs the same check, so every reachable pose holds a
    /// unit view.
    pub fn new(point_of_view: Point, view: [f64; 4]) -> Result<Self> {
        let raw = Quaternion::new(view[0], view[1], view[2], view[3]);
        let norm = raw.norm();
        // Written negated so a NaN norm fails.
        if !((norm - 1.0).abs() <= UNIT_NORM_TOLERANCE) {
            return Err(AssemblyError::InvalidPose { norm });
        }
        Ok(Self {
            point_of_view,
            view: UnitQuaternion::from_quaternion(raw),
        })
    }

    /// Builds a pose from parts that are unit by construction.
    pub fn from_parts(point_of_view: Point, view: UnitQuaternion<f64>) -> Self {
        Self {
            point_of_view,
            view,
        }
    }

    pub fn point_of_view(&self) -> Point {
        self.point_of_view
    }

    pub fn view(&self) -> UnitQuaternion<f64> {
        self.view
    }

    /// View quaternion components in `[w, x, y, z]` order.
    pub fn view_wxyz(&self) -> [f64; 4] {
        let q = self.view.quaternion();
        [q.coords.w, q.coords.x, q.coords.y, q.coords.z]
    }

    /// Same orientation, new translation.
    pub fn with_point_of_view(&self, point_of_view: Point) -> Self {
        Self {
            point_of_view,
            view: self.view,
        }
    }

    /// Maps a world-space point into this pose's local frame, applying the
    /// translation and rotation parts independently per flag.
    ///
    /// The translation is removed first, then the view rotation applied.
    pub fn local_from_world_with(
        &self,
        world: &Point,
        consider_translation: bool,
        consider_rotation: bool,
    ) -> Point {
        let mut v = world.coords;
        if consider_translation {
            v -= self.point_of_view.coords;
        }
        if consider_rotation {
            v = self.view.transform_vector(&v);
        }
        Point::from(v)
    }

    /// Maps a world-space point into the local frame with both parts applied.
    pub fn local_from_world(&self, world: &Point) -> Point {
        self.local_from_world_with(world, true, true)
    }

    /// Maps a local-frame point into world space, applying the translation
    /// and rotation parts independently per flag.
    ///
    /// The inverse view rotation is applied first, then the translation added.
    pub fn world_from_local_with(
        &self,
        local: &Point,
        consider_translation: bool,
        consider_rotation: bool,
    ) -> Point {
        let mut v = local.coords;
        if consider_rotation {
            v = self.view.inverse_transform_vector(&v);
        }
        if consider_translation {
            v += self.point_of_view.coords;
        }
        Point::from(v)
    }

    /// Maps a local-frame point into world space with both parts applied.
    pub fn world_from_local(&self, local: &Point) -> Point {
        self.world_from_local_with(local, true, true)
    }

    /// Composes two poses: `self` is the outer pose, applied after `inner`.
    ///
    /// The result's local-to-world map equals running `inner`'s
    /// local-to-world, then `self`'s. Concretely the translation is
    /// `self.world_from_local(inner.point_of_view)` and the view is the
    /// quaternion product `inner.view * self.view`; that operand order is
    /// part of the contract. Two valid poses compose to a valid pose.
    pub fn compose(&self, inner: &Pose) -> Pose {
        Pose {
            point_of_view: self.world_from_local(&inner.point_of_view),
            view: inner.view * self.view,
        }
    }

    /// Componentwise comparison of translations and of quaternion components
    /// as stored. Sign-sensitive: `q` and `-q` compare unequal.
    pub fn approx_eq(&self, other: &Pose, tolerance: f64) -> bool {
        let dt = self.point_of_view - other.point_of_view;
        if dt.iter().any(|c| c.abs() > tolerance) {
            return false;
        }
        let a = self.view_wxyz();
        let b = other.view_wxyz();
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tolerance)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Raw wire form of a pose; deserialization funnels through [`Pose::new`] so
/// serde input cannot smuggle in a non-unit view.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PoseData {
    point_of_view: [f64; 3],
    view: [f64; 4],
}

impl TryFrom<PoseData> for Pose {
    type Error = AssemblyError;

    fn try_from(data: PoseData) -> Result<Self> {
        let [x, y, z] = data.point_of_view;
        Pose::new(Point::new(x, y, z), data.view)
    }
}

impl From<Pose> for PoseData {
    fn from(pose: Pose) -> Self {
        let p = pose.point_of_view;
        PoseData {
            point_of_view: [p.x, p.y, p.z],
            view: pose.view_wxyz(),
        }
    }
}
