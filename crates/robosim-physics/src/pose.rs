//! Planar poses (position + heading).

use nalgebra::{Isometry2, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// A 2D pose: position in meters and heading in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// X position (m).
    pub x: f64,
    /// Y position (m).
    pub y: f64,
    /// Heading (rad, counter-clockwise from +X).
    pub theta: f64,
}

impl Pose {
    /// Create a pose from its components.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// The origin pose.
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Position as a point.
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Unit vector along the heading.
    pub fn heading(&self) -> Vector2<f64> {
        Vector2::new(self.theta.cos(), self.theta.sin())
    }

    /// Transform a point from this pose's local frame into the parent frame.
    pub fn transform_point(&self, local: Point2<f64>) -> Point2<f64> {
        let (s, c) = self.theta.sin_cos();
        Point2::new(
            self.x + c * local.x - s * local.y,
            self.y + s * local.x + c * local.y,
        )
    }

    /// Compose a child pose expressed in this pose's frame.
    pub fn compose(&self, child: &Pose) -> Pose {
        let p = self.transform_point(child.position());
        Pose::new(p.x, p.y, self.theta + child.theta)
    }

    /// Translate by a world-frame offset, keeping the heading.
    pub fn translated(&self, offset: Vector2<f64>) -> Pose {
        Pose::new(self.x + offset.x, self.y + offset.y, self.theta)
    }

    /// Component-wise sum, used for spawn offsets.
    pub fn offset_by(&self, other: &Pose) -> Pose {
        Pose::new(self.x + other.x, self.y + other.y, self.theta + other.theta)
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }

    /// Convert to a nalgebra isometry for collision queries.
    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.x, self.y), self.theta)
    }
}

impl From<(f64, f64, f64)> for Pose {
    fn from((x, y, theta): (f64, f64, f64)) -> Self {
        Self::new(x, y, theta)
    }
}
