//! Collision shapes and the narrow-phase backend.
//!
//! The stepping engine only needs a contact normal and a penetration depth per
//! overlapping pair; it gets them through [`CollisionBackend`]. The default
//! [`ParryBackend`] answers those queries with parry.

use std::fmt;

use nalgebra::{Isometry2, Point2, Vector2};
use parry2d_f64::query::{self, PointQuery, Ray, RayCast};
use parry2d_f64::shape::SharedShape;

use crate::config::ShapeConfig;
use crate::error::PhysicsError;
use crate::pose::Pose;

/// Minimum half extent of the fallback box for degenerate outlines.
const MIN_HALF_EXTENT: f64 = 1e-4;

/// A body's collision shape: its description plus the prebuilt collider.
#[derive(Clone)]
pub struct BodyShape {
    config: ShapeConfig,
    collider: SharedShape,
}

impl fmt::Debug for BodyShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyShape").field("config", &self.config).finish()
    }
}

impl BodyShape {
    /// Build the collider for a shape description.
    ///
    /// # Arguments
    ///
    /// * `config` - Shape description in the body's local frame
    /// * `name` - Body name for error messages
    pub fn from_config(config: &ShapeConfig, name: &str) -> Result<Self, PhysicsError> {
        let collider = match config {
            ShapeConfig::Circle { radius } => {
                if !(radius.is_finite() && *radius > 0.0) {
                    return Err(PhysicsError::CollisionShape {
                        name: name.to_string(),
                        reason: format!("Invalid circle radius {radius}"),
                    });
                }
                SharedShape::ball(*radius)
            }
            ShapeConfig::Polygon { points } => polygon_collider(points, name)?,
        };
        Ok(Self {
            config: config.clone(),
            collider,
        })
    }

    /// The shape description.
    pub fn config(&self) -> &ShapeConfig {
        &self.config
    }

    /// The prebuilt parry collider.
    pub fn collider(&self) -> &SharedShape {
        &self.collider
    }
}

fn polygon_collider(points: &[[f64; 2]], name: &str) -> Result<SharedShape, PhysicsError> {
    if points.len() < 3 {
        return Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: "Need at least 3 points for a polygon".to_string(),
        });
    }
    if points.iter().flatten().any(|v| !v.is_finite()) {
        return Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: "Non-finite polygon vertex".to_string(),
        });
    }

    let pts: Vec<Point2<f64>> = points.iter().map(|p| Point2::new(p[0], p[1])).collect();

    match SharedShape::convex_hull(&pts) {
        Some(hull) => Ok(hull),
        // Degenerate (collinear) outline
        None => Ok(bounding_box(&pts)),
    }
}

fn bounding_box(points: &[Point2<f64>]) -> SharedShape {
    let mut min = Vector2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Vector2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    let half = ((max - min) / 2.0).map(|h| h.max(MIN_HALF_EXTENT));
    let center = (max + min) / 2.0;
    SharedShape::compound(vec![(
        Isometry2::translation(center.x, center.y),
        SharedShape::cuboid(half.x, half.y),
    )])
}

/// Contact between two overlapping bodies for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Manifold {
    /// Unit contact normal pointing from the first body toward the second.
    pub normal: Vector2<f64>,
    /// Non-negative penetration depth (m).
    pub penetration: f64,
}

/// Narrow-phase geometry queries consumed by the engine and the sensors.
///
/// Implementations must be deterministic for identical inputs. Swapping the
/// two shapes in [`collide`](Self::collide) may only flip the normal.
pub trait CollisionBackend {
    /// Contact between two posed shapes, or `None` if they do not overlap.
    fn collide(&self, a: &BodyShape, pose_a: &Pose, b: &BodyShape, pose_b: &Pose) -> Option<Manifold>;

    /// Distance along a unit ray to the shape, if hit within `max_dist`.
    fn cast_ray(
        &self,
        shape: &BodyShape,
        pose: &Pose,
        origin: Point2<f64>,
        dir: Vector2<f64>,
        max_dist: f64,
    ) -> Option<f64>;

    /// Whether a world point lies inside the posed shape.
    fn contains_point(&self, shape: &BodyShape, pose: &Pose, point: Point2<f64>) -> bool;
}

/// [`CollisionBackend`] built on parry's contact, ray and point queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParryBackend;

impl CollisionBackend for ParryBackend {
    fn collide(&self, a: &BodyShape, pose_a: &Pose, b: &BodyShape, pose_b: &Pose) -> Option<Manifold> {
        let contact = query::contact(
            &pose_a.to_isometry(),
            &*a.collider,
            &pose_b.to_isometry(),
            &*b.collider,
            0.0,
        )
        .ok()
        .flatten()?;

        let normal = contact.normal1.into_inner();
        if !normal.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Manifold {
            normal,
            penetration: (-contact.dist).max(0.0),
        })
    }

    fn cast_ray(
        &self,
        shape: &BodyShape,
        pose: &Pose,
        origin: Point2<f64>,
        dir: Vector2<f64>,
        max_dist: f64,
    ) -> Option<f64> {
        let ray = Ray::new(origin, dir);
        shape
            .collider
            .cast_ray(&pose.to_isometry(), &ray, max_dist, true)
    }

    fn contains_point(&self, shape: &BodyShape, pose: &Pose, point: Point2<f64>) -> bool {
        shape.collider.contains_point(&pose.to_isometry(), &point)
    }
}
