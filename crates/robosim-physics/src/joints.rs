//! Compliant (XPBD-style) distance constraints between robot bodies.

use nalgebra::Point2;

use crate::body::{BodyHandle, BodyRegistry};
use crate::config::{JointConfig, SimulationConfig};
use crate::error::PhysicsError;

/// Added to compliance so a rigid joint does not divide by zero.
const COMPLIANCE_EPSILON: f64 = 1e-9;

/// Added to the anchor separation before normalizing the direction.
const DIRECTION_EPSILON: f64 = 1e-6;

/// A joint bound to the current registry, with its accumulated multiplier.
#[derive(Debug, Clone)]
pub struct JointRuntime {
    /// Static configuration.
    pub config: JointConfig,
    parent: BodyHandle,
    child: BodyHandle,
    /// Accumulated Lagrange multiplier for the current continuous motion.
    pub lambda_accum: f64,
}

impl JointRuntime {
    /// Resolve the joint's bodies in the registry.
    pub fn attach(config: &JointConfig, bodies: &BodyRegistry) -> Result<Self, PhysicsError> {
        if config.compliance < 0.0 || config.compliance.is_nan() {
            return Err(PhysicsError::NegativeCompliance {
                name: config.name.clone(),
                compliance: config.compliance,
            });
        }
        let resolve = |body: &str| {
            bodies.handle(body).ok_or_else(|| PhysicsError::MissingBody {
                kind: "joint",
                name: config.name.clone(),
                body: body.to_string(),
            })
        };
        Ok(Self {
            parent: resolve(&config.parent)?,
            child: resolve(&config.child)?,
            config: config.clone(),
            lambda_accum: 0.0,
        })
    }

    /// Target anchor separation: zero for locked limits, else the upper limit.
    pub fn target_separation(&self) -> f64 {
        if self.config.lower_limit == self.config.upper_limit {
            0.0
        } else {
            self.config.upper_limit
        }
    }

    /// Forget the accumulated constraint history.
    pub fn reset(&mut self) {
        self.lambda_accum = 0.0;
    }
}

/// One XPBD correction per joint.
pub fn solve_joints(
    joints: &mut [JointRuntime],
    bodies: &mut BodyRegistry,
    config: &SimulationConfig,
    dt: f64,
) {
    for joint in joints.iter_mut() {
        let target = joint.target_separation();
        let Some((parent, child)) = bodies.pair_mut(joint.parent, joint.child) else {
            continue;
        };
        if !parent.can_move && !child.can_move {
            continue;
        }

        let [ax, ay] = joint.config.anchor_parent;
        let [bx, by] = joint.config.anchor_child;
        let pa = parent.pose.transform_point(Point2::new(ax, ay));
        let pb = child.pose.transform_point(Point2::new(bx, by));
        let delta = pb - pa;
        let dist = delta.norm();
        let error = dist - target;
        if error.abs() < config.joint_epsilon {
            continue;
        }
        let n = delta / (dist + DIRECTION_EPSILON);

        let inv_a = parent.inv_mass();
        let inv_b = child.inv_mass();
        let w = inv_a + inv_b;
        if w == 0.0 {
            continue;
        }
        let alpha = 1.0 / (joint.config.compliance + COMPLIANCE_EPSILON);
        let dlambda = -error * alpha / (w + alpha * dt * dt);
        if !dlambda.is_finite() {
            continue;
        }
        joint.lambda_accum += dlambda;

        let limit = config.max_penetration_correction;
        let correction = dlambda.clamp(-limit, limit);
        if parent.can_move {
            parent.pose = parent.pose.translated(-n * correction * inv_a);
        }
        if child.can_move {
            child.pose = child.pose.translated(n * correction * inv_b);
        }
    }
}
