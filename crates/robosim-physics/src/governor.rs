//! Safety governor: contains non-finite values and runaway motion.
//!
//! Every check recovers in place (zero, clamp or roll back) and records a
//! warning. Only the latest warning is kept; history belongs to the trace log.

use slotmap::SecondaryMap;

use crate::body::{Body, BodyHandle, BodyRegistry};
use crate::config::SimulationConfig;
use crate::pose::Pose;

/// Most recent physics warning (last write wins).
#[derive(Debug, Default, Clone)]
pub struct WarningSlot {
    last: Option<String>,
}

impl WarningSlot {
    /// Record a warning, replacing the previous one.
    pub fn flag(&mut self, message: String) {
        tracing::warn!("{message}");
        self.last = Some(message);
    }

    /// The latest warning, if any.
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Forget the latest warning.
    pub fn clear(&mut self) {
        self.last = None;
    }
}

/// Reset non-finite velocities and clamp speeds to the configured ceilings.
pub fn sanitize_velocity(body: &mut Body, config: &SimulationConfig, warnings: &mut WarningSlot) {
    let v = body.state.linear_velocity;
    if !(v.x.is_finite() && v.y.is_finite()) {
        body.state.linear_velocity.fill(0.0);
        warnings.flag(format!("{}: reset invalid linear velocity", body.name));
    }
    if !body.state.angular_velocity.is_finite() {
        body.state.angular_velocity = 0.0;
        warnings.flag(format!("{}: reset invalid angular velocity", body.name));
    }

    let speed = body.state.linear_velocity.norm();
    if config.max_linear_speed > 0.0 && speed > config.max_linear_speed {
        body.state.linear_velocity *= config.max_linear_speed / speed.max(1e-9);
        warnings.flag(format!(
            "{}: clamped linear speed to {:.2} m/s",
            body.name, config.max_linear_speed
        ));
    }
    let omega = body.state.angular_velocity;
    if config.max_angular_speed > 0.0 && omega.abs() > config.max_angular_speed {
        body.state.angular_velocity = config.max_angular_speed.copysign(omega);
        warnings.flag(format!(
            "{}: clamped angular speed to {:.2} rad/s",
            body.name, config.max_angular_speed
        ));
    }
}

/// Reset a non-finite pose to the origin.
pub fn sanitize_pose(body: &mut Body, warnings: &mut WarningSlot) {
    if !body.pose.is_finite() {
        body.pose = Pose::origin();
        warnings.flag(format!("{}: reset pose due to invalid values", body.name));
    }
}

/// Pose of every body before the tick, for displacement checks.
pub fn capture_poses(bodies: &BodyRegistry) -> SecondaryMap<BodyHandle, Pose> {
    let mut poses = SecondaryMap::with_capacity(bodies.len());
    for &handle in bodies.handles() {
        if let Some(body) = bodies.get(handle) {
            poses.insert(handle, body.pose);
        }
    }
    poses
}

/// Final pass of the tick: re-sanitize every movable body and limit its
/// translation relative to the pre-step pose.
pub fn enforce(
    bodies: &mut BodyRegistry,
    prev_poses: &SecondaryMap<BodyHandle, Pose>,
    config: &SimulationConfig,
    dt: f64,
    warnings: &mut WarningSlot,
) {
    let handles = bodies.handles().to_vec();
    for handle in handles {
        let Some(body) = bodies.get_mut(handle) else {
            continue;
        };
        if !body.can_move {
            continue;
        }
        sanitize_velocity(body, config, warnings);
        sanitize_pose(body, warnings);
        if let Some(prev) = prev_poses.get(handle) {
            limit_step(body, prev, config, dt, warnings);
        }
    }
}

fn limit_step(body: &mut Body, prev: &Pose, config: &SimulationConfig, dt: f64, warnings: &mut WarningSlot) {
    let limit = config.max_step_translation;
    if limit <= 0.0 {
        return;
    }
    let delta = body.pose.position() - prev.position();
    let dist = delta.norm();
    if !dist.is_finite() {
        body.pose = *prev;
        warnings.flag(format!("{}: invalid step distance; resetting pose", body.name));
        sanitize_pose(body, warnings);
        return;
    }
    if dist > limit {
        warnings.flag(format!(
            "{}: large step {:.3} m (dt={:.4}) clamped",
            body.name, dist, dt
        ));
        let scaled = delta * (limit / dist);
        body.pose = Pose::new(prev.x + scaled.x, prev.y + scaled.y, body.pose.theta);
    }
}
