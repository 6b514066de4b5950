//! Force application, damping and pose integration.

use nalgebra::Vector2;

use crate::body::BodyRegistry;
use crate::config::SimulationConfig;
use crate::governor::{sanitize_pose, sanitize_velocity, WarningSlot};

/// Advance every dynamic body by `dt`.
///
/// Gravity is added as a force, velocities are damped and sanitized, then the
/// body is integrated with semi-implicit Euler. Immovable or massless bodies
/// are not integrated and lose whatever loads were accumulated on them.
pub fn integrate_bodies(
    bodies: &mut BodyRegistry,
    gravity: Vector2<f64>,
    config: &SimulationConfig,
    dt: f64,
    warnings: &mut WarningSlot,
) {
    bodies.for_each_mut(|body| {
        if !body.is_dynamic() {
            body.clear_impulses();
            return;
        }
        body.apply_force(gravity * body.state.mass);
        body.state.linear_velocity *= config.linear_damping;
        body.state.angular_velocity *= config.angular_damping;
        sanitize_velocity(body, config, warnings);
        body.integrate(dt);
        sanitize_pose(body, warnings);
    });
}
