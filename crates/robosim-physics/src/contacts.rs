//! Sequential-impulse contact resolution.
//!
//! One pass over every unordered pair, in registry order. Normal impulses act
//! through the body centers only (no angular response), and pairs are not
//! iterated to convergence.

use crate::body::{Body, BodyRegistry};
use crate::colliders::{CollisionBackend, Manifold};
use crate::config::SimulationConfig;
use crate::governor::{sanitize_velocity, WarningSlot};

/// Resolve every overlapping pair that has at least one movable body.
pub fn resolve_contacts(
    bodies: &mut BodyRegistry,
    backend: &dyn CollisionBackend,
    config: &SimulationConfig,
    warnings: &mut WarningSlot,
) {
    let handles = bodies.handles().to_vec();
    for (i, &ha) in handles.iter().enumerate() {
        for &hb in &handles[i + 1..] {
            let manifold = {
                let (Some(a), Some(b)) = (bodies.get(ha), bodies.get(hb)) else {
                    continue;
                };
                if !(a.can_move || b.can_move) {
                    continue;
                }
                match backend.collide(&a.shape, &a.pose, &b.shape, &b.pose) {
                    Some(m) => m,
                    None => continue,
                }
            };
            if let Some((a, b)) = bodies.pair_mut(ha, hb) {
                resolve_pair(a, b, &manifold, config, warnings);
            }
        }
    }
}

/// Positional correction, restitution impulse and Coulomb friction for one pair.
///
/// The manifold normal points from `a` toward `b`.
pub fn resolve_pair(
    a: &mut Body,
    b: &mut Body,
    manifold: &Manifold,
    config: &SimulationConfig,
    warnings: &mut WarningSlot,
) {
    let inv_a = a.inv_mass();
    let inv_b = b.inv_mass();
    let inv_sum = inv_a + inv_b;
    if inv_sum == 0.0 {
        return;
    }
    let n = manifold.normal;

    // Positional correction
    let mut correction = (manifold.penetration - config.contact_slop).max(0.0)
        * config.contact_correction_percent
        / inv_sum;
    correction = correction.min(config.max_penetration_correction);
    if !correction.is_finite() {
        return;
    }
    if a.can_move {
        a.pose = a.pose.translated(-n * correction * inv_a);
    }
    if b.can_move {
        b.pose = b.pose.translated(n * correction * inv_b);
    }

    // Normal impulse
    let vel_along_normal = (b.state.linear_velocity - a.state.linear_velocity).dot(&n);
    if !vel_along_normal.is_finite() || vel_along_normal >= 0.0 {
        return;
    }
    let restitution = a
        .material
        .restitution
        .max(b.material.restitution)
        .clamp(0.0, 1.0);
    let j = -(1.0 + restitution) * vel_along_normal / inv_sum;
    if !j.is_finite() {
        return;
    }
    let impulse = n * j;
    if a.can_move {
        a.state.linear_velocity -= impulse * inv_a;
    }
    if b.can_move {
        b.state.linear_velocity += impulse * inv_b;
    }

    // Friction
    let tangent = nalgebra::Vector2::new(-n.y, n.x);
    let vt = (b.state.linear_velocity - a.state.linear_velocity).dot(&tangent);
    let jt = -vt / inv_sum;
    if !jt.is_finite() {
        return;
    }
    let mu = 0.5 * (a.material.friction + b.material.friction);
    let jt_limit = (mu * j.abs()).abs();
    let t_impulse = tangent * jt.clamp(-jt_limit, jt_limit);
    if a.can_move {
        a.state.linear_velocity -= t_impulse * inv_a;
        sanitize_velocity(a, config, warnings);
    }
    if b.can_move {
        b.state.linear_velocity += t_impulse * inv_b;
        sanitize_velocity(b, config, warnings);
    }
}
