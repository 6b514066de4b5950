//! Point-in-time captures of simulation state.

use std::collections::BTreeMap;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::body::{Body, BodyRegistry};
use crate::pose::Pose;

/// Pose and velocities of one body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    /// World pose.
    pub pose: Pose,
    /// Linear velocity (m/s).
    pub linear_velocity: [f64; 2],
    /// Angular velocity (rad/s).
    pub angular_velocity: f64,
}

impl From<&Body> for BodySnapshot {
    fn from(body: &Body) -> Self {
        let v = body.state.linear_velocity;
        Self {
            pose: body.pose,
            linear_velocity: [v.x, v.y],
            angular_velocity: body.state.angular_velocity,
        }
    }
}

/// Simulated time, step index, per-body state and optional controller state.
///
/// Snapshots hold plain values only and can outlive the registry they were
/// taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulated time (s).
    pub time: f64,
    /// Step index.
    pub step: u64,
    /// Body state by name.
    pub bodies: BTreeMap<String, BodySnapshot>,
    /// Opaque controller state.
    #[serde(default)]
    pub controller_state: Option<serde_json::Value>,
}

impl Snapshot {
    /// Capture every body in `bodies`.
    pub fn capture(
        time: f64,
        step: u64,
        bodies: &BodyRegistry,
        controller_state: Option<serde_json::Value>,
    ) -> Self {
        Self {
            time,
            step,
            bodies: bodies
                .iter()
                .map(|b| (b.name.clone(), BodySnapshot::from(b)))
                .collect(),
            controller_state,
        }
    }

    /// Overwrite pose and velocities of every body present in both the
    /// snapshot and the registry. Returns how many bodies were restored.
    pub fn restore_bodies(&self, bodies: &mut BodyRegistry) -> usize {
        let mut restored = 0;
        for (name, state) in &self.bodies {
            let Some(body) = bodies.by_name_mut(name) else {
                continue;
            };
            body.pose = state.pose;
            body.state.linear_velocity = Vector2::from(state.linear_velocity);
            body.state.angular_velocity = state.angular_velocity;
            restored += 1;
        }
        restored
    }
}
