//! Rigid bodies and the name-keyed body registry.

use std::collections::{BTreeMap, HashMap};

use nalgebra::{Point2, Vector2};
use slotmap::{new_key_type, SlotMap};

use crate::colliders::BodyShape;
use crate::config::{BodyConfig, MaterialConfig};
use crate::error::PhysicsError;
use crate::pose::Pose;

new_key_type! {
    /// Stable handle to a body inside one registry build.
    pub struct BodyHandle;
}

/// Surface properties resolved from a [`MaterialConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Coulomb friction coefficient.
    pub friction: f64,
    /// Coefficient of restitution.
    pub restitution: f64,
    /// Wheel traction coefficient.
    pub traction: f64,
    /// Scalar signals sensed by probes (e.g. `line_intensity`).
    pub field_signals: BTreeMap<String, f64>,
}

impl From<&MaterialConfig> for Material {
    fn from(cfg: &MaterialConfig) -> Self {
        let field_signals = cfg
            .custom
            .get("line_intensity")
            .and_then(|v| v.as_f64())
            .map(|v| BTreeMap::from([("line_intensity".to_string(), v)]))
            .unwrap_or_default();
        Self {
            friction: cfg.friction,
            restitution: cfg.restitution,
            traction: cfg.traction.unwrap_or(cfg.friction),
            field_signals,
        }
    }
}

/// Mass properties, velocities and accumulated loads of a body.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicState {
    /// Mass (kg).
    pub mass: f64,
    /// Moment of inertia (kg·m²).
    pub moment_of_inertia: f64,
    /// Linear velocity (m/s).
    pub linear_velocity: Vector2<f64>,
    /// Angular velocity (rad/s).
    pub angular_velocity: f64,
    /// Force accumulated for the current tick (N).
    pub force: Vector2<f64>,
    /// Torque accumulated for the current tick (N·m).
    pub torque: f64,
}

impl DynamicState {
    /// At rest with the given mass properties.
    pub fn new(mass: f64, moment_of_inertia: f64) -> Self {
        Self {
            mass,
            moment_of_inertia,
            linear_velocity: Vector2::zeros(),
            angular_velocity: 0.0,
            force: Vector2::zeros(),
            torque: 0.0,
        }
    }
}

/// A simulated rigid object.
#[derive(Debug, Clone)]
pub struct Body {
    /// Registry key.
    pub name: String,
    /// World pose.
    pub pose: Pose,
    /// Collision shape.
    pub shape: BodyShape,
    /// Surface material.
    pub material: Material,
    /// Whether the body is dynamic.
    pub can_move: bool,
    /// Dynamic state.
    pub state: DynamicState,
}

impl Body {
    /// Build a body from its description, placed at `pose`.
    pub fn from_config(cfg: &BodyConfig, pose: Pose) -> Result<Self, PhysicsError> {
        Ok(Self {
            name: cfg.name.clone(),
            pose,
            shape: BodyShape::from_config(&cfg.shape, &cfg.name)?,
            material: Material::from(&cfg.material),
            can_move: cfg.can_move,
            state: DynamicState::new(cfg.mass, cfg.inertia),
        })
    }

    /// Inverse mass; zero for immovable or massless bodies.
    pub fn inv_mass(&self) -> f64 {
        if self.can_move && self.state.mass > 0.0 {
            1.0 / self.state.mass
        } else {
            0.0
        }
    }

    /// Inverse moment of inertia; zero for immovable bodies or non-positive inertia.
    pub fn inv_inertia(&self) -> f64 {
        if self.can_move && self.state.moment_of_inertia > 0.0 {
            1.0 / self.state.moment_of_inertia
        } else {
            0.0
        }
    }

    /// Whether forces and impulses act on this body.
    pub fn is_dynamic(&self) -> bool {
        self.can_move && self.state.mass > 0.0
    }

    /// Accumulate a force through the center of mass.
    pub fn apply_force(&mut self, force: Vector2<f64>) {
        self.state.force += force;
    }

    /// Apply an impulse at a world point, changing linear and angular velocity.
    pub fn apply_impulse_at(&mut self, impulse: Vector2<f64>, point: Point2<f64>) {
        if !self.is_dynamic() {
            return;
        }
        let r = point - self.pose.position();
        self.state.linear_velocity += impulse * self.inv_mass();
        self.state.angular_velocity += r.perp(&impulse) * self.inv_inertia();
    }

    /// Velocity of a world point rigidly attached to the body.
    pub fn point_velocity(&self, point: Point2<f64>) -> Vector2<f64> {
        let r = point - self.pose.position();
        let omega = self.state.angular_velocity;
        self.state.linear_velocity + Vector2::new(-omega * r.y, omega * r.x)
    }

    /// Effective inverse mass along `axis` for an impulse applied at `point`.
    pub fn inv_mass_at(&self, point: Point2<f64>, axis: Vector2<f64>) -> f64 {
        let r = point - self.pose.position();
        let r_cross_n = r.perp(&axis);
        self.inv_mass() + r_cross_n * r_cross_n * self.inv_inertia()
    }

    /// Discard accumulated force and torque.
    pub fn clear_impulses(&mut self) {
        self.state.force = Vector2::zeros();
        self.state.torque = 0.0;
    }

    /// Zero both velocities.
    pub fn stop(&mut self) {
        self.state.linear_velocity = Vector2::zeros();
        self.state.angular_velocity = 0.0;
    }

    /// Semi-implicit Euler: accumulated loads update velocity, then the new
    /// velocity advances the pose. Accumulators are cleared afterwards.
    pub fn integrate(&mut self, dt: f64) {
        self.state.linear_velocity += self.state.force * self.inv_mass() * dt;
        self.state.angular_velocity += self.state.torque * self.inv_inertia() * dt;
        let v = self.state.linear_velocity;
        self.pose = Pose::new(
            self.pose.x + v.x * dt,
            self.pose.y + v.y * dt,
            self.pose.theta + self.state.angular_velocity * dt,
        );
        self.clear_impulses();
    }
}

/// Owns every body, keyed by name, in insertion order.
///
/// Devices and joints refer to bodies through [`BodyHandle`]s resolved at
/// attach time. The registry is only ever rebuilt wholesale.
#[derive(Debug, Default, Clone)]
pub struct BodyRegistry {
    bodies: SlotMap<BodyHandle, Body>,
    order: Vec<BodyHandle>,
    by_name: HashMap<String, BodyHandle>,
}

impl BodyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a body; names must be unique.
    pub fn insert(&mut self, body: Body) -> Result<BodyHandle, PhysicsError> {
        if self.by_name.contains_key(&body.name) {
            return Err(PhysicsError::DuplicateBody(body.name));
        }
        let name = body.name.clone();
        let handle = self.bodies.insert(body);
        self.order.push(handle);
        self.by_name.insert(name, handle);
        Ok(handle)
    }

    /// Drop every body.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.order.clear();
        self.by_name.clear();
    }

    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no bodies are registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Handle for a body name.
    pub fn handle(&self, name: &str) -> Option<BodyHandle> {
        self.by_name.get(name).copied()
    }

    /// Body by handle.
    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    /// Mutable body by handle.
    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle)
    }

    /// Body by name.
    pub fn by_name(&self, name: &str) -> Option<&Body> {
        self.handle(name).and_then(|h| self.bodies.get(h))
    }

    /// Mutable body by name.
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Body> {
        let handle = self.handle(name)?;
        self.bodies.get_mut(handle)
    }

    /// Two distinct bodies mutably at once.
    pub fn pair_mut(&mut self, a: BodyHandle, b: BodyHandle) -> Option<(&mut Body, &mut Body)> {
        let [a, b] = self.bodies.get_disjoint_mut([a, b])?;
        Some((a, b))
    }

    /// Handles in insertion order.
    pub fn handles(&self) -> &[BodyHandle] {
        &self.order
    }

    /// Bodies in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.order.iter().filter_map(|h| self.bodies.get(*h))
    }

    /// Visit every body mutably in insertion order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Body)) {
        for handle in &self.order {
            if let Some(body) = self.bodies.get_mut(*handle) {
                f(body);
            }
        }
    }
}
