//! Simulation tunables and scenario description types.
//!
//! [`SimulationConfig`] holds the per-instance stability knobs; the remaining
//! types describe a scenario (world terrain + robot) as delivered by an outer
//! loading layer. They derive serde so that layer can deserialize them, but no
//! schema validation happens here beyond the configuration errors reported by
//! [`Simulation::load`](crate::Simulation::load).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// Stability and solver tunables owned by one simulation instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Per-tick linear velocity multiplier, in (0, 1].
    pub linear_damping: f64,
    /// Per-tick angular velocity multiplier, in (0, 1].
    pub angular_damping: f64,
    /// Linear speed ceiling (m/s). Zero or negative disables the clamp.
    pub max_linear_speed: f64,
    /// Angular speed ceiling (rad/s). Zero or negative disables the clamp.
    pub max_angular_speed: f64,
    /// Fraction of the penetration (beyond slop) removed per tick.
    pub contact_correction_percent: f64,
    /// Penetration tolerated without positional correction (m).
    pub contact_slop: f64,
    /// Cap on one positional correction, shared by contacts and joints (m).
    pub max_penetration_correction: f64,
    /// Ceiling on a body's translation in one tick (m). Zero or negative disables.
    pub max_step_translation: f64,
    /// Joint errors below this are ignored (m).
    pub joint_epsilon: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            linear_damping: 0.995,
            angular_damping: 0.995,
            max_linear_speed: 15.0,
            max_angular_speed: 40.0,
            contact_correction_percent: 0.25,
            contact_slop: 0.002,
            max_penetration_correction: 0.05,
            max_step_translation: 0.5,
            joint_epsilon: 1e-5,
        }
    }
}

impl SimulationConfig {
    /// Set both damping factors.
    #[must_use]
    pub fn damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Disable damping (both factors set to 1).
    #[must_use]
    pub fn without_damping(self) -> Self {
        self.damping(1.0, 1.0)
    }

    /// Set the speed ceilings.
    #[must_use]
    pub fn speed_limits(mut self, linear: f64, angular: f64) -> Self {
        self.max_linear_speed = linear;
        self.max_angular_speed = angular;
        self
    }

    /// Set the contact correction fraction and slop.
    #[must_use]
    pub fn contact_correction(mut self, percent: f64, slop: f64) -> Self {
        self.contact_correction_percent = percent;
        self.contact_slop = slop;
        self
    }

    /// Set the per-tick translation ceiling.
    #[must_use]
    pub fn max_step_translation(mut self, limit: f64) -> Self {
        self.max_step_translation = limit;
        self
    }
}

/// Surface properties of a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Coulomb friction coefficient.
    pub friction: f64,
    /// Coefficient of restitution.
    pub restitution: f64,
    /// Wheel traction coefficient; falls back to `friction`.
    pub traction: Option<f64>,
    /// Reflectance seen by line sensors.
    pub reflect_line: f64,
    /// Reflectance seen by distance sensors.
    pub reflect_distance: f64,
    /// Free-form fields. Numeric `line_intensity` becomes a field signal.
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            friction: 0.8,
            restitution: 0.1,
            traction: None,
            reflect_line: 0.5,
            reflect_distance: 0.5,
            custom: BTreeMap::new(),
        }
    }
}

/// Collision shape in the body's local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeConfig {
    /// Polygon outline; the convex hull of the points is used for collision.
    Polygon {
        /// Outline vertices.
        points: Vec<[f64; 2]>,
    },
    /// Circle centered on the body origin.
    Circle {
        /// Radius (m).
        radius: f64,
    },
}

impl ShapeConfig {
    /// Axis-aligned rectangle centered on the origin.
    pub fn rectangle(width: f64, height: f64) -> Self {
        let (hx, hy) = (width / 2.0, height / 2.0);
        Self::Polygon {
            points: vec![[-hx, -hy], [hx, -hy], [hx, hy], [-hx, hy]],
        }
    }
}

/// One rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    /// Unique body name.
    pub name: String,
    /// Collision shape.
    pub shape: ShapeConfig,
    /// Pose; robot bodies are offset by the spawn pose.
    #[serde(default)]
    pub pose: Pose,
    /// Whether the body is dynamic.
    #[serde(default = "default_true")]
    pub can_move: bool,
    /// Mass (kg).
    #[serde(default = "default_one")]
    pub mass: f64,
    /// Moment of inertia (kg·m²).
    #[serde(default = "default_one")]
    pub inertia: f64,
    /// Surface material.
    #[serde(default)]
    pub material: MaterialConfig,
}

impl BodyConfig {
    /// A movable body with unit mass and inertia and the default material.
    pub fn new(name: impl Into<String>, shape: ShapeConfig) -> Self {
        Self {
            name: name.into(),
            shape,
            pose: Pose::origin(),
            can_move: true,
            mass: 1.0,
            inertia: 1.0,
            material: MaterialConfig::default(),
        }
    }

    /// Set the pose.
    #[must_use]
    pub fn at(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Make the body immovable.
    #[must_use]
    pub fn fixed(mut self) -> Self {
        self.can_move = false;
        self
    }

    /// Set mass and inertia.
    #[must_use]
    pub fn mass(mut self, mass: f64, inertia: f64) -> Self {
        self.mass = mass;
        self.inertia = inertia;
        self
    }

    /// Set the material.
    #[must_use]
    pub fn material(mut self, material: MaterialConfig) -> Self {
        self.material = material;
        self
    }
}

/// Joint constraint type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointKind {
    /// Anchors held together.
    #[default]
    Rigid,
    /// Anchors held at a target separation derived from the limits.
    Hinge,
}

/// A compliant constraint between two bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointConfig {
    /// Joint name.
    pub name: String,
    /// Parent body name.
    pub parent: String,
    /// Child body name.
    pub child: String,
    /// Constraint type.
    #[serde(default)]
    pub kind: JointKind,
    /// Anchor in the parent's local frame.
    #[serde(default)]
    pub anchor_parent: [f64; 2],
    /// Anchor in the child's local frame.
    #[serde(default)]
    pub anchor_child: [f64; 2],
    /// Lower limit (m).
    #[serde(default)]
    pub lower_limit: f64,
    /// Upper limit (m).
    #[serde(default)]
    pub upper_limit: f64,
    /// Inverse stiffness; 0 is rigid. Must not be negative.
    #[serde(default)]
    pub compliance: f64,
    /// Damping coefficient.
    #[serde(default = "default_joint_damping")]
    pub damping: f64,
}

impl JointConfig {
    /// A rigid joint with anchors at both body origins.
    pub fn rigid(name: impl Into<String>, parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: parent.into(),
            child: child.into(),
            kind: JointKind::Rigid,
            anchor_parent: [0.0, 0.0],
            anchor_child: [0.0, 0.0],
            lower_limit: 0.0,
            upper_limit: 0.0,
            compliance: 0.0,
            damping: default_joint_damping(),
        }
    }

    /// Set local anchors.
    #[must_use]
    pub fn anchors(mut self, parent: [f64; 2], child: [f64; 2]) -> Self {
        self.anchor_parent = parent;
        self.anchor_child = child;
        self
    }
}

/// Parameters of the force-based wheel motor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelParams {
    /// Drive force at full command (N).
    pub max_force: f64,
    /// Longitudinal friction; defaults to the parent material's traction.
    pub mu_long: Option<f64>,
    /// Lateral friction; defaults to the parent material's friction.
    pub mu_lat: Option<f64>,
    /// Gravity used to derive the normal load (m/s²).
    pub g_equiv: f64,
    /// Explicit per-wheel normal load (N).
    pub normal_force: Option<f64>,
    /// Fraction of the lateral correction withheld, in [0, 1].
    pub lateral_damping: f64,
    /// Wheels sharing the body's weight; counted at attach time when unset.
    pub wheel_count: Option<u32>,
    /// Wheel radius (m).
    pub wheel_radius: f64,
}

impl Default for WheelParams {
    fn default() -> Self {
        Self {
            max_force: 2.0,
            mu_long: None,
            mu_lat: None,
            g_equiv: 9.81,
            normal_force: None,
            lateral_damping: 0.25,
            wheel_count: None,
            wheel_radius: 0.03,
        }
    }
}

/// Motor variant selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum MotorParams {
    /// Force-commanded wheel.
    Wheel(WheelParams),
    /// Torque-commanded wheel configured from a named preset.
    Detailed {
        /// Preset name (`wheel_small`, `wheel_large`).
        preset: String,
    },
}

impl Default for MotorParams {
    fn default() -> Self {
        Self::Wheel(WheelParams::default())
    }
}

/// An actuator mounted on a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorConfig {
    /// Unique device name.
    pub name: String,
    /// Parent body name.
    pub body: String,
    /// Mount pose in the parent's frame.
    #[serde(default)]
    pub mount_pose: Pose,
    /// Motor model.
    #[serde(default)]
    pub params: MotorParams,
}

impl ActuatorConfig {
    /// A default wheel motor.
    pub fn wheel(name: impl Into<String>, body: impl Into<String>, mount_pose: Pose) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            mount_pose,
            params: MotorParams::default(),
        }
    }
}

/// Sensor variant selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorKind {
    /// Forward range finder.
    Distance {
        /// Maximum range (m).
        #[serde(default = "default_range")]
        max_range: f64,
    },
    /// Downward line reflectance probe.
    Line,
    /// Heading, yaw rate and planar acceleration.
    Imu,
    /// Travelled distance and forward speed of the parent body.
    Encoder,
}

/// A sensor mounted on a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Unique device name.
    pub name: String,
    /// Parent body name.
    pub body: String,
    /// Mount pose in the parent's frame.
    #[serde(default)]
    pub mount_pose: Pose,
    /// Sensor model.
    pub kind: SensorKind,
}

/// Everything that belongs to the robot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Offset added to every robot body's configured pose.
    pub spawn_pose: Pose,
    /// Robot bodies.
    pub bodies: Vec<BodyConfig>,
    /// Joints between robot bodies.
    pub joints: Vec<JointConfig>,
    /// Motors.
    pub actuators: Vec<ActuatorConfig>,
    /// Sensors.
    pub sensors: Vec<SensorConfig>,
}

/// Rectangular arena enclosed by static walls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum X (m).
    pub min_x: f64,
    /// Maximum X (m).
    pub max_x: f64,
    /// Minimum Y (m).
    pub min_y: f64,
    /// Maximum Y (m).
    pub max_y: f64,
}

/// A drawn polyline turned into static wall segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallStroke {
    /// Polyline vertices.
    pub points: Vec<[f64; 2]>,
    /// Wall thickness (m).
    #[serde(default = "default_wall_thickness")]
    pub thickness: f64,
}

/// Static environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World name.
    pub name: String,
    /// Gravity (m/s²), ignored in top-down mode.
    pub gravity: [f64; 2],
    /// Default timestep (s).
    pub timestep: f64,
    /// Terrain bodies; always treated as immovable.
    pub terrain: Vec<BodyConfig>,
    /// Optional arena walls.
    pub bounds: Option<Bounds>,
    /// Drawn walls.
    pub walls: Vec<WallStroke>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "world".to_string(),
            gravity: [0.0, 0.0],
            timestep: 1.0 / 120.0,
            terrain: Vec::new(),
            bounds: None,
            walls: Vec::new(),
        }
    }
}

/// A world and the robot placed in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Static environment.
    pub world: WorldConfig,
    /// Robot description.
    pub robot: RobotConfig,
}

/// Options applied when building the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Top-down view: gravity is zeroed.
    pub top_down: bool,
    /// Skip `WorldConfig::terrain`.
    pub ignore_terrain: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            top_down: true,
            ignore_terrain: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}

fn default_joint_damping() -> f64 {
    0.01
}

fn default_range() -> f64 {
    1.0
}

fn default_wall_thickness() -> f64 {
    0.05
}
