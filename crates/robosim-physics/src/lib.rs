#![warn(missing_docs)]

//! Fixed-timestep 2D physics for wheeled robots.
//!
//! This crate steps a planar rigid-body world in which a robot made of one or
//! more bodies drives over static terrain, reads its sensors and is commanded
//! by a user controller.
//!
//! # Features
//!
//! - Semi-implicit Euler integration with damping and gravity
//! - Single-pass sequential-impulse contacts with Coulomb friction
//! - Compliant (XPBD-style) distance joints
//! - Friction-cone-limited wheel traction
//! - A safety governor that contains NaNs, runaway speeds and large steps
//! - Snapshots and per-tick trace records for deterministic replay
//!
//! # Example
//!
//! ```ignore
//! use robosim_physics::{LoadOptions, Scenario, Simulation};
//!
//! let scenario: Scenario = serde_json::from_str(&json_str)?;
//! let mut sim = Simulation::load(scenario, LoadOptions::default())?;
//! sim.set_controller(MyController::default());
//!
//! let checkpoint = sim.snapshot();
//! for _ in 0..120 {
//!     sim.step(None);
//! }
//! sim.apply_snapshot(&checkpoint);
//! ```

mod body;
mod colliders;
mod config;
mod contacts;
mod controller;
mod environment;
mod error;
mod governor;
mod integrator;
mod joints;
mod motors;
mod pose;
mod sensors;
mod snapshot;
mod trace;
mod world;

pub use body::{Body, BodyHandle, BodyRegistry, DynamicState, Material};
pub use colliders::{BodyShape, CollisionBackend, Manifold, ParryBackend};
pub use config::{
    ActuatorConfig, BodyConfig, Bounds, JointConfig, JointKind, LoadOptions, MaterialConfig,
    MotorParams, RobotConfig, Scenario, SensorConfig, SensorKind, ShapeConfig, SimulationConfig,
    WallStroke, WheelParams, WorldConfig,
};
pub use contacts::{resolve_contacts, resolve_pair};
pub use controller::{Actuators, Controller, ControllerError, SensorReadings};
pub use error::PhysicsError;
pub use governor::WarningSlot;
pub use joints::{solve_joints, JointRuntime};
pub use motors::{
    solve_wheel_traction, wheel_preset, Motor, MotorModel, Traction, TractionOutcome,
    TractionReport, WheelPreset, WHEEL_PRESETS,
};
pub use pose::Pose;
pub use sensors::{Sensor, SensorModel, SensorReading, SimulationView, LINE_SIGNAL};
pub use snapshot::{BodySnapshot, Snapshot};
pub use trace::{BodyTrace, MotorTrace, TraceCallback, TraceRecord};
pub use world::Simulation;
