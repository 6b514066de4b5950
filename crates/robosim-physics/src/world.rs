//! Simulation ownership, registry assembly and the per-tick pipeline.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use nalgebra::Vector2;

use crate::body::{Body, BodyHandle, BodyRegistry};
use crate::colliders::{CollisionBackend, ParryBackend};
use crate::config::{
    ActuatorConfig, BodyConfig, LoadOptions, RobotConfig, Scenario, SensorConfig, SimulationConfig,
    WorldConfig,
};
use crate::contacts::resolve_contacts;
use crate::controller::{panic_message, Actuators, Controller, SensorReadings};
use crate::environment::{bound_walls, stroke_walls};
use crate::error::PhysicsError;
use crate::governor::{self, capture_poses, WarningSlot};
use crate::integrator::integrate_bodies;
use crate::joints::{solve_joints, JointRuntime};
use crate::motors::Motor;
use crate::pose::Pose;
use crate::sensors::{Sensor, SimulationView};
use crate::snapshot::Snapshot;
use crate::trace::{TraceCallback, TraceLog, TraceRecord};

/// Everything built from a world + robot description.
struct Assembly {
    bodies: BodyRegistry,
    joints: Vec<JointRuntime>,
    motors: Vec<Motor>,
    sensors: Vec<Sensor>,
}

impl Assembly {
    fn build(world: &WorldConfig, robot: &RobotConfig, options: LoadOptions) -> Result<Self, PhysicsError> {
        check_device_names(robot)?;

        let mut bodies = BodyRegistry::new();
        if !options.ignore_terrain {
            for cfg in &world.terrain {
                let mut body = Body::from_config(cfg, cfg.pose)?;
                body.can_move = false;
                bodies.insert(body)?;
            }
        }
        let environment = world
            .bounds
            .iter()
            .flat_map(bound_walls)
            .chain(stroke_walls(&world.walls));
        for cfg in environment {
            bodies.insert(Body::from_config(&cfg, cfg.pose)?)?;
        }
        for cfg in &robot.bodies {
            bodies.insert(Body::from_config(cfg, cfg.pose.offset_by(&robot.spawn_pose))?)?;
        }

        let joints = robot
            .joints
            .iter()
            .map(|cfg| JointRuntime::attach(cfg, &bodies))
            .collect::<Result<Vec<_>, _>>()?;

        let mut motors: Vec<Motor> = Vec::with_capacity(robot.actuators.len());
        let mut wheels_per_body: HashMap<BodyHandle, u32> = HashMap::new();
        for cfg in &robot.actuators {
            let on_parent = bodies
                .handle(&cfg.body)
                .and_then(|h| wheels_per_body.get(&h).copied())
                .unwrap_or(0);
            let motor = Motor::attach(cfg, &bodies, on_parent)?;
            *wheels_per_body.entry(motor.parent()).or_default() += 1;
            motors.push(motor);
        }

        let sensors = robot
            .sensors
            .iter()
            .map(|cfg| Sensor::attach(cfg, &bodies))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            bodies,
            joints,
            motors,
            sensors,
        })
    }
}

fn check_device_names(robot: &RobotConfig) -> Result<(), PhysicsError> {
    let mut seen = HashSet::new();
    let names = robot
        .actuators
        .iter()
        .map(|a| &a.name)
        .chain(robot.sensors.iter().map(|s| &s.name));
    for name in names {
        if !seen.insert(name) {
            return Err(PhysicsError::DuplicateDevice(name.clone()));
        }
    }
    Ok(())
}

/// A loaded scenario and its stepping state.
///
/// Built once per scenario by [`Simulation::load`]; any body or device edit
/// rebuilds the whole registry and carries live body state over by name.
pub struct Simulation {
    config: SimulationConfig,
    backend: Box<dyn CollisionBackend>,
    world: WorldConfig,
    robot: RobotConfig,
    options: LoadOptions,
    gravity: Vector2<f64>,
    dt: f64,
    time: f64,
    step_index: u64,
    bodies: BodyRegistry,
    joints: Vec<JointRuntime>,
    motors: Vec<Motor>,
    sensors: Vec<Sensor>,
    controller: Option<Box<dyn Controller>>,
    last_controller_error: Option<String>,
    last_sensor_readings: SensorReadings,
    last_motor_commands: BTreeMap<String, f64>,
    warnings: WarningSlot,
    trace: TraceLog,
}

impl Simulation {
    /// Load a scenario with default tunables.
    pub fn load(scenario: Scenario, options: LoadOptions) -> Result<Self, PhysicsError> {
        Self::load_with_config(scenario, options, SimulationConfig::default())
    }

    /// Load a scenario with explicit tunables.
    ///
    /// Fails on any configuration error: a device or joint naming a missing
    /// body, duplicate names, negative joint compliance, an invalid shape or
    /// an unknown motor preset.
    pub fn load_with_config(
        scenario: Scenario,
        options: LoadOptions,
        config: SimulationConfig,
    ) -> Result<Self, PhysicsError> {
        let Scenario { world, robot } = scenario;
        let assembly = Assembly::build(&world, &robot, options)?;
        let gravity = if options.top_down {
            Vector2::zeros()
        } else {
            Vector2::from(world.gravity)
        };
        tracing::debug!(
            world = %world.name,
            bodies = assembly.bodies.len(),
            joints = assembly.joints.len(),
            motors = assembly.motors.len(),
            sensors = assembly.sensors.len(),
            "Loaded scenario"
        );

        Ok(Self {
            config,
            backend: Box::new(ParryBackend),
            dt: world.timestep,
            world,
            robot,
            options,
            gravity,
            time: 0.0,
            step_index: 0,
            bodies: assembly.bodies,
            joints: assembly.joints,
            motors: assembly.motors,
            sensors: assembly.sensors,
            controller: None,
            last_controller_error: None,
            last_sensor_readings: SensorReadings::new(),
            last_motor_commands: BTreeMap::new(),
            warnings: WarningSlot::default(),
            trace: TraceLog::default(),
        })
    }

    /// Replace the narrow-phase backend.
    #[must_use]
    pub fn with_backend(mut self, backend: impl CollisionBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    /// Install the controller invoked each tick. Clears any pending controller error.
    pub fn set_controller(&mut self, controller: impl Controller + 'static) {
        self.controller = Some(Box::new(controller));
        self.last_controller_error = None;
    }

    /// Remove the controller.
    pub fn clear_controller(&mut self) {
        self.controller = None;
    }

    /// Advance one tick of `dt` seconds (the scenario timestep if `None`).
    ///
    /// Never fails: controller failures and numerical trouble are recorded
    /// and surfaced through [`last_controller_error`](Self::last_controller_error)
    /// and [`last_physics_warning`](Self::last_physics_warning).
    pub fn step(&mut self, dt: Option<f64>) {
        let dt = dt.unwrap_or(self.dt);
        self.warnings.clear();
        let prev_poses = capture_poses(&self.bodies);

        let view = SimulationView::new(&self.bodies, self.backend.as_ref(), self.time);
        self.last_sensor_readings = self
            .sensors
            .iter_mut()
            .filter_map(|sensor| {
                let reading = sensor.read(&view, dt)?;
                Some((sensor.name.clone(), reading))
            })
            .collect();

        self.tick_controller(dt);

        integrate_bodies(&mut self.bodies, self.gravity, &self.config, dt, &mut self.warnings);
        solve_joints(&mut self.joints, &mut self.bodies, &self.config, dt);
        resolve_contacts(
            &mut self.bodies,
            self.backend.as_ref(),
            &self.config,
            &mut self.warnings,
        );
        governor::enforce(&mut self.bodies, &prev_poses, &self.config, dt, &mut self.warnings);

        self.last_motor_commands = self
            .motors
            .iter()
            .map(|m| (m.name.clone(), m.last_command))
            .collect();
        if self.trace.is_enabled() {
            let record = TraceRecord::capture(self.step_index, self.time, dt, &self.motors, &self.bodies);
            self.trace.push(record);
        }
        self.time += dt;
        self.step_index += 1;
    }

    fn tick_controller(&mut self, dt: f64) {
        if self.last_controller_error.is_some() {
            return;
        }
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let readings = &self.last_sensor_readings;
        let mut actuators = Actuators::new(&mut self.motors, &mut self.bodies, dt, self.step_index);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            controller.update(readings, &mut actuators, dt)
        }));
        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(&*payload),
        };
        tracing::warn!(step = self.step_index, error = %failure, "Controller failed; pausing until cleared");
        self.last_controller_error = Some(failure);
    }

    /// Capture time, step index, every body's state and the controller state.
    ///
    /// A controller that fails to save its state yields `controller_state: None`.
    pub fn snapshot(&self) -> Snapshot {
        let controller_state = self.controller.as_ref().and_then(|c| match c.save_state() {
            Ok(state) => state,
            Err(err) => {
                tracing::debug!(error = %err, "Controller state not captured");
                None
            }
        });
        Snapshot::capture(self.time, self.step_index, &self.bodies, controller_state)
    }

    /// Restore time, step index and the state of every body still present.
    /// Sensor history starts over.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.time = snapshot.time;
        self.step_index = snapshot.step;
        let restored = snapshot.restore_bodies(&mut self.bodies);
        self.sensors.iter_mut().for_each(Sensor::reset);
        if let (Some(controller), Some(state)) = (self.controller.as_mut(), snapshot.controller_state.as_ref()) {
            if let Err(err) = controller.restore_state(state) {
                tracing::debug!(error = %err, "Controller state not restored");
            }
        }
        tracing::debug!(
            step = snapshot.step,
            restored,
            skipped = snapshot.bodies.len() - restored,
            "Applied snapshot"
        );
    }

    /// Move every robot body to its configured pose offset by `pose`.
    ///
    /// Joint multipliers and sensor state are always reset; velocities and
    /// accumulated loads only when `zero_velocity` is set.
    pub fn reposition_robot(&mut self, pose: Pose, zero_velocity: bool, set_as_spawn: bool) {
        for cfg in &self.robot.bodies {
            let Some(body) = self.bodies.by_name_mut(&cfg.name) else {
                continue;
            };
            body.pose = cfg.pose.offset_by(&pose);
            if zero_velocity {
                body.stop();
                body.clear_impulses();
            }
        }
        if set_as_spawn {
            self.robot.spawn_pose = pose;
        }
        for joint in &mut self.joints {
            joint.reset();
        }
        self.sensors.iter_mut().for_each(Sensor::reset);
    }

    /// Return the robot to its spawn pose at rest.
    pub fn reset_to_spawn(&mut self) {
        self.reposition_robot(self.robot.spawn_pose, true, false);
    }

    // --- Registry edits ---------------------------------------------------

    /// Add a body to the robot.
    pub fn add_robot_body(&mut self, body: BodyConfig) -> Result<(), PhysicsError> {
        let mut robot = self.robot.clone();
        robot.bodies.push(body);
        self.rebuild(robot)
    }

    /// Remove a robot body together with the joints and devices attached to it.
    pub fn remove_robot_body(&mut self, name: &str) -> Result<(), PhysicsError> {
        let mut robot = self.robot.clone();
        let before = robot.bodies.len();
        robot.bodies.retain(|b| b.name != name);
        if robot.bodies.len() == before {
            return Err(PhysicsError::NotFound(name.to_string()));
        }
        robot.joints.retain(|j| j.parent != name && j.child != name);
        robot.actuators.retain(|a| a.body != name);
        robot.sensors.retain(|s| s.body != name);
        self.rebuild(robot)
    }

    /// Mount an actuator on the robot.
    pub fn add_actuator(&mut self, actuator: ActuatorConfig) -> Result<(), PhysicsError> {
        let mut robot = self.robot.clone();
        robot.actuators.push(actuator);
        self.rebuild(robot)
    }

    /// Mount a sensor on the robot.
    pub fn add_sensor(&mut self, sensor: SensorConfig) -> Result<(), PhysicsError> {
        let mut robot = self.robot.clone();
        robot.sensors.push(sensor);
        self.rebuild(robot)
    }

    /// Remove an actuator or sensor by name.
    pub fn remove_device(&mut self, name: &str) -> Result<(), PhysicsError> {
        let mut robot = self.robot.clone();
        let before = robot.actuators.len() + robot.sensors.len();
        robot.actuators.retain(|a| a.name != name);
        robot.sensors.retain(|s| s.name != name);
        if robot.actuators.len() + robot.sensors.len() == before {
            return Err(PhysicsError::NotFound(name.to_string()));
        }
        self.rebuild(robot)
    }

    /// Rebuild everything from `robot`, keeping time, step and the live state
    /// of bodies that survive. On error nothing changes.
    fn rebuild(&mut self, robot: RobotConfig) -> Result<(), PhysicsError> {
        let assembly = Assembly::build(&self.world, &robot, self.options)?;
        let carried = Snapshot::capture(self.time, self.step_index, &self.bodies, None);

        self.bodies = assembly.bodies;
        self.joints = assembly.joints;
        self.motors = assembly.motors;
        self.sensors = assembly.sensors;
        self.robot = robot;
        let restored = carried.restore_bodies(&mut self.bodies);
        tracing::debug!(
            bodies = self.bodies.len(),
            restored,
            motors = self.motors.len(),
            sensors = self.sensors.len(),
            "Rebuilt registry"
        );
        Ok(())
    }

    // --- Trace ------------------------------------------------------------

    /// Turn per-tick tracing on or off. Existing records are dropped.
    pub fn enable_trace_logging(&mut self, enabled: bool, callback: Option<TraceCallback>) {
        self.trace.configure(enabled, callback);
    }

    /// Copy of the captured trace.
    pub fn export_trace_log(&self) -> Vec<TraceRecord> {
        self.trace.records().to_vec()
    }

    /// Drop captured records, keeping tracing enabled.
    pub fn clear_trace_log(&mut self) {
        self.trace.clear();
    }

    /// Write the captured trace as JSON.
    pub fn save_trace_log(&self, path: impl AsRef<Path>) -> Result<(), PhysicsError> {
        self.trace.save(path.as_ref())
    }

    // --- Accessors --------------------------------------------------------

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed ticks.
    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    /// Default tick length (s).
    pub fn timestep(&self) -> f64 {
        self.dt
    }

    /// Effective gravity.
    pub fn gravity(&self) -> Vector2<f64> {
        self.gravity
    }

    /// Tunables.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Mutable tunables.
    pub fn config_mut(&mut self) -> &mut SimulationConfig {
        &mut self.config
    }

    /// World description.
    pub fn world(&self) -> &WorldConfig {
        &self.world
    }

    /// Robot description, including the current spawn pose.
    pub fn robot(&self) -> &RobotConfig {
        &self.robot
    }

    /// The body registry.
    pub fn bodies(&self) -> &BodyRegistry {
        &self.bodies
    }

    /// Body by name.
    pub fn body(&self, name: &str) -> Option<&Body> {
        self.bodies.by_name(name)
    }

    /// Mutable body by name.
    pub fn body_mut(&mut self, name: &str) -> Option<&mut Body> {
        self.bodies.by_name_mut(name)
    }

    /// Joints with their accumulated multipliers.
    pub fn joints(&self) -> &[JointRuntime] {
        &self.joints
    }

    /// Motors in attach order.
    pub fn motors(&self) -> &[Motor] {
        &self.motors
    }

    /// Sensors in attach order.
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Readings delivered to the controller on the last tick.
    pub fn last_sensor_readings(&self) -> &SensorReadings {
        &self.last_sensor_readings
    }

    /// Motor commands at the end of the last tick.
    pub fn last_motor_commands(&self) -> &BTreeMap<String, f64> {
        &self.last_motor_commands
    }

    /// Latest physics warning from the last tick.
    pub fn last_physics_warning(&self) -> Option<&str> {
        self.warnings.last()
    }

    /// Pending controller failure, if any.
    pub fn last_controller_error(&self) -> Option<&str> {
        self.last_controller_error.as_deref()
    }

    /// Resume controller invocation after a failure.
    pub fn clear_controller_error(&mut self) {
        self.last_controller_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Bounds, JointConfig, MotorParams, SensorKind, ShapeConfig};
    use crate::controller::ControllerError;
    use crate::sensors::SensorReading;
    use approx::assert_abs_diff_eq;

    fn robot() -> RobotConfig {
        RobotConfig {
            spawn_pose: Pose::new(1.0, 0.5, 0.0),
            bodies: vec![BodyConfig::new("chassis", ShapeConfig::rectangle(0.2, 0.15)).mass(1.0, 0.01)],
            joints: Vec::new(),
            actuators: vec![
                ActuatorConfig::wheel("left", "chassis", Pose::new(0.0, 0.08, 0.0)),
                ActuatorConfig::wheel("right", "chassis", Pose::new(0.0, -0.08, 0.0)),
            ],
            sensors: vec![SensorConfig {
                name: "odometer".to_string(),
                body: "chassis".to_string(),
                mount_pose: Pose::origin(),
                kind: SensorKind::Encoder,
            }],
        }
    }

    fn scenario() -> Scenario {
        Scenario {
            world: WorldConfig {
                bounds: Some(Bounds {
                    min_x: 0.0,
                    max_x: 3.0,
                    min_y: 0.0,
                    max_y: 2.0,
                }),
                terrain: vec![BodyConfig::new("rock", ShapeConfig::Circle { radius: 0.1 }).at(Pose::new(2.5, 1.5, 0.0))],
                ..WorldConfig::default()
            },
            robot: robot(),
        }
    }

    struct Drive(f64);

    impl Controller for Drive {
        fn update(
            &mut self,
            _readings: &SensorReadings,
            actuators: &mut Actuators<'_>,
            _dt: f64,
        ) -> Result<(), ControllerError> {
            actuators.command("left", self.0);
            actuators.command("right", self.0);
            Ok(())
        }
    }

    struct Failing {
        calls: std::rc::Rc<std::cell::Cell<u32>>,
        panic: bool,
    }

    impl Controller for Failing {
        fn update(
            &mut self,
            _readings: &SensorReadings,
            _actuators: &mut Actuators<'_>,
            _dt: f64,
        ) -> Result<(), ControllerError> {
            self.calls.set(self.calls.get() + 1);
            if self.panic {
                panic!("wheel fell off");
            }
            Err("sensor timeout".into())
        }
    }

    #[test]
    fn test_load_builds_registry_in_order() {
        let sim = Simulation::load(scenario(), LoadOptions::default()).unwrap();
        let names: Vec<_> = sim.bodies().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            ["rock", "env_bound_bottom", "env_bound_top", "env_bound_left", "env_bound_right", "chassis"]
        );
        assert!(!sim.body("rock").unwrap().can_move);
        assert_eq!(sim.body("chassis").unwrap().pose, Pose::new(1.0, 0.5, 0.0));
        assert_eq!(sim.gravity(), Vector2::zeros());
        assert_eq!(sim.motors()[1].traction.wheel_count, 2);
        assert_eq!(sim.motors()[0].traction.wheel_count, 1);
    }

    #[test]
    fn test_load_options() {
        let mut s = scenario();
        s.world.gravity = [0.0, -9.81];
        let options = LoadOptions {
            top_down: false,
            ignore_terrain: true,
        };
        let sim = Simulation::load(s, options).unwrap();
        assert!(sim.body("rock").is_none());
        assert_eq!(sim.gravity(), Vector2::new(0.0, -9.81));
    }

    #[test]
    fn test_configuration_errors() {
        let mut s = scenario();
        s.robot.sensors[0].body = "ghost".to_string();
        assert!(matches!(
            Simulation::load(s, LoadOptions::default()),
            Err(PhysicsError::MissingBody { kind: "sensor", .. })
        ));

        let mut s = scenario();
        s.robot.sensors[0].name = "left".to_string();
        assert!(matches!(
            Simulation::load(s, LoadOptions::default()),
            Err(PhysicsError::DuplicateDevice(name)) if name == "left"
        ));

        let mut s = scenario();
        s.robot.actuators[0].params = MotorParams::Detailed {
            preset: "nope".to_string(),
        };
        assert!(matches!(
            Simulation::load(s, LoadOptions::default()),
            Err(PhysicsError::UnknownPreset(_))
        ));

        let mut s = scenario();
        s.robot.joints.push(JointConfig::rigid("j", "chassis", "rock"));
        s.robot.joints[0].compliance = -0.5;
        assert!(matches!(
            Simulation::load(s, LoadOptions::default()),
            Err(PhysicsError::NegativeCompliance { .. })
        ));
    }

    #[test]
    fn test_step_advances_time_and_drives_forward() {
        let mut sim = Simulation::load(scenario(), LoadOptions::default()).unwrap();
        sim.set_controller(Drive(1.0));
        for _ in 0..10 {
            sim.step(None);
        }
        assert_eq!(sim.step_index(), 10);
        assert_abs_diff_eq!(sim.time(), 10.0 / 120.0, epsilon = 1e-12);
        assert!(sim.body("chassis").unwrap().pose.x > 1.0);
        assert_eq!(sim.last_motor_commands().get("left"), Some(&1.0));
        assert!(sim.last_controller_error().is_none());
    }

    #[test]
    fn test_sensors_observe_pre_step_state() {
        let mut sim = Simulation::load(scenario(), LoadOptions::default()).unwrap();
        sim.body_mut("chassis").unwrap().state.linear_velocity = Vector2::new(0.5, 0.0);
        sim.step(Some(0.01));
        let Some(SensorReading::Encoder { speed, .. }) = sim.last_sensor_readings().get("odometer") else {
            panic!("expected encoder reading");
        };
        assert_eq!(*speed, 0.5);
    }

    #[test]
    fn test_controller_error_pauses_until_cleared() {
        for panics in [false, true] {
            let mut sim = Simulation::load(scenario(), LoadOptions::default()).unwrap();
            let calls = std::rc::Rc::new(std::cell::Cell::new(0));
            sim.set_controller(Failing {
                calls: calls.clone(),
                panic: panics,
            });
            sim.step(None);
            sim.step(None);
            assert_eq!(calls.get(), 1);
            let error = sim.last_controller_error().unwrap();
            if panics {
                assert!(error.contains("wheel fell off"));
            } else {
                assert_eq!(error, "sensor timeout");
            }
            assert_eq!(sim.step_index(), 2);

            sim.clear_controller_error();
            sim.step(None);
            assert_eq!(calls.get(), 2);
        }
    }

    #[test]
    fn test_rebuild_keeps_live_state() {
        let mut sim = Simulation::load(scenario(), LoadOptions::default()).unwrap();
        sim.set_controller(Drive(1.0));
        for _ in 0..5 {
            sim.step(None);
        }
        let pose = sim.body("chassis").unwrap().pose;

        sim.add_sensor(SensorConfig {
            name: "range".to_string(),
            body: "chassis".to_string(),
            mount_pose: Pose::origin(),
            kind: SensorKind::Distance { max_range: 1.0 },
        })
        .unwrap();
        assert_eq!(sim.body("chassis").unwrap().pose, pose);
        assert_eq!(sim.step_index(), 5);
        assert_eq!(sim.sensors().len(), 2);

        sim.remove_device("left").unwrap();
        assert_eq!(sim.motors().len(), 1);
        assert_eq!(sim.motors()[0].traction.wheel_count, 1);
        assert!(matches!(sim.remove_device("left"), Err(PhysicsError::NotFound(_))));

        let failed = sim.add_actuator(ActuatorConfig::wheel("range", "chassis", Pose::origin()));
        assert!(matches!(failed, Err(PhysicsError::DuplicateDevice(_))));
        assert_eq!(sim.motors().len(), 1);
    }

    #[test]
    fn test_add_and_remove_robot_body() {
        let mut sim = Simulation::load(scenario(), LoadOptions::default()).unwrap();
        let arm = BodyConfig::new("arm", ShapeConfig::Circle { radius: 0.02 }).at(Pose::new(0.1, 0.0, 0.0));
        sim.add_robot_body(arm).unwrap();
        assert_eq!(sim.body("arm").unwrap().pose, Pose::new(1.1, 0.5, 0.0));

        sim.remove_robot_body("chassis").unwrap();
        assert!(sim.body("chassis").is_none());
        assert!(sim.motors().is_empty());
        assert!(sim.sensors().is_empty());
        assert!(matches!(sim.remove_robot_body("rock"), Err(PhysicsError::NotFound(_))));
    }

    #[test]
    fn test_reposition_and_reset_to_spawn() {
        let mut sim = Simulation::load(scenario(), LoadOptions::default()).unwrap();
        sim.body_mut("chassis").unwrap().state.linear_velocity = Vector2::new(1.0, 0.0);
        sim.reposition_robot(Pose::new(2.0, 1.0, 0.3), false, false);
        let body = sim.body("chassis").unwrap();
        assert_eq!(body.pose, Pose::new(2.0, 1.0, 0.3));
        assert_eq!(body.state.linear_velocity.x, 1.0);

        sim.reset_to_spawn();
        let body = sim.body("chassis").unwrap();
        assert_eq!(body.pose, Pose::new(1.0, 0.5, 0.0));
        assert_eq!(body.state.linear_velocity, Vector2::zeros());

        sim.reposition_robot(Pose::new(0.5, 0.5, 0.0), true, true);
        assert_eq!(sim.robot().spawn_pose, Pose::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn test_reposition_restarts_sensor_history() {
        let mut sim = Simulation::load(scenario(), LoadOptions::default()).unwrap();
        sim.add_sensor(SensorConfig {
            name: "imu".to_string(),
            body: "chassis".to_string(),
            mount_pose: Pose::origin(),
            kind: SensorKind::Imu,
        })
        .unwrap();
        sim.body_mut("chassis").unwrap().state.linear_velocity = Vector2::new(2.0, 0.0);
        sim.step(None);
        sim.step(None);

        sim.reposition_robot(Pose::new(1.0, 1.0, 0.0), true, false);
        sim.step(None);
        let readings = sim.last_sensor_readings();
        assert_eq!(
            readings.get("imu"),
            Some(&SensorReading::Imu {
                heading: 0.0,
                yaw_rate: 0.0,
                acceleration: [0.0, 0.0],
            })
        );
        assert_eq!(
            readings.get("odometer"),
            Some(&SensorReading::Encoder {
                distance: 0.0,
                speed: 0.0,
            })
        );
    }

    #[test]
    fn test_nan_pose_recovers_within_one_tick() {
        let mut sim = Simulation::load(scenario(), LoadOptions::default()).unwrap();
        sim.body_mut("chassis").unwrap().pose = Pose::new(f64::NAN, 0.5, 0.0);
        sim.step(None);
        assert!(sim.body("chassis").unwrap().pose.is_finite());
        assert!(sim.last_physics_warning().is_some());
        sim.step(None);
        assert!(sim.body("chassis").unwrap().pose.is_finite());
    }

    #[test]
    fn test_trace_records_each_tick() {
        let mut sim = Simulation::load(scenario(), LoadOptions::default()).unwrap();
        sim.set_controller(Drive(0.5));
        sim.enable_trace_logging(true, None);
        sim.step(None);
        sim.step(None);
        let trace = sim.export_trace_log();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[1].step, 1);
        let left = &trace[1].motors["left"];
        assert_eq!(left.command, 0.5);
        assert_eq!(left.step, Some(1));
        assert!(left.applied_longitudinal_impulse.unwrap() > 0.0);
        assert!(trace[1].bodies.contains_key("chassis"));

        sim.clear_trace_log();
        assert!(sim.export_trace_log().is_empty());
    }
}
