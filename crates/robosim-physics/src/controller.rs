//! Controller interface and the actuator handle it drives.

use std::any::Any;
use std::collections::BTreeMap;

use crate::body::{Body, BodyRegistry};
use crate::motors::Motor;
use crate::sensors::SensorReading;

/// Error type returned by controllers.
pub type ControllerError = Box<dyn std::error::Error + Send + Sync>;

/// Sensor readings keyed by sensor name.
pub type SensorReadings = BTreeMap<String, SensorReading>;

/// Robot control logic invoked once per tick, after sensing.
///
/// A returned error or a panic pauses the controller until
/// [`Simulation::clear_controller_error`](crate::Simulation::clear_controller_error)
/// is called; physics keeps stepping in the meantime.
pub trait Controller {
    /// React to this tick's readings by commanding actuators.
    fn update(
        &mut self,
        readings: &SensorReadings,
        actuators: &mut Actuators<'_>,
        dt: f64,
    ) -> Result<(), ControllerError>;

    /// Opaque state captured into snapshots.
    fn save_state(&self) -> Result<Option<serde_json::Value>, ControllerError> {
        Ok(None)
    }

    /// Restore state captured by [`save_state`](Self::save_state).
    fn restore_state(&mut self, _state: &serde_json::Value) -> Result<(), ControllerError> {
        Ok(())
    }
}

/// Mutable access to the robot's motors for the duration of one update.
pub struct Actuators<'a> {
    motors: &'a mut [Motor],
    bodies: &'a mut BodyRegistry,
    dt: f64,
    step: u64,
}

impl<'a> Actuators<'a> {
    pub(crate) fn new(motors: &'a mut [Motor], bodies: &'a mut BodyRegistry, dt: f64, step: u64) -> Self {
        Self {
            motors,
            bodies,
            dt,
            step,
        }
    }

    /// Command a motor by name. Returns `false` if no such motor exists.
    pub fn command(&mut self, name: &str, value: f64) -> bool {
        let Some(motor) = self.motors.iter_mut().find(|m| m.name == name) else {
            return false;
        };
        motor.command(value, self.bodies, self.dt);
        if let Some(report) = motor.last_report.as_mut() {
            report.step = self.step;
        }
        true
    }

    /// Motor names in attach order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.motors.iter().map(|m| m.name.as_str())
    }

    /// Last command sent to a motor.
    pub fn last_command(&self, name: &str) -> Option<f64> {
        self.motors.iter().find(|m| m.name == name).map(|m| m.last_command)
    }

    /// Read-only body lookup.
    pub fn body(&self, name: &str) -> Option<&Body> {
        self.bodies.by_name(name)
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("controller panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActuatorConfig, BodyConfig, ShapeConfig};
    use crate::pose::Pose;

    #[test]
    fn test_actuators_route_commands_by_name() {
        let mut bodies = BodyRegistry::new();
        let cfg = BodyConfig::new("chassis", ShapeConfig::Circle { radius: 0.1 });
        bodies.insert(Body::from_config(&cfg, Pose::origin()).unwrap()).unwrap();
        let mut motors = vec![
            Motor::attach(&ActuatorConfig::wheel("left", "chassis", Pose::origin()), &bodies, 0).unwrap(),
        ];

        let mut actuators = Actuators::new(&mut motors, &mut bodies, 0.01, 7);
        assert!(actuators.command("left", 0.5));
        assert!(!actuators.command("right", 0.5));
        assert_eq!(actuators.last_command("left"), Some(0.5));
        assert_eq!(actuators.names().collect::<Vec<_>>(), ["left"]);
        assert!(actuators.body("chassis").unwrap().state.linear_velocity.x > 0.0);
        assert_eq!(motors[0].last_report.as_ref().unwrap().step, 7);
    }

    #[test]
    fn test_panic_message_from_payload() {
        let payload = std::panic::catch_unwind(|| {
            panic!("boom");
        }).unwrap_err();
        assert_eq!(panic_message(&*payload), "controller panicked: boom");
    }
}
