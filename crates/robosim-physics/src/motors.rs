//! Wheel motors and friction-cone-limited traction coupling.
//!
//! A command is turned into a drive impulse at the wheel's contact point,
//! capped by the longitudinal friction cone, followed by a lateral
//! correction that resists side slip within the lateral cone. Both act on the
//! parent body immediately; there is no force accumulation.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::body::{Body, BodyHandle, BodyRegistry};
use crate::config::{ActuatorConfig, MotorParams, WheelParams};
use crate::error::PhysicsError;
use crate::pose::Pose;

/// Wheel angular speed bound for the detailed model (rad/s).
const MAX_WHEEL_OMEGA: f64 = 100.0;

/// Lateral contact speeds below this are left alone (m/s).
const LATERAL_DEADBAND: f64 = 1e-5;

/// Constants of a named torque-driven wheel.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelPreset {
    /// Preset name.
    pub name: &'static str,
    /// Command magnitude limit.
    pub max_command: f64,
    /// Stall torque at full command (N·m).
    pub max_torque: f64,
    /// Gearbox ratio.
    pub gear_ratio: f64,
    /// Wheel radius (m).
    pub wheel_radius: f64,
    /// Rotor inertia for the first-order speed response (kg·m²).
    pub motor_inertia: f64,
    /// Longitudinal friction coefficient.
    pub mu_long: f64,
    /// Lateral friction coefficient.
    pub mu_lat: f64,
    /// Gravity used for the normal load (m/s²).
    pub g_equiv: f64,
    /// Explicit per-wheel normal load (N).
    pub normal_force: Option<f64>,
    /// Fraction of the lateral correction withheld.
    pub lateral_damping: f64,
    /// Wheels sharing the body's weight.
    pub wheel_count: u32,
}

/// Built-in presets for [`MotorParams::Detailed`].
pub static WHEEL_PRESETS: [WheelPreset; 2] = [
    WheelPreset {
        name: "wheel_small",
        max_command: 1.0,
        max_torque: 0.06,
        gear_ratio: 1.0,
        wheel_radius: 0.03,
        motor_inertia: 1e-4,
        mu_long: 0.9,
        mu_lat: 0.8,
        g_equiv: 9.81,
        normal_force: None,
        lateral_damping: 0.25,
        wheel_count: 2,
    },
    WheelPreset {
        name: "wheel_large",
        max_command: 1.0,
        max_torque: 0.25,
        gear_ratio: 1.0,
        wheel_radius: 0.05,
        motor_inertia: 4e-4,
        mu_long: 1.0,
        mu_lat: 0.9,
        g_equiv: 9.81,
        normal_force: None,
        lateral_damping: 0.2,
        wheel_count: 2,
    },
];

/// Look up a preset by name.
pub fn wheel_preset(name: &str) -> Result<&'static WheelPreset, PhysicsError> {
    WHEEL_PRESETS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| PhysicsError::UnknownPreset(name.to_string()))
}

/// Friction and load parameters shared by both motor models.
#[derive(Debug, Clone, PartialEq)]
pub struct Traction {
    /// Longitudinal friction coefficient.
    pub mu_long: f64,
    /// Lateral friction coefficient.
    pub mu_lat: f64,
    /// Gravity used for the normal load (m/s²).
    pub g_equiv: f64,
    /// Explicit per-wheel normal load (N).
    pub normal_force: Option<f64>,
    /// Fraction of the lateral correction withheld, clamped to [0, 1] on use.
    pub lateral_damping: f64,
    /// Wheels sharing the body's weight (at least 1).
    pub wheel_count: u32,
}

impl Traction {
    /// Per-wheel normal load for a body of the given mass.
    pub fn normal_load(&self, mass: f64) -> f64 {
        let load = self
            .normal_force
            .unwrap_or_else(|| mass * self.g_equiv / f64::from(self.wheel_count.max(1)));
        load.max(0.0)
    }
}

/// Motor variant.
#[derive(Debug, Clone, PartialEq)]
pub enum MotorModel {
    /// Force-commanded wheel.
    Wheel {
        /// Drive force at full command (N).
        max_force: f64,
    },
    /// Torque-commanded wheel with a first-order speed state.
    Detailed {
        /// Preset constants.
        preset: &'static WheelPreset,
        /// Integrated wheel angular speed (rad/s).
        angular_speed: f64,
    },
}

/// Per-command traction diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TractionReport {
    /// Clamped command.
    pub command: f64,
    /// Relative slip between wheel surface and contact point, when the model tracks wheel speed.
    pub slip_ratio: Option<f64>,
    /// Lateral contact-point speed before the slip correction (m/s).
    pub lateral_slip: f64,
    /// Wheel surface speed, when the model tracks it (m/s).
    pub wheel_speed: Option<f64>,
    /// Longitudinal contact-point speed before the drive impulse (m/s).
    pub contact_speed: f64,
    /// Longitudinal contact-point speed after both impulses (m/s).
    pub contact_speed_after: f64,
    /// Drive impulse actually applied (N·s).
    pub applied_longitudinal_impulse: f64,
    /// Lateral impulse actually applied (N·s).
    pub applied_lateral_impulse: f64,
    /// Per-wheel normal load (N).
    pub normal_load: f64,
    /// Step index at which the command was issued.
    pub step: u64,
}

/// A wheel actuator mounted on a body.
#[derive(Debug, Clone)]
pub struct Motor {
    /// Device name.
    pub name: String,
    parent: BodyHandle,
    /// Mount pose in the parent's frame.
    pub mount_pose: Pose,
    /// Command magnitude limit.
    pub max_command: f64,
    /// Last clamped command.
    pub last_command: f64,
    /// Diagnostics from the last command that reached the body.
    pub last_report: Option<TractionReport>,
    /// Friction and load parameters.
    pub traction: Traction,
    /// Model-specific parameters and state.
    pub model: MotorModel,
}

impl Motor {
    /// Resolve an actuator description against the registry.
    ///
    /// `wheels_on_parent` is the number of motors already mounted on the same
    /// body; it sets the load share when `wheel_count` is not given.
    pub fn attach(
        cfg: &ActuatorConfig,
        bodies: &BodyRegistry,
        wheels_on_parent: u32,
    ) -> Result<Self, PhysicsError> {
        let missing = || PhysicsError::MissingBody {
            kind: "actuator",
            name: cfg.name.clone(),
            body: cfg.body.clone(),
        };
        let parent = bodies.handle(&cfg.body).ok_or_else(missing)?;
        let body = bodies.get(parent).ok_or_else(missing)?;

        let (max_command, traction, model) = match &cfg.params {
            MotorParams::Wheel(params) => {
                let traction = wheel_traction(params, body, wheels_on_parent);
                let model = MotorModel::Wheel {
                    max_force: params.max_force,
                };
                (1.0, traction, model)
            }
            MotorParams::Detailed { preset } => {
                let preset = wheel_preset(preset)?;
                let traction = Traction {
                    mu_long: preset.mu_long,
                    mu_lat: preset.mu_lat,
                    g_equiv: preset.g_equiv,
                    normal_force: preset.normal_force,
                    lateral_damping: preset.lateral_damping,
                    wheel_count: preset.wheel_count.max(1),
                };
                let model = MotorModel::Detailed {
                    preset,
                    angular_speed: 0.0,
                };
                (preset.max_command, traction, model)
            }
        };

        Ok(Self {
            name: cfg.name.clone(),
            parent,
            mount_pose: cfg.mount_pose,
            max_command,
            last_command: 0.0,
            last_report: None,
            traction,
            model,
        })
    }

    /// Handle of the parent body.
    pub fn parent(&self) -> BodyHandle {
        self.parent
    }

    /// Wheel surface speed, for models that track it.
    pub fn wheel_speed(&self) -> Option<f64> {
        match &self.model {
            MotorModel::Wheel { .. } => None,
            MotorModel::Detailed {
                preset,
                angular_speed,
            } => Some(angular_speed * preset.wheel_radius),
        }
    }

    /// Clamp and record `value`, then couple it into the parent body.
    ///
    /// A non-finite command is treated as zero. Commands to a missing or
    /// immovable parent are recorded but have no physical effect.
    pub fn command(&mut self, value: f64, bodies: &mut BodyRegistry, dt: f64) {
        let value = if value.is_finite() {
            value.clamp(-self.max_command, self.max_command)
        } else {
            0.0
        };
        self.last_command = value;

        let Some(body) = bodies.get_mut(self.parent) else {
            self.last_report = None;
            return;
        };
        if !body.can_move {
            self.last_report = None;
            return;
        }

        let drive_impulse = match &mut self.model {
            MotorModel::Wheel { max_force, .. } => *max_force * value * dt,
            MotorModel::Detailed {
                preset,
                angular_speed,
            } => {
                let torque = preset.max_torque * value;
                *angular_speed += torque / preset.motor_inertia.max(1e-6) * dt;
                *angular_speed = angular_speed.clamp(-MAX_WHEEL_OMEGA, MAX_WHEEL_OMEGA);
                torque * preset.gear_ratio / preset.wheel_radius * dt
            }
        };

        let mount = body.pose.compose(&self.mount_pose);
        let normal_load = self.traction.normal_load(body.state.mass);
        let outcome = solve_wheel_traction(
            body,
            mount.position(),
            mount.heading(),
            drive_impulse,
            &self.traction,
            normal_load,
            dt,
        );

        let wheel_speed = self.wheel_speed();
        let slip_ratio = wheel_speed.map(|w| {
            let scale = w.abs().max(outcome.contact_speed_after.abs()).max(1e-6);
            (w - outcome.contact_speed_after) / scale
        });
        self.last_report = Some(TractionReport {
            command: value,
            slip_ratio,
            lateral_slip: outcome.lateral_slip,
            wheel_speed,
            contact_speed: outcome.contact_speed,
            contact_speed_after: outcome.contact_speed_after,
            applied_longitudinal_impulse: outcome.longitudinal_impulse,
            applied_lateral_impulse: outcome.lateral_impulse,
            normal_load,
            step: 0,
        });
    }
}

fn wheel_traction(params: &WheelParams, parent: &Body, wheels_on_parent: u32) -> Traction {
    Traction {
        mu_long: params.mu_long.unwrap_or(parent.material.traction),
        mu_lat: params.mu_lat.unwrap_or(parent.material.friction),
        g_equiv: params.g_equiv,
        normal_force: params.normal_force,
        lateral_damping: params.lateral_damping,
        wheel_count: params.wheel_count.unwrap_or(wheels_on_parent + 1).max(1),
    }
}

/// Impulses applied by one traction solve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TractionOutcome {
    /// Applied drive impulse (N·s).
    pub longitudinal_impulse: f64,
    /// Applied lateral impulse (N·s).
    pub lateral_impulse: f64,
    /// Lateral contact speed seen by the slip correction (m/s).
    pub lateral_slip: f64,
    /// Longitudinal contact speed before the solve (m/s).
    pub contact_speed: f64,
    /// Longitudinal contact speed after the solve (m/s).
    pub contact_speed_after: f64,
}

/// Apply a friction-limited drive impulse and lateral slip correction at
/// `contact` on `body`.
pub fn solve_wheel_traction(
    body: &mut Body,
    contact: Point2<f64>,
    forward: Vector2<f64>,
    drive_impulse: f64,
    traction: &Traction,
    normal_load: f64,
    dt: f64,
) -> TractionOutcome {
    let mut outcome = TractionOutcome {
        contact_speed: body.point_velocity(contact).dot(&forward),
        ..TractionOutcome::default()
    };
    if !body.can_move {
        outcome.contact_speed_after = outcome.contact_speed;
        return outcome;
    }

    let normal_load = normal_load.max(0.0);
    let lateral_damping = traction.lateral_damping.clamp(0.0, 1.0);
    let lateral = Vector2::new(-forward.y, forward.x);
    let max_long = traction.mu_long.abs() * normal_load * dt;
    let max_lat = traction.mu_lat.abs() * normal_load * dt;

    let j_drive = if max_long > 0.0 && drive_impulse.is_finite() {
        drive_impulse.clamp(-max_long, max_long)
    } else {
        0.0
    };
    if j_drive != 0.0 {
        body.apply_impulse_at(forward * j_drive, contact);
    }
    outcome.longitudinal_impulse = j_drive;

    if max_lat > 0.0 {
        let v_lat = body.point_velocity(contact).dot(&lateral);
        outcome.lateral_slip = v_lat;
        if v_lat.abs() > LATERAL_DEADBAND {
            let inv_mass = body.inv_mass_at(contact, lateral);
            if inv_mass > 1e-9 {
                let j_lat = (-v_lat / inv_mass * (1.0 - lateral_damping)).clamp(-max_lat, max_lat);
                body.apply_impulse_at(lateral * j_lat, contact);
                outcome.lateral_impulse = j_lat;
            }
        }
    }

    outcome.contact_speed_after = body.point_velocity(contact).dot(&forward);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BodyConfig, ShapeConfig};
    use approx::assert_abs_diff_eq;

    fn chassis_registry(can_move: bool) -> BodyRegistry {
        let mut cfg = BodyConfig::new("chassis", ShapeConfig::rectangle(0.2, 0.2)).mass(1.0, 0.01);
        cfg.can_move = can_move;
        let mut reg = BodyRegistry::new();
        reg.insert(Body::from_config(&cfg, Pose::origin()).unwrap()).unwrap();
        reg
    }

    fn wheel(params: WheelParams) -> ActuatorConfig {
        ActuatorConfig {
            params: MotorParams::Wheel(params),
            ..ActuatorConfig::wheel("left", "chassis", Pose::origin())
        }
    }

    #[test]
    fn test_drive_impulse_below_cap_applied_fully() {
        let mut reg = chassis_registry(true);
        let mut motor = Motor::attach(&wheel(WheelParams::default()), &reg, 0).unwrap();
        assert_eq!(motor.model, MotorModel::Wheel { max_force: 2.0 });
        let dt = 0.01;
        motor.command(0.5, &mut reg, dt);
        // 2.0 * 0.5 * 0.01 = 0.01 < cap 0.8 * 9.81 * 0.01
        let report = motor.last_report.as_ref().unwrap();
        assert_abs_diff_eq!(report.applied_longitudinal_impulse, 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(reg.by_name("chassis").unwrap().state.linear_velocity.x, 0.01, epsilon = 1e-12);
        assert!(report.wheel_speed.is_none());
    }

    #[test]
    fn test_drive_clamped_by_friction_cone() {
        let mut reg = chassis_registry(true);
        let params = WheelParams {
            max_force: 100.0,
            mu_long: Some(0.5),
            normal_force: Some(2.0),
            ..WheelParams::default()
        };
        let mut motor = Motor::attach(&wheel(params), &reg, 0).unwrap();
        motor.command(1.0, &mut reg, 0.1);
        let report = motor.last_report.as_ref().unwrap();
        assert_abs_diff_eq!(report.applied_longitudinal_impulse, 0.1, epsilon = 1e-12);
        assert_eq!(report.normal_load, 2.0);
    }

    #[test]
    fn test_zero_normal_load_gives_zero_impulse() {
        let mut reg = chassis_registry(true);
        let params = WheelParams {
            normal_force: Some(0.0),
            ..WheelParams::default()
        };
        let mut motor = Motor::attach(&wheel(params), &reg, 0).unwrap();
        reg.by_name_mut("chassis").unwrap().state.linear_velocity = Vector2::new(0.0, 0.3);
        motor.command(1.0, &mut reg, 0.01);
        let report = motor.last_report.as_ref().unwrap();
        assert_eq!(report.applied_longitudinal_impulse, 0.0);
        assert_eq!(report.applied_lateral_impulse, 0.0);
        assert_eq!(
            reg.by_name("chassis").unwrap().state.linear_velocity,
            Vector2::new(0.0, 0.3)
        );
    }

    #[test]
    fn test_lateral_slip_reduced_within_cone() {
        let mut reg = chassis_registry(true);
        let params = WheelParams {
            lateral_damping: 0.0,
            mu_lat: Some(10.0),
            ..WheelParams::default()
        };
        let mut motor = Motor::attach(&wheel(params), &reg, 0).unwrap();
        reg.by_name_mut("chassis").unwrap().state.linear_velocity = Vector2::new(0.0, 0.2);
        motor.command(0.0, &mut reg, 0.01);
        // Mounted at the center: the full correction cancels the side slip.
        let v = reg.by_name("chassis").unwrap().state.linear_velocity;
        assert_abs_diff_eq!(v.y, 0.0, epsilon = 1e-12);
        let report = motor.last_report.as_ref().unwrap();
        assert_abs_diff_eq!(report.lateral_slip, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(report.applied_lateral_impulse, -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_offset_wheel_yaws_body() {
        let mut reg = chassis_registry(true);
        let cfg = ActuatorConfig::wheel("left", "chassis", Pose::new(0.0, 0.1, 0.0));
        let mut motor = Motor::attach(&cfg, &reg, 0).unwrap();
        motor.command(1.0, &mut reg, 0.01);
        // Forward push at +y offset turns the body clockwise.
        assert!(reg.by_name("chassis").unwrap().state.angular_velocity < 0.0);
    }

    #[test]
    fn test_command_clamped_and_static_parent_ignored() {
        let mut reg = chassis_registry(false);
        let mut motor = Motor::attach(&wheel(WheelParams::default()), &reg, 0).unwrap();
        motor.command(5.0, &mut reg, 0.01);
        assert_eq!(motor.last_command, 1.0);
        assert!(motor.last_report.is_none());
        assert_eq!(reg.by_name("chassis").unwrap().state.linear_velocity, Vector2::zeros());
        motor.command(f64::NAN, &mut reg, 0.01);
        assert_eq!(motor.last_command, 0.0);
    }

    #[test]
    fn test_defaults_from_material_and_wheel_count() {
        let reg = chassis_registry(true);
        let motor = Motor::attach(&wheel(WheelParams::default()), &reg, 1).unwrap();
        assert_eq!(motor.traction.wheel_count, 2);
        assert_eq!(motor.traction.mu_long, 0.8);
        assert_eq!(motor.traction.mu_lat, 0.8);
        assert_abs_diff_eq!(motor.traction.normal_load(1.0), 9.81 / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_detailed_motor_tracks_wheel_speed() {
        let mut reg = chassis_registry(true);
        let cfg = ActuatorConfig {
            params: MotorParams::Detailed {
                preset: "wheel_small".to_string(),
            },
            ..ActuatorConfig::wheel("left", "chassis", Pose::origin())
        };
        let mut motor = Motor::attach(&cfg, &reg, 0).unwrap();
        for _ in 0..1000 {
            motor.command(1.0, &mut reg, 0.01);
        }
        let MotorModel::Detailed { angular_speed, .. } = motor.model else {
            panic!("expected detailed model");
        };
        assert_eq!(angular_speed, MAX_WHEEL_OMEGA);
        assert!(motor.last_report.as_ref().unwrap().slip_ratio.is_some());
    }

    #[test]
    fn test_unknown_preset_and_missing_body() {
        let reg = chassis_registry(true);
        let cfg = ActuatorConfig {
            params: MotorParams::Detailed {
                preset: "wheel_huge".to_string(),
            },
            ..ActuatorConfig::wheel("left", "chassis", Pose::origin())
        };
        assert!(matches!(Motor::attach(&cfg, &reg, 0), Err(PhysicsError::UnknownPreset(_))));
        let orphan = ActuatorConfig::wheel("left", "ghost", Pose::origin());
        assert!(matches!(
            Motor::attach(&orphan, &reg, 0),
            Err(PhysicsError::MissingBody { kind: "actuator", .. })
        ));
    }
}
