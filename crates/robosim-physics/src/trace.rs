//! Optional per-tick diagnostic records.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::body::BodyRegistry;
use crate::error::PhysicsError;
use crate::motors::Motor;
use crate::pose::Pose;

/// Called with each record as it is appended.
pub type TraceCallback = Box<dyn FnMut(&TraceRecord)>;

/// Per-motor diagnostics for one tick. Fields other than `command` are
/// `None` when the motor has not reached its body yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorTrace {
    /// Last command.
    pub command: f64,
    /// Wheel/contact slip ratio.
    pub slip_ratio: Option<f64>,
    /// Lateral contact speed (m/s).
    pub lateral_slip: Option<f64>,
    /// Wheel surface speed (m/s).
    pub wheel_speed: Option<f64>,
    /// Longitudinal contact speed before the command (m/s).
    pub contact_speed: Option<f64>,
    /// Longitudinal contact speed after the command (m/s).
    pub contact_speed_after: Option<f64>,
    /// Drive impulse (N·s).
    pub applied_longitudinal_impulse: Option<f64>,
    /// Lateral impulse (N·s).
    pub applied_lateral_impulse: Option<f64>,
    /// Drive impulse divided by dt (N).
    pub applied_longitudinal_force: Option<f64>,
    /// Lateral impulse divided by dt (N).
    pub applied_lateral_force: Option<f64>,
    /// Per-wheel normal load (N).
    pub normal_load: Option<f64>,
    /// Step at which the report was produced.
    pub step: Option<u64>,
}

impl MotorTrace {
    fn from_motor(motor: &Motor, dt: f64) -> Self {
        let Some(report) = motor.last_report.as_ref() else {
            return Self {
                command: motor.last_command,
                ..Self::default()
            };
        };
        let per_dt = |impulse: f64| (dt > 0.0).then(|| impulse / dt);
        Self {
            command: motor.last_command,
            slip_ratio: report.slip_ratio,
            lateral_slip: Some(report.lateral_slip),
            wheel_speed: report.wheel_speed,
            contact_speed: Some(report.contact_speed),
            contact_speed_after: Some(report.contact_speed_after),
            applied_longitudinal_impulse: Some(report.applied_longitudinal_impulse),
            applied_lateral_impulse: Some(report.applied_lateral_impulse),
            applied_longitudinal_force: per_dt(report.applied_longitudinal_impulse),
            applied_lateral_force: per_dt(report.applied_lateral_impulse),
            normal_load: Some(report.normal_load),
            step: Some(report.step),
        }
    }
}

/// Body state at the end of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyTrace {
    /// World pose.
    pub pose: Pose,
    /// Linear velocity (m/s).
    pub lin_vel: [f64; 2],
    /// Angular velocity (rad/s).
    pub ang_vel: f64,
}

/// One tick of diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Step index (before the advance).
    pub step: u64,
    /// Simulated time (before the advance).
    pub time: f64,
    /// Tick length.
    pub dt: f64,
    /// Motor diagnostics by name.
    pub motors: BTreeMap<String, MotorTrace>,
    /// Body state by name.
    pub bodies: BTreeMap<String, BodyTrace>,
}

impl TraceRecord {
    /// Build a record from the current motors and bodies.
    pub fn capture(step: u64, time: f64, dt: f64, motors: &[Motor], bodies: &BodyRegistry) -> Self {
        Self {
            step,
            time,
            dt,
            motors: motors
                .iter()
                .map(|m| (m.name.clone(), MotorTrace::from_motor(m, dt)))
                .collect(),
            bodies: bodies
                .iter()
                .map(|b| {
                    let v = b.state.linear_velocity;
                    let trace = BodyTrace {
                        pose: b.pose,
                        lin_vel: [v.x, v.y],
                        ang_vel: b.state.angular_velocity,
                    };
                    (b.name.clone(), trace)
                })
                .collect(),
        }
    }
}

/// In-memory trace with an optional streaming callback.
#[derive(Default)]
pub struct TraceLog {
    enabled: bool,
    records: Vec<TraceRecord>,
    callback: Option<TraceCallback>,
}

impl TraceLog {
    /// Enable or disable capture, replacing the callback and dropping old records.
    pub fn configure(&mut self, enabled: bool, callback: Option<TraceCallback>) {
        self.enabled = enabled;
        self.callback = callback;
        self.records.clear();
    }

    /// Whether records are being captured.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append a record and hand it to the callback.
    pub fn push(&mut self, record: TraceRecord) {
        if let Some(callback) = self.callback.as_mut() {
            callback(&record);
        }
        self.records.push(record);
    }

    /// Captured records.
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Drop captured records.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Write the records as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), PhysicsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.records)?;
        Ok(())
    }
}
