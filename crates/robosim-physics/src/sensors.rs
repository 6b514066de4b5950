//! Sensors and the read-only view they sample.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::body::{Body, BodyHandle, BodyRegistry};
use crate::colliders::CollisionBackend;
use crate::config::{SensorConfig, SensorKind};
use crate::error::PhysicsError;
use crate::pose::Pose;

/// Material field signal sampled by line sensors.
pub const LINE_SIGNAL: &str = "line_intensity";

/// Read-only access to the world for sensors.
pub struct SimulationView<'a> {
    bodies: &'a BodyRegistry,
    backend: &'a dyn CollisionBackend,
    time: f64,
}

impl<'a> SimulationView<'a> {
    /// A view over `bodies`, answering geometry queries with `backend`.
    pub fn new(bodies: &'a BodyRegistry, backend: &'a dyn CollisionBackend, time: f64) -> Self {
        Self {
            bodies,
            backend,
            time,
        }
    }

    /// All bodies.
    pub fn bodies(&self) -> &'a BodyRegistry {
        self.bodies
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Nearest ray hit among bodies other than `skip`, with the hit body's name.
    pub fn cast_ray(
        &self,
        origin: Point2<f64>,
        dir: Vector2<f64>,
        max_dist: f64,
        skip: BodyHandle,
    ) -> Option<(f64, &'a Body)> {
        let mut nearest: Option<(f64, &'a Body)> = None;
        for &handle in self.bodies.handles() {
            if handle == skip {
                continue;
            }
            let Some(body) = self.bodies.get(handle) else {
                continue;
            };
            let Some(toi) = self
                .backend
                .cast_ray(&body.shape, &body.pose, origin, dir, max_dist)
            else {
                continue;
            };
            if nearest.map_or(true, |(best, _)| toi < best) {
                nearest = Some((toi, body));
            }
        }
        nearest
    }

    /// Bodies other than `skip` whose shape contains `point`.
    pub fn bodies_at(&self, point: Point2<f64>, skip: BodyHandle) -> impl Iterator<Item = &'a Body> + '_ {
        let bodies = self.bodies;
        bodies.handles().iter().filter_map(move |&handle| {
            if handle == skip {
                return None;
            }
            let body = bodies.get(handle)?;
            self.backend
                .contains_point(&body.shape, &body.pose, point)
                .then_some(body)
        })
    }
}

/// One sensor sample, delivered to the controller keyed by sensor name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorReading {
    /// Range along the sensor's heading.
    Distance {
        /// Distance to the nearest hit, or the maximum range (m).
        range: f64,
        /// Name of the body hit, if any.
        hit: Option<String>,
    },
    /// Reflectance under the probe.
    Line {
        /// Strongest `line_intensity` under the probe, 0 if none.
        intensity: f64,
    },
    /// Inertial sample of the parent body.
    Imu {
        /// Heading (rad).
        heading: f64,
        /// Yaw rate (rad/s).
        yaw_rate: f64,
        /// Planar acceleration since the previous read (m/s²).
        acceleration: [f64; 2],
    },
    /// Odometry of the parent body.
    Encoder {
        /// Accumulated forward travel (m).
        distance: f64,
        /// Current forward speed (m/s).
        speed: f64,
    },
}

/// Sensor variant with its per-model state.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorModel {
    /// Forward range finder.
    Distance {
        /// Maximum range (m).
        max_range: f64,
    },
    /// Downward line probe.
    Line,
    /// Inertial unit.
    Imu {
        /// Linear velocity at the previous read.
        last_velocity: Option<Vector2<f64>>,
    },
    /// Wheel odometry.
    Encoder {
        /// Accumulated forward travel (m).
        distance: f64,
    },
}

impl From<&SensorKind> for SensorModel {
    fn from(kind: &SensorKind) -> Self {
        match kind {
            SensorKind::Distance { max_range } => Self::Distance {
                max_range: *max_range,
            },
            SensorKind::Line => Self::Line,
            SensorKind::Imu => Self::Imu {
                last_velocity: None,
            },
            SensorKind::Encoder => Self::Encoder { distance: 0.0 },
        }
    }
}

/// A sensor mounted on a body.
#[derive(Debug, Clone)]
pub struct Sensor {
    /// Device name.
    pub name: String,
    parent: BodyHandle,
    /// Mount pose in the parent's frame.
    pub mount_pose: Pose,
    /// Model and state.
    pub model: SensorModel,
}

impl Sensor {
    /// Resolve a sensor description against the registry.
    pub fn attach(cfg: &SensorConfig, bodies: &BodyRegistry) -> Result<Self, PhysicsError> {
        let parent = bodies
            .handle(&cfg.body)
            .ok_or_else(|| PhysicsError::MissingBody {
                kind: "sensor",
                name: cfg.name.clone(),
                body: cfg.body.clone(),
            })?;
        Ok(Self {
            name: cfg.name.clone(),
            parent,
            mount_pose: cfg.mount_pose,
            model: SensorModel::from(&cfg.kind),
        })
    }

    /// Handle of the parent body.
    pub fn parent(&self) -> BodyHandle {
        self.parent
    }

    /// Drop accumulated state (IMU velocity history, encoder travel).
    pub fn reset(&mut self) {
        match &mut self.model {
            SensorModel::Distance { .. } | SensorModel::Line => {}
            SensorModel::Imu { last_velocity } => *last_velocity = None,
            SensorModel::Encoder { distance } => *distance = 0.0,
        }
    }

    /// Sample the world. Returns `None` if the parent body is gone.
    pub fn read(&mut self, view: &SimulationView<'_>, dt: f64) -> Option<SensorReading> {
        let body = view.bodies().get(self.parent)?;
        let mount = body.pose.compose(&self.mount_pose);

        let reading = match &mut self.model {
            SensorModel::Distance { max_range } => {
                let max_range = *max_range;
                match view.cast_ray(mount.position(), mount.heading(), max_range, self.parent) {
                    Some((range, hit)) => SensorReading::Distance {
                        range,
                        hit: Some(hit.name.clone()),
                    },
                    None => SensorReading::Distance {
                        range: max_range,
                        hit: None,
                    },
                }
            }
            SensorModel::Line => {
                let intensity = view
                    .bodies_at(mount.position(), self.parent)
                    .filter_map(|b| b.material.field_signals.get(LINE_SIGNAL).copied())
                    .fold(0.0, f64::max);
                SensorReading::Line { intensity }
            }
            SensorModel::Imu { last_velocity } => {
                let velocity = body.state.linear_velocity;
                let acceleration = match last_velocity {
                    Some(prev) if dt > 0.0 => (velocity - *prev) / dt,
                    _ => Vector2::zeros(),
                };
                *last_velocity = Some(velocity);
                SensorReading::Imu {
                    heading: body.pose.theta,
                    yaw_rate: body.state.angular_velocity,
                    acceleration: [acceleration.x, acceleration.y],
                }
            }
            SensorModel::Encoder { distance } => {
                let speed = body.state.linear_velocity.dot(&body.pose.heading());
                *distance += speed * dt;
                SensorReading::Encoder {
                    distance: *distance,
                    speed,
                }
            }
        };
        Some(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colliders::ParryBackend;
    use crate::config::{BodyConfig, MaterialConfig, ShapeConfig};
    use approx::assert_abs_diff_eq;

    fn world() -> BodyRegistry {
        let mut reg = BodyRegistry::new();
        let robot = BodyConfig::new("robot", ShapeConfig::Circle { radius: 0.1 });
        reg.insert(Body::from_config(&robot, Pose::origin()).unwrap()).unwrap();
        let wall = BodyConfig::new("wall", ShapeConfig::rectangle(0.2, 2.0)).fixed();
        reg.insert(Body::from_config(&wall, Pose::new(1.1, 0.0, 0.0)).unwrap())
            .unwrap();
        let mut tape = MaterialConfig::default();
        tape.custom.insert(LINE_SIGNAL.to_string(), serde_json::json!(0.9));
        let line = BodyConfig::new("line", ShapeConfig::rectangle(0.05, 2.0))
            .fixed()
            .material(tape);
        reg.insert(Body::from_config(&line, Pose::new(-0.2, 0.0, 0.0)).unwrap())
            .unwrap();
        reg
    }

    fn sensor(kind: SensorKind, mount: Pose, reg: &BodyRegistry) -> Sensor {
        let cfg = SensorConfig {
            name: "s".to_string(),
            body: "robot".to_string(),
            mount_pose: mount,
            kind,
        };
        Sensor::attach(&cfg, reg).unwrap()
    }

    #[test]
    fn test_distance_hits_wall_and_skips_parent() {
        let reg = world();
        let mut s = sensor(SensorKind::Distance { max_range: 2.0 }, Pose::origin(), &reg);
        let view = SimulationView::new(&reg, &ParryBackend, 0.0);
        let Some(SensorReading::Distance { range, hit }) = s.read(&view, 0.01) else {
            panic!("expected distance reading");
        };
        assert_abs_diff_eq!(range, 1.0, epsilon = 1e-9);
        assert_eq!(hit.as_deref(), Some("wall"));
    }

    #[test]
    fn test_distance_reports_max_range_on_miss() {
        let reg = world();
        let mut s = sensor(
            SensorKind::Distance { max_range: 0.5 },
            Pose::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            &reg,
        );
        let view = SimulationView::new(&reg, &ParryBackend, 0.0);
        assert_eq!(
            s.read(&view, 0.01),
            Some(SensorReading::Distance {
                range: 0.5,
                hit: None
            })
        );
    }

    #[test]
    fn test_line_probe_reads_field_signal() {
        let reg = world();
        let mut on_line = sensor(SensorKind::Line, Pose::new(-0.2, 0.0, 0.0), &reg);
        let mut off_line = sensor(SensorKind::Line, Pose::new(0.05, 0.0, 0.0), &reg);
        let view = SimulationView::new(&reg, &ParryBackend, 0.0);
        assert_eq!(on_line.read(&view, 0.01), Some(SensorReading::Line { intensity: 0.9 }));
        assert_eq!(off_line.read(&view, 0.01), Some(SensorReading::Line { intensity: 0.0 }));
    }

    #[test]
    fn test_imu_and_encoder_track_motion() {
        let mut reg = world();
        let mut imu = sensor(SensorKind::Imu, Pose::origin(), &reg);
        let mut encoder = sensor(SensorKind::Encoder, Pose::origin(), &reg);

        reg.by_name_mut("robot").unwrap().state.linear_velocity = Vector2::new(1.0, 0.0);
        {
            let view = SimulationView::new(&reg, &ParryBackend, 0.0);
            imu.read(&view, 0.1);
            encoder.read(&view, 0.1);
        }
        reg.by_name_mut("robot").unwrap().state.linear_velocity = Vector2::new(2.0, 0.0);
        let view = SimulationView::new(&reg, &ParryBackend, 0.1);
        let Some(SensorReading::Imu { acceleration, .. }) = imu.read(&view, 0.1) else {
            panic!("expected imu reading");
        };
        assert_abs_diff_eq!(acceleration[0], 10.0, epsilon = 1e-9);
        let Some(SensorReading::Encoder { distance, speed }) = encoder.read(&view, 0.1) else {
            panic!("expected encoder reading");
        };
        assert_abs_diff_eq!(distance, 0.3, epsilon = 1e-12);
        assert_eq!(speed, 2.0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut reg = world();
        let mut imu = sensor(SensorKind::Imu, Pose::origin(), &reg);
        let mut encoder = sensor(SensorKind::Encoder, Pose::origin(), &reg);
        reg.by_name_mut("robot").unwrap().state.linear_velocity = Vector2::new(3.0, 0.0);
        {
            let view = SimulationView::new(&reg, &ParryBackend, 0.0);
            imu.read(&view, 0.1);
            encoder.read(&view, 0.1);
        }
        imu.reset();
        encoder.reset();
        assert_eq!(imu.model, SensorModel::Imu { last_velocity: None });
        assert_eq!(encoder.model, SensorModel::Encoder { distance: 0.0 });

        reg.by_name_mut("robot").unwrap().state.linear_velocity = Vector2::zeros();
        let view = SimulationView::new(&reg, &ParryBackend, 0.1);
        let Some(SensorReading::Imu { acceleration, .. }) = imu.read(&view, 0.1) else {
            panic!("expected imu reading");
        };
        assert_eq!(acceleration, [0.0, 0.0]);
    }

    #[test]
    fn test_reading_serializes_with_type_tag() {
        let json = serde_json::to_value(SensorReading::Line { intensity: 0.5 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "line", "intensity": 0.5}));
    }
}
