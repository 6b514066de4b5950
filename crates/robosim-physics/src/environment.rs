//! Static wall bodies generated from arena bounds and drawn wall strokes.

use crate::config::{BodyConfig, Bounds, MaterialConfig, ShapeConfig, WallStroke};
use crate::pose::Pose;

/// Thickness of the arena boundary walls (m).
pub const BOUND_THICKNESS: f64 = 0.05;

const MIN_STROKE_THICKNESS: f64 = 1e-4;
const MIN_SEGMENT_LENGTH: f64 = 1e-6;

fn static_wall(name: String, points: Vec<[f64; 2]>) -> BodyConfig {
    let material = MaterialConfig {
        friction: 0.9,
        restitution: 0.05,
        ..MaterialConfig::default()
    };
    BodyConfig::new(name, ShapeConfig::Polygon { points })
        .at(Pose::origin())
        .fixed()
        .mass(10.0, 10.0)
        .material(material)
}

/// Four walls straddling the edges of `bounds`.
pub fn bound_walls(bounds: &Bounds) -> Vec<BodyConfig> {
    let h = BOUND_THICKNESS / 2.0;
    let Bounds {
        min_x,
        max_x,
        min_y,
        max_y,
    } = *bounds;
    let rect = |x0: f64, y0: f64, x1: f64, y1: f64| vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]];
    [
        ("env_bound_bottom", rect(min_x - h, min_y - h, max_x + h, min_y + h)),
        ("env_bound_top", rect(min_x - h, max_y - h, max_x + h, max_y + h)),
        ("env_bound_left", rect(min_x - h, min_y - h, min_x + h, max_y + h)),
        ("env_bound_right", rect(max_x - h, min_y - h, max_x + h, max_y + h)),
    ]
    .into_iter()
    .map(|(name, points)| static_wall(name.to_string(), points))
    .collect()
}

/// One rectangle per polyline segment, numbered across all strokes.
pub fn stroke_walls(strokes: &[WallStroke]) -> Vec<BodyConfig> {
    let mut walls = Vec::new();
    for stroke in strokes {
        let half = stroke.thickness.max(MIN_STROKE_THICKNESS) / 2.0;
        for pair in stroke.points.windows(2) {
            let ([x0, y0], [x1, y1]) = (pair[0], pair[1]);
            let (dx, dy) = (x1 - x0, y1 - y0);
            let len = dx.hypot(dy);
            if len < MIN_SEGMENT_LENGTH || !len.is_finite() {
                continue;
            }
            let (nx, ny) = (-dy / len * half, dx / len * half);
            let points = vec![
                [x0 + nx, y0 + ny],
                [x1 + nx, y1 + ny],
                [x1 - nx, y1 - ny],
                [x0 - nx, y0 - ny],
            ];
            walls.push(static_wall(format!("env_wall_{}", walls.len()), points));
        }
    }
    walls
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bound_walls_named_and_static() {
        let walls = bound_walls(&Bounds {
            min_x: 0.0,
            max_x: 2.0,
            min_y: 0.0,
            max_y: 1.0,
        });
        let names: Vec<_> = walls.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(
            names,
            ["env_bound_bottom", "env_bound_top", "env_bound_left", "env_bound_right"]
        );
        assert!(walls.iter().all(|w| !w.can_move && w.material.friction == 0.9));
        let ShapeConfig::Polygon { points } = &walls[0].shape else {
            panic!("expected polygon");
        };
        assert_eq!(points[0], [-0.025, -0.025]);
        assert_abs_diff_eq!(points[2][0], 2.025, epsilon = 1e-12);
        assert_abs_diff_eq!(points[2][1], 0.025, epsilon = 1e-12);
    }

    #[test]
    fn test_strokes_skip_degenerate_segments() {
        let strokes = vec![
            WallStroke {
                points: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
                thickness: 0.1,
            },
            WallStroke {
                points: vec![[5.0, 5.0]],
                thickness: 0.1,
            },
            WallStroke {
                points: vec![[2.0, 0.0], [3.0, 0.0]],
                thickness: 0.0,
            },
        ];
        let walls = stroke_walls(&strokes);
        let names: Vec<_> = walls.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, ["env_wall_0", "env_wall_1", "env_wall_2"]);
        let ShapeConfig::Polygon { points } = &walls[0].shape else {
            panic!("expected polygon");
        };
        assert_eq!(points[0], [0.0, 0.05]);
        assert_eq!(points[3], [0.0, -0.05]);
        let ShapeConfig::Polygon { points } = &walls[2].shape else {
            panic!("expected polygon");
        };
        assert_eq!(points[0][1], MIN_STROKE_THICKNESS / 2.0);
    }
}
