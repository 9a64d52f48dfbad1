//! Isovist construction — the polygon of space visible from a point.
//!
//! Rays are cast at a fixed angular step against the wall segments; each
//! ray stops at its first wall hit or at max range. The ordered ray
//! endpoints form the isovist polygon (simple by construction, since
//! vertices are in angular order around the origin). Area comes from the
//! shoelace formula, perimeter from consecutive vertex distances, and the
//! radial statistics from the cast distances themselves.

use serde::{Deserialize, Serialize};

use crate::graph::Point;

/// A wall segment, read-only obstacle geometry owned by the extraction
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    pub start: Point,
    pub end: Point,
}

impl WallSegment {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            start: Point::new(x1, y1),
            end: Point::new(x2, y2),
        }
    }
}

/// The visibility field computed from one sample point. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsovistSample {
    pub origin: Point,
    /// Polygon vertices in angular order (one per ray).
    pub vertices: Vec<Point>,
    pub area: f64,
    pub perimeter: f64,
    /// Length of the longest unobstructed ray.
    pub max_radial: f64,
    pub mean_radial: f64,
    /// 4πA / P²: 1.0 for a circle, lower for elongated fields.
    pub compactness: f64,
    /// True when the field collapsed (no usable rays); reported, not dropped.
    pub degenerate: bool,
}

/// Cast a single ray from `origin` along `angle` (radians), returning the
/// distance to the first wall hit, or `max_range` if nothing is hit.
pub fn cast_ray(origin: Point, angle: f64, max_range: f64, walls: &[WallSegment]) -> f64 {
    let dir_x = angle.cos();
    let dir_y = angle.sin();
    let mut closest = max_range;

    for wall in walls {
        if let Some(t) = ray_segment_distance(origin, dir_x, dir_y, wall) {
            if t < closest {
                closest = t;
            }
        }
    }
    closest
}

/// Distance along the ray (origin + t·dir) to its intersection with the
/// wall, if one exists in front of the origin.
fn ray_segment_distance(origin: Point, dir_x: f64, dir_y: f64, wall: &WallSegment) -> Option<f64> {
    let ex = wall.end.x - wall.start.x;
    let ey = wall.end.y - wall.start.y;
    let den = dir_x * ey - dir_y * ex;
    if den.abs() < 1e-12 {
        return None; // parallel
    }
    let ox = wall.start.x - origin.x;
    let oy = wall.start.y - origin.y;
    let t = (ox * ey - oy * ex) / den; // along the ray
    let u = (ox * dir_y - oy * dir_x) / den; // along the wall
    if t > 1e-9 && (-1e-9..=1.0 + 1e-9).contains(&u) {
        Some(t)
    } else {
        None
    }
}

/// Compute the full isovist from `origin` with `ray_count` rays.
pub fn compute_isovist(
    origin: Point,
    walls: &[WallSegment],
    ray_count: usize,
    max_range: f64,
) -> IsovistSample {
    let mut vertices = Vec::with_capacity(ray_count);
    let mut radials = Vec::with_capacity(ray_count);

    for i in 0..ray_count {
        let angle = std::f64::consts::TAU * i as f64 / ray_count as f64;
        let dist = cast_ray(origin, angle, max_range, walls);
        radials.push(dist);
        vertices.push(Point::new(
            origin.x + dist * angle.cos(),
            origin.y + dist * angle.sin(),
        ));
    }

    if vertices.len() < 3 || radials.iter().all(|&r| r <= 1e-6) {
        // Fully enclosed point: flagged, kept in the result set.
        return degenerate_sample(origin);
    }

    let area = shoelace_area(&vertices);
    if area <= 1e-9 {
        return degenerate_sample(origin);
    }
    let perimeter = polygon_perimeter(&vertices);
    let max_radial = radials.iter().fold(0.0_f64, |a, &b| a.max(b));
    let mean_radial = radials.iter().sum::<f64>() / radials.len() as f64;
    let compactness = if perimeter > 0.0 {
        (4.0 * std::f64::consts::PI * area) / (perimeter * perimeter)
    } else {
        0.0
    };

    IsovistSample {
        origin,
        vertices,
        area,
        perimeter,
        max_radial,
        mean_radial,
        compactness,
        degenerate: false,
    }
}

fn degenerate_sample(origin: Point) -> IsovistSample {
    IsovistSample {
        origin,
        vertices: Vec::new(),
        area: 0.0,
        perimeter: 0.0,
        max_radial: 0.0,
        mean_radial: 0.0,
        compactness: 0.0,
        degenerate: true,
    }
}

/// Shoelace formula over a closed polygon given as an ordered vertex list.
pub fn shoelace_area(vertices: &[Point]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        twice_area += a.x * b.y - b.x * a.y;
    }
    (twice_area / 2.0).abs()
}

fn polygon_perimeter(vertices: &[Point]) -> f64 {
    if vertices.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        total += a.distance(&b);
    }
    total
}

/// True when the open segment p–q crosses no wall: mutual line of sight.
pub fn line_of_sight(p: Point, q: Point, walls: &[WallSegment]) -> bool {
    for wall in walls {
        if segments_intersect(p, q, wall.start, wall.end) {
            return false;
        }
    }
    true
}

/// Standard orientation-based segment intersection, counting touching
/// endpoints and collinear overlap as intersection (a grazing sightline
/// along a wall is blocked).
pub fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1.abs() < 1e-12 && on_segment(q1, q2, p1))
        || (d2.abs() < 1e-12 && on_segment(q1, q2, p2))
        || (d3.abs() < 1e-12 && on_segment(p1, p2, q1))
        || (d4.abs() < 1e-12 && on_segment(p1, p2, q2))
}

fn cross(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) - 1e-12
        && p.x <= a.x.max(b.x) + 1e-12
        && p.y >= a.y.min(b.y) - 1e-12
        && p.y <= a.y.max(b.y) + 1e-12
}

/// True when `p` lies on any wall segment (within `eps`). Grid points on a
/// wall boundary are excluded from sampling.
pub fn point_on_any_wall(p: Point, walls: &[WallSegment], eps: f64) -> bool {
    walls.iter().any(|w| point_segment_distance(p, w) <= eps)
}

fn point_segment_distance(p: Point, wall: &WallSegment) -> f64 {
    let vx = wall.end.x - wall.start.x;
    let vy = wall.end.y - wall.start.y;
    let len_sq = vx * vx + vy * vy;
    if len_sq < 1e-24 {
        return p.distance(&wall.start);
    }
    let t = (((p.x - wall.start.x) * vx + (p.y - wall.start.y) * vy) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(wall.start.x + t * vx, wall.start.y + t * vy);
    p.distance(&proj)
}

/// Axis-aligned walls of a rectangular room, handy for tests and demos.
pub fn rectangle_walls(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<WallSegment> {
    vec![
        WallSegment::new(min_x, min_y, max_x, min_y),
        WallSegment::new(max_x, min_y, max_x, max_y),
        WallSegment::new(max_x, max_y, min_x, max_y),
        WallSegment::new(min_x, max_y, min_x, min_y),
    ]
}
