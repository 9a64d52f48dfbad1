//! Visibility Graph Analysis — sample grid, mutual sight lines, and
//! visual integration.
//!
//! A regular grid is laid over the walkable extent of the wall geometry
//! (cell centers, so the default grid never sits on a perimeter wall).
//! If the grid exceeds the configured cap the spacing is coarsened
//! deterministically — never randomly subsampled — so the same input
//! always yields the same samples. Each sample gets an isovist; every
//! unordered pair gets one mutual-visibility test.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::SamplingConfig;
use crate::error::InputError;
use crate::graph::Point;
use crate::isovist::{compute_isovist, line_of_sight, point_on_any_wall, IsovistSample, WallSegment};
use crate::stats::{mean, percentile};

/// Spacing growth applied per coarsening round until the cap is met.
const COARSEN_STEP: f64 = 1.5;

/// Graph of mutual sight lines between sample points.
///
/// Edges are tested once per unordered pair and stored in both adjacency
/// lists, so symmetry holds by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityGraph {
    pub points: Vec<Point>,
    adjacency: Vec<Vec<usize>>,
}

impl VisibilityGraph {
    pub fn node_count(&self) -> usize {
        self.points.len()
    }

    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.adjacency.get(index).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.neighbors(a).contains(&b)
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(|n| n.len()).sum::<usize>() / 2
    }
}

/// Per-sample VGA metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SampleMetrics {
    pub index: usize,
    pub origin: Point,
    pub visible_neighbors: usize,
    /// 0.5·(neighbors / max observed) + 0.5·(isovist area / normalization).
    pub visual_integration: f64,
}

/// Full visibility-analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityReport {
    pub samples: Vec<IsovistSample>,
    pub graph: VisibilityGraph,
    pub metrics: Vec<SampleMetrics>,
    /// Sample indices below the blind-spot percentile of visual integration.
    pub blind_spots: Vec<usize>,
    /// Sample indices above the wide-view percentile.
    pub wide_view_points: Vec<usize>,
    pub mean_visual_integration: f64,
    /// Spacing actually used after any coarsening rounds.
    pub effective_spacing: f64,
    pub degenerate_count: usize,
}

/// Run the full VGA pass over the wall geometry.
pub fn analyze(walls: &[WallSegment], cfg: &SamplingConfig) -> Result<VisibilityReport, InputError> {
    let (points, effective_spacing) = generate_grid(walls, cfg)?;

    let ray_count = (360.0 / cfg.angular_step_deg).round().max(3.0) as usize;
    let samples: Vec<IsovistSample> = points
        .iter()
        .map(|&p| compute_isovist(p, walls, ray_count, cfg.max_ray_range))
        .collect();

    let degenerate_count = samples.iter().filter(|s| s.degenerate).count();
    if degenerate_count > 0 {
        warn!("{degenerate_count} of {} isovists are degenerate (zero area)", samples.len());
    }

    let graph = build_visibility_graph(&points, walls);

    // Visual integration against the largest observed neighbor count and
    // the fixed (cross-plan comparable) area normalization constant.
    let max_neighbors = (0..points.len())
        .map(|i| graph.neighbors(i).len())
        .max()
        .unwrap_or(0);
    let metrics: Vec<SampleMetrics> = (0..points.len())
        .map(|i| {
            let visible_neighbors = graph.neighbors(i).len();
            let neighbor_term = if max_neighbors > 0 {
                visible_neighbors as f64 / max_neighbors as f64
            } else {
                0.0
            };
            let area_term = samples[i].area / cfg.area_normalization;
            SampleMetrics {
                index: i,
                origin: points[i],
                visible_neighbors,
                visual_integration: 0.5 * neighbor_term + 0.5 * area_term,
            }
        })
        .collect();

    let vi_values: Vec<f64> = metrics.iter().map(|m| m.visual_integration).collect();
    let blind_threshold = percentile(&vi_values, cfg.blind_spot_percentile);
    let wide_threshold = percentile(&vi_values, cfg.wide_view_percentile);
    let blind_spots: Vec<usize> = metrics
        .iter()
        .filter(|m| m.visual_integration <= blind_threshold)
        .map(|m| m.index)
        .collect();
    let wide_view_points: Vec<usize> = metrics
        .iter()
        .filter(|m| m.visual_integration >= wide_threshold)
        .map(|m| m.index)
        .collect();

    Ok(VisibilityReport {
        mean_visual_integration: mean(&vi_values),
        samples,
        graph,
        metrics,
        blind_spots,
        wide_view_points,
        effective_spacing,
        degenerate_count,
    })
}

/// Lay a cell-centered grid over the wall extent, excluding points that sit
/// exactly on a wall. Coarsens the spacing deterministically until the
/// sample cap is met.
fn generate_grid(walls: &[WallSegment], cfg: &SamplingConfig) -> Result<(Vec<Point>, f64), InputError> {
    let bounds = wall_extent(walls).ok_or(InputError::EmptySampleGrid {
        spacing: cfg.grid_spacing,
        cap: cfg.max_samples,
    })?;

    let mut spacing = cfg.grid_spacing;
    loop {
        let points = grid_points(bounds, spacing, walls);
        if points.len() <= cfg.max_samples {
            if points.is_empty() {
                return Err(InputError::EmptySampleGrid {
                    spacing: cfg.grid_spacing,
                    cap: cfg.max_samples,
                });
            }
            if spacing > cfg.grid_spacing {
                warn!(
                    "sample cap {} exceeded at spacing {}; coarsened to {spacing}",
                    cfg.max_samples, cfg.grid_spacing
                );
            }
            return Ok((points, spacing));
        }
        spacing *= COARSEN_STEP;
    }
}

fn wall_extent(walls: &[WallSegment]) -> Option<(f64, f64, f64, f64)> {
    if walls.is_empty() {
        return None;
    }
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for w in walls {
        for p in [w.start, w.end] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
    }
    if max_x > min_x && max_y > min_y {
        Some((min_x, min_y, max_x, max_y))
    } else {
        None
    }
}

fn grid_points(
    (min_x, min_y, max_x, max_y): (f64, f64, f64, f64),
    spacing: f64,
    walls: &[WallSegment],
) -> Vec<Point> {
    let mut points = Vec::new();
    let mut y = min_y + spacing / 2.0;
    while y < max_y {
        let mut x = min_x + spacing / 2.0;
        while x < max_x {
            let p = Point::new(x, y);
            if !point_on_any_wall(p, walls, 1e-9) {
                points.push(p);
            }
            x += spacing;
        }
        y += spacing;
    }
    points
}

fn build_visibility_graph(points: &[Point], walls: &[WallSegment]) -> VisibilityGraph {
    let mut adjacency = vec![Vec::new(); points.len()];
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            if line_of_sight(points[i], points[j], walls) {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }
    VisibilityGraph {
        points: points.to_vec(),
        adjacency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isovist::rectangle_walls;

    fn room_10x10() -> Vec<WallSegment> {
        rectangle_walls(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn open_room_everyone_sees_everyone() {
        let walls = room_10x10();
        let cfg = SamplingConfig {
            grid_spacing: 4.0,
            ..SamplingConfig::default()
        };
        let report = analyze(&walls, &cfg).unwrap();
        let n = report.graph.node_count();
        assert!(n >= 4);
        assert_eq!(report.graph.edge_count(), n * (n - 1) / 2);
        for m in &report.metrics {
            assert_eq!(m.visible_neighbors, n - 1);
        }
    }

    #[test]
    fn graph_is_symmetric() {
        // A dividing wall with a gap forces a mix of visible and blocked pairs.
        let mut walls = room_10x10();
        walls.push(WallSegment::new(5.0, 0.0, 5.0, 7.0));
        let cfg = SamplingConfig {
            grid_spacing: 2.0,
            ..SamplingConfig::default()
        };
        let report = analyze(&walls, &cfg).unwrap();
        let n = report.graph.node_count();
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    assert_eq!(
                        report.graph.has_edge(i, j),
                        report.graph.has_edge(j, i),
                        "asymmetry at ({i}, {j})"
                    );
                }
            }
        }
        // The wall must actually block something.
        assert!(report.graph.edge_count() < n * (n - 1) / 2);
    }

    #[test]
    fn cap_triggers_deterministic_coarsening() {
        let walls = room_10x10();
        let cfg = SamplingConfig {
            grid_spacing: 0.5,
            max_samples: 30,
            ..SamplingConfig::default()
        };
        let a = analyze(&walls, &cfg).unwrap();
        let b = analyze(&walls, &cfg).unwrap();
        assert!(a.graph.node_count() <= 30);
        assert!(a.effective_spacing > 0.5);
        // Reproducible: identical sample sets both times.
        assert_eq!(a.graph.node_count(), b.graph.node_count());
        for (p, q) in a.graph.points.iter().zip(b.graph.points.iter()) {
            assert_eq!(p, q);
        }
    }

    #[test]
    fn no_walls_is_fatal() {
        let err = analyze(&[], &SamplingConfig::default()).unwrap_err();
        assert!(matches!(err, InputError::EmptySampleGrid { .. }));
    }

    #[test]
    fn grid_skips_points_on_walls() {
        // An interior wall passing exactly through would-be cell centers.
        let mut walls = room_10x10();
        walls.push(WallSegment::new(0.0, 5.0, 10.0, 5.0));
        let cfg = SamplingConfig {
            grid_spacing: 10.0, // cell centers at (5, 5) only
            ..SamplingConfig::default()
        };
        let result = analyze(&walls, &cfg);
        // The single candidate sits on the dividing wall, so the grid is empty.
        assert!(matches!(result, Err(InputError::EmptySampleGrid { .. })));
    }

    #[test]
    fn blind_spots_have_lowest_integration() {
        let mut walls = room_10x10();
        // A pocket in one corner limits visibility there.
        walls.push(WallSegment::new(2.0, 0.0, 2.0, 2.5));
        walls.push(WallSegment::new(0.0, 2.5, 1.2, 2.5));
        let cfg = SamplingConfig {
            grid_spacing: 1.0,
            ..SamplingConfig::default()
        };
        let report = analyze(&walls, &cfg).unwrap();
        assert!(!report.blind_spots.is_empty());
        assert!(!report.wide_view_points.is_empty());
        let vi_values: Vec<f64> = report
            .metrics
            .iter()
            .map(|m| m.visual_integration)
            .collect();
        let threshold = percentile(&vi_values, cfg.blind_spot_percentile);
        let worst = vi_values.iter().copied().fold(f64::INFINITY, f64::min);
        // Blind spots are exactly the samples at or below the configured
        // low percentile, and the single worst sample is among them.
        for &idx in &report.blind_spots {
            let vi = report.metrics[idx].visual_integration;
            assert!(vi <= threshold, "index {idx}: {vi} above p{}", cfg.blind_spot_percentile);
        }
        assert!(report.blind_spots.iter().any(|&i| {
            (report.metrics[i].visual_integration - worst).abs() < 1e-12
        }));
    }
}
