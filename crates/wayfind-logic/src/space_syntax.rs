//! Space-syntax metrics — integration, choice, control.
//!
//! Hillier & Hanson convex-space analysis over the navigation graph:
//! per-node mean depth via BFS, real asymmetry normalized against the
//! diamond-graph D value, Brandes betweenness as choice, and
//! reciprocal-degree control. Disconnected components are analyzed
//! independently, each with its own k; components too small for
//! integration (k < 3) report it as undefined rather than failing.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::SpaceSyntaxConfig;
use crate::graph::{NavGraph, NodeId};
use crate::stats::{percentile, MetricSummary};

/// Floor for RRA before inversion. A node at depth 1 from everything
/// (star center, complete graph) has RA = 0; flooring keeps Integration
/// finite and positive instead of dividing by zero.
const MIN_RRA: f64 = 1e-6;

/// Diamond-graph D values for k = 3..=16, from the published space-syntax
/// normalization tables. Index 0 holds D_3.
const D_VALUE_TABLE: [f64; 14] = [
    0.210897, // k = 3
    0.333333, // k = 4
    0.351994, // k = 5
    0.349022, // k = 6
    0.339649, // k = 7
    0.328368, // k = 8
    0.316794, // k = 9
    0.305556, // k = 10
    0.294894, // k = 11
    0.284886, // k = 12
    0.275531, // k = 13
    0.266802, // k = 14
    0.258654, // k = 15
    0.251042, // k = 16
];

/// D_k normalization constant for a diamond-shaped graph of k nodes.
///
/// k <= 16 uses the exact table; larger k uses the standard asymptotic
/// closed form 2·(k·(log2((k+2)/3) − 1) + 1) / ((k−1)·(k−2)). The two
/// agree at the boundary, so integration is continuous in k.
pub fn d_value(k: usize) -> Option<f64> {
    if k < 3 {
        return None;
    }
    if k <= 16 {
        return Some(D_VALUE_TABLE[k - 3]);
    }
    let kf = k as f64;
    let num = 2.0 * (kf * (((kf + 2.0) / 3.0).log2() - 1.0) + 1.0);
    Some(num / ((kf - 1.0) * (kf - 2.0)))
}

/// Per-node space-syntax metrics.
///
/// `mean_depth`, `ra`, `rra` and `integration` are `None` when the node's
/// component is too small to define them (k < 3; mean depth needs k >= 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node: NodeId,
    pub degree: usize,
    pub mean_depth: Option<f64>,
    pub ra: Option<f64>,
    pub rra: Option<f64>,
    pub integration: Option<f64>,
    /// Shortest-path betweenness over the weighted graph, normalized.
    pub choice: f64,
    /// Σ 1/degree(neighbor): how much this node dominates its neighbors.
    pub control: f64,
    /// Mean reciprocal neighbor degree: control received, not exerted.
    pub controllability: f64,
    pub is_bottleneck: bool,
    pub is_hub: bool,
}

/// Metrics for one connected component (its own k).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    /// Node ids in this component, ascending.
    pub nodes: Vec<NodeId>,
    pub size: usize,
    /// False when k < 3 and integration was skipped.
    pub integration_defined: bool,
    /// Per-node metrics, ordered by node id.
    pub metrics: Vec<NodeMetrics>,
    pub integration_summary: Option<MetricSummary>,
    pub choice_summary: Option<MetricSummary>,
    pub control_summary: Option<MetricSummary>,
    pub mean_depth_summary: Option<MetricSummary>,
}

/// Full space-syntax result over all components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceSyntaxReport {
    pub components: Vec<ComponentReport>,
}

impl SpaceSyntaxReport {
    /// Flattened view of every node's metrics across components.
    pub fn all_metrics(&self) -> impl Iterator<Item = &NodeMetrics> {
        self.components.iter().flat_map(|c| c.metrics.iter())
    }

    /// Mean integration across every node where it is defined.
    pub fn mean_integration(&self) -> Option<f64> {
        let values: Vec<f64> = self.all_metrics().filter_map(|m| m.integration).collect();
        if values.is_empty() {
            None
        } else {
            Some(crate::stats::mean(&values))
        }
    }
}

/// Analyze every connected component of the graph independently.
pub fn analyze(graph: &NavGraph, cfg: &SpaceSyntaxConfig) -> SpaceSyntaxReport {
    let components = graph.connected_components();
    let mut reports = Vec::with_capacity(components.len());
    if components.len() > 1 {
        warn!(
            "graph has {} disconnected components; each analyzed with its own k",
            components.len()
        );
    }
    for component in components {
        reports.push(analyze_component(graph, &component, cfg));
    }
    SpaceSyntaxReport {
        components: reports,
    }
}

fn analyze_component(
    graph: &NavGraph,
    component: &[NodeId],
    cfg: &SpaceSyntaxConfig,
) -> ComponentReport {
    let k = component.len();
    let dk = d_value(k);
    if dk.is_none() {
        warn!("component of {k} node(s) too small for integration; reporting undefined");
    }

    let betweenness = brandes_betweenness(graph, component);

    let mut metrics = Vec::with_capacity(k);
    for &node in component {
        let degree = graph.degree(node);

        // Mean depth over BFS edge counts to all other component nodes.
        let mean_depth = if k >= 2 {
            let depths = graph.bfs_depths(node);
            let total: u64 = depths.values().map(|&d| d as u64).sum();
            Some(total as f64 / (k - 1) as f64)
        } else {
            None
        };

        let (ra, rra, integration) = match (mean_depth, dk) {
            (Some(md), Some(d)) if k >= 3 => {
                let ra = 2.0 * (md - 1.0) / (k as f64 - 2.0);
                let rra = ra / d;
                let integration = 1.0 / rra.max(MIN_RRA);
                (Some(ra), Some(rra), Some(integration))
            }
            _ => (None, None, None),
        };

        let control: f64 = graph
            .neighbors(node)
            .iter()
            .map(|&(nb, _)| {
                let d = graph.degree(nb);
                if d > 0 {
                    1.0 / d as f64
                } else {
                    0.0
                }
            })
            .sum();
        let controllability = if degree > 0 {
            control / degree as f64
        } else {
            0.0
        };

        metrics.push(NodeMetrics {
            node,
            degree,
            mean_depth,
            ra,
            rra,
            integration,
            choice: betweenness.get(&node).copied().unwrap_or(0.0),
            control,
            controllability,
            is_bottleneck: false,
            is_hub: false,
        });
    }

    classify_critical_nodes(&mut metrics, cfg);

    let integration_values: Vec<f64> = metrics.iter().filter_map(|m| m.integration).collect();
    let choice_values: Vec<f64> = metrics.iter().map(|m| m.choice).collect();
    let control_values: Vec<f64> = metrics.iter().map(|m| m.control).collect();
    let depth_values: Vec<f64> = metrics.iter().filter_map(|m| m.mean_depth).collect();

    ComponentReport {
        nodes: component.to_vec(),
        size: k,
        integration_defined: dk.is_some(),
        integration_summary: MetricSummary::from_values(&integration_values),
        choice_summary: MetricSummary::from_values(&choice_values),
        control_summary: MetricSummary::from_values(&control_values),
        mean_depth_summary: MetricSummary::from_values(&depth_values),
        metrics,
    }
}

/// Flag bottlenecks (high choice) and hubs (high integration) against the
/// configured percentile thresholds, within one component.
fn classify_critical_nodes(metrics: &mut [NodeMetrics], cfg: &SpaceSyntaxConfig) {
    let choice_values: Vec<f64> = metrics.iter().map(|m| m.choice).collect();
    if choice_values.iter().any(|&v| v > 0.0) {
        let threshold = percentile(&choice_values, cfg.bottleneck_percentile);
        for m in metrics.iter_mut() {
            m.is_bottleneck = m.choice >= threshold && m.choice > 0.0;
        }
    }

    let integration_values: Vec<f64> = metrics.iter().filter_map(|m| m.integration).collect();
    if !integration_values.is_empty() {
        let threshold = percentile(&integration_values, cfg.hub_percentile);
        for m in metrics.iter_mut() {
            m.is_hub = m.integration.map(|v| v >= threshold).unwrap_or(false);
        }
    }
}

/// Brandes' betweenness centrality over the weighted graph, restricted to
/// one component, normalized by 2/((k−1)(k−2)) for undirected graphs.
fn brandes_betweenness(graph: &NavGraph, component: &[NodeId]) -> HashMap<NodeId, f64> {
    let k = component.len();
    let mut centrality: HashMap<NodeId, f64> = component.iter().map(|&n| (n, 0.0)).collect();
    if k < 3 {
        return centrality;
    }

    for &source in component {
        // Dijkstra with shortest-path counts and predecessor lists.
        let mut dist: HashMap<NodeId, f64> = HashMap::new();
        let mut sigma: HashMap<NodeId, f64> = component.iter().map(|&n| (n, 0.0)).collect();
        let mut preds: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut settled: Vec<NodeId> = Vec::new();

        dist.insert(source, 0.0);
        sigma.insert(source, 1.0);

        let mut heap = std::collections::BinaryHeap::new();
        heap.push(std::cmp::Reverse((HeapDist(0.0), source)));

        let mut done: HashMap<NodeId, bool> = HashMap::new();
        while let Some(std::cmp::Reverse((HeapDist(d), node))) = heap.pop() {
            if *done.get(&node).unwrap_or(&false) {
                continue;
            }
            if d > dist.get(&node).copied().unwrap_or(f64::INFINITY) {
                continue;
            }
            done.insert(node, true);
            settled.push(node);
            for &(next, w) in graph.neighbors(node) {
                let nd = d + w;
                let cur = dist.get(&next).copied().unwrap_or(f64::INFINITY);
                if nd < cur - 1e-12 {
                    dist.insert(next, nd);
                    sigma.insert(next, sigma[&node]);
                    preds.insert(next, vec![node]);
                    heap.push(std::cmp::Reverse((HeapDist(nd), next)));
                } else if (nd - cur).abs() <= 1e-12 {
                    // Another shortest path of equal length.
                    *sigma.entry(next).or_insert(0.0) += sigma[&node];
                    preds.entry(next).or_default().push(node);
                }
            }
        }

        // Dependency accumulation, farthest-first.
        let mut delta: HashMap<NodeId, f64> = component.iter().map(|&n| (n, 0.0)).collect();
        for &w in settled.iter().rev() {
            if let Some(pred_list) = preds.get(&w) {
                for &v in pred_list {
                    let share = sigma[&v] / sigma[&w] * (1.0 + delta[&w]);
                    *delta.entry(v).or_insert(0.0) += share;
                }
            }
            if w != source {
                *centrality.entry(w).or_insert(0.0) += delta[&w];
            }
        }
    }

    // Each unordered pair was counted from both endpoints.
    let scale = 1.0 / ((k - 1) as f64 * (k - 2) as f64);
    for value in centrality.values_mut() {
        *value *= scale;
    }
    centrality
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapDist(f64);

impl Eq for HeapDist {}

impl PartialOrd for HeapDist {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapDist {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, Point};

    fn node(id: NodeId, x: f64, y: f64) -> Node {
        Node {
            id,
            position: Point::new(x, y),
            tag: None,
        }
    }

    fn edge(a: NodeId, b: NodeId, w: f64) -> Edge {
        Edge { a, b, weight: w }
    }

    fn star_graph() -> NavGraph {
        // center 0, leaves 1..=5
        let mut nodes = vec![node(0, 0.0, 0.0)];
        let mut edges = Vec::new();
        for i in 1..=5 {
            nodes.push(node(i, i as f64, 0.0));
            edges.push(edge(0, i, 1.0));
        }
        NavGraph::build(&nodes, &edges).unwrap()
    }

    #[test]
    fn d_value_boundaries() {
        assert!(d_value(2).is_none());
        assert!((d_value(3).unwrap() - 0.210897).abs() < 1e-6);
        assert!((d_value(16).unwrap() - 0.251042).abs() < 1e-6);
        // Continuous across the table/formula boundary.
        let d16 = d_value(16).unwrap();
        let d17 = d_value(17).unwrap();
        assert!((d16 - d17).abs() < 0.01);
    }

    #[test]
    fn line_graph_integration_finite_positive() {
        let nodes = vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0), node(3, 2.0, 0.0)];
        let edges = vec![edge(1, 2, 1.0), edge(2, 3, 1.0)];
        let g = NavGraph::build(&nodes, &edges).unwrap();
        let report = analyze(&g, &SpaceSyntaxConfig::default());
        assert_eq!(report.components.len(), 1);
        for m in report.all_metrics() {
            let integ = m.integration.unwrap();
            assert!(integ.is_finite() && integ > 0.0, "node {}: {integ}", m.node);
        }
        // Middle node is shallower than the ends.
        let comp = &report.components[0];
        let mid = comp.metrics.iter().find(|m| m.node == 2).unwrap();
        let end = comp.metrics.iter().find(|m| m.node == 1).unwrap();
        assert!(mid.integration.unwrap() > end.integration.unwrap());
    }

    #[test]
    fn star_center_has_max_choice_and_degree() {
        let g = star_graph();
        let report = analyze(&g, &SpaceSyntaxConfig::default());
        let comp = &report.components[0];
        let center = comp.metrics.iter().find(|m| m.node == 0).unwrap();
        for m in &comp.metrics {
            if m.node != 0 {
                assert!(center.choice > m.choice);
                assert!(center.degree > m.degree);
            }
        }
        // Every s-t pair among the 5 leaves passes through the center.
        assert!((center.choice - 1.0).abs() < 1e-9);
        assert!(center.is_bottleneck);
    }

    #[test]
    fn star_control_values() {
        let g = star_graph();
        let report = analyze(&g, &SpaceSyntaxConfig::default());
        let comp = &report.components[0];
        let center = comp.metrics.iter().find(|m| m.node == 0).unwrap();
        let leaf = comp.metrics.iter().find(|m| m.node == 1).unwrap();
        // Center receives 1/1 from each of 5 leaves; each leaf gets 1/5.
        assert!((center.control - 5.0).abs() < 1e-12);
        assert!((leaf.control - 0.2).abs() < 1e-12);
        assert!((leaf.controllability - 0.2).abs() < 1e-12);
    }

    #[test]
    fn two_node_component_reports_undefined_integration() {
        let nodes = vec![
            node(1, 0.0, 0.0),
            node(2, 1.0, 0.0),
            node(3, 5.0, 5.0),
            node(4, 6.0, 5.0),
            node(5, 7.0, 5.0),
        ];
        let edges = vec![edge(1, 2, 1.0), edge(3, 4, 1.0), edge(4, 5, 1.0)];
        let g = NavGraph::build(&nodes, &edges).unwrap();
        let report = analyze(&g, &SpaceSyntaxConfig::default());
        assert_eq!(report.components.len(), 2);

        let small = &report.components[0];
        assert_eq!(small.size, 2);
        assert!(!small.integration_defined);
        for m in &small.metrics {
            assert!(m.integration.is_none());
            assert!(m.mean_depth.is_some()); // depth still defined for k = 2
        }

        let big = &report.components[1];
        assert!(big.integration_defined);
        for m in &big.metrics {
            let v = m.integration.unwrap();
            assert!(v.is_finite() && v > 0.0);
        }
    }

    #[test]
    fn weighted_choice_follows_cheap_route() {
        // Square 1-2-3-4 where the 1-4 side is expensive: paths route the
        // long way around, giving the middle nodes all the betweenness.
        let nodes = vec![
            node(1, 0.0, 0.0),
            node(2, 1.0, 0.0),
            node(3, 2.0, 0.0),
            node(4, 3.0, 0.0),
        ];
        let edges = vec![
            edge(1, 2, 1.0),
            edge(2, 3, 1.0),
            edge(3, 4, 1.0),
            edge(1, 4, 10.0),
        ];
        let g = NavGraph::build(&nodes, &edges).unwrap();
        let report = analyze(&g, &SpaceSyntaxConfig::default());
        let comp = &report.components[0];
        let m2 = comp.metrics.iter().find(|m| m.node == 2).unwrap();
        let m1 = comp.metrics.iter().find(|m| m.node == 1).unwrap();
        assert!(m2.choice > m1.choice);
    }

    #[test]
    fn mean_integration_across_report() {
        let g = star_graph();
        let report = analyze(&g, &SpaceSyntaxConfig::default());
        let mi = report.mean_integration().unwrap();
        assert!(mi.is_finite() && mi > 0.0);
    }
}
