//! Graph model — the topological representation of circulation space.
//!
//! `NavGraph` holds a validated adjacency list built from externally
//! supplied nodes (rooms, corridors, decision points) and edges (doors,
//! corridor links). It provides BFS depths, weighted shortest-path
//! distances, and connected-component enumeration for the analyzers.
//!
//! All iteration orders (node ids, neighbor lists) are sorted at build
//! time so downstream results are deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::InputError;

pub type NodeId = u32;

/// A 2-D position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Semantic tag for a node, supplied by the floor-plan extraction collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeTag {
    Room,
    Corridor,
    DecisionPoint,
}

/// A circulation node. Immutable after graph construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Point,
    pub tag: Option<NodeTag>,
}

/// An undirected connection between two nodes, stored once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub a: NodeId,
    pub b: NodeId,
    /// Walked distance in meters. Non-negative.
    pub weight: f64,
}

/// Validated navigation graph with sorted, deterministic adjacency.
#[derive(Debug, Clone)]
pub struct NavGraph {
    nodes: HashMap<NodeId, Node>,
    /// node id → sorted list of (neighbor id, edge weight)
    adj: HashMap<NodeId, Vec<(NodeId, f64)>>,
    /// All node ids, ascending.
    ids: Vec<NodeId>,
}

impl NavGraph {
    /// Build and validate a graph from plain node/edge data.
    ///
    /// Fatal errors: fewer than 2 nodes, duplicate node ids, edges that
    /// reference nonexistent nodes, non-finite or negative edge weights.
    pub fn build(nodes: &[Node], edges: &[Edge]) -> Result<Self, InputError> {
        if nodes.len() < 2 {
            return Err(InputError::GraphTooSmall { count: nodes.len() });
        }

        let mut node_map: HashMap<NodeId, Node> = HashMap::with_capacity(nodes.len());
        for n in nodes {
            if node_map.insert(n.id, *n).is_some() {
                return Err(InputError::DuplicateNode { node: n.id });
            }
        }

        let mut adj: HashMap<NodeId, Vec<(NodeId, f64)>> = HashMap::with_capacity(nodes.len());
        for n in nodes {
            adj.insert(n.id, Vec::new());
        }

        for (index, e) in edges.iter().enumerate() {
            if !node_map.contains_key(&e.a) {
                return Err(InputError::UnknownEdgeNode { index, node: e.a });
            }
            if !node_map.contains_key(&e.b) {
                return Err(InputError::UnknownEdgeNode { index, node: e.b });
            }
            if !e.weight.is_finite() || e.weight < 0.0 {
                return Err(InputError::InvalidEdgeWeight {
                    index,
                    weight: e.weight,
                });
            }
            adj.entry(e.a).or_default().push((e.b, e.weight));
            adj.entry(e.b).or_default().push((e.a, e.weight));
        }

        // Sorted neighbor lists make tie-breaks and RNG draws reproducible.
        for list in adj.values_mut() {
            list.sort_by(|x, y| x.0.cmp(&y.0));
        }
        let mut ids: Vec<NodeId> = node_map.keys().copied().collect();
        ids.sort_unstable();

        Ok(Self {
            nodes: node_map,
            adj,
            ids,
        })
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// All node ids in ascending order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn position(&self, id: NodeId) -> Option<Point> {
        self.nodes.get(&id).map(|n| n.position)
    }

    /// Sorted neighbor list: (neighbor id, edge weight).
    pub fn neighbors(&self, id: NodeId) -> &[(NodeId, f64)] {
        self.adj.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.neighbors(id).len()
    }

    /// A node is a decision point when more than one choice exists there.
    pub fn is_decision_point(&self, id: NodeId) -> bool {
        self.degree(id) > 1
    }

    /// Straight-line distance between two node positions.
    pub fn straight_line(&self, a: NodeId, b: NodeId) -> Option<f64> {
        Some(self.position(a)?.distance(&self.position(b)?))
    }

    /// Topological depths (edge counts) from `from` via BFS.
    ///
    /// Unreachable nodes are absent from the result.
    pub fn bfs_depths(&self, from: NodeId) -> HashMap<NodeId, u32> {
        let mut depths = HashMap::new();
        if !self.contains(from) {
            return depths;
        }
        depths.insert(from, 0);
        let mut queue = VecDeque::new();
        queue.push_back(from);
        while let Some(current) = queue.pop_front() {
            let d = depths[&current];
            for &(next, _) in self.neighbors(current) {
                if !depths.contains_key(&next) {
                    depths.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }
        depths
    }

    /// Weighted shortest-path distances from `from` via Dijkstra.
    ///
    /// Unreachable nodes are absent from the result.
    pub fn shortest_distances(&self, from: NodeId) -> HashMap<NodeId, f64> {
        let mut dist: HashMap<NodeId, f64> = HashMap::new();
        if !self.contains(from) {
            return dist;
        }
        let mut heap: BinaryHeap<Reverse<(OrderedDist, NodeId)>> = BinaryHeap::new();
        dist.insert(from, 0.0);
        heap.push(Reverse((OrderedDist(0.0), from)));

        while let Some(Reverse((OrderedDist(d), node))) = heap.pop() {
            if d > dist.get(&node).copied().unwrap_or(f64::INFINITY) {
                continue; // stale heap entry
            }
            for &(next, w) in self.neighbors(node) {
                let nd = d + w;
                if nd < dist.get(&next).copied().unwrap_or(f64::INFINITY) {
                    dist.insert(next, nd);
                    heap.push(Reverse((OrderedDist(nd), next)));
                }
            }
        }
        dist
    }

    /// Connected components as sorted node-id lists, largest-id-first stable:
    /// components are ordered by their smallest node id.
    pub fn connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut components = Vec::new();
        for &start in &self.ids {
            if seen.contains(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::new();
            seen.insert(start);
            queue.push_back(start);
            while let Some(current) = queue.pop_front() {
                component.push(current);
                for &(next, _) in self.neighbors(current) {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Graph diameter in hops: the largest BFS eccentricity over all nodes,
    /// per component. Used to size agent step budgets.
    pub fn diameter_hops(&self) -> u32 {
        let mut diameter = 0;
        for &id in &self.ids {
            let depths = self.bfs_depths(id);
            if let Some(&ecc) = depths.values().max() {
                diameter = diameter.max(ecc);
            }
        }
        diameter
    }
}

/// f64 wrapper giving Dijkstra's heap a total order.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedDist(f64);

impl Eq for OrderedDist {}

impl PartialOrd for OrderedDist {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedDist {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn node(id: NodeId, x: f64, y: f64) -> Node {
        Node {
            id,
            position: Point::new(x, y),
            tag: None,
        }
    }

    fn edge(a: NodeId, b: NodeId, weight: f64) -> Edge {
        Edge { a, b, weight }
    }

    fn line_graph() -> NavGraph {
        // 1 — 2 — 3, unit weights
        let nodes = vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0), node(3, 2.0, 0.0)];
        let edges = vec![edge(1, 2, 1.0), edge(2, 3, 1.0)];
        NavGraph::build(&nodes, &edges).unwrap()
    }

    #[test]
    fn build_rejects_unknown_edge_node() {
        let nodes = vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0)];
        let edges = vec![edge(1, 99, 1.0)];
        let err = NavGraph::build(&nodes, &edges).unwrap_err();
        assert_eq!(err, InputError::UnknownEdgeNode { index: 0, node: 99 });
    }

    #[test]
    fn build_rejects_tiny_graph() {
        let nodes = vec![node(1, 0.0, 0.0)];
        let err = NavGraph::build(&nodes, &[]).unwrap_err();
        assert_eq!(err, InputError::GraphTooSmall { count: 1 });
    }

    #[test]
    fn build_rejects_duplicate_node() {
        let nodes = vec![node(1, 0.0, 0.0), node(1, 1.0, 0.0)];
        let err = NavGraph::build(&nodes, &[]).unwrap_err();
        assert_eq!(err, InputError::DuplicateNode { node: 1 });
    }

    #[test]
    fn build_rejects_negative_weight() {
        let nodes = vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0)];
        let edges = vec![edge(1, 2, -1.0)];
        assert!(matches!(
            NavGraph::build(&nodes, &edges),
            Err(InputError::InvalidEdgeWeight { index: 0, .. })
        ));
    }

    #[test]
    fn degree_and_neighbors() {
        let g = line_graph();
        assert_eq!(g.degree(1), 1);
        assert_eq!(g.degree(2), 2);
        assert_eq!(g.neighbors(2), &[(1, 1.0), (3, 1.0)]);
        assert!(g.is_decision_point(2));
        assert!(!g.is_decision_point(1));
    }

    #[test]
    fn bfs_depths_on_line() {
        let g = line_graph();
        let depths = g.bfs_depths(1);
        assert_eq!(depths[&1], 0);
        assert_eq!(depths[&2], 1);
        assert_eq!(depths[&3], 2);
    }

    #[test]
    fn dijkstra_prefers_lighter_route() {
        // 1 —(5)— 3 and 1 —(1)— 2 —(1)— 3
        let nodes = vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0), node(3, 2.0, 0.0)];
        let edges = vec![edge(1, 3, 5.0), edge(1, 2, 1.0), edge(2, 3, 1.0)];
        let g = NavGraph::build(&nodes, &edges).unwrap();
        let dist = g.shortest_distances(1);
        assert!((dist[&3] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn components_split_disconnected_graph() {
        let nodes = vec![
            node(1, 0.0, 0.0),
            node(2, 1.0, 0.0),
            node(10, 5.0, 5.0),
            node(11, 6.0, 5.0),
        ];
        let edges = vec![edge(1, 2, 1.0), edge(10, 11, 1.0)];
        let g = NavGraph::build(&nodes, &edges).unwrap();
        let comps = g.connected_components();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0], vec![1, 2]);
        assert_eq!(comps[1], vec![10, 11]);
    }

    #[test]
    fn diameter_of_line_is_two() {
        assert_eq!(line_graph().diameter_hops(), 2);
    }

    #[test]
    fn unreachable_nodes_absent_from_distances() {
        let nodes = vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0), node(3, 9.0, 9.0)];
        let edges = vec![edge(1, 2, 1.0)];
        let g = NavGraph::build(&nodes, &edges).unwrap();
        let dist = g.shortest_distances(1);
        assert!(dist.contains_key(&2));
        assert!(!dist.contains_key(&3));
    }
}
