//! Agent-based navigation simulation.
//!
//! Each run is an independent stochastic trial: an agent walks the
//! navigation graph from origin to destination, drawing wrong turns at
//! decision points against an error model fed by node degree and by
//! signage/landmark presence. Movement is a pure state-transition
//! function driven in a plain loop — no scheduler, no shared state.
//!
//! Determinism: every run owns a `StdRng` seeded from the scenario seed
//! and the run index, so a scenario reproduces byte-identical traces
//! regardless of run ordering.

use std::collections::{HashMap, HashSet};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::InputError;
use crate::graph::{NavGraph, NodeId, Point};
use crate::stats::{mean, percentile_sorted};

/// SplitMix64 increment, used to derive independent sub-seeds per run
/// (and, in the engine, per scenario).
pub(crate) const RUN_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// The closed set of simulated user populations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentType {
    Familiar,
    FirstTime,
    Elderly,
    MobilityImpaired,
}

impl AgentType {
    pub const ALL: [AgentType; 4] = [
        AgentType::Familiar,
        AgentType::FirstTime,
        AgentType::Elderly,
        AgentType::MobilityImpaired,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AgentType::Familiar => "familiar",
            AgentType::FirstTime => "first_time",
            AgentType::Elderly => "elderly",
            AgentType::MobilityImpaired => "mobility_impaired",
        }
    }
}

/// One origin→destination batch. Immutable once started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub origin: NodeId,
    pub destination: NodeId,
    /// Population mix: how many runs of each agent type.
    pub population: Vec<(AgentType, u32)>,
}

impl Scenario {
    pub fn run_count(&self) -> u32 {
        self.population.iter().map(|(_, n)| n).sum()
    }
}

/// Signage and landmark positions supplied by the detection collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CueLocations {
    pub signage: Vec<Point>,
    pub landmarks: Vec<Point>,
}

/// Agent state machine. `Moving` carries the committed edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentState {
    AtNode(NodeId),
    Deciding(NodeId),
    Moving {
        from: NodeId,
        to: NodeId,
        weight: f64,
        dwelled: bool,
    },
    Arrived,
    Stuck,
}

/// Mutable per-run agent record. Discarded after aggregation unless the
/// caller keeps the trace.
#[derive(Debug, Clone)]
struct Agent {
    agent_type: AgentType,
    previous: Option<NodeId>,
    distance: f64,
    time: f64,
    errors: u32,
    hesitations: u32,
    steps: u32,
    path: Vec<NodeId>,
    visited: HashSet<NodeId>,
}

impl Agent {
    fn new(agent_type: AgentType, origin: NodeId) -> Self {
        let mut visited = HashSet::new();
        visited.insert(origin);
        Self {
            agent_type,
            previous: None,
            distance: 0.0,
            time: 0.0,
            errors: 0,
            hesitations: 0,
            steps: 0,
            path: vec![origin],
            visited,
        }
    }
}

/// Immutable record of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTrace {
    pub agent_type: AgentType,
    /// Ordered node sequence including backtracks.
    pub path: Vec<NodeId>,
    pub distance: f64,
    pub time: f64,
    pub errors: u32,
    pub hesitations: u32,
    pub arrived: bool,
    pub stuck: bool,
}

/// Aggregate statistics over one scenario batch. Stuck runs count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AggregateStats {
    pub runs: u32,
    pub mean_time: f64,
    pub median_time: f64,
    pub p90_time: f64,
    pub mean_distance: f64,
    pub mean_errors: f64,
    pub mean_hesitations: f64,
    /// Walked length over straight-line origin→destination distance, >= 1.
    pub detour_index: f64,
    /// Fraction of runs that arrived with zero errors.
    pub first_pass_success_rate: f64,
    /// Fraction of runs that arrived at all.
    pub success_rate: f64,
    pub stuck_count: u32,
}

/// Run/arrival counts for one agent type within a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TypeBreakdown {
    pub agent_type: AgentType,
    pub runs: u32,
    pub arrived: u32,
}

/// One scenario's full result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub origin: NodeId,
    pub destination: NodeId,
    pub aggregate: AggregateStats,
    pub by_type: Vec<TypeBreakdown>,
    /// Per-run traces, in run order, for downstream heatmap rendering.
    pub traces: Vec<AgentTrace>,
}

/// Everything one run needs, borrowed; the RNG is the only mutable part
/// and is owned per run.
struct RunContext<'a> {
    graph: &'a NavGraph,
    cfg: &'a SimulationConfig,
    destination: NodeId,
    /// Weighted distance from each node to the destination.
    dist_to_dest: &'a HashMap<NodeId, f64>,
    signage_nodes: &'a HashSet<NodeId>,
    landmark_nodes: &'a HashSet<NodeId>,
    step_budget: u32,
}

/// Run a full scenario batch deterministically from `seed`.
pub fn run_scenario(
    graph: &NavGraph,
    scenario: &Scenario,
    cues: &CueLocations,
    cfg: &SimulationConfig,
    seed: u64,
) -> Result<ScenarioResult, InputError> {
    if !graph.contains(scenario.origin) {
        return Err(InputError::UnknownScenarioNode {
            role: "origin",
            node: scenario.origin,
        });
    }
    if !graph.contains(scenario.destination) {
        return Err(InputError::UnknownScenarioNode {
            role: "destination",
            node: scenario.destination,
        });
    }
    if scenario.run_count() == 0 {
        return Err(InputError::EmptyPopulation);
    }

    let dist_to_dest = graph.shortest_distances(scenario.destination);
    let signage_nodes = nodes_with_cue_nearby(graph, &cues.signage, cfg.cue_radius);
    let landmark_nodes = nodes_with_cue_nearby(graph, &cues.landmarks, cfg.cue_radius);
    let step_budget = (cfg.stuck_budget_factor * graph.diameter_hops().max(1))
        .max(cfg.min_step_budget);

    let ctx = RunContext {
        graph,
        cfg,
        destination: scenario.destination,
        dist_to_dest: &dist_to_dest,
        signage_nodes: &signage_nodes,
        landmark_nodes: &landmark_nodes,
        step_budget,
    };

    let mut traces = Vec::with_capacity(scenario.run_count() as usize);
    let mut run_index: u64 = 0;
    for &(agent_type, count) in &scenario.population {
        for _ in 0..count {
            let sub_seed = seed.wrapping_add(run_index.wrapping_mul(RUN_SEED_STRIDE));
            let mut rng = StdRng::seed_from_u64(sub_seed);
            traces.push(run_one(agent_type, scenario.origin, &ctx, &mut rng));
            run_index += 1;
        }
    }

    let aggregate = aggregate(graph, scenario, &traces);
    let by_type = scenario
        .population
        .iter()
        .filter(|&&(_, count)| count > 0)
        .map(|&(agent_type, runs)| TypeBreakdown {
            agent_type,
            runs,
            arrived: traces
                .iter()
                .filter(|t| t.agent_type == agent_type && t.arrived)
                .count() as u32,
        })
        .collect();
    Ok(ScenarioResult {
        origin: scenario.origin,
        destination: scenario.destination,
        aggregate,
        by_type,
        traces,
    })
}

/// Drive one agent through the state machine until a terminal state.
fn run_one(agent_type: AgentType, origin: NodeId, ctx: &RunContext, rng: &mut StdRng) -> AgentTrace {
    let mut agent = Agent::new(agent_type, origin);
    let mut state = AgentState::AtNode(origin);

    loop {
        state = step(state, &mut agent, ctx, rng);
        match state {
            AgentState::Arrived => {
                return finish(agent, true, false);
            }
            AgentState::Stuck => {
                debug!(
                    "agent ({}) stuck after {} steps from {origin} toward {}",
                    agent.agent_type.name(),
                    agent.steps,
                    ctx.destination
                );
                return finish(agent, false, true);
            }
            _ => {}
        }
    }
}

fn finish(agent: Agent, arrived: bool, stuck: bool) -> AgentTrace {
    AgentTrace {
        agent_type: agent.agent_type,
        path: agent.path,
        distance: agent.distance,
        time: agent.time,
        errors: agent.errors,
        hesitations: agent.hesitations,
        arrived,
        stuck,
    }
}

/// Pure state transition: `AtNode → Deciding → Moving → {AtNode | Arrived | Stuck}`.
fn step(state: AgentState, agent: &mut Agent, ctx: &RunContext, rng: &mut StdRng) -> AgentState {
    match state {
        AgentState::AtNode(node) => {
            if node == ctx.destination {
                AgentState::Arrived
            } else if ctx.graph.degree(node) == 0 {
                AgentState::Stuck
            } else {
                AgentState::Deciding(node)
            }
        }

        AgentState::Deciding(node) => {
            let decision_point = ctx.graph.is_decision_point(node);
            let (to, weight, wrong) = choose_next(node, agent, ctx, rng);
            if wrong {
                agent.errors += 1;
            }
            AgentState::Moving {
                from: node,
                to,
                weight,
                dwelled: decision_point,
            }
        }

        AgentState::Moving {
            from,
            to,
            weight,
            dwelled,
        } => {
            let speed = ctx.cfg.profiles.get(agent.agent_type).speed;
            agent.distance += weight;
            agent.time += weight / speed;
            if dwelled {
                agent.time += ctx.cfg.decision_dwell_time;
            }
            agent.steps += 1;
            agent.previous = Some(from);
            agent.path.push(to);
            if !agent.visited.insert(to) {
                agent.hesitations += 1;
            }
            if to == ctx.destination {
                AgentState::AtNode(to)
            } else if agent.steps >= ctx.step_budget {
                AgentState::Stuck
            } else {
                AgentState::AtNode(to)
            }
        }

        terminal @ (AgentState::Arrived | AgentState::Stuck) => terminal,
    }
}

/// Select the next edge. Returns (next node, edge weight, wrong turn).
///
/// The correct hop minimizes edge weight + remaining distance to the
/// destination. An "incorrect" neighbor is any non-optimal one other
/// than the node just came from — walking back through the door you
/// entered by is not a navigation choice, which is what makes a single
/// corridor decision-free.
fn choose_next(
    node: NodeId,
    agent: &Agent,
    ctx: &RunContext,
    rng: &mut StdRng,
) -> (NodeId, f64, bool) {
    let neighbors = ctx.graph.neighbors(node);

    // Best next hop toward the destination; ties break on the sorted
    // neighbor order for determinism.
    let mut best: (NodeId, f64) = neighbors[0];
    let mut best_cost = f64::INFINITY;
    for &(next, w) in neighbors {
        let cost = w + ctx
            .dist_to_dest
            .get(&next)
            .copied()
            .unwrap_or(f64::INFINITY);
        if cost < best_cost - 1e-9 {
            best_cost = cost;
            best = (next, w);
        }
    }

    let wrong_candidates: Vec<(NodeId, f64)> = neighbors
        .iter()
        .copied()
        .filter(|&(next, w)| {
            let cost = w + ctx
                .dist_to_dest
                .get(&next)
                .copied()
                .unwrap_or(f64::INFINITY);
            cost > best_cost + 1e-9 && Some(next) != agent.previous
        })
        .collect();

    if ctx.graph.is_decision_point(node) && !wrong_candidates.is_empty() {
        let p = error_probability(node, agent.agent_type, ctx);
        if rng.gen::<f64>() < p {
            let pick = wrong_candidates[rng.gen_range(0..wrong_candidates.len())];
            return (pick.0, pick.1, true);
        }
    }
    (best.0, best.1, false)
}

/// p = min(cap, base · (1 + (degree−1)·gain) · signage_factor · landmark_factor),
/// with the cue factors applied only when the cue is absent near the node.
fn error_probability(node: NodeId, agent_type: AgentType, ctx: &RunContext) -> f64 {
    let cfg = ctx.cfg;
    let base = cfg.profiles.get(agent_type).base_error_rate;
    let degree = ctx.graph.degree(node);
    let degree_factor = (degree.saturating_sub(1)) as f64 * cfg.degree_error_gain;
    let mut p = base * (1.0 + degree_factor);
    if !ctx.signage_nodes.contains(&node) {
        p *= cfg.no_signage_factor;
    }
    if !ctx.landmark_nodes.contains(&node) {
        p *= cfg.no_landmark_factor;
    }
    p.min(cfg.error_cap)
}

/// Nodes with at least one cue point within `radius` of their position.
fn nodes_with_cue_nearby(graph: &NavGraph, cues: &[Point], radius: f64) -> HashSet<NodeId> {
    let mut nodes = HashSet::new();
    if cues.is_empty() {
        return nodes;
    }
    for &id in graph.node_ids() {
        if let Some(pos) = graph.position(id) {
            if cues.iter().any(|c| pos.distance(c) <= radius) {
                nodes.insert(id);
            }
        }
    }
    nodes
}

fn aggregate(graph: &NavGraph, scenario: &Scenario, traces: &[AgentTrace]) -> AggregateStats {
    let times: Vec<f64> = traces.iter().map(|t| t.time).collect();
    let mut sorted_times = times.clone();
    sorted_times.sort_by(|a, b| a.total_cmp(b));

    let distances: Vec<f64> = traces.iter().map(|t| t.distance).collect();
    let errors: Vec<f64> = traces.iter().map(|t| t.errors as f64).collect();
    let hesitations: Vec<f64> = traces.iter().map(|t| t.hesitations as f64).collect();

    let arrived: Vec<&AgentTrace> = traces.iter().filter(|t| t.arrived).collect();
    let stuck_count = traces.iter().filter(|t| t.stuck).count() as u32;
    let first_pass = traces
        .iter()
        .filter(|t| t.arrived && t.errors == 0)
        .count() as f64;

    // Detour against the straight-line origin→destination distance, over
    // runs that actually arrived (wandering that never finishes is
    // captured by the failure rate instead).
    let straight = graph
        .straight_line(scenario.origin, scenario.destination)
        .unwrap_or(0.0);
    let detour_index = if straight > 1e-9 && !arrived.is_empty() {
        let walked = mean(&arrived.iter().map(|t| t.distance).collect::<Vec<f64>>());
        (walked / straight).max(1.0)
    } else {
        1.0
    };

    let n = traces.len() as f64;
    AggregateStats {
        runs: traces.len() as u32,
        mean_time: mean(&times),
        median_time: percentile_sorted(&sorted_times, 50.0),
        p90_time: percentile_sorted(&sorted_times, 90.0),
        mean_distance: mean(&distances),
        mean_errors: mean(&errors),
        mean_hesitations: mean(&hesitations),
        detour_index,
        first_pass_success_rate: if n > 0.0 { first_pass / n } else { 0.0 },
        success_rate: if n > 0.0 { arrived.len() as f64 / n } else { 0.0 },
        stuck_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

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

    fn line_abc() -> NavGraph {
        let nodes = vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0), node(3, 2.0, 0.0)];
        let edges = vec![edge(1, 2, 1.0), edge(2, 3, 1.0)];
        NavGraph::build(&nodes, &edges).unwrap()
    }

    /// A plus-shaped junction: center 0 at origin, arms to 1..=4, with the
    /// destination two hops away so the center is a genuine wrong-turn trap.
    fn junction_graph() -> NavGraph {
        let nodes = vec![
            node(0, 0.0, 0.0),
            node(1, 10.0, 0.0),
            node(2, -10.0, 0.0),
            node(3, 0.0, 10.0),
            node(4, 0.0, -10.0),
            node(5, 20.0, 0.0), // destination beyond arm 1
        ];
        let edges = vec![
            edge(0, 1, 10.0),
            edge(0, 2, 10.0),
            edge(0, 3, 10.0),
            edge(0, 4, 10.0),
            edge(1, 5, 10.0),
        ];
        NavGraph::build(&nodes, &edges).unwrap()
    }

    fn mix(entries: &[(AgentType, u32)]) -> Vec<(AgentType, u32)> {
        entries.to_vec()
    }

    #[test]
    fn decision_free_line_has_zero_errors_and_unit_detour() {
        let g = line_abc();
        let scenario = Scenario {
            origin: 1,
            destination: 3,
            population: mix(&[(AgentType::FirstTime, 50), (AgentType::Elderly, 50)]),
        };
        let result =
            run_scenario(&g, &scenario, &CueLocations::default(), &SimulationConfig::default(), 7)
                .unwrap();
        assert_eq!(result.aggregate.runs, 100);
        assert_eq!(result.aggregate.mean_errors, 0.0);
        assert_eq!(result.aggregate.success_rate, 1.0);
        assert_eq!(result.aggregate.first_pass_success_rate, 1.0);
        assert!((result.aggregate.detour_index - 1.0).abs() < 1e-12);
        assert_eq!(result.by_type.len(), 2);
        assert!(result.by_type.iter().all(|b| b.arrived == b.runs));
        for t in &result.traces {
            assert_eq!(t.path, vec![1, 2, 3]);
        }
    }

    #[test]
    fn identical_seed_reproduces_identical_traces() {
        let g = junction_graph();
        let scenario = Scenario {
            origin: 2,
            destination: 5,
            population: mix(&[(AgentType::FirstTime, 40)]),
        };
        let cues = CueLocations::default();
        let cfg = SimulationConfig::default();
        let a = run_scenario(&g, &scenario, &cues, &cfg, 12345).unwrap();
        let b = run_scenario(&g, &scenario, &cues, &cfg, 12345).unwrap();
        assert_eq!(a.traces, b.traces);
    }

    #[test]
    fn different_seeds_diverge() {
        let g = junction_graph();
        let scenario = Scenario {
            origin: 2,
            destination: 5,
            population: mix(&[(AgentType::Elderly, 60)]),
        };
        let cues = CueLocations::default();
        let cfg = SimulationConfig::default();
        let a = run_scenario(&g, &scenario, &cues, &cfg, 1).unwrap();
        let b = run_scenario(&g, &scenario, &cues, &cfg, 2).unwrap();
        assert_ne!(a.traces, b.traces);
    }

    #[test]
    fn errors_occur_at_junctions_for_error_prone_agents() {
        let g = junction_graph();
        let scenario = Scenario {
            origin: 2,
            destination: 5,
            population: mix(&[(AgentType::Elderly, 200)]),
        };
        let result =
            run_scenario(&g, &scenario, &CueLocations::default(), &SimulationConfig::default(), 99)
                .unwrap();
        assert!(result.aggregate.mean_errors > 0.0);
        assert!(result.aggregate.mean_hesitations > 0.0);
        assert!(result.aggregate.detour_index >= 1.0);
    }

    #[test]
    fn signage_at_junction_reduces_errors() {
        let g = junction_graph();
        let scenario = Scenario {
            origin: 2,
            destination: 5,
            population: mix(&[(AgentType::FirstTime, 300)]),
        };
        let cfg = SimulationConfig::default();
        let no_cues = CueLocations::default();
        let with_signage = CueLocations {
            signage: vec![Point::new(0.0, 0.0)], // at the junction
            landmarks: vec![Point::new(0.0, 0.0)],
        };
        let bare = run_scenario(&g, &scenario, &no_cues, &cfg, 42).unwrap();
        let signed = run_scenario(&g, &scenario, &with_signage, &cfg, 42).unwrap();
        assert!(
            signed.aggregate.mean_errors < bare.aggregate.mean_errors,
            "signage should reduce errors: {} vs {}",
            signed.aggregate.mean_errors,
            bare.aggregate.mean_errors
        );
    }

    #[test]
    fn familiar_agents_arrive_faster_than_impaired() {
        let g = line_abc();
        let cfg = SimulationConfig::default();
        let cues = CueLocations::default();
        let fast = run_scenario(
            &g,
            &Scenario {
                origin: 1,
                destination: 3,
                population: mix(&[(AgentType::Familiar, 10)]),
            },
            &cues,
            &cfg,
            5,
        )
        .unwrap();
        let slow = run_scenario(
            &g,
            &Scenario {
                origin: 1,
                destination: 3,
                population: mix(&[(AgentType::MobilityImpaired, 10)]),
            },
            &cues,
            &cfg,
            5,
        )
        .unwrap();
        assert!(fast.aggregate.mean_time < slow.aggregate.mean_time);
    }

    #[test]
    fn unreachable_destination_records_stuck_not_error() {
        // Destination in a separate component.
        let nodes = vec![
            node(1, 0.0, 0.0),
            node(2, 1.0, 0.0),
            node(3, 9.0, 9.0),
            node(4, 10.0, 9.0),
        ];
        let edges = vec![edge(1, 2, 1.0), edge(3, 4, 1.0)];
        let g = NavGraph::build(&nodes, &edges).unwrap();
        let scenario = Scenario {
            origin: 1,
            destination: 3,
            population: mix(&[(AgentType::Familiar, 5)]),
        };
        let result =
            run_scenario(&g, &scenario, &CueLocations::default(), &SimulationConfig::default(), 3)
                .unwrap();
        assert_eq!(result.aggregate.success_rate, 0.0);
        assert_eq!(result.aggregate.stuck_count, 5);
        // Counted, not discarded.
        assert_eq!(result.aggregate.runs, 5);
    }

    #[test]
    fn unknown_origin_is_fatal() {
        let g = line_abc();
        let scenario = Scenario {
            origin: 99,
            destination: 3,
            population: mix(&[(AgentType::Familiar, 1)]),
        };
        let err = run_scenario(
            &g,
            &scenario,
            &CueLocations::default(),
            &SimulationConfig::default(),
            0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            InputError::UnknownScenarioNode {
                role: "origin",
                node: 99
            }
        );
    }

    #[test]
    fn empty_population_is_fatal() {
        let g = line_abc();
        let scenario = Scenario {
            origin: 1,
            destination: 3,
            population: vec![(AgentType::Familiar, 0)],
        };
        let err = run_scenario(
            &g,
            &scenario,
            &CueLocations::default(),
            &SimulationConfig::default(),
            0,
        )
        .unwrap_err();
        assert_eq!(err, InputError::EmptyPopulation);
    }

    #[test]
    fn error_probability_grows_with_degree_and_caps() {
        let g = junction_graph();
        let cfg = SimulationConfig::default();
        let dist = g.shortest_distances(5);
        let signage = HashSet::new();
        let landmarks = HashSet::new();
        let ctx = RunContext {
            graph: &g,
            cfg: &cfg,
            destination: 5,
            dist_to_dest: &dist,
            signage_nodes: &signage,
            landmark_nodes: &landmarks,
            step_budget: 100,
        };
        // Degree-4 junction with no cues: 0.25 · 1.45 · 2.0 · 1.67 ≈ 1.21 → capped.
        let p_junction = error_probability(0, AgentType::FirstTime, &ctx);
        assert!((p_junction - cfg.error_cap).abs() < 1e-12);
        // Degree-2 node for a familiar agent stays low.
        let p_arm = error_probability(1, AgentType::Familiar, &ctx);
        assert!(p_arm < 0.5);
        assert!(p_arm > 0.0);
    }
}
