//! Wayfind Headless Validation Harness
//!
//! Runs the full analysis pipeline against a bundled demo floor plan and
//! sweeps each analyzer over its invariants. Entirely in-process — no
//! services, no rendering.
//!
//! Usage:
//!   cargo run -p wayfind-simtest
//!   cargo run -p wayfind-simtest -- --verbose

use serde::Deserialize;
use wayfind_logic::config::{EngineConfig, ScoringConfig};
use wayfind_logic::engine::{run_analysis, AnalysisInput};
use wayfind_logic::graph::{Edge, NavGraph, Node, NodeId, NodeTag, Point};
use wayfind_logic::isovist::WallSegment;
use wayfind_logic::scoring::{self, WesInputs};
use wayfind_logic::simulation::{run_scenario, AgentType, CueLocations, Scenario};
use wayfind_logic::space_syntax;
use wayfind_logic::visibility;

// ── Demo floor plan (same JSON a host application would materialize) ────
const FLOORPLAN_JSON: &str = include_str!("../../../data/demo_floorplan.json");

#[derive(Debug, Deserialize)]
struct FloorPlan {
    #[allow(dead_code)]
    name: String,
    nodes: Vec<PlanNode>,
    edges: Vec<PlanEdge>,
    walls: Vec<[f64; 4]>,
    signage: Vec<[f64; 2]>,
    landmarks: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct PlanNode {
    id: NodeId,
    x: f64,
    y: f64,
    tag: String,
}

#[derive(Debug, Deserialize)]
struct PlanEdge {
    a: NodeId,
    b: NodeId,
    weight: f64,
}

impl FloorPlan {
    fn nodes(&self) -> Vec<Node> {
        self.nodes
            .iter()
            .map(|n| Node {
                id: n.id,
                position: Point::new(n.x, n.y),
                tag: match n.tag.as_str() {
                    "room" => Some(NodeTag::Room),
                    "corridor" => Some(NodeTag::Corridor),
                    "decision_point" => Some(NodeTag::DecisionPoint),
                    _ => None,
                },
            })
            .collect()
    }

    fn edges(&self) -> Vec<Edge> {
        self.edges
            .iter()
            .map(|e| Edge {
                a: e.a,
                b: e.b,
                weight: e.weight,
            })
            .collect()
    }

    fn walls(&self) -> Vec<WallSegment> {
        self.walls
            .iter()
            .map(|&[x1, y1, x2, y2]| WallSegment::new(x1, y1, x2, y2))
            .collect()
    }

    fn cues(&self) -> CueLocations {
        CueLocations {
            signage: self.signage.iter().map(|&[x, y]| Point::new(x, y)).collect(),
            landmarks: self
                .landmarks
                .iter()
                .map(|&[x, y]| Point::new(x, y))
                .collect(),
        }
    }
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: String) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail,
    }
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Wayfind Validation Harness ===\n");

    let plan: FloorPlan = match serde_json::from_str(FLOORPLAN_JSON) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("demo floor plan failed to parse: {e}");
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    results.extend(validate_floorplan(&plan));
    results.extend(validate_space_syntax(&plan));
    results.extend(validate_visibility(&plan));
    results.extend(validate_simulation(&plan));
    results.extend(validate_scoring());
    results.extend(validate_full_pipeline(&plan));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Floor plan sanity ────────────────────────────────────────────────

fn validate_floorplan(plan: &FloorPlan) -> Vec<TestResult> {
    println!("--- Floor Plan ---");
    let mut results = Vec::new();

    results.push(check(
        "plan_has_content",
        plan.nodes.len() >= 2 && !plan.edges.is_empty() && plan.walls.len() >= 4,
        format!(
            "{} nodes, {} edges, {} walls",
            plan.nodes.len(),
            plan.edges.len(),
            plan.walls.len()
        ),
    ));

    let graph = NavGraph::build(&plan.nodes(), &plan.edges());
    results.push(check(
        "graph_builds",
        graph.is_ok(),
        match &graph {
            Ok(g) => format!("{} nodes validated", g.node_count()),
            Err(e) => format!("rejected: {e}"),
        },
    ));

    if let Ok(g) = graph {
        let connected = g.connected_components().len() == 1;
        results.push(check(
            "plan_is_connected",
            connected,
            format!("{} component(s)", g.connected_components().len()),
        ));
    }
    results
}

// ── 2. Space syntax ─────────────────────────────────────────────────────

fn validate_space_syntax(plan: &FloorPlan) -> Vec<TestResult> {
    println!("--- Space Syntax ---");
    let mut results = Vec::new();
    let graph = match NavGraph::build(&plan.nodes(), &plan.edges()) {
        Ok(g) => g,
        Err(e) => {
            results.push(check("space_syntax_graph", false, format!("{e}")));
            return results;
        }
    };

    let report = space_syntax::analyze(&graph, &EngineConfig::default().space_syntax);

    let all_finite = report
        .all_metrics()
        .all(|m| m.integration.map(|v| v.is_finite() && v > 0.0).unwrap_or(false));
    results.push(check(
        "integration_finite_positive",
        all_finite,
        format!(
            "mean integration {:.3}",
            report.mean_integration().unwrap_or(f64::NAN)
        ),
    ));

    let choice_in_range = report.all_metrics().all(|m| (0.0..=1.0).contains(&m.choice));
    results.push(check(
        "choice_normalized",
        choice_in_range,
        "betweenness within [0, 1]".into(),
    ));

    // The lobby junction carries the building's through-traffic.
    let lobby = report.all_metrics().find(|m| m.node == 2);
    results.push(check(
        "lobby_is_bottleneck",
        lobby.map(|m| m.is_bottleneck).unwrap_or(false),
        lobby
            .map(|m| format!("node 2 choice {:.3}", m.choice))
            .unwrap_or_else(|| "node 2 missing".into()),
    ));

    results
}

// ── 3. Visibility ───────────────────────────────────────────────────────

fn validate_visibility(plan: &FloorPlan) -> Vec<TestResult> {
    println!("--- Visibility ---");
    let mut results = Vec::new();
    let cfg = EngineConfig::default();

    let report = match visibility::analyze(&plan.walls(), &cfg.sampling) {
        Ok(r) => r,
        Err(e) => {
            results.push(check("visibility_analyze", false, format!("{e}")));
            return results;
        }
    };

    results.push(check(
        "grid_within_cap",
        report.graph.node_count() <= cfg.sampling.max_samples,
        format!(
            "{} samples at spacing {:.2}",
            report.graph.node_count(),
            report.effective_spacing
        ),
    ));

    let mut symmetric = true;
    for i in 0..report.graph.node_count() {
        for &j in report.graph.neighbors(i) {
            if !report.graph.has_edge(j, i) {
                symmetric = false;
            }
        }
    }
    results.push(check(
        "visibility_graph_symmetric",
        symmetric,
        format!("{} edges", report.graph.edge_count()),
    ));

    let vi_sane = report
        .metrics
        .iter()
        .all(|m| m.visual_integration.is_finite() && m.visual_integration >= 0.0);
    results.push(check(
        "visual_integration_sane",
        vi_sane,
        format!("mean VI {:.3}", report.mean_visual_integration),
    ));

    results.push(check(
        "blind_and_wide_classified",
        !report.blind_spots.is_empty() && !report.wide_view_points.is_empty(),
        format!(
            "{} blind spots, {} wide-view points",
            report.blind_spots.len(),
            report.wide_view_points.len()
        ),
    ));

    results
}

// ── 4. Simulation ───────────────────────────────────────────────────────

fn validate_simulation(plan: &FloorPlan) -> Vec<TestResult> {
    println!("--- Simulation ---");
    let mut results = Vec::new();
    let graph = match NavGraph::build(&plan.nodes(), &plan.edges()) {
        Ok(g) => g,
        Err(e) => {
            results.push(check("simulation_graph", false, format!("{e}")));
            return results;
        }
    };
    let cfg = EngineConfig::default().simulation;
    let cues = plan.cues();

    let scenario = Scenario {
        origin: 1,
        destination: 6,
        population: vec![
            (AgentType::Familiar, 25),
            (AgentType::FirstTime, 25),
            (AgentType::Elderly, 25),
            (AgentType::MobilityImpaired, 25),
        ],
    };

    let mut detour_ok = true;
    let mut all_counted = true;
    for seed in 0..10_u64 {
        match run_scenario(&graph, &scenario, &cues, &cfg, seed) {
            Ok(r) => {
                if r.aggregate.detour_index < 1.0 {
                    detour_ok = false;
                }
                if r.aggregate.runs != 100 || r.traces.len() != 100 {
                    all_counted = false;
                }
            }
            Err(e) => {
                results.push(check("scenario_runs", false, format!("seed {seed}: {e}")));
                return results;
            }
        }
    }
    results.push(check(
        "detour_index_at_least_one",
        detour_ok,
        "10 seeds × 100 runs".into(),
    ));
    results.push(check(
        "every_run_counted",
        all_counted,
        "stuck runs counted, none dropped".into(),
    ));

    let a = run_scenario(&graph, &scenario, &cues, &cfg, 777).unwrap();
    let b = run_scenario(&graph, &scenario, &cues, &cfg, 777).unwrap();
    results.push(check(
        "seed_determinism",
        a.traces == b.traces,
        format!("{} traces byte-identical", a.traces.len()),
    ));

    let bare = run_scenario(&graph, &scenario, &CueLocations::default(), &cfg, 777).unwrap();
    results.push(check(
        "cues_reduce_errors",
        a.aggregate.mean_errors <= bare.aggregate.mean_errors,
        format!(
            "with cues {:.2}, without {:.2}",
            a.aggregate.mean_errors, bare.aggregate.mean_errors
        ),
    ));

    results
}

// ── 5. Scoring ──────────────────────────────────────────────────────────

fn validate_scoring() -> Vec<TestResult> {
    println!("--- Scoring ---");
    let mut results = Vec::new();
    let cfg = ScoringConfig::default();

    let mut bounded = true;
    let mut monotone = true;
    for time in [0.0, 60.0, 180.0, 300.0, 1e9] {
        let mut previous = f64::INFINITY;
        for errors in [0.0, 1.0, 3.0, 5.0, 100.0] {
            let r = scoring::score(
                &WesInputs {
                    mean_time: time,
                    detour_index: 1.2,
                    mean_errors: errors,
                    mean_hesitations: 2.0,
                    visual_integration: 0.5,
                    signage_quality: 0.5,
                    accessibility: 0.5,
                },
                &cfg,
            );
            if !(0.0..=100.0).contains(&r.score) {
                bounded = false;
            }
            if r.score > previous {
                monotone = false;
            }
            previous = r.score;
        }
    }
    results.push(check("wes_bounded", bounded, "sweep of 25 input combinations".into()));
    results.push(check(
        "wes_monotone_in_errors",
        monotone,
        "more errors never raise the score".into(),
    ));

    results
}

// ── 6. Full pipeline ────────────────────────────────────────────────────

fn validate_full_pipeline(plan: &FloorPlan) -> Vec<TestResult> {
    println!("--- Full Pipeline ---");
    let mut results = Vec::new();

    let input = AnalysisInput {
        nodes: plan.nodes(),
        edges: plan.edges(),
        walls: plan.walls(),
        cues: plan.cues(),
        scenarios: vec![
            Scenario {
                origin: 1,
                destination: 6,
                population: vec![(AgentType::FirstTime, 30), (AgentType::Familiar, 30)],
            },
            Scenario {
                origin: 1,
                destination: 7,
                population: vec![(AgentType::Elderly, 20), (AgentType::MobilityImpaired, 20)],
            },
        ],
        signage_quality: 0.6,
        accessibility: 0.7,
        seed: 90210,
    };

    match run_analysis(&input, &EngineConfig::default()) {
        Ok(report) => {
            results.push(check(
                "pipeline_score_bounded",
                (0.0..=100.0).contains(&report.wes.score),
                format!("WES {:.1} ({})", report.wes.score, report.wes.band.label()),
            ));
            results.push(check(
                "nothing_silently_skipped",
                report.skipped.is_empty(),
                if report.skipped.is_empty() {
                    "no skipped sub-metrics".into()
                } else {
                    format!(
                        "{} skipped: {}",
                        report.skipped.len(),
                        report
                            .skipped
                            .iter()
                            .map(|s| s.metric.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                },
            ));
            results.push(check(
                "all_scenarios_reported",
                report.scenarios.len() == 2,
                format!("{} scenario results", report.scenarios.len()),
            ));
        }
        Err(e) => {
            results.push(check("pipeline_runs", false, format!("{e}")));
        }
    }

    results
}
