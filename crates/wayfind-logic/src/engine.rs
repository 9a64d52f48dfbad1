//! Orchestration façade — one call runs the whole pipeline.
//!
//! `run_analysis` validates the configuration, builds the graph, runs the
//! space-syntax and visibility analyzers, simulates every scenario, and
//! folds the batch means into a single WES. Sub-metrics that could not be
//! computed (components too small for integration, degenerate isovists)
//! are listed explicitly in the report so partial results are never
//! silent.

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::InputError;
use crate::graph::{Edge, NavGraph, Node};
use crate::isovist::WallSegment;
use crate::scoring::{self, WesInputs, WesResult};
use crate::simulation::{self, CueLocations, Scenario, ScenarioResult};
use crate::space_syntax::{self, SpaceSyntaxReport};
use crate::stats::mean;
use crate::visibility::{self, VisibilityReport};

/// Everything one analysis consumes, materialized by the host application
/// (floor-plan extraction and signage detection live upstream).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub walls: Vec<WallSegment>,
    pub cues: CueLocations,
    pub scenarios: Vec<Scenario>,
    /// Signage quality score, [0, 1] or [0, 100].
    pub signage_quality: f64,
    /// Accessibility quality score, [0, 1] or [0, 100].
    pub accessibility: f64,
    /// Base seed; each simulation run derives its own sub-stream.
    pub seed: u64,
}

/// A sub-metric the engine could not compute for some entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMetric {
    pub metric: String,
    pub entity: String,
    pub reason: String,
}

/// Full analysis result: every sub-report plus the composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub space_syntax: SpaceSyntaxReport,
    pub visibility: VisibilityReport,
    pub scenarios: Vec<ScenarioResult>,
    /// The batch means fed to the scorer.
    pub wes_inputs: WesInputs,
    pub wes: WesResult,
    pub skipped: Vec<SkippedMetric>,
}

/// Run the full pipeline over materialized inputs.
pub fn run_analysis(input: &AnalysisInput, cfg: &EngineConfig) -> Result<AnalysisReport, InputError> {
    cfg.validate()?;

    let graph = NavGraph::build(&input.nodes, &input.edges)?;
    info!(
        "analyzing {} nodes, {} edges, {} walls, {} scenario(s)",
        graph.node_count(),
        input.edges.len(),
        input.walls.len(),
        input.scenarios.len()
    );

    let mut skipped = Vec::new();

    let space_syntax = space_syntax::analyze(&graph, &cfg.space_syntax);
    for component in &space_syntax.components {
        if !component.integration_defined {
            skipped.push(SkippedMetric {
                metric: "integration".to_string(),
                entity: format!("component[{}]", component.nodes[0]),
                reason: format!("{} node(s), need at least 3", component.size),
            });
        }
    }

    let visibility = visibility::analyze(&input.walls, &cfg.sampling)?;
    for sample in visibility.samples.iter().filter(|s| s.degenerate) {
        skipped.push(SkippedMetric {
            metric: "isovist".to_string(),
            entity: format!("sample({}, {})", sample.origin.x, sample.origin.y),
            reason: "degenerate zero-area isovist".to_string(),
        });
    }

    let mut scenarios = Vec::with_capacity(input.scenarios.len());
    for (index, scenario) in input.scenarios.iter().enumerate() {
        // Each scenario gets its own seed sub-stream; XOR-mixing keeps it
        // disjoint from the additive per-run derivation inside the batch.
        let scenario_seed =
            input.seed ^ (index as u64 + 1).wrapping_mul(simulation::RUN_SEED_STRIDE);
        scenarios.push(simulation::run_scenario(
            &graph,
            scenario,
            &input.cues,
            &cfg.simulation,
            scenario_seed,
        )?);
    }

    let wes_inputs = wes_inputs(&scenarios, &visibility, input, &mut skipped);
    let wes = scoring::score(&wes_inputs, &cfg.scoring);

    Ok(AnalysisReport {
        space_syntax,
        visibility,
        scenarios,
        wes_inputs,
        wes,
        skipped,
    })
}

/// Fold scenario batch means and the visibility mean into scorer inputs.
/// With no scenarios the simulation terms sit at their no-penalty bounds
/// and the omission is recorded.
fn wes_inputs(
    scenarios: &[ScenarioResult],
    visibility: &VisibilityReport,
    input: &AnalysisInput,
    skipped: &mut Vec<SkippedMetric>,
) -> WesInputs {
    let (mean_time, detour_index, mean_errors, mean_hesitations) = if scenarios.is_empty() {
        skipped.push(SkippedMetric {
            metric: "simulation".to_string(),
            entity: "scenarios".to_string(),
            reason: "no scenarios supplied; simulation penalties omitted".to_string(),
        });
        (0.0, 1.0, 0.0, 0.0)
    } else {
        (
            mean(&scenarios.iter().map(|s| s.aggregate.mean_time).collect::<Vec<f64>>()),
            mean(&scenarios.iter().map(|s| s.aggregate.detour_index).collect::<Vec<f64>>()),
            mean(&scenarios.iter().map(|s| s.aggregate.mean_errors).collect::<Vec<f64>>()),
            mean(&scenarios.iter().map(|s| s.aggregate.mean_hesitations).collect::<Vec<f64>>()),
        )
    };

    WesInputs {
        mean_time,
        detour_index,
        mean_errors,
        mean_hesitations,
        visual_integration: visibility.mean_visual_integration,
        signage_quality: input.signage_quality,
        accessibility: input.accessibility,
    }
}
