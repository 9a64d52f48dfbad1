//! Fatal input errors — malformed data the engine refuses to analyze.
//!
//! These are the reject-input cases: everything else (disconnected
//! components, degenerate isovists, stuck agents) is recoverable and
//! reported as data, not as an error.

use thiserror::Error;

/// Structured rejection of malformed engine input.
///
/// Each variant names the guard that failed and the entity it failed on,
/// so the calling application can surface a precise message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("duplicate node id {node}")]
    DuplicateNode { node: u32 },

    #[error("edge #{index} references nonexistent node {node}")]
    UnknownEdgeNode { index: usize, node: u32 },

    #[error("edge #{index} has invalid weight {weight} (must be finite and >= 0)")]
    InvalidEdgeWeight { index: usize, weight: f64 },

    #[error("graph has {count} node(s); at least 2 are required")]
    GraphTooSmall { count: usize },

    #[error("sampling configuration produced zero sample points (spacing {spacing}, cap {cap})")]
    EmptySampleGrid { spacing: f64, cap: usize },

    #[error("scenario {role} node {node} does not exist in the graph")]
    UnknownScenarioNode { role: &'static str, node: u32 },

    #[error("scenario population mix is empty (zero runs)")]
    EmptyPopulation,

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}
