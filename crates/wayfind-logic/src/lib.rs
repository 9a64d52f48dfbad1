//! Pure spatial-analysis and simulation logic for Wayfind.
//!
//! This crate contains all wayfinding evaluation logic that is independent
//! of any I/O, rendering, or service runtime. Functions take plain data
//! (nodes, edges, wall segments, scenarios) and return plain results,
//! making them unit-testable and portable across CLI tools, services, and
//! batch pipelines. Floor-plan extraction, signage detection, and report
//! rendering live upstream and downstream of this crate.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | All tunable parameters with defaults and validation |
//! | [`engine`] | One-call orchestration of the full analysis pipeline |
//! | [`error`] | Structured fatal input errors |
//! | [`graph`] | Navigation graph: nodes, edges, BFS/Dijkstra, components |
//! | [`isovist`] | Ray casting, isovist polygons, line-of-sight geometry |
//! | [`scoring`] | Wayfinding Efficiency Score (WES) composite scorer |
//! | [`simulation`] | Stochastic agent navigation over the graph |
//! | [`space_syntax`] | Integration, choice, and control graph metrics |
//! | [`stats`] | Shared descriptive-statistics helpers |
//! | [`visibility`] | Sample grid, visibility graph, visual integration |

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod isovist;
pub mod scoring;
pub mod simulation;
pub mod space_syntax;
pub mod stats;
pub mod visibility;
