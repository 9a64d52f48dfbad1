//! Engine configuration — every tunable the analyzers and the simulator
//! read, with literature-derived defaults and validation.
//!
//! Nothing in the engine hardcodes a threshold: percentile cutoffs,
//! normalization bounds, agent profiles, and error-model constants all
//! live here so a host application can replace them without code change.

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::simulation::AgentType;

/// Space-syntax thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceSyntaxConfig {
    /// Nodes above this betweenness percentile are flagged as bottlenecks.
    pub bottleneck_percentile: f64,
    /// Nodes above this integration percentile are flagged as hubs.
    pub hub_percentile: f64,
}

impl Default for SpaceSyntaxConfig {
    fn default() -> Self {
        Self {
            bottleneck_percentile: 90.0,
            hub_percentile: 90.0,
        }
    }
}

/// Visibility sampling and isovist parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Grid spacing in meters between sample points.
    pub grid_spacing: f64,
    /// Hard cap on sample count; spacing is coarsened deterministically
    /// until the grid fits.
    pub max_samples: usize,
    /// Maximum ray length in meters.
    pub max_ray_range: f64,
    /// Angular step between rays in degrees (5.0 gives 72 rays).
    pub angular_step_deg: f64,
    /// Fixed isovist-area normalization constant (m²). Not derived from the
    /// dataset, so scores stay comparable across floor plans.
    pub area_normalization: f64,
    /// Samples below this visual-integration percentile are blind spots.
    pub blind_spot_percentile: f64,
    /// Samples above this visual-integration percentile are wide-visibility
    /// points.
    pub wide_view_percentile: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            grid_spacing: 1.0,
            max_samples: 400,
            max_ray_range: 50.0,
            angular_step_deg: 5.0,
            area_normalization: 100.0,
            blind_spot_percentile: 10.0,
            wide_view_percentile: 90.0,
        }
    }
}

/// Behavioral parameters for one agent profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Base probability of a wrong turn at a decision point.
    pub base_error_rate: f64,
    /// Walking speed in m/s.
    pub speed: f64,
}

/// The closed set of four agent profiles.
///
/// Hölscher-style wayfinding populations: familiar users make few errors
/// and walk fast; first-time visitors err often; elderly and
/// mobility-impaired users err often and walk slowly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileTable {
    pub familiar: AgentProfile,
    pub first_time: AgentProfile,
    pub elderly: AgentProfile,
    pub mobility_impaired: AgentProfile,
}

impl ProfileTable {
    pub fn get(&self, agent_type: AgentType) -> AgentProfile {
        match agent_type {
            AgentType::Familiar => self.familiar,
            AgentType::FirstTime => self.first_time,
            AgentType::Elderly => self.elderly,
            AgentType::MobilityImpaired => self.mobility_impaired,
        }
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            familiar: AgentProfile {
                base_error_rate: 0.05,
                speed: 1.4,
            },
            first_time: AgentProfile {
                base_error_rate: 0.25,
                speed: 1.0,
            },
            elderly: AgentProfile {
                base_error_rate: 0.35,
                speed: 0.8,
            },
            mobility_impaired: AgentProfile {
                base_error_rate: 0.30,
                speed: 0.6,
            },
        }
    }
}

/// Agent-simulator tunables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub profiles: ProfileTable,
    /// Per-extra-choice error gain: degree_factor = (degree - 1) * this.
    pub degree_error_gain: f64,
    /// Upper bound on the per-decision error probability.
    pub error_cap: f64,
    /// Multiplier applied when no signage is within `cue_radius` of a node.
    pub no_signage_factor: f64,
    /// Multiplier applied when no landmark is within `cue_radius` of a node.
    pub no_landmark_factor: f64,
    /// Radius in meters within which a signage/landmark cue counts.
    pub cue_radius: f64,
    /// Seconds spent reorienting at each decision point.
    pub decision_dwell_time: f64,
    /// Step budget = this factor × graph diameter (hops).
    pub stuck_budget_factor: u32,
    /// Floor on the step budget for very small graphs.
    pub min_step_budget: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            profiles: ProfileTable::default(),
            degree_error_gain: 0.15,
            error_cap: 0.9,
            no_signage_factor: 2.0,
            no_landmark_factor: 1.67,
            cue_radius: 10.0,
            decision_dwell_time: 5.0,
            stuck_budget_factor: 6,
            min_step_budget: 16,
        }
    }
}

/// WES component weights. Penalties α apply to normalized simulation
/// metrics, bonuses β to normalized quality scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WesWeights {
    pub time: f64,
    pub detour: f64,
    pub errors: f64,
    pub hesitations: f64,
    pub visual_integration: f64,
    pub signage: f64,
    pub accessibility: f64,
}

impl Default for WesWeights {
    fn default() -> Self {
        Self {
            time: 15.0,
            detour: 10.0,
            errors: 20.0,
            hesitations: 10.0,
            visual_integration: 20.0,
            signage: 15.0,
            accessibility: 10.0,
        }
    }
}

/// Linear clamp bounds for normalizing raw metrics into [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormalizationBounds {
    pub time: (f64, f64),
    pub detour: (f64, f64),
    pub errors: (f64, f64),
    pub hesitations: (f64, f64),
    pub visual_integration: (f64, f64),
}

impl Default for NormalizationBounds {
    fn default() -> Self {
        Self {
            time: (60.0, 300.0),
            detour: (1.0, 2.5),
            errors: (0.0, 5.0),
            hesitations: (0.0, 8.0),
            visual_integration: (0.0, 1.0),
        }
    }
}

/// Composite-scorer configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: WesWeights,
    pub bounds: NormalizationBounds,
}

/// Top-level configuration for one full analysis.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub space_syntax: SpaceSyntaxConfig,
    pub sampling: SamplingConfig,
    pub simulation: SimulationConfig,
    pub scoring: ScoringConfig,
}

impl EngineConfig {
    /// Reject configurations that would make results meaningless.
    pub fn validate(&self) -> Result<(), InputError> {
        let fail = |reason: &str| {
            Err(InputError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.sampling.grid_spacing <= 0.0 || !self.sampling.grid_spacing.is_finite() {
            return fail("sampling.grid_spacing must be positive and finite");
        }
        if self.sampling.max_samples == 0 {
            return fail("sampling.max_samples must be at least 1");
        }
        if self.sampling.angular_step_deg <= 0.0 || self.sampling.angular_step_deg > 120.0 {
            return fail("sampling.angular_step_deg must be in (0, 120]");
        }
        if self.sampling.max_ray_range <= 0.0 {
            return fail("sampling.max_ray_range must be positive");
        }
        if self.sampling.area_normalization <= 0.0 {
            return fail("sampling.area_normalization must be positive");
        }
        if !(0.0..=1.0).contains(&self.simulation.error_cap) {
            return fail("simulation.error_cap must be in [0, 1]");
        }
        if self.simulation.stuck_budget_factor == 0 {
            return fail("simulation.stuck_budget_factor must be at least 1");
        }
        for (name, p) in [
            ("space_syntax.bottleneck_percentile", self.space_syntax.bottleneck_percentile),
            ("space_syntax.hub_percentile", self.space_syntax.hub_percentile),
            ("sampling.blind_spot_percentile", self.sampling.blind_spot_percentile),
            ("sampling.wide_view_percentile", self.sampling.wide_view_percentile),
        ] {
            if !(0.0..=100.0).contains(&p) {
                return Err(InputError::InvalidConfig {
                    reason: format!("{name} must be in [0, 100]"),
                });
            }
        }
        for (lo, hi) in [
            self.scoring.bounds.time,
            self.scoring.bounds.detour,
            self.scoring.bounds.errors,
            self.scoring.bounds.hesitations,
            self.scoring.bounds.visual_integration,
        ] {
            if !(hi > lo) {
                return fail("scoring.bounds must satisfy hi > lo");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_spacing_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.sampling.grid_spacing = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(InputError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn inverted_bounds_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.scoring.bounds.time = (300.0, 60.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn profile_table_lookup() {
        let t = ProfileTable::default();
        assert_eq!(t.get(AgentType::Familiar), t.familiar);
        assert!(t.get(AgentType::Elderly).speed < t.get(AgentType::Familiar).speed);
        assert!(
            t.get(AgentType::FirstTime).base_error_rate
                > t.get(AgentType::Familiar).base_error_rate
        );
    }
}
