//! Wayfinding Efficiency Score (WES) — the composite 0–100 grade.
//!
//! Raw simulation and visibility metrics are normalized into [0, 1] with
//! linear clamps against fixed bounds, then combined as
//! `100 − Σ α·penalty + Σ β·bonus`, clamped back into [0, 100]. The
//! bounds are fixed rather than dataset-derived so two floor plans score
//! on the same scale.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;

/// Raw inputs to the composite scorer, typically scenario-batch means.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WesInputs {
    /// Mean completion time in seconds.
    pub mean_time: f64,
    /// Mean detour index, >= 1.
    pub detour_index: f64,
    /// Mean wrong turns per run.
    pub mean_errors: f64,
    /// Mean hesitations (node revisits) per run.
    pub mean_hesitations: f64,
    /// Mean visual integration over the sample grid, in [0, 1].
    pub visual_integration: f64,
    /// Signage quality, in [0, 1] or [0, 100].
    pub signage_quality: f64,
    /// Accessibility quality, in [0, 1] or [0, 100].
    pub accessibility: f64,
}

/// The inputs after normalization, kept for reporting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormalizedMetrics {
    pub time: f64,
    pub detour: f64,
    pub errors: f64,
    pub hesitations: f64,
    pub visual_integration: f64,
    pub signage: f64,
    pub accessibility: f64,
}

/// Qualitative grade band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreBand {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Critical,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            ScoreBand::Excellent
        } else if score >= 75.0 {
            ScoreBand::Good
        } else if score >= 60.0 {
            ScoreBand::Acceptable
        } else if score >= 45.0 {
            ScoreBand::Poor
        } else {
            ScoreBand::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreBand::Excellent => "excellent",
            ScoreBand::Good => "good",
            ScoreBand::Acceptable => "acceptable",
            ScoreBand::Poor => "poor",
            ScoreBand::Critical => "critical",
        }
    }
}

/// Scored result with the full contribution breakdown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WesResult {
    /// Final score in [0, 100].
    pub score: f64,
    pub band: ScoreBand,
    pub normalized: NormalizedMetrics,
    pub time_penalty: f64,
    pub detour_penalty: f64,
    pub error_penalty: f64,
    pub hesitation_penalty: f64,
    pub visual_bonus: f64,
    pub signage_bonus: f64,
    pub accessibility_bonus: f64,
}

impl WesResult {
    pub fn penalty_total(&self) -> f64 {
        self.time_penalty + self.detour_penalty + self.error_penalty + self.hesitation_penalty
    }

    pub fn bonus_total(&self) -> f64 {
        self.visual_bonus + self.signage_bonus + self.accessibility_bonus
    }
}

/// Compute the composite score.
pub fn score(inputs: &WesInputs, cfg: &ScoringConfig) -> WesResult {
    let b = &cfg.bounds;
    let w = &cfg.weights;

    let normalized = NormalizedMetrics {
        time: clamp_normalize(inputs.mean_time, b.time),
        detour: clamp_normalize(inputs.detour_index, b.detour),
        errors: clamp_normalize(inputs.mean_errors, b.errors),
        hesitations: clamp_normalize(inputs.mean_hesitations, b.hesitations),
        visual_integration: clamp_normalize(inputs.visual_integration, b.visual_integration),
        signage: quality_fraction(inputs.signage_quality),
        accessibility: quality_fraction(inputs.accessibility),
    };

    let time_penalty = w.time * normalized.time;
    let detour_penalty = w.detour * normalized.detour;
    let error_penalty = w.errors * normalized.errors;
    let hesitation_penalty = w.hesitations * normalized.hesitations;
    let visual_bonus = w.visual_integration * normalized.visual_integration;
    let signage_bonus = w.signage * normalized.signage;
    let accessibility_bonus = w.accessibility * normalized.accessibility;

    let raw = 100.0
        - (time_penalty + detour_penalty + error_penalty + hesitation_penalty)
        + (visual_bonus + signage_bonus + accessibility_bonus);
    let score = raw.clamp(0.0, 100.0);

    WesResult {
        score,
        band: ScoreBand::from_score(score),
        normalized,
        time_penalty,
        detour_penalty,
        error_penalty,
        hesitation_penalty,
        visual_bonus,
        signage_bonus,
        accessibility_bonus,
    }
}

/// Linear clamp of `value` against `(lo, hi)` into [0, 1].
fn clamp_normalize(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if !(hi > lo) {
        return 0.0;
    }
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Quality inputs accept either a [0, 1] fraction or a [0, 100] score.
fn quality_fraction(value: f64) -> f64 {
    if value > 1.0 {
        (value / 100.0).clamp(0.0, 1.0)
    } else {
        value.clamp(0.0, 1.0)
    }
}
