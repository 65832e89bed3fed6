//! Reduction of per-iteration totals into checkpoint rows.

use crate::correlation::CorrelationSummary;
use crate::snapshot::StateSnapshot;
use crate::types::{Checkpoint, EntityId};
use crate::validator::Normalized;
use serde::{Deserialize, Serialize};

/// Empirical percentile with linear interpolation between adjacent ranks.
/// `percent` is on the 0..=100 scale; `sorted` must be ascending and
/// non-empty.
pub fn percentile(sorted: &[f64], percent: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = (sorted.len() - 1) as f64 * percent / 100.0;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] + weight * (sorted[upper] - sorted[lower])
    }
}

/// (p20, p50, p80) of a totals vector.
pub fn summarise_totals(totals: &[f64]) -> (f64, f64, f64) {
    let mut sorted = totals.to_vec();
    sorted.sort_by(f64::total_cmp);
    (
        percentile(&sorted, 20.0),
        percentile(&sorted, 50.0),
        percentile(&sorted, 80.0),
    )
}

/// Deterministic point estimate: item medians plus expected risk impacts
/// over the logged risks.
pub fn deterministic_estimate(snapshot: &StateSnapshot, logged: &[bool]) -> f64 {
    let items: f64 = snapshot.items.iter().map(|i| i.median()).sum();
    let risks: f64 = snapshot
        .risks
        .iter()
        .zip(logged)
        .filter(|(_, &is_logged)| is_logged)
        .map(|(r, _)| r.expected_impact())
        .sum();
    items + risks
}

/// One applied action in the mitigation ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationImpact {
    pub action_id:      EntityId,
    pub description:    String,
    /// Change the action caused to its element's deterministic
    /// contribution; negative when the action grew the cost.
    pub expected_saving: f64,
}

/// One logged risk's expected contribution at a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskImpact {
    pub risk_id:         EntityId,
    pub name:            String,
    pub expected_impact: f64,
}

/// Expected impacts of every logged risk, input order. Zero-probability
/// risks (including eliminated ones) stay listed with a zero impact.
pub fn risk_impacts(
    normalized: &Normalized,
    snapshot: &StateSnapshot,
    logged: &[bool],
) -> Vec<RiskImpact> {
    normalized
        .risks
        .iter()
        .zip(&snapshot.risks)
        .zip(logged)
        .filter(|(_, &is_logged)| is_logged)
        .map(|((risk, state), _)| RiskImpact {
            risk_id:         risk.risk_id,
            name:            risk.name.clone(),
            expected_impact: state.expected_impact(),
        })
        .collect()
}

/// One output row per checkpoint, strictly increasing dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRow {
    pub date:               Checkpoint,
    pub p20:                f64,
    pub p50:                f64,
    pub p80:                f64,
    pub deterministic:      f64,
    pub mitigation_impacts: Vec<MitigationImpact>,
    pub risk_impacts:       Vec<RiskImpact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub seed_used:           u64,
    pub n_iterations:        usize,
    pub n_items:             usize,
    pub n_risks:             usize,
    pub correlation_summary: CorrelationSummary,
    pub rows:                Vec<CheckpointRow>,
}
