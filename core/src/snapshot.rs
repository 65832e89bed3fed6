//! The state snapshot — per-element distribution parameters over time.
//!
//! The snapshot holds the (mu, sigma, p) parameters the sampler reads. It
//! is mutated ONLY at checkpoint boundaries, by applying dated actions;
//! during a sampling batch it is read-only, so the inner loop needs no
//! locks. Applying an action returns the change it caused to the element's
//! deterministic contribution, which feeds the mitigation diagnostics.

use crate::dataset::{CapexEffect, RiskEffect};
use crate::distribution::Lognormal;
use crate::validator::{NormCapexAction, NormRiskAction, Normalized};
use serde::{Deserialize, Serialize};

/// One CAPEX item's active parameters: the base quote plus any additive
/// adjustment deltas, all sharing the item's correlated normal driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    pub base:   Lognormal,
    pub deltas: Vec<Lognormal>,
}

impl ItemState {
    /// Deterministic contribution: median of the base plus delta medians.
    pub fn median(&self) -> f64 {
        self.base.median() + self.deltas.iter().map(Lognormal::median).sum::<f64>()
    }

    /// Cost at a correlated standard-normal draw.
    pub fn sample_at(&self, y: f64) -> f64 {
        self.base.sample_at(y)
            + self.deltas.iter().map(|d| d.sample_at(y)).sum::<f64>()
    }
}

/// One risk's active parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub probability: f64,
    pub impact:      Lognormal,
}

impl RiskState {
    /// Expected impact p * median, the deterministic contribution.
    pub fn expected_impact(&self) -> f64 {
        self.probability * self.impact.median()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub items: Vec<ItemState>,
    pub risks: Vec<RiskState>,
}

impl StateSnapshot {
    /// Fit every base quote. This is the distribution-fitter stage of the
    /// pipeline: after this point the engine works in (mu, sigma) space.
    pub fn init(normalized: &Normalized) -> Self {
        Self {
            items: normalized
                .items
                .iter()
                .map(|i| ItemState {
                    base:   Lognormal::from_p10_p90(i.p10, i.p90),
                    deltas: Vec::new(),
                })
                .collect(),
            risks: normalized
                .risks
                .iter()
                .map(|r| RiskState {
                    probability: r.probability,
                    impact:      Lognormal::from_p10_p90(r.p10, r.p90),
                })
                .collect(),
        }
    }

    /// Apply one CAPEX action. Returns the expected saving: the drop in
    /// the item's deterministic contribution (negative for cost growth).
    pub fn apply_capex_action(&mut self, action: &NormCapexAction) -> f64 {
        let item = &mut self.items[action.item_index];
        let before = item.median();
        match action.effect {
            CapexEffect::Replacement { p10, p90 } => {
                item.base = Lognormal::from_p10_p90(p10, p90);
                item.deltas.clear();
            }
            CapexEffect::Adjustment { p10, p90 } => {
                item.deltas.push(Lognormal::from_p10_p90(p10, p90));
            }
        }
        let saving = before - item.median();
        log::debug!(
            "applied capex action {} to item index {}: saving {saving:.2}",
            action.action_id,
            action.item_index
        );
        saving
    }

    /// Apply one risk action. Returns the expected saving: the drop in the
    /// risk's expected impact. Probability can only fall, never below 0.
    pub fn apply_risk_action(&mut self, action: &NormRiskAction) -> f64 {
        let risk = &mut self.risks[action.risk_index];
        let before = risk.expected_impact();
        match action.effect {
            RiskEffect::ProbabilityScale { factor } => {
                risk.probability *= factor;
            }
            RiskEffect::ProbabilitySubtract { amount } => {
                risk.probability = (risk.probability - amount).max(0.0);
            }
            RiskEffect::ImpactScale { factor } => {
                risk.impact = risk.impact.scaled(factor);
            }
            RiskEffect::Elimination => {
                risk.probability = 0.0;
            }
        }
        let saving = before - risk.expected_impact();
        log::debug!(
            "applied risk action {} to risk index {}: saving {saving:.2}",
            action.action_id,
            action.risk_index
        );
        saving
    }
}
