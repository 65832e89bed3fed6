//! Input tables for a simulation run.
//!
//! The engine consumes already-loaded tabular inputs; how rows arrive
//! (database, RPC, file) is the caller's concern. Lookup tables exist to
//! give categorical attributes referential stability — correlation scoring
//! resolves against them once, during validation.

use crate::types::EntityId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A capital-expenditure line item with an uncertain cost.
///
/// The (P10, P90) quote is anchored at `base_date`; `ml_cost`, when quoted,
/// is retained for display only and never re-parameterises the distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapexItem {
    pub item_id:       EntityId,
    pub name:          String,
    pub p10_cost:      f64,
    #[serde(default)]
    pub ml_cost:       Option<f64>,
    pub p90_cost:      f64,
    pub base_date:     NaiveDate,
    #[serde(default)]
    pub owner:         Option<String>,
    #[serde(default)]
    pub discipline_id: Option<EntityId>,
    #[serde(default)]
    pub phase_id:      Option<EntityId>,
    #[serde(default)]
    pub location_id:   Option<EntityId>,
}

/// What a CAPEX action does to its item from the effective date forward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapexEffect {
    /// New quote supersedes the item's current one, clearing any
    /// accumulated adjustments.
    Replacement { p10: f64, p90: f64 },
    /// Additive delta with its own quote, on top of the current quote.
    Adjustment { p10: f64, p90: f64 },
}

/// A dated change to a CAPEX item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapexAction {
    pub action_id:      EntityId,
    pub item_id:        EntityId,
    pub name:           String,
    pub effective_date: NaiveDate,
    pub effect:         CapexEffect,
}

/// An uncertain future event that may add cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub risk_id:          EntityId,
    pub name:             String,
    /// Probability of occurrence over the simulation horizon.
    pub probability:      f64,
    /// Conditional impact quote, drawn only when the Bernoulli fires.
    pub p10_impact:       f64,
    pub p90_impact:       f64,
    /// Date the risk enters the register. Risks not yet logged at a
    /// checkpoint contribute nothing there. None = logged from the start.
    #[serde(default)]
    pub risk_log_date:    Option<NaiveDate>,
    #[serde(default)]
    pub owner:            Option<String>,
    #[serde(default)]
    pub discipline_id:    Option<EntityId>,
    #[serde(default)]
    pub phase_id:         Option<EntityId>,
    #[serde(default)]
    pub location_id:      Option<EntityId>,
    #[serde(default)]
    pub risk_category_id: Option<EntityId>,
    #[serde(default)]
    pub risk_log_id:      Option<EntityId>,
}

/// What a risk action does to its risk from the effective date forward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskEffect {
    /// Multiply the probability by a factor in [0, 1].
    ProbabilityScale { factor: f64 },
    /// Subtract from the probability, clamped at 0.
    ProbabilitySubtract { amount: f64 },
    /// Scale the impact quote (both P10 and P90) by a factor in (0, 1].
    ImpactScale { factor: f64 },
    /// Remove the risk entirely: probability drops to 0.
    Elimination,
}

/// A dated change to a risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAction {
    pub action_id:      EntityId,
    pub risk_id:        EntityId,
    pub name:           String,
    pub effective_date: NaiveDate,
    pub effect:         RiskEffect,
}

// ── Lookup tables ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discipline {
    pub discipline_id: EntityId,
    pub name:          String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectPhase {
    pub phase_id:    EntityId,
    pub name:        String,
    /// Position in the project lifecycle; adjacency (|Δ| = 1) earns a
    /// correlation contribution.
    #[serde(default)]
    pub phase_order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub location_id:        EntityId,
    pub name:               String,
    #[serde(default)]
    pub parent_location_id: Option<EntityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCategory {
    pub risk_category_id:    EntityId,
    pub name:                String,
    /// Per-category override for the same-category affinity contribution.
    #[serde(default)]
    pub default_correlation: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLog {
    pub risk_log_id: EntityId,
    pub name:        String,
}

/// Everything the engine needs for one run: four input tables plus the
/// lookup tables their foreign keys point into.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub capex_items:     Vec<CapexItem>,
    pub capex_actions:   Vec<CapexAction>,
    pub risks:           Vec<Risk>,
    pub risk_actions:    Vec<RiskAction>,
    pub disciplines:     Vec<Discipline>,
    pub phases:          Vec<ProjectPhase>,
    pub locations:       Vec<Location>,
    pub risk_categories: Vec<RiskCategory>,
    pub risk_logs:       Vec<RiskLog>,
}

impl CapexEffect {
    /// Stable application rank for same-date tie-breaks.
    pub(crate) fn apply_rank(&self) -> u8 {
        match self {
            Self::Replacement { .. } => 0,
            Self::Adjustment { .. }  => 1,
        }
    }
}

impl RiskEffect {
    /// Continues the rank order after the CAPEX effects.
    pub(crate) fn apply_rank(&self) -> u8 {
        match self {
            Self::ProbabilityScale { .. }    => 2,
            Self::ProbabilitySubtract { .. } => 2,
            Self::ImpactScale { .. }         => 3,
            Self::Elimination                => 4,
        }
    }
}
