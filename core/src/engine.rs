//! The simulation engine — the heart of the cost-evolution pipeline.
//!
//! PIPELINE ORDER (fixed, documented, never reordered):
//!   1. Configuration checks
//!   2. Validator (aggregate row errors, FK resolution)
//!   3. Distribution fitter (initial state snapshot)
//!   4. Correlation builder (factored once, cached for the run)
//!   5. Evolution loop over checkpoints
//!   6. Aggregator (percentiles, deterministic estimate, diagnostics)
//!
//! RULES:
//!   - The snapshot mutates only at checkpoint boundaries.
//!   - All randomness flows through IterationRng streams from one master
//!     seed; picking the seed itself is the only platform-RNG call.
//!   - Same-date actions apply in (effect rank, action id) order.
//!   - Sampling re-runs only when the snapshot or the logged-risk set
//!     changed since the previous checkpoint.
//!   - The cancellation token is honoured between checkpoints and chunks.

use crate::aggregate::{
    self, CheckpointRow, MitigationImpact, SimulationResult,
};
use crate::cancel::CancelToken;
use crate::config::SimulationConfig;
use crate::correlation::{AffinityWeights, FactoredCorrelation};
use crate::dataset::Dataset;
use crate::error::{SimError, SimResult};
use crate::sampler;
use crate::schedule;
use crate::snapshot::StateSnapshot;
use crate::types::{Checkpoint, EntityId};
use crate::validator::{self, NormCapexAction, NormRiskAction, Normalized};

/// Run the whole pipeline once. Each call owns its data; concurrent
/// requests get independent engines and share nothing mutable.
pub fn simulate_cost_evolution(
    dataset: &Dataset,
    config: &SimulationConfig,
    cancel: &CancelToken,
) -> SimResult<SimulationResult> {
    SimEngine::build(dataset, config)?.run(cancel)
}

pub struct SimEngine {
    config:     SimulationConfig,
    normalized: Normalized,
    weights:    AffinityWeights,
}

impl SimEngine {
    /// Validate configuration and inputs and wire up the engine.
    pub fn build(dataset: &Dataset, config: &SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        let normalized = validator::validate(dataset)?;
        if normalized.items.is_empty() && normalized.risks.is_empty() {
            return Err(SimError::InsufficientData);
        }
        Ok(Self {
            config:     config.clone(),
            normalized,
            weights:    AffinityWeights::default(),
        })
    }

    /// Override the affinity coefficients. The defaults are normative;
    /// this exists for calibration experiments.
    pub fn with_affinity_weights(mut self, weights: AffinityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Walk the checkpoint schedule and produce one row per checkpoint.
    pub fn run(&self, cancel: &CancelToken) -> SimResult<SimulationResult> {
        let seed_used = self.config.seed.unwrap_or_else(|| {
            use rand::Rng;
            rand::thread_rng().gen()
        });
        let n_items = self.normalized.items.len();
        let n_risks = self.normalized.risks.len();
        log::info!(
            "starting cost evolution: {n_items} item(s), {n_risks} risk(s), \
             {} iteration(s), seed={seed_used}",
            self.config.n_iterations
        );

        let correlation = if self.config.correlation_active() {
            FactoredCorrelation::build(&self.normalized.element_traits(), &self.weights)?
        } else {
            FactoredCorrelation::independent(n_items + n_risks)
        };

        let end = schedule::horizon_end(self.config.data_date, self.config.horizon_months);
        let event_dates = self
            .normalized
            .capex_actions
            .iter()
            .map(|a| a.effective_date)
            .chain(self.normalized.risk_actions.iter().map(|a| a.effective_date))
            .chain(self.normalized.risks.iter().filter_map(|r| r.risk_log_date));
        let checkpoints = schedule::build_checkpoints(
            self.config.data_date,
            end,
            self.config.frequency,
            event_dates,
        );
        log::info!(
            "generated {} checkpoint(s) from {} to {end}",
            checkpoints.len(),
            self.config.data_date
        );

        let mut planned = self.planned_actions();
        planned.sort_by_key(|a| (a.date(), a.rank(), a.id()));

        let mut snapshot = StateSnapshot::init(&self.normalized);
        let mut next_action = 0usize;
        let mut ledger: Vec<MitigationImpact> = Vec::new();
        let mut logged_prev: Option<Vec<bool>> = None;
        let mut percentiles: Option<(f64, f64, f64)> = None;
        let mut rows = Vec::with_capacity(checkpoints.len());

        for &date in &checkpoints {
            if cancel.is_cancelled() {
                return Err(SimError::Cancelled);
            }

            let mut changed = false;
            while next_action < planned.len() && planned[next_action].date() <= date {
                let applied = self.apply(&mut snapshot, &planned[next_action]);
                ledger.push(applied);
                changed = true;
                next_action += 1;
            }

            let logged: Vec<bool> = self
                .normalized
                .risks
                .iter()
                .map(|r| r.risk_log_date.map_or(true, |d| d <= date))
                .collect();
            if logged_prev.as_ref() != Some(&logged) {
                changed = true;
            }

            if changed || percentiles.is_none() {
                let totals = sampler::sample_totals(
                    &snapshot,
                    &logged,
                    &correlation.factor,
                    seed_used,
                    self.config.n_iterations,
                    cancel,
                )?;
                percentiles = Some(aggregate::summarise_totals(&totals));
                log::debug!("checkpoint {date}: state changed, re-sampled");
            }
            logged_prev = Some(logged.clone());

            let (p20, p50, p80) = percentiles.ok_or_else(|| {
                SimError::Internal(anyhow::anyhow!("no sampling batch ran before {date}"))
            })?;
            rows.push(CheckpointRow {
                date,
                p20,
                p50,
                p80,
                deterministic: aggregate::deterministic_estimate(&snapshot, &logged),
                mitigation_impacts: ledger.clone(),
                risk_impacts: aggregate::risk_impacts(&self.normalized, &snapshot, &logged),
            });
        }

        log::info!("cost evolution complete: {} row(s)", rows.len());
        Ok(SimulationResult {
            seed_used,
            n_iterations: self.config.n_iterations,
            n_items,
            n_risks,
            correlation_summary: correlation.summary,
            rows,
        })
    }

    fn planned_actions(&self) -> Vec<PlannedAction<'_>> {
        self.normalized
            .capex_actions
            .iter()
            .map(PlannedAction::Capex)
            .chain(self.normalized.risk_actions.iter().map(PlannedAction::Risk))
            .collect()
    }

    fn apply(&self, snapshot: &mut StateSnapshot, action: &PlannedAction<'_>) -> MitigationImpact {
        match action {
            PlannedAction::Capex(a) => {
                let saving = snapshot.apply_capex_action(a);
                MitigationImpact {
                    action_id:       a.action_id,
                    description:     a.name.clone(),
                    expected_saving: saving,
                }
            }
            PlannedAction::Risk(a) => {
                let saving = snapshot.apply_risk_action(a);
                MitigationImpact {
                    action_id:       a.action_id,
                    description:     a.name.clone(),
                    expected_saving: saving,
                }
            }
        }
    }
}

/// A dated action of either table, merged for stable application order.
enum PlannedAction<'a> {
    Capex(&'a NormCapexAction),
    Risk(&'a NormRiskAction),
}

impl PlannedAction<'_> {
    fn date(&self) -> Checkpoint {
        match self {
            Self::Capex(a) => a.effective_date,
            Self::Risk(a) => a.effective_date,
        }
    }

    /// Same-date order: cost replacement, cost adjustment, probability
    /// reduction, impact reduction, elimination.
    fn rank(&self) -> u8 {
        match self {
            Self::Capex(a) => a.effect.apply_rank(),
            Self::Risk(a) => a.effect.apply_rank(),
        }
    }

    fn id(&self) -> EntityId {
        match self {
            Self::Capex(a) => a.action_id,
            Self::Risk(a) => a.action_id,
        }
    }
}
