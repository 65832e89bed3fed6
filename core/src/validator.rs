//! Input validation and normalisation.
//!
//! RULE: validation never stops at the first failure. Every offending row
//! across every table is collected into one aggregated error, so a caller
//! can fix a whole dataset in a single round trip.
//!
//! Normalisation resolves foreign keys into integer indices into the item
//! and risk vectors, and joins lookup attributes (phase order, parent
//! location, category hint) into per-element traits. Downstream stages
//! never see an id they cannot resolve.

use crate::correlation::ElementTraits;
use crate::dataset::{CapexEffect, Dataset, RiskEffect};
use crate::error::{RowError, SimError, SimResult};
use crate::types::EntityId;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

/// A CAPEX item with resolved traits. Quotes stay raw here; the
/// distribution fitter parameterises them when the state snapshot is built.
#[derive(Debug, Clone)]
pub struct NormItem {
    pub item_id:   EntityId,
    pub name:      String,
    pub p10:       f64,
    pub ml:        Option<f64>,
    pub p90:       f64,
    pub base_date: NaiveDate,
    pub traits:    ElementTraits,
}

#[derive(Debug, Clone)]
pub struct NormRisk {
    pub risk_id:       EntityId,
    pub name:          String,
    pub probability:   f64,
    pub p10:           f64,
    pub p90:           f64,
    pub risk_log_date: Option<NaiveDate>,
    pub traits:        ElementTraits,
}

#[derive(Debug, Clone)]
pub struct NormCapexAction {
    pub action_id:      EntityId,
    pub name:           String,
    pub item_index:     usize,
    pub effective_date: NaiveDate,
    pub effect:         CapexEffect,
}

#[derive(Debug, Clone)]
pub struct NormRiskAction {
    pub action_id:      EntityId,
    pub name:           String,
    pub risk_index:     usize,
    pub effective_date: NaiveDate,
    pub effect:         RiskEffect,
}

/// The validated dataset: indices resolve, quotes are usable, traits are
/// joined. Actions are sorted by (effective_date, apply rank, action id).
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub items:         Vec<NormItem>,
    pub risks:         Vec<NormRisk>,
    pub capex_actions: Vec<NormCapexAction>,
    pub risk_actions:  Vec<NormRiskAction>,
}

impl Normalized {
    /// Traits of every sampled element: items first, then risks, in input
    /// order. This ordering is the correlation matrix ordering.
    pub fn element_traits(&self) -> Vec<ElementTraits> {
        self.items
            .iter()
            .map(|i| i.traits.clone())
            .chain(self.risks.iter().map(|r| r.traits.clone()))
            .collect()
    }
}

struct Lookups {
    disciplines: HashSet<EntityId>,
    phases:      HashMap<EntityId, Option<i64>>,
    locations:   HashMap<EntityId, Option<EntityId>>,
    categories:  HashMap<EntityId, Option<f64>>,
    risk_logs:   HashSet<EntityId>,
}

pub fn validate(dataset: &Dataset) -> SimResult<Normalized> {
    let mut errors: Vec<RowError> = Vec::new();
    let lookups = check_lookups(dataset, &mut errors);

    let mut item_index: HashMap<EntityId, usize> = HashMap::new();
    let mut items = Vec::with_capacity(dataset.capex_items.len());
    for item in &dataset.capex_items {
        let e = &mut errors;
        if item_index.contains_key(&item.item_id) {
            push(e, "capex_items", item.item_id, "duplicate item id");
            continue;
        }
        let quote_ok = check_quote(e, "capex_items", item.item_id, item.p10_cost, item.p90_cost);
        if let Some(ml) = item.ml_cost {
            if !ml.is_finite() {
                push(e, "capex_items", item.item_id, "ML cost is not finite");
            } else if quote_ok && !(item.p10_cost <= ml && ml <= item.p90_cost) {
                push(e, "capex_items", item.item_id, "ML cost outside [P10, P90]");
            }
        }
        let traits = item_traits(e, "capex_items", item.item_id, &lookups,
            item.owner.clone(), item.discipline_id, item.phase_id, item.location_id);

        item_index.insert(item.item_id, items.len());
        items.push(NormItem {
            item_id:   item.item_id,
            name:      item.name.clone(),
            p10:       item.p10_cost,
            ml:        item.ml_cost,
            p90:       item.p90_cost,
            base_date: item.base_date,
            traits,
        });
    }

    let mut risk_index: HashMap<EntityId, usize> = HashMap::new();
    let mut risks = Vec::with_capacity(dataset.risks.len());
    for risk in &dataset.risks {
        let e = &mut errors;
        if risk_index.contains_key(&risk.risk_id) {
            push(e, "risks", risk.risk_id, "duplicate risk id");
            continue;
        }
        check_quote(e, "risks", risk.risk_id, risk.p10_impact, risk.p90_impact);
        check_probability(e, "risks", risk.risk_id, risk.probability);

        let mut traits = item_traits(e, "risks", risk.risk_id, &lookups,
            risk.owner.clone(), risk.discipline_id, risk.phase_id, risk.location_id);
        if let Some(category_id) = risk.risk_category_id {
            match lookups.categories.get(&category_id) {
                Some(hint) => {
                    traits.risk_category_id = Some(category_id);
                    traits.category_affinity = *hint;
                }
                None => push(e, "risks", risk.risk_id,
                    &format!("unknown risk_category_id {category_id}")),
            }
        }
        if let Some(log_id) = risk.risk_log_id {
            if lookups.risk_logs.contains(&log_id) {
                traits.risk_log_id = Some(log_id);
            } else {
                push(e, "risks", risk.risk_id, &format!("unknown risk_log_id {log_id}"));
            }
        }

        risk_index.insert(risk.risk_id, risks.len());
        risks.push(NormRisk {
            risk_id:       risk.risk_id,
            name:          risk.name.clone(),
            probability:   risk.probability,
            p10:           risk.p10_impact,
            p90:           risk.p90_impact,
            risk_log_date: risk.risk_log_date,
            traits,
        });
    }

    let mut capex_actions = Vec::with_capacity(dataset.capex_actions.len());
    let mut seen_capex_actions: HashSet<EntityId> = HashSet::new();
    for action in &dataset.capex_actions {
        let e = &mut errors;
        if !seen_capex_actions.insert(action.action_id) {
            push(e, "capex_actions", action.action_id, "duplicate action id");
            continue;
        }
        let (p10, p90) = match action.effect {
            CapexEffect::Replacement { p10, p90 } | CapexEffect::Adjustment { p10, p90 } => {
                (p10, p90)
            }
        };
        check_quote(e, "capex_actions", action.action_id, p10, p90);

        let Some(&index) = item_index.get(&action.item_id) else {
            push(e, "capex_actions", action.action_id,
                &format!("references non-existent item {}", action.item_id));
            continue;
        };
        if action.effective_date < items[index].base_date {
            push(e, "capex_actions", action.action_id,
                "effective_date precedes the item's base_date");
        }
        capex_actions.push(NormCapexAction {
            action_id:      action.action_id,
            name:           action.name.clone(),
            item_index:     index,
            effective_date: action.effective_date,
            effect:         action.effect,
        });
    }

    let mut risk_actions = Vec::with_capacity(dataset.risk_actions.len());
    let mut seen_risk_actions: HashSet<EntityId> = HashSet::new();
    for action in &dataset.risk_actions {
        let e = &mut errors;
        if !seen_risk_actions.insert(action.action_id) {
            push(e, "risk_actions", action.action_id, "duplicate action id");
            continue;
        }
        check_risk_effect(e, action.action_id, &action.effect);

        let Some(&index) = risk_index.get(&action.risk_id) else {
            push(e, "risk_actions", action.action_id,
                &format!("references non-existent risk {}", action.risk_id));
            continue;
        };
        if let Some(log_date) = risks[index].risk_log_date {
            if action.effective_date < log_date {
                push(e, "risk_actions", action.action_id,
                    "effective_date precedes the risk's log date");
            }
        }
        risk_actions.push(NormRiskAction {
            action_id:      action.action_id,
            name:           action.name.clone(),
            risk_index:     index,
            effective_date: action.effective_date,
            effect:         action.effect,
        });
    }

    if !errors.is_empty() {
        log::warn!("input validation found {} offending row(s)", errors.len());
        for error in &errors {
            log::warn!("  - {error}");
        }
        return Err(SimError::Validation(errors));
    }

    capex_actions.sort_by(|a, b| {
        (a.effective_date, a.effect.apply_rank(), a.action_id)
            .cmp(&(b.effective_date, b.effect.apply_rank(), b.action_id))
    });
    risk_actions.sort_by(|a, b| {
        (a.effective_date, a.effect.apply_rank(), a.action_id)
            .cmp(&(b.effective_date, b.effect.apply_rank(), b.action_id))
    });

    log::debug!(
        "validated {} item(s), {} risk(s), {} capex action(s), {} risk action(s)",
        items.len(), risks.len(), capex_actions.len(), risk_actions.len()
    );

    Ok(Normalized { items, risks, capex_actions, risk_actions })
}

fn check_lookups(dataset: &Dataset, errors: &mut Vec<RowError>) -> Lookups {
    let mut disciplines = HashSet::new();
    for d in &dataset.disciplines {
        if !disciplines.insert(d.discipline_id) {
            push(errors, "disciplines", d.discipline_id, "duplicate discipline id");
        }
    }

    let mut phases = HashMap::new();
    for p in &dataset.phases {
        if phases.insert(p.phase_id, p.phase_order).is_some() {
            push(errors, "project_phases", p.phase_id, "duplicate phase id");
        }
    }

    let mut locations = HashMap::new();
    for l in &dataset.locations {
        if locations.insert(l.location_id, l.parent_location_id).is_some() {
            push(errors, "locations", l.location_id, "duplicate location id");
        }
    }
    for l in &dataset.locations {
        if let Some(parent) = l.parent_location_id {
            if !locations.contains_key(&parent) {
                push(errors, "locations", l.location_id,
                    &format!("unknown parent_location_id {parent}"));
            }
        }
    }

    let mut categories = HashMap::new();
    for c in &dataset.risk_categories {
        if let Some(hint) = c.default_correlation {
            if !hint.is_finite() || !(0.0..=1.0).contains(&hint) {
                push(errors, "risk_categories", c.risk_category_id,
                    "default_correlation outside [0, 1]");
            }
        }
        if categories.insert(c.risk_category_id, c.default_correlation).is_some() {
            push(errors, "risk_categories", c.risk_category_id, "duplicate category id");
        }
    }

    let mut risk_logs = HashSet::new();
    for l in &dataset.risk_logs {
        if !risk_logs.insert(l.risk_log_id) {
            push(errors, "risk_logs", l.risk_log_id, "duplicate risk log id");
        }
    }

    Lookups { disciplines, phases, locations, categories, risk_logs }
}

/// Shared trait resolution for the attributes items and risks have in
/// common. Null foreign keys are fine (no affinity); unknown ones are not.
fn item_traits(
    errors: &mut Vec<RowError>,
    table: &'static str,
    id: EntityId,
    lookups: &Lookups,
    owner: Option<String>,
    discipline_id: Option<EntityId>,
    phase_id: Option<EntityId>,
    location_id: Option<EntityId>,
) -> ElementTraits {
    let mut traits = ElementTraits { owner, ..Default::default() };

    if let Some(did) = discipline_id {
        if lookups.disciplines.contains(&did) {
            traits.discipline_id = Some(did);
        } else {
            push(errors, table, id, &format!("unknown discipline_id {did}"));
        }
    }
    if let Some(pid) = phase_id {
        match lookups.phases.get(&pid) {
            Some(order) => {
                traits.phase_id = Some(pid);
                traits.phase_order = *order;
            }
            None => push(errors, table, id, &format!("unknown phase_id {pid}")),
        }
    }
    if let Some(lid) = location_id {
        match lookups.locations.get(&lid) {
            Some(parent) => {
                traits.location_id = Some(lid);
                traits.parent_location_id = *parent;
            }
            None => push(errors, table, id, &format!("unknown location_id {lid}")),
        }
    }

    traits
}

/// True when the quote is usable for further checks.
fn check_quote(
    errors: &mut Vec<RowError>,
    table: &'static str,
    id: EntityId,
    p10: f64,
    p90: f64,
) -> bool {
    if !p10.is_finite() || !p90.is_finite() {
        push(errors, table, id, "quote contains a non-finite value");
        return false;
    }
    if p10 <= 0.0 || p90 <= 0.0 {
        push(errors, table, id, "quote values must be positive");
        return false;
    }
    if p10 > p90 {
        push(errors, table, id, "P10 exceeds P90");
        return false;
    }
    true
}

fn check_probability(errors: &mut Vec<RowError>, table: &'static str, id: EntityId, p: f64) {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        push(errors, table, id, "probability outside [0, 1]");
    }
}

fn check_risk_effect(errors: &mut Vec<RowError>, id: EntityId, effect: &RiskEffect) {
    match *effect {
        RiskEffect::ProbabilityScale { factor } => {
            if !factor.is_finite() || !(0.0..=1.0).contains(&factor) {
                push(errors, "risk_actions", id, "probability scale factor outside [0, 1]");
            }
        }
        RiskEffect::ProbabilitySubtract { amount } => {
            if !amount.is_finite() || !(0.0..=1.0).contains(&amount) {
                push(errors, "risk_actions", id, "probability reduction outside [0, 1]");
            }
        }
        RiskEffect::ImpactScale { factor } => {
            if !factor.is_finite() || factor <= 0.0 || factor > 1.0 {
                push(errors, "risk_actions", id, "impact scale factor outside (0, 1]");
            }
        }
        RiskEffect::Elimination => {}
    }
}

fn push(errors: &mut Vec<RowError>, table: &'static str, id: EntityId, message: &str) {
    errors.push(RowError { table, id, message: message.to_string() });
}
