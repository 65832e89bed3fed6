//! Boundary behaviour: iteration limits, error taxonomy, cancellation.

use caprisk_core::{
    simulate_cost_evolution, CancelToken, CapexAction, CapexEffect, CapexItem, Dataset, Risk,
    SimError, SimulationConfig,
};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn item(item_id: i64, p10: f64, p90: f64) -> CapexItem {
    CapexItem {
        item_id,
        name: format!("item-{item_id}"),
        p10_cost: p10,
        ml_cost: None,
        p90_cost: p90,
        base_date: date(2025, 1, 1),
        owner: None,
        discipline_id: None,
        phase_id: None,
        location_id: None,
    }
}

fn single_item_dataset() -> Dataset {
    Dataset { capex_items: vec![item(1, 100.0, 200.0)], ..Default::default() }
}

#[test]
fn iteration_bounds_are_inclusive() {
    let dataset = single_item_dataset();
    for n in [1_000usize, 50_000] {
        let mut config = SimulationConfig::default_test();
        config.n_iterations = n;
        let result = simulate_cost_evolution(&dataset, &config, &CancelToken::new())
            .unwrap_or_else(|e| panic!("N={n} must succeed: {e}"));
        assert_eq!(result.n_iterations, n);
    }
    for n in [999usize, 50_001] {
        let mut config = SimulationConfig::default_test();
        config.n_iterations = n;
        let error = simulate_cost_evolution(&dataset, &config, &CancelToken::new())
            .expect_err("out-of-bounds N must be rejected");
        assert!(matches!(error, SimError::Configuration(_)), "got {error}");
    }
}

#[test]
fn horizon_bounds_are_enforced() {
    let dataset = single_item_dataset();
    for months in [0u32, 61] {
        let mut config = SimulationConfig::default_test();
        config.horizon_months = months;
        let error = simulate_cost_evolution(&dataset, &config, &CancelToken::new())
            .expect_err("out-of-bounds horizon must be rejected");
        assert!(matches!(error, SimError::Configuration(_)), "got {error}");
    }
}

#[test]
fn empty_dataset_is_insufficient_data() {
    let error = simulate_cost_evolution(
        &Dataset::default(),
        &SimulationConfig::default_test(),
        &CancelToken::new(),
    )
    .expect_err("empty dataset must be rejected");
    assert!(matches!(error, SimError::InsufficientData), "got {error}");
}

/// Validation reports every offending row at once, never just the first.
#[test]
fn validation_aggregates_all_offending_rows() {
    let dataset = Dataset {
        capex_items: vec![
            item(1, 200.0, 100.0), // P10 > P90
            item(2, f64::NAN, 200.0),
        ],
        capex_actions: vec![CapexAction {
            action_id: 101,
            item_id: 999, // dangling reference
            name: "orphan".into(),
            effective_date: date(2025, 2, 1),
            effect: CapexEffect::Adjustment { p10: 10.0, p90: 20.0 },
        }],
        risks: vec![Risk {
            risk_id: 11,
            name: "risk".into(),
            probability: 1.5, // out of range
            p10_impact: 50.0,
            p90_impact: 100.0,
            risk_log_date: None,
            owner: None,
            discipline_id: None,
            phase_id: None,
            location_id: None,
            risk_category_id: None,
            risk_log_id: None,
        }],
        ..Default::default()
    };

    let error = simulate_cost_evolution(
        &dataset,
        &SimulationConfig::default_test(),
        &CancelToken::new(),
    )
    .expect_err("invalid dataset must be rejected");

    let SimError::Validation(rows) = error else {
        panic!("expected Validation, got {error}");
    };
    assert_eq!(rows.len(), 4, "all four offending rows must be listed: {rows:?}");
    assert!(rows.iter().any(|r| r.table == "capex_items" && r.id == 1));
    assert!(rows.iter().any(|r| r.table == "capex_items" && r.id == 2));
    assert!(rows.iter().any(|r| r.table == "capex_actions" && r.id == 101));
    assert!(rows.iter().any(|r| r.table == "risks" && r.id == 11));
}

#[test]
fn cancelled_token_aborts_without_results() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let error =
        simulate_cost_evolution(&single_item_dataset(), &SimulationConfig::default_test(), &cancel)
            .expect_err("cancelled run must not produce results");
    assert!(matches!(error, SimError::Cancelled), "got {error}");
}

/// One item plus a certain risk with the item's own distribution roughly
/// doubles the P50.
#[test]
fn certain_risk_with_item_distribution_doubles_the_p50() {
    let dataset = Dataset {
        capex_items: vec![item(1, 100.0, 200.0)],
        risks: vec![Risk {
            risk_id: 11,
            name: "mirror".into(),
            probability: 1.0,
            p10_impact: 100.0,
            p90_impact: 200.0,
            risk_log_date: None,
            owner: None,
            discipline_id: None,
            phase_id: None,
            location_id: None,
            risk_category_id: None,
            risk_log_id: None,
        }],
        ..Default::default()
    };
    let mut config = SimulationConfig::default_test();
    config.n_iterations = 20_000;
    let result = simulate_cost_evolution(&dataset, &config, &CancelToken::new()).expect("run");

    let expected = 2.0 * (100.0f64 * 200.0).sqrt(); // 282.84
    let p50 = result.rows[0].p50;
    let relative = (p50 - expected).abs() / expected;
    assert!(
        relative < 0.03,
        "p50 with a certain mirrored risk: expected ~{expected}, got {p50}"
    );
    assert!((result.rows[0].deterministic - expected).abs() < 1e-9);
}

/// Zero mitigations and zero risks: a flat curve at the item median.
#[test]
fn no_state_changes_means_a_flat_curve() {
    let mut config = SimulationConfig::default_test();
    config.n_iterations = 20_000;
    let result =
        simulate_cost_evolution(&single_item_dataset(), &config, &CancelToken::new())
            .expect("run");

    let median = (100.0f64 * 200.0).sqrt();
    let first = &result.rows[0];
    assert!((first.p50 - median).abs() / median < 0.02);
    for row in &result.rows {
        assert_eq!(row.p50, first.p50, "curve must be exactly flat at {}", row.date);
        assert!(row.mitigation_impacts.is_empty());
        assert!(row.risk_impacts.is_empty());
    }
}
