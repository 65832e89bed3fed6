//! Distribution-fitter behaviour observed through the public API.

use caprisk_core::{
    simulate_cost_evolution, CancelToken, CapexItem, Dataset, SimulationConfig,
};
use chrono::NaiveDate;
use statrs::distribution::{ContinuousCDF, Normal};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn item(p10: f64, ml: Option<f64>, p90: f64) -> CapexItem {
    CapexItem {
        item_id: 1,
        name: "item".into(),
        p10_cost: p10,
        ml_cost: ml,
        p90_cost: p90,
        base_date: date(2025, 1, 1),
        owner: None,
        discipline_id: None,
        phase_id: None,
        location_id: None,
    }
}

fn run(dataset: &Dataset) -> caprisk_core::SimulationResult {
    simulate_cost_evolution(dataset, &SimulationConfig::default_test(), &CancelToken::new())
        .expect("simulation")
}

/// The fitted lognormal must put exactly 10% of mass below P10 and 90%
/// below P90, to 1e-9, for several representative quotes.
#[test]
fn fitted_parameters_round_trip_the_quote() {
    let standard = Normal::new(0.0, 1.0).unwrap();
    for (p10, p90) in [(100.0, 200.0), (1.0, 50.0), (3_000.0, 3_100.0)] {
        let quote = caprisk_core::distribution::Lognormal::from_p10_p90(p10, p90);
        let at_p10: f64 = standard.cdf((f64::ln(p10) - quote.mu) / quote.sigma);
        let at_p90: f64 = standard.cdf((f64::ln(p90) - quote.mu) / quote.sigma);
        assert!((at_p10 - 0.10).abs() < 1e-9, "CDF(P10)={at_p10} for ({p10},{p90})");
        assert!((at_p90 - 0.90).abs() < 1e-9, "CDF(P90)={at_p90} for ({p10},{p90})");
    }
}

/// A degenerate P10 == P90 quote collapses to a point mass: every
/// percentile and the deterministic estimate equal the quoted value.
#[test]
fn degenerate_quote_gives_a_deterministic_item() {
    let dataset = Dataset {
        capex_items: vec![item(150.0, None, 150.0)],
        ..Default::default()
    };
    let result = run(&dataset);
    for row in &result.rows {
        assert!((row.p20 - 150.0).abs() < 1e-9);
        assert!((row.p50 - 150.0).abs() < 1e-9);
        assert!((row.p80 - 150.0).abs() < 1e-9);
        assert_eq!(row.p20, row.p80, "a point mass has zero spread");
        assert!((row.deterministic - 150.0).abs() < 1e-9);
    }
}

/// The deterministic estimate is the median exp(mu): the geometric mean
/// of the quote.
#[test]
fn deterministic_estimate_is_the_quote_geometric_mean() {
    let dataset = Dataset {
        capex_items: vec![item(100.0, None, 200.0)],
        ..Default::default()
    };
    let result = run(&dataset);
    let geo_mean = (100.0f64 * 200.0).sqrt();
    assert!((result.rows[0].deterministic - geo_mean).abs() < 1e-9);
}

/// ML is retained for display only: quoting it must not change any number
/// in the result.
#[test]
fn most_likely_does_not_reparameterise() {
    let without = Dataset {
        capex_items: vec![item(100.0, None, 200.0)],
        ..Default::default()
    };
    let with_ml = Dataset {
        capex_items: vec![item(100.0, Some(120.0), 200.0)],
        ..Default::default()
    };
    let result_a = run(&without);
    let result_b = run(&with_ml);
    assert_eq!(
        serde_json::to_string(&result_a.rows).unwrap(),
        serde_json::to_string(&result_b.rows).unwrap(),
        "ML must not affect simulation output"
    );
}
