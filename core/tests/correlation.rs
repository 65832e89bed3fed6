//! Correlation subsystem: affinity-driven sample correlation and the
//! independence fallback, measured on actual draws.

use caprisk_core::correlation::{ElementTraits, FactoredCorrelation};
use caprisk_core::distribution::Lognormal;
use caprisk_core::rng::IterationRng;
use caprisk_core::{
    simulate_cost_evolution, AffinityWeights, CancelToken, CapexItem, Dataset, SimulationConfig,
};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x) * (x - mean_x);
        var_y += (y - mean_y) * (y - mean_y);
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Draw per-iteration cost pairs for two elements through a factor, the
/// way the sampler does.
fn sample_pairs(
    factor: &FactoredCorrelation,
    quote_a: Lognormal,
    quote_b: Lognormal,
    n: usize,
) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::with_capacity(n);
    let mut ys = Vec::with_capacity(n);
    let mut z = [0.0f64; 2];
    let mut y = [0.0f64; 2];
    for k in 0..n {
        let mut rng = IterationRng::new(42, k as u64);
        z[0] = rng.next_standard_normal();
        z[1] = rng.next_standard_normal();
        factor.factor.transform_into(&z, &mut y);
        xs.push(quote_a.sample_at(y[0]));
        ys.push(quote_b.sample_at(y[1]));
    }
    (xs, ys)
}

/// Two items with the same owner and discipline: affinity 0.5 + 0.4 = 0.9,
/// and the cost samples should carry that correlation.
#[test]
fn shared_owner_and_discipline_correlate_at_point_nine() {
    let shared = ElementTraits {
        owner: Some("owner-a".into()),
        discipline_id: Some(1),
        ..Default::default()
    };
    let factored = FactoredCorrelation::build(
        &[shared.clone(), shared],
        &AffinityWeights::default(),
    )
    .expect("build");

    assert_eq!(factored.summary.pairs, 1);
    assert!((factored.matrix.get(0, 1) - 0.9).abs() < 1e-12);
    assert!(!factored.summary.repaired);

    let quote = Lognormal::from_p10_p90(100.0, 200.0);
    let (xs, ys) = sample_pairs(&factored, quote, quote, 20_000);
    let rho = pearson(&xs, &ys);
    assert!(
        (rho - 0.9).abs() < 0.05,
        "expected sample correlation near 0.9, got {rho:.3}"
    );
}

/// With the identity factor the same two elements sample independently.
#[test]
fn independent_factor_gives_uncorrelated_samples() {
    let factored = FactoredCorrelation::independent(2);
    let quote = Lognormal::from_p10_p90(100.0, 200.0);
    let (xs, ys) = sample_pairs(&factored, quote, quote, 20_000);
    let rho = pearson(&xs, &ys);
    assert!(rho.abs() < 0.05, "expected near-zero correlation, got {rho:.3}");
}

/// Disabling correlation in the config produces an empty summary.
#[test]
fn disabled_correlation_reports_no_pairs() {
    let dataset = Dataset {
        capex_items: (1..=3)
            .map(|item_id| CapexItem {
                item_id,
                name: format!("item-{item_id}"),
                p10_cost: 100.0,
                ml_cost: None,
                p90_cost: 200.0,
                base_date: date(2025, 1, 1),
                owner: Some("owner-a".into()),
                discipline_id: None,
                phase_id: None,
                location_id: None,
            })
            .collect(),
        ..Default::default()
    };

    let mut config = SimulationConfig::default_test();
    config.enable_correlation = false;
    let result =
        simulate_cost_evolution(&dataset, &config, &CancelToken::new()).expect("run");
    assert_eq!(result.correlation_summary.pairs, 0);
    assert!(!result.correlation_summary.repaired);

    config.enable_correlation = true;
    let result =
        simulate_cost_evolution(&dataset, &config, &CancelToken::new()).expect("run");
    // Three items sharing an owner: all three pairs at 0.5.
    assert_eq!(result.correlation_summary.pairs, 3);
    assert!((result.correlation_summary.mean_off_diagonal - 0.5).abs() < 1e-12);
    assert!((result.correlation_summary.max_off_diagonal - 0.5).abs() < 1e-12);
}

/// An indefinite affinity pattern (a hub strongly tied to two spokes that
/// share nothing with each other) is repaired rather than rejected, and
/// the repair is reported in the summary.
#[test]
fn indefinite_affinity_pattern_is_repaired() {
    // spoke_a - hub: owner + discipline = 0.9
    // hub - spoke_b: phase + location + category = 1.0, capped at 0.95
    // spoke_a - spoke_b: nothing
    // [[1, .9, 0], [.9, 1, .95], [0, .95, 1]] has a negative eigenvalue.
    let spoke_a = ElementTraits {
        owner: Some("owner-a".into()),
        discipline_id: Some(1),
        ..Default::default()
    };
    let hub = ElementTraits {
        owner: Some("owner-a".into()),
        discipline_id: Some(1),
        phase_id: Some(9),
        location_id: Some(9),
        risk_category_id: Some(9),
        ..Default::default()
    };
    let spoke_b = ElementTraits {
        phase_id: Some(9),
        location_id: Some(9),
        risk_category_id: Some(9),
        ..Default::default()
    };

    let factored =
        FactoredCorrelation::build(&[spoke_a, hub, spoke_b], &AffinityWeights::default())
            .expect("repair must succeed");

    assert!(factored.summary.repaired, "repair should have been needed");
    let lowest = factored
        .summary
        .min_eigenvalue
        .expect("repair reports the eigenvalue it clipped");
    assert!(lowest < 0.0, "the pre-repair matrix was indefinite: {lowest}");

    // The repaired matrix must stay symmetric and unit-diagonal with
    // off-diagonals in [0, 1].
    let m = &factored.matrix;
    for i in 0..3 {
        assert!((m.get(i, i) - 1.0).abs() < 1e-9);
        for j in 0..3 {
            assert!(m.get(i, j) >= -1e-12 && m.get(i, j) <= 1.0 + 1e-12);
            assert!((m.get(i, j) - m.get(j, i)).abs() < 1e-12, "symmetry at ({i},{j})");
        }
    }
}
