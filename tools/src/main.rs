//! sim-runner: headless runner for the caprisk engine.
//!
//! Usage:
//!   sim-runner --seed 42 --iterations 10000 --horizon-months 12
//!   sim-runner --seed 42 --json
//!
//! Runs the engine against a small built-in demo project and prints the
//! checkpoint table. This is a dev harness; the engine itself has no CLI.

use anyhow::Result;
use caprisk_core::{
    simulate_cost_evolution, CancelToken, CapexAction, CapexEffect, CapexItem, Dataset,
    Discipline, Risk, RiskAction, RiskCategory, RiskEffect, SimulationConfig,
};
use chrono::NaiveDate;
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let iterations = parse_arg(&args, "--iterations", 10_000usize);
    let horizon_months = parse_arg(&args, "--horizon-months", 12u32);
    let as_json = args.iter().any(|a| a == "--json");

    println!("caprisk — sim-runner");
    println!("  seed:           {seed}");
    println!("  iterations:     {iterations}");
    println!("  horizon months: {horizon_months}");
    println!();

    let dataset = demo_dataset();
    let mut config = SimulationConfig::new(date(2025, 1, 1));
    config.seed = Some(seed);
    config.n_iterations = iterations;
    config.horizon_months = horizon_months;

    let result = simulate_cost_evolution(&dataset, &config, &CancelToken::new())?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("=== RUN SUMMARY ===");
    println!("  seed_used:    {}", result.seed_used);
    println!("  items/risks:  {}/{}", result.n_items, result.n_risks);
    println!(
        "  correlation:  {} pair(s), mean {:.3}, repaired: {}",
        result.correlation_summary.pairs,
        result.correlation_summary.mean_off_diagonal,
        result.correlation_summary.repaired
    );
    println!();
    println!("  {:<12} {:>12} {:>12} {:>12} {:>14}", "date", "p20", "p50", "p80", "deterministic");
    for row in &result.rows {
        println!(
            "  {:<12} {:>12.0} {:>12.0} {:>12.0} {:>14.0}",
            row.date.to_string(),
            row.p20,
            row.p50,
            row.p80,
            row.deterministic
        );
    }

    Ok(())
}

/// A small project: three items, two risks, one mitigation on each side.
fn demo_dataset() -> Dataset {
    Dataset {
        capex_items: vec![
            item(1, "Substation works", 800_000.0, 1_400_000.0, Some("n.varga"), Some(1)),
            item(2, "Cable routing", 300_000.0, 520_000.0, Some("n.varga"), Some(1)),
            item(3, "Control building", 450_000.0, 700_000.0, Some("p.osei"), Some(2)),
        ],
        capex_actions: vec![CapexAction {
            action_id:      101,
            item_id:        1,
            name:           "Re-tendered substation package".into(),
            effective_date: date(2025, 3, 15),
            effect:         CapexEffect::Replacement { p10: 700_000.0, p90: 1_100_000.0 },
        }],
        risks: vec![
            Risk {
                risk_id:          11,
                name:             "Late grid permit".into(),
                probability:      0.35,
                p10_impact:       100_000.0,
                p90_impact:       280_000.0,
                risk_log_date:    None,
                owner:            Some("n.varga".into()),
                discipline_id:    Some(1),
                phase_id:         None,
                location_id:      None,
                risk_category_id: Some(5),
                risk_log_id:      None,
            },
            Risk {
                risk_id:          12,
                name:             "Ground contamination".into(),
                probability:      0.15,
                p10_impact:       200_000.0,
                p90_impact:       600_000.0,
                risk_log_date:    Some(date(2025, 2, 1)),
                owner:            Some("p.osei".into()),
                discipline_id:    Some(2),
                phase_id:         None,
                location_id:      None,
                risk_category_id: Some(5),
                risk_log_id:      None,
            },
        ],
        risk_actions: vec![RiskAction {
            action_id:      201,
            risk_id:        11,
            name:           "Early permit pre-application".into(),
            effective_date: date(2025, 4, 1),
            effect:         RiskEffect::ProbabilityScale { factor: 0.5 },
        }],
        disciplines: vec![
            Discipline { discipline_id: 1, name: "Electrical".into() },
            Discipline { discipline_id: 2, name: "Civil".into() },
        ],
        phases: vec![],
        locations: vec![],
        risk_categories: vec![RiskCategory {
            risk_category_id:    5,
            name:                "Regulatory".into(),
            default_correlation: None,
        }],
        risk_logs: vec![],
    }
}

fn item(
    item_id: i64,
    name: &str,
    p10: f64,
    p90: f64,
    owner: Option<&str>,
    discipline_id: Option<i64>,
) -> CapexItem {
    CapexItem {
        item_id,
        name: name.into(),
        p10_cost: p10,
        ml_cost: None,
        p90_cost: p90,
        base_date: date(2025, 1, 1),
        owner: owner.map(str::to_string),
        discipline_id,
        phase_id: None,
        location_id: None,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
