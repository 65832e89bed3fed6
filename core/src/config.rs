use crate::error::{SimError, SimResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MIN_ITERATIONS: usize = 1_000;
pub const MAX_ITERATIONS: usize = 50_000;
pub const DEFAULT_ITERATIONS: usize = 10_000;
pub const MAX_HORIZON_MONTHS: u32 = 60;
pub const DEFAULT_HORIZON_MONTHS: u32 = 12;

/// Baseline checkpoint spacing. Event dates are inserted on top of this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    /// Categorical-affinity correlation (owner, discipline, phase, ...).
    Category,
    /// Independent sampling: the factor is the identity.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Start of the simulation horizon.
    pub data_date:          NaiveDate,
    pub frequency:          Frequency,
    /// Horizon length in months, 1..=60.
    pub horizon_months:     u32,
    /// Monte Carlo iterations, 1_000..=50_000.
    pub n_iterations:       usize,
    pub enable_correlation: bool,
    pub correlation_method: CorrelationMethod,
    /// Master seed. When absent the engine picks one and reports it
    /// in the result header as `seed_used`.
    pub seed:               Option<u64>,
}

impl SimulationConfig {
    pub fn new(data_date: NaiveDate) -> Self {
        Self {
            data_date,
            frequency:          Frequency::Weekly,
            horizon_months:     DEFAULT_HORIZON_MONTHS,
            n_iterations:       DEFAULT_ITERATIONS,
            enable_correlation: true,
            correlation_method: CorrelationMethod::Category,
            seed:               None,
        }
    }

    /// Config with a fixed seed and a short horizon for use in tests.
    pub fn default_test() -> Self {
        let mut config = Self::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
        );
        config.horizon_months = 3;
        config.n_iterations = 2_000;
        config.seed = Some(42);
        config
    }

    /// Range-check every option; all offending options are named at once.
    pub fn validate(&self) -> SimResult<()> {
        let mut problems = Vec::new();

        if self.horizon_months == 0 || self.horizon_months > MAX_HORIZON_MONTHS {
            problems.push(format!(
                "horizon_months must be in 1..={MAX_HORIZON_MONTHS}, got {}",
                self.horizon_months
            ));
        }
        if self.n_iterations < MIN_ITERATIONS || self.n_iterations > MAX_ITERATIONS {
            problems.push(format!(
                "n_iterations must be in {MIN_ITERATIONS}..={MAX_ITERATIONS}, got {}",
                self.n_iterations
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SimError::Configuration(problems.join("; ")))
        }
    }

    /// True when sampling should go through the correlation factor.
    pub fn correlation_active(&self) -> bool {
        self.enable_correlation && self.correlation_method == CorrelationMethod::Category
    }
}
