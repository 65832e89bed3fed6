//! caprisk-core — Monte Carlo project-cost risk simulation.
//!
//! Given CAPEX line items with uncertain costs, risks with probabilities
//! and conditional impacts, and dated mitigation actions against both, the
//! engine produces a time series of probabilistic cost forecasts: per
//! checkpoint date, P20/P50/P80 of total project cost plus a deterministic
//! point estimate and per-checkpoint mitigation/risk diagnostics.
//!
//! The engine is synchronous and CPU-bound. It takes already-loaded
//! tabular inputs ([`Dataset`]) and returns tabular outputs
//! ([`SimulationResult`]); transports, persistence, and rendering live
//! outside this crate.

pub mod aggregate;
pub mod cancel;
pub mod config;
pub mod correlation;
pub mod dataset;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod rng;
pub mod sampler;
pub mod schedule;
pub mod snapshot;
pub mod types;
pub mod validator;

pub use aggregate::{CheckpointRow, MitigationImpact, RiskImpact, SimulationResult};
pub use cancel::CancelToken;
pub use config::{CorrelationMethod, Frequency, SimulationConfig};
pub use correlation::{AffinityWeights, CorrelationSummary};
pub use dataset::{
    CapexAction, CapexEffect, CapexItem, Dataset, Discipline, Location, ProjectPhase, Risk,
    RiskAction, RiskCategory, RiskEffect, RiskLog,
};
pub use engine::{simulate_cost_evolution, SimEngine};
pub use error::{RowError, SimError, SimResult};
