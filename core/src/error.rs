use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One failed validation check, tied to the row that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub table:   &'static str,
    pub id:      EntityId,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.table, self.id, self.message)
    }
}

#[derive(Error, Debug)]
pub enum SimError {
    /// Every offending row is listed; validation never stops at the first.
    #[error("Input validation failed with {} offending row(s)", .0.len())]
    Validation(Vec<RowError>),

    #[error("Nothing to simulate: zero CAPEX items and zero risks")]
    InsufficientData,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Correlation factorisation failed after jitter escalation (min eigenvalue {min_eigenvalue:.3e})")]
    Numeric { min_eigenvalue: f64 },

    #[error("Simulation cancelled")]
    Cancelled,

    /// Internal logic errors — bugs, not user input problems.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
