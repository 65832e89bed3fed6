//! Lognormal parameterisation from percentile quotes.
//!
//! A positive quantity quoted as (P10, P90) is modelled lognormal with
//! parameters (mu, sigma) on the log scale:
//!
//!   sigma = (ln P90 - ln P10) / (Z90 - Z10)
//!   mu    = ln P10 - Z10 * sigma
//!
//! The z constants are fixed literals, never recomputed, so independent
//! implementations agree to at least 1e-9.

use serde::{Deserialize, Serialize};

/// Phi^-1(0.10).
pub const Z10: f64 = -1.281_551_565_5;
/// Phi^-1(0.90).
pub const Z90: f64 = 1.281_551_565_5;

/// Fitted lognormal parameters on the log scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lognormal {
    pub mu:    f64,
    pub sigma: f64,
}

impl Lognormal {
    /// Fit from a (P10, P90) quote. Callers guarantee 0 < p10 <= p90
    /// (the validator enforces it); p10 == p90 collapses to a point mass.
    pub fn from_p10_p90(p10: f64, p90: f64) -> Self {
        if p10 == p90 {
            return Self { mu: p10.ln(), sigma: 0.0 };
        }
        let sigma = (p90.ln() - p10.ln()) / (Z90 - Z10);
        let mu = p10.ln() - Z10 * sigma;
        Self { mu, sigma }
    }

    /// Median exp(mu) — the deterministic point estimate.
    pub fn median(&self) -> f64 {
        self.mu.exp()
    }

    /// Mean exp(mu + sigma^2/2). Display and diagnostics only; the
    /// deterministic estimate is the median.
    pub fn mean(&self) -> f64 {
        (self.mu + 0.5 * self.sigma * self.sigma).exp()
    }

    /// Evaluate at a (correlated) standard-normal draw.
    pub fn sample_at(&self, y: f64) -> f64 {
        if self.sigma == 0.0 {
            self.mu.exp()
        } else {
            (self.mu + self.sigma * y).exp()
        }
    }

    /// Scale the underlying quantity by a positive factor. Scaling a
    /// lognormal by c shifts mu by ln(c) and leaves sigma unchanged.
    pub fn scaled(&self, factor: f64) -> Self {
        debug_assert!(factor > 0.0, "scale factor must be positive");
        Self {
            mu:    self.mu + factor.ln(),
            sigma: self.sigma,
        }
    }
}

/// PERT point estimate (P10 + 4·ML + P90) / 6. Diagnostics only.
pub fn pert_estimate(p10: f64, ml: f64, p90: f64) -> f64 {
    (p10 + 4.0 * ml + p90) / 6.0
}
